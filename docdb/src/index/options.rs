use serde::{Deserialize, Serialize};

/// Configuration of a secondary index.
///
/// An index is keyed by a (possibly dotted) field path. It can enforce
/// uniqueness, skip documents where the field is undefined (`sparse`), and
/// expire documents whose indexed timestamp is older than
/// `expire_after_seconds`.
///
/// The serialized form uses the camelCase names `fieldName`, `unique`,
/// `sparse` and `expireAfterSeconds`, which is how index definitions are
/// written to the data file.
///
/// ```ignore
/// db.ensure_index(IndexOptions::new("name").unique(true))?;
/// db.ensure_index(unique_index("developer.name"))?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOptions {
    field_name: String,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    sparse: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expire_after_seconds: Option<u64>,
}

impl IndexOptions {
    /// Creates options for a plain, non-unique index on `field_name`.
    pub fn new(field_name: &str) -> IndexOptions {
        IndexOptions {
            field_name: field_name.to_string(),
            unique: false,
            sparse: false,
            expire_after_seconds: None,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    /// Documents whose indexed field holds a timestamp older than
    /// `seconds` are treated as deleted.
    pub fn expire_after_seconds(mut self, seconds: u64) -> Self {
        self.expire_after_seconds = Some(seconds);
        self
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse
    }

    pub fn expire_after(&self) -> Option<u64> {
        self.expire_after_seconds
    }
}

/// Creates options for a unique index on `field_name`.
pub fn unique_index(field_name: &str) -> IndexOptions {
    IndexOptions::new(field_name).unique(true)
}

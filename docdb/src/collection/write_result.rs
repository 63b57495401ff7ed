use crate::collection::Document;

/// Documents returned by an update run with `return_updated_docs`.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatedDocs {
    /// The single updated document of a non-multi update.
    Single(Document),
    /// Every updated document of a multi update, in insertion order.
    Many(Vec<Document>),
}

/// The result of an update.
///
/// # Examples
///
/// ```rust,ignore
/// let result = db.update(doc!{ _id: "id1" }, &doc!{ "$inc": { price: 100 } }, return_updated_docs())?;
/// assert_eq!(result.count(), 1);
/// if let Some(UpdatedDocs::Single(doc)) = result.updated_docs() {
///     println!("new price {:?}", doc.get("price"));
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    count: usize,
    updated: Option<UpdatedDocs>,
    upserted: Option<Document>,
}

impl UpdateResult {
    pub(crate) fn new(count: usize, updated: Option<UpdatedDocs>) -> Self {
        UpdateResult {
            count,
            updated,
            upserted: None,
        }
    }

    pub(crate) fn upserted(document: Document, return_updated_docs: bool) -> Self {
        UpdateResult {
            count: 1,
            updated: return_updated_docs.then(|| UpdatedDocs::Single(document.clone())),
            upserted: Some(document),
        }
    }

    /// Number of documents updated or inserted.
    pub fn count(&self) -> usize {
        self.count
    }

    /// The updated documents, when requested.
    pub fn updated_docs(&self) -> Option<&UpdatedDocs> {
        self.updated.as_ref()
    }

    /// The inserted document, when the update turned into an insert.
    pub fn upserted_doc(&self) -> Option<&Document> {
        self.upserted.as_ref()
    }

    /// Whether the update turned into an insert.
    pub fn is_upsert(&self) -> bool {
        self.upserted.is_some()
    }
}

/// Options for controlling update operations on documents.
///
/// By default only the first matching document is updated, nothing is
/// inserted when no document matches, and the updated documents are not
/// returned.
///
/// # Examples
///
/// ```rust,ignore
/// use docdb::collection::{update_multi, UpdateOptions};
///
/// // Update every match
/// let options = update_multi();
///
/// // Insert when nothing matches
/// let options = upsert();
///
/// // Custom options
/// let options = UpdateOptions::new(true, false, true);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    multi: bool,
    upsert: bool,
    return_updated_docs: bool,
}

impl UpdateOptions {
    /// Creates a new `UpdateOptions`.
    ///
    /// # Arguments
    ///
    /// * `multi` - If true, update every matching document instead of the first
    /// * `upsert` - If true, insert a new document when nothing matches
    /// * `return_updated_docs` - If true, return the updated documents
    pub fn new(multi: bool, upsert: bool, return_updated_docs: bool) -> Self {
        Self {
            multi,
            upsert,
            return_updated_docs,
        }
    }

    pub fn with_multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn with_return_updated_docs(mut self, return_updated_docs: bool) -> Self {
        self.return_updated_docs = return_updated_docs;
        self
    }

    /// Returns whether every matching document is updated.
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Returns whether to insert when no document matches.
    pub fn is_upsert(&self) -> bool {
        self.upsert
    }

    /// Returns whether the updated documents are returned.
    pub fn is_return_updated_docs(&self) -> bool {
        self.return_updated_docs
    }
}

/// Creates `UpdateOptions` that update every matching document.
pub fn update_multi() -> UpdateOptions {
    UpdateOptions::new(true, false, false)
}

/// Creates `UpdateOptions` that insert a new document when nothing matches.
pub fn upsert() -> UpdateOptions {
    UpdateOptions::new(false, true, false)
}

/// Creates `UpdateOptions` that return the updated documents.
pub fn return_updated_docs() -> UpdateOptions {
    UpdateOptions::new(false, false, true)
}

/// Options for controlling remove operations.
///
/// By default only the first matching document is removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOptions {
    multi: bool,
}

impl RemoveOptions {
    pub fn new(multi: bool) -> Self {
        Self { multi }
    }

    /// Returns whether every matching document is removed.
    pub fn is_multi(&self) -> bool {
        self.multi
    }
}

/// Creates `RemoveOptions` that remove every matching document.
pub fn remove_multi() -> RemoveOptions {
    RemoveOptions::new(true)
}

//! Secondary indexes.
//!
//! Every datastore carries a unique index on `_id`. Additional indexes are
//! declared with [IndexOptions]:
//!
//! ```rust,ignore
//! db.ensure_index(IndexOptions::new("developer.name"))?;
//! db.ensure_index(unique_index("name"))?;
//! db.ensure_index(IndexOptions::new("createdAt").expire_after_seconds(3600))?;
//! ```
//!
//! Unique indexes reject any insert or update that would give two documents
//! the same key. Queries with an equality or `$in` condition on an indexed
//! field only visit the documents the index points to.

mod field_index;
mod index_manager;
mod options;

pub(crate) use field_index::*;
pub(crate) use index_manager::*;
pub use options::*;

//! Documents and the operations on a datastore's document collection.
//!
//! A [Document] is a schema-less record addressed by its `_id`. Documents
//! without an `_id` get a random 16 character identifier when inserted.
//!
//! ```rust,ignore
//! let db = Datastore::in_memory()?;
//! let inserted = db.insert(doc!{ name: "Switch", price: 29980 })?;
//! assert!(inserted.has_id());
//! ```
//!
//! Queries return a [Cursor], updates an [UpdateResult].

mod cursor;
mod document;
mod document_id;
pub(crate) mod operation;
mod projection;
mod update_options;
mod write_result;

pub use cursor::*;
pub use document::*;
pub(crate) use document_id::*;
pub(crate) use operation::*;
pub(crate) use projection::*;
pub use update_options::*;
pub use write_result::*;

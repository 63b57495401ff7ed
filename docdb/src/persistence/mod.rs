//! Durability of datastore state.
//!
//! The datastore reports every committed mutation to a [Persistence]
//! implementation as a batch of [OperationRecord]s, before the mutation
//! becomes visible. If the append fails the mutation is abandoned and
//! memory is left as it was.
//!
//! Two implementations ship with the crate: [MemoryPersistence], which
//! keeps nothing, and [FilePersistence], an append-only log of JSON lines
//! that is compacted on load and on demand.

mod codec;
mod file;
mod memory;

use crate::collection::Document;
use crate::errors::DocDbResult;
use crate::index::IndexOptions;

pub use file::*;
pub use memory::*;

/// A single logged change.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRecord {
    /// A document was inserted or replaced by an update.
    Upsert(Document),
    /// The document with this `_id` was removed.
    Delete(String),
    /// An index was created.
    IndexCreated(IndexOptions),
    /// The index on this field was removed.
    IndexRemoved(String),
}

/// The state rebuilt from storage when a datastore opens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    /// Live documents in insertion order.
    pub documents: Vec<Document>,
    /// Index definitions, the implicit `_id` index excluded.
    pub indexes: Vec<IndexOptions>,
}

/// Storage collaborator of a datastore.
///
/// Calls are serialized by the datastore: at most one method runs at a
/// time.
pub trait Persistence: Send + Sync {
    /// Reads back everything previously appended.
    fn load(&mut self) -> DocDbResult<PersistedState>;

    /// Durably records a batch of changes. The batch is all or nothing
    /// from the datastore's point of view.
    fn append(&mut self, records: &[OperationRecord]) -> DocDbResult<()>;

    /// Replaces the stored history with a snapshot of `state`.
    fn compact(&mut self, state: &PersistedState) -> DocDbResult<()>;
}

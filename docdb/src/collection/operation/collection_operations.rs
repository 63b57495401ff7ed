use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::collection::Document;
use crate::common::truncate_millis;
use crate::errors::DocDbResult;
use crate::index::IndexManager;
use crate::persistence::{PersistedState, Persistence};

/// Everything a datastore guards with its lock: the documents in insertion
/// order, their indexes and the persistence collaborator.
///
/// Mutations follow the same sequence: compute the new documents,
/// validate them against the indexes, append the change to persistence,
/// then commit to memory. Any failure before the commit leaves the state
/// untouched.
pub(crate) struct StoreState {
    pub(super) documents: IndexMap<String, Document>,
    pub(super) indexes: IndexManager,
    pub(super) persistence: Box<dyn Persistence>,
    pub(super) timestamp_data: bool,
}

impl StoreState {
    /// Loads the persisted state, rebuilds the indexes and compacts the
    /// storage.
    pub(crate) fn open(mut persistence: Box<dyn Persistence>, timestamp_data: bool) -> DocDbResult<Self> {
        let loaded = persistence.load()?;
        let indexes = IndexManager::rebuild(&loaded.indexes, loaded.documents.iter())?;

        let mut documents = IndexMap::with_capacity(loaded.documents.len());
        for document in loaded.documents {
            if let Some(id) = document.id() {
                documents.insert(id.to_string(), document);
            }
        }

        let mut state = StoreState {
            documents,
            indexes,
            persistence,
            timestamp_data,
        };
        state.compact()?;
        log::debug!(
            "Opened datastore with {} documents and {} indexes",
            state.documents.len(),
            state.indexes.definitions().len()
        );
        Ok(state)
    }

    pub(crate) fn snapshot(&self) -> PersistedState {
        PersistedState {
            documents: self.documents.values().cloned().collect(),
            indexes: self.indexes.definitions(),
        }
    }

    /// Rewrites the storage as a snapshot of the current state.
    pub(crate) fn compact(&mut self) -> DocDbResult<()> {
        let snapshot = self.snapshot();
        self.persistence.compact(&snapshot)
    }
}

/// The current time truncated to the millisecond precision of the data
/// file.
pub(crate) fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

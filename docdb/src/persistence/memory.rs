use crate::errors::DocDbResult;

use super::{OperationRecord, PersistedState, Persistence};

/// Persistence for in-memory datastores. Nothing is stored and every
/// datastore starts empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryPersistence;

impl MemoryPersistence {
    pub fn new() -> Self {
        MemoryPersistence
    }
}

impl Persistence for MemoryPersistence {
    fn load(&mut self) -> DocDbResult<PersistedState> {
        Ok(PersistedState::default())
    }

    fn append(&mut self, _records: &[OperationRecord]) -> DocDbResult<()> {
        Ok(())
    }

    fn compact(&mut self, _state: &PersistedState) -> DocDbResult<()> {
        Ok(())
    }
}

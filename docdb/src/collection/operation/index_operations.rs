use crate::common::DOC_ID;
use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use crate::index::{FieldIndex, IndexOptions};
use crate::persistence::OperationRecord;

use super::StoreState;

impl StoreState {
    /// Creates an index over the current documents.
    ///
    /// Ensuring an index that already exists with the same options does
    /// nothing. If the current documents violate a unique index the index is
    /// not created.
    pub(crate) fn ensure_index(&mut self, options: IndexOptions) -> DocDbResult<()> {
        let field_name = options.field_name().to_string();
        if field_name.is_empty() {
            log::error!("Cannot create an index without a field name");
            return Err(DocDbError::new(
                "Cannot create an index without a field name",
                ErrorKind::ValidationError,
            ));
        }

        if field_name == DOC_ID {
            return Ok(());
        }

        if let Some(existing) = self.indexes.get(&field_name) {
            if existing.options() == &options {
                return Ok(());
            }
            log::error!("An index on {} already exists with different options", field_name);
            return Err(DocDbError::new(
                &format!("An index on {} already exists with different options", field_name),
                ErrorKind::ValidationError,
            ));
        }

        let index = FieldIndex::build(options.clone(), self.documents.values())?;
        self.persistence.append(&[OperationRecord::IndexCreated(options)])?;
        self.indexes.install(index);
        log::debug!("Created index on {}", field_name);
        Ok(())
    }

    /// Drops the index on `field_name`. Dropping a missing index succeeds.
    pub(crate) fn remove_index(&mut self, field_name: &str) -> DocDbResult<()> {
        if field_name == DOC_ID {
            return self.indexes.remove(field_name).map(|_| ());
        }
        if self.indexes.get(field_name).is_none() {
            return Ok(());
        }

        self.persistence
            .append(&[OperationRecord::IndexRemoved(field_name.to_string())])?;
        self.indexes.remove(field_name)?;
        log::debug!("Removed index on {}", field_name);
        Ok(())
    }

    /// Every index, the implicit `_id` index first.
    pub(crate) fn indexes(&self) -> Vec<IndexOptions> {
        self.indexes.all_definitions()
    }
}

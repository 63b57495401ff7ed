use chrono::{DateTime, Utc};

use crate::collection::{
    generate_id, validate_id, Document, RemoveOptions, UpdateOptions, UpdateResult, UpdatedDocs,
};
use crate::common::{CREATED_AT, DOC_ID, UPDATED_AT};
use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use crate::filter::Filter;
use crate::index::IndexChange;
use crate::persistence::OperationRecord;
use crate::update::UpdatePlan;

use super::{now_millis, StoreState};

impl StoreState {
    /// Inserts a batch of documents. Either every document is inserted or
    /// none is.
    pub(crate) fn insert(&mut self, documents: Vec<Document>) -> DocDbResult<Vec<Document>> {
        self.purge_expired()?;
        self.insert_prepared(documents)
    }

    fn insert_prepared(&mut self, documents: Vec<Document>) -> DocDbResult<Vec<Document>> {
        let now = now_millis();
        let mut prepared: Vec<Document> = Vec::with_capacity(documents.len());
        for document in documents {
            let document = self.prepare_insert(document, now, &prepared)?;
            prepared.push(document);
        }

        let changes: Vec<IndexChange> = prepared.iter().map(IndexChange::insert).collect();
        self.indexes.validate(&changes)?;

        let records: Vec<OperationRecord> = prepared.iter().cloned().map(OperationRecord::Upsert).collect();
        self.persistence.append(&records)?;

        self.indexes.apply(&changes);
        for document in &prepared {
            if let Some(id) = document.id() {
                self.documents.insert(id.to_string(), document.clone());
            }
        }
        log::debug!("Inserted {} documents", prepared.len());
        Ok(prepared)
    }

    fn prepare_insert(&self, mut document: Document, now: DateTime<Utc>, batch: &[Document]) -> DocDbResult<Document> {
        match document.get_field(DOC_ID) {
            Some(id) => {
                validate_id(id)?;
            }
            None => {
                let id = generate_id(|candidate| {
                    self.documents.contains_key(candidate) || batch.iter().any(|d| d.id() == Some(candidate))
                });
                document.put_field(DOC_ID, id);
            }
        }

        if self.timestamp_data {
            if !document.contains_key(CREATED_AT) {
                document.put_field(CREATED_AT, now);
            }
            if !document.contains_key(UPDATED_AT) {
                document.put_field(UPDATED_AT, now);
            }
        }

        document.check_keys()?;
        document.truncate_timestamps();
        Ok(document)
    }

    /// Updates the first document matching `filter`, or all of them with
    /// `multi`. With `upsert`, a document is inserted when nothing matches.
    pub(crate) fn update(
        &mut self,
        filter: &Filter,
        plan: &UpdatePlan,
        options: &UpdateOptions,
    ) -> DocDbResult<UpdateResult> {
        self.purge_expired()?;

        let limit = if options.is_multi() { None } else { Some(1) };
        let targets: Vec<Document> = self.matching(filter, limit)?.into_iter().cloned().collect();

        if targets.is_empty() {
            if !options.is_upsert() {
                return Ok(UpdateResult::new(0, None));
            }

            let document = plan.upsert_document(filter)?;
            let Some(inserted) = self.insert_prepared(vec![document])?.pop() else {
                log::error!("Upsert did not produce a document");
                return Err(DocDbError::new(
                    "Upsert did not produce a document",
                    ErrorKind::InternalError,
                ));
            };
            log::debug!("Upserted document {:?} for {}", inserted.id(), filter);
            return Ok(UpdateResult::upserted(inserted, options.is_return_updated_docs()));
        }

        let now = now_millis();
        let mut updated = Vec::with_capacity(targets.len());
        for current in &targets {
            let mut document = plan.apply(current)?;
            document.truncate_timestamps();
            if self.timestamp_data {
                if let Some(created_at) = current.get_field(CREATED_AT) {
                    document.put_field(CREATED_AT, created_at.clone());
                }
                document.put_field(UPDATED_AT, now);
            }
            updated.push(document);
        }

        let changes: Vec<IndexChange> = targets
            .iter()
            .zip(updated.iter())
            .map(|(old, new)| IndexChange::update(old, new))
            .collect();
        self.indexes.validate(&changes)?;

        let records: Vec<OperationRecord> = updated.iter().cloned().map(OperationRecord::Upsert).collect();
        self.persistence.append(&records)?;

        self.indexes.apply(&changes);
        for document in &updated {
            if let Some(id) = document.id() {
                // an existing key keeps its position
                self.documents.insert(id.to_string(), document.clone());
            }
        }
        log::debug!("Updated {} documents matching {}", updated.len(), filter);

        let count = updated.len();
        let returned = match (options.is_return_updated_docs(), options.is_multi()) {
            (false, _) => None,
            (true, true) => Some(UpdatedDocs::Many(updated)),
            (true, false) => updated.into_iter().next().map(UpdatedDocs::Single),
        };
        Ok(UpdateResult::new(count, returned))
    }

    /// Removes the first document matching `filter`, or all of them with
    /// `multi`, and returns how many were removed.
    pub(crate) fn remove(&mut self, filter: &Filter, options: &RemoveOptions) -> DocDbResult<usize> {
        self.purge_expired()?;

        let limit = if options.is_multi() { None } else { Some(1) };
        let targets: Vec<Document> = self.matching(filter, limit)?.into_iter().cloned().collect();
        let removed = self.remove_documents(&targets)?;
        log::debug!("Removed {} documents matching {}", removed, filter);
        Ok(removed)
    }

    fn remove_documents(&mut self, targets: &[Document]) -> DocDbResult<usize> {
        if targets.is_empty() {
            return Ok(0);
        }

        let changes: Vec<IndexChange> = targets.iter().map(IndexChange::remove).collect();
        let records: Vec<OperationRecord> = targets
            .iter()
            .filter_map(|document| document.id())
            .map(|id| OperationRecord::Delete(id.to_string()))
            .collect();
        self.persistence.append(&records)?;

        self.indexes.apply(&changes);
        for document in targets {
            if let Some(id) = document.id() {
                self.documents.shift_remove(id);
            }
        }
        Ok(targets.len())
    }

    /// Removes the documents expired by TTL indexes.
    ///
    /// Runs as its own committed step before a mutation. Reads already hide
    /// expired documents, so the purge stays invisible even when the
    /// mutation that follows fails.
    pub(crate) fn purge_expired(&mut self) -> DocDbResult<()> {
        if !self.indexes.has_ttl() {
            return Ok(());
        }

        let expired: Vec<Document> = self
            .indexes
            .expired(Utc::now())
            .iter()
            .filter_map(|id| self.documents.get(id).cloned())
            .collect();
        if !expired.is_empty() {
            log::debug!("Purging {} expired documents", expired.len());
            self.remove_documents(&expired)?;
        }
        Ok(())
    }
}

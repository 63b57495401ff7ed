use chrono::Utc;

use crate::collection::Document;
use crate::errors::DocDbResult;
use crate::filter::Filter;

use super::StoreState;

impl StoreState {
    /// Documents matching `filter`, in insertion order.
    ///
    /// An index on the filtered field narrows the scan when one applies.
    /// Documents expired by a TTL index are skipped. The scan stops after
    /// `limit` matches.
    pub(crate) fn matching(&self, filter: &Filter, limit: Option<usize>) -> DocDbResult<Vec<&Document>> {
        let now = Utc::now();
        let check_ttl = self.indexes.has_ttl();
        let mut matches = Vec::new();

        for document in self.candidates(filter) {
            if limit.is_some_and(|limit| matches.len() >= limit) {
                break;
            }
            if check_ttl && self.indexes.is_expired(document, now) {
                continue;
            }
            if filter.apply(document)? {
                matches.push(document);
            }
        }
        Ok(matches)
    }

    fn candidates<'a>(&'a self, filter: &Filter) -> Box<dyn Iterator<Item = &'a Document> + 'a> {
        match self.indexes.candidates(filter) {
            Some(ids) => {
                let mut positioned: Vec<(usize, &Document)> = ids
                    .iter()
                    .filter_map(|id| self.documents.get_full(id))
                    .map(|(position, _, document)| (position, document))
                    .collect();
                positioned.sort_by_key(|(position, _)| *position);
                Box::new(positioned.into_iter().map(|(_, document)| document))
            }
            None => Box::new(self.documents.values()),
        }
    }

    pub(crate) fn find_by_id(&self, id: &str) -> Option<Document> {
        let document = self.documents.get(id)?;
        if self.indexes.has_ttl() && self.indexes.is_expired(document, Utc::now()) {
            return None;
        }
        Some(document.clone())
    }

    /// Every live document in insertion order.
    pub(crate) fn all_documents(&self) -> Vec<Document> {
        let now = Utc::now();
        let check_ttl = self.indexes.has_ttl();
        self.documents
            .values()
            .filter(|document| !check_ttl || !self.indexes.is_expired(document, now))
            .cloned()
            .collect()
    }

    /// Number of live documents. Expired documents that are not purged yet
    /// are not counted.
    pub(crate) fn size(&self) -> usize {
        if !self.indexes.has_ttl() {
            return self.documents.len();
        }
        let now = Utc::now();
        self.documents
            .values()
            .filter(|document| !self.indexes.is_expired(document, now))
            .count()
    }
}

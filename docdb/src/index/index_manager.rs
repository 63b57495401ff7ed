use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;

use crate::collection::Document;
use crate::common::{Value, DOC_ID};
use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use crate::filter::Filter;

use super::{FieldIndex, IndexKey, IndexOptions};

/// A document level change checked against and applied to every index.
///
/// An insert has no `old` document, a removal has no `new` one.
#[derive(Clone, Copy)]
pub(crate) struct IndexChange<'a> {
    pub(crate) old: Option<&'a Document>,
    pub(crate) new: Option<&'a Document>,
}

impl<'a> IndexChange<'a> {
    pub(crate) fn insert(document: &'a Document) -> Self {
        IndexChange {
            old: None,
            new: Some(document),
        }
    }

    pub(crate) fn update(old: &'a Document, new: &'a Document) -> Self {
        IndexChange {
            old: Some(old),
            new: Some(new),
        }
    }

    pub(crate) fn remove(old: &'a Document) -> Self {
        IndexChange {
            old: Some(old),
            new: None,
        }
    }
}

/// The set of indexes of a datastore.
///
/// The `_id` index always exists and is unique. Changes go through two
/// steps: [IndexManager::validate] checks a whole batch against every
/// unique index without modifying anything, then [IndexManager::apply]
/// commits it. A batch that fails validation leaves the indexes untouched.
#[derive(Clone)]
pub(crate) struct IndexManager {
    indexes: IndexMap<String, FieldIndex>,
}

impl IndexManager {
    pub(crate) fn new() -> Self {
        let mut indexes = IndexMap::new();
        indexes.insert(
            DOC_ID.to_string(),
            FieldIndex::new(IndexOptions::new(DOC_ID).unique(true)),
        );
        IndexManager { indexes }
    }

    /// Rebuilds the `_id` index and every index in `definitions` over
    /// `documents`.
    pub(crate) fn rebuild<'a, I>(definitions: &[IndexOptions], documents: I) -> DocDbResult<Self>
    where
        I: IntoIterator<Item = &'a Document> + Clone,
    {
        let mut manager = IndexManager::new();
        let id_index = FieldIndex::build(IndexOptions::new(DOC_ID).unique(true), documents.clone())?;
        manager.indexes.insert(DOC_ID.to_string(), id_index);

        for options in definitions {
            if options.field_name() == DOC_ID {
                continue;
            }
            let index = FieldIndex::build(options.clone(), documents.clone())?;
            manager.install(index);
        }
        Ok(manager)
    }

    pub(crate) fn get(&self, field_name: &str) -> Option<&FieldIndex> {
        self.indexes.get(field_name)
    }

    /// Index definitions, the implicit `_id` index excluded.
    pub(crate) fn definitions(&self) -> Vec<IndexOptions> {
        self.indexes
            .values()
            .filter(|index| index.field_name() != DOC_ID)
            .map(|index| index.options().clone())
            .collect()
    }

    /// Every index definition, the implicit `_id` index first.
    pub(crate) fn all_definitions(&self) -> Vec<IndexOptions> {
        self.indexes.values().map(|index| index.options().clone()).collect()
    }

    pub(crate) fn install(&mut self, index: FieldIndex) {
        self.indexes.insert(index.field_name().to_string(), index);
    }

    /// Drops the index on `field_name`. The `_id` index cannot be dropped.
    pub(crate) fn remove(&mut self, field_name: &str) -> DocDbResult<bool> {
        if field_name == DOC_ID {
            log::error!("The _id index cannot be removed");
            return Err(DocDbError::new(
                "The _id index cannot be removed",
                ErrorKind::ValidationError,
            ));
        }
        Ok(self.indexes.shift_remove(field_name).is_some())
    }

    /// Checks that applying `changes` keeps every unique index unique.
    pub(crate) fn validate(&self, changes: &[IndexChange<'_>]) -> DocDbResult<()> {
        // documents whose current index entries are going away
        let replaced: HashSet<&str> = changes
            .iter()
            .filter_map(|change| change.old.and_then(|doc| doc.id()))
            .collect();

        for index in self.indexes.values().filter(|index| index.is_unique()) {
            let mut claimed: HashMap<IndexKey, usize> = HashMap::new();
            for (position, change) in changes.iter().enumerate() {
                let Some(document) = change.new else {
                    continue;
                };

                for key in index.keys_for(document) {
                    if claimed.insert(key.clone(), position).is_some() {
                        return Err(index.violation(&key));
                    }

                    let taken = index
                        .holders(&key)
                        .is_some_and(|ids| ids.iter().any(|id| !replaced.contains(id.as_str())));
                    if taken {
                        return Err(index.violation(&key));
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies validated `changes` to every index.
    pub(crate) fn apply(&mut self, changes: &[IndexChange<'_>]) {
        for index in self.indexes.values_mut() {
            for change in changes {
                if let Some(old) = change.old {
                    index.remove(old.id().unwrap_or_default(), old);
                }
            }
            for change in changes {
                if let Some(new) = change.new {
                    index.insert(new.id().unwrap_or_default(), new);
                }
            }
        }
    }

    /// Narrows the documents that can match `filter` using an index.
    ///
    /// Returns `None` when no index applies and every document has to be
    /// scanned.
    pub(crate) fn candidates(&self, filter: &Filter) -> Option<BTreeSet<String>> {
        let (field, values) = filter.index_lookup()?;
        let index = self.indexes.get(&field)?;
        log::debug!("Using index on {} for {}", field, filter);
        Some(index.lookup(&values))
    }

    /// Ids of documents expired by a TTL index at `now`.
    pub(crate) fn expired(&self, now: DateTime<Utc>) -> BTreeSet<String> {
        let mut expired = BTreeSet::new();
        for index in self.indexes.values() {
            if let Some(cutoff) = ttl_cutoff(index, now) {
                expired.extend(index.expired_before(cutoff));
            }
        }
        expired
    }

    /// Whether `document` is expired by a TTL index at `now`.
    pub(crate) fn is_expired(&self, document: &Document, now: DateTime<Utc>) -> bool {
        self.indexes.values().any(|index| {
            match (ttl_cutoff(index, now), document.get(index.field_name())) {
                (Some(cutoff), Some(Value::Timestamp(t))) => t <= cutoff,
                _ => false,
            }
        })
    }

    pub(crate) fn has_ttl(&self) -> bool {
        self.indexes.values().any(|index| index.options().expire_after().is_some())
    }
}

/// The instant at or before which documents of a TTL index expire.
fn ttl_cutoff(index: &FieldIndex, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(index.options().expire_after()?).ok()?;
    now.checked_sub_signed(Duration::try_seconds(seconds)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn manager_with(docs: &[Document], options: IndexOptions) -> IndexManager {
        IndexManager::rebuild(&[options], docs.iter()).unwrap()
    }

    #[test]
    fn test_id_index_always_present() {
        let manager = IndexManager::new();
        assert!(manager.get(DOC_ID).is_some_and(|index| index.is_unique()));
        assert!(manager.definitions().is_empty());
        assert_eq!(manager.all_definitions().len(), 1);
    }

    #[test]
    fn test_id_index_cannot_be_removed() {
        let mut manager = IndexManager::new();
        assert!(manager.remove(DOC_ID).is_err());
        assert!(!manager.remove("name").unwrap());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let existing = doc! { _id: "id1", name: "PS4" };
        let manager = manager_with(&[existing], IndexOptions::new("name"));

        let dup_id = doc! { _id: "id1", name: "PS5" };
        let err = manager.validate(&[IndexChange::insert(&dup_id)]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
    }

    #[test]
    fn test_batch_conflict_within_itself() {
        let manager = IndexManager::rebuild(&[IndexOptions::new("name").unique(true)], std::iter::empty()).unwrap();
        let a = doc! { _id: "a", name: "Wii" };
        let b = doc! { _id: "b", name: "Wii" };
        assert!(manager.validate(&[IndexChange::insert(&a), IndexChange::insert(&b)]).is_err());
    }

    #[test]
    fn test_update_can_keep_its_own_key() {
        let old = doc! { _id: "id1", name: "PS4" };
        let manager = manager_with(&[old.clone()], IndexOptions::new("name").unique(true));
        let new = doc! { _id: "id1", name: "PS4", price: 1 };
        assert!(manager.validate(&[IndexChange::update(&old, &new)]).is_ok());
    }

    #[test]
    fn test_swap_keys_in_one_batch() {
        let a = doc! { _id: "a", name: "x" };
        let b = doc! { _id: "b", name: "y" };
        let manager = manager_with(&[a.clone(), b.clone()], IndexOptions::new("name").unique(true));

        let a2 = doc! { _id: "a", name: "y" };
        let b2 = doc! { _id: "b", name: "x" };
        let changes = [IndexChange::update(&a, &a2), IndexChange::update(&b, &b2)];
        assert!(manager.validate(&changes).is_ok());
    }

    #[test]
    fn test_update_into_taken_key_rejected() {
        let a = doc! { _id: "a", name: "x" };
        let b = doc! { _id: "b", name: "y" };
        let manager = manager_with(&[a.clone(), b], IndexOptions::new("name").unique(true));
        let a2 = doc! { _id: "a", name: "y" };
        assert!(manager.validate(&[IndexChange::update(&a, &a2)]).is_err());
    }

    #[test]
    fn test_apply_moves_entries() {
        let old = doc! { _id: "id1", media: "Card" };
        let mut manager = manager_with(&[old.clone()], IndexOptions::new("media"));
        let new = doc! { _id: "id1", media: "Blu-ray" };
        manager.apply(&[IndexChange::update(&old, &new)]);

        let index = manager.get("media").unwrap();
        assert!(index.lookup(&[val!("Card")]).is_empty());
        assert_eq!(index.lookup(&[val!("Blu-ray")]).len(), 1);

        manager.apply(&[IndexChange::remove(&new)]);
        assert!(manager.get(DOC_ID).unwrap().lookup(&[val!("id1")]).is_empty());
    }

    #[test]
    fn test_candidates() {
        let docs = [
            doc! { _id: "1", media: "Card" },
            doc! { _id: "2", media: "Blu-ray" },
        ];
        let manager = manager_with(&docs, IndexOptions::new("media"));

        let filter = Filter::parse(&doc! { media: "Card" }).unwrap();
        let ids = manager.candidates(&filter).unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["1".to_string()]);

        let filter = Filter::parse(&doc! { price: 1 }).unwrap();
        assert!(manager.candidates(&filter).is_none());
    }

    #[test]
    fn test_expired() {
        let old = doc! { _id: "old", createdAt: (Value::from_millis(0)) };
        let manager = manager_with(&[old.clone()], IndexOptions::new("createdAt").expire_after_seconds(60));
        assert!(manager.has_ttl());

        let now = DateTime::from_timestamp_millis(120_000).unwrap();
        assert!(manager.expired(now).contains("old"));
        assert!(manager.is_expired(&old, now));

        let early = DateTime::from_timestamp_millis(30_000).unwrap();
        assert!(manager.expired(early).is_empty());
        assert!(!manager.is_expired(&old, early));
    }
}

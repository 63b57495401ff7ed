use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::collection::Document;
use crate::common::Value;
use crate::errors::{DocDbError, DocDbResult, ErrorKind};

use super::IndexOptions;

/// An index key; `None` stands for an undefined field.
pub(crate) type IndexKey = Option<Value>;

/// An ordered mapping from the values of one field to the ids of the
/// documents holding them.
///
/// Array values are indexed under each distinct element, so a document
/// can appear under several keys.
#[derive(Clone)]
pub(crate) struct FieldIndex {
    options: IndexOptions,
    entries: BTreeMap<IndexKey, BTreeSet<String>>,
}

impl FieldIndex {
    pub(crate) fn new(options: IndexOptions) -> Self {
        FieldIndex {
            options,
            entries: BTreeMap::new(),
        }
    }

    /// Builds an index over `documents`, failing on the first duplicate
    /// key when the index is unique.
    pub(crate) fn build<'a, I>(options: IndexOptions, documents: I) -> DocDbResult<Self>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut index = FieldIndex::new(options);
        for document in documents {
            let id = document.id().unwrap_or_default().to_string();
            for key in index.keys_for(document) {
                if index.options.is_unique() && index.holders(&key).is_some_and(|h| !h.is_empty()) {
                    return Err(index.violation(&key));
                }
                index.entries.entry(key).or_default().insert(id.clone());
            }
        }
        Ok(index)
    }

    pub(crate) fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub(crate) fn field_name(&self) -> &str {
        self.options.field_name()
    }

    pub(crate) fn is_unique(&self) -> bool {
        self.options.is_unique()
    }

    /// The keys `document` is indexed under.
    pub(crate) fn keys_for(&self, document: &Document) -> Vec<IndexKey> {
        match document.resolve(self.field_name()) {
            None if self.options.is_sparse() => Vec::new(),
            None => vec![None],
            Some(Value::Array(items)) => {
                let mut flat = Vec::new();
                flatten(items, &mut flat);
                flat.into_iter().unique().map(Some).collect()
            }
            Some(value) => vec![Some(value)],
        }
    }

    pub(crate) fn holders(&self, key: &IndexKey) -> Option<&BTreeSet<String>> {
        self.entries.get(key)
    }

    pub(crate) fn insert(&mut self, id: &str, document: &Document) {
        for key in self.keys_for(document) {
            self.entries.entry(key).or_default().insert(id.to_string());
        }
    }

    pub(crate) fn remove(&mut self, id: &str, document: &Document) {
        for key in self.keys_for(document) {
            if let Some(ids) = self.entries.get_mut(&key) {
                ids.remove(id);
                if ids.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    /// Ids of the documents indexed under any of `values`.
    pub(crate) fn lookup(&self, values: &[Value]) -> BTreeSet<String> {
        values
            .iter()
            .filter_map(|value| self.entries.get(&Some(value.clone())))
            .flatten()
            .cloned()
            .collect()
    }

    /// Ids of the documents whose indexed timestamp is at or before `cutoff`.
    pub(crate) fn expired_before(&self, cutoff: DateTime<Utc>) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|(key, _)| matches!(key, Some(Value::Timestamp(t)) if *t <= cutoff))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }

    pub(crate) fn violation(&self, key: &IndexKey) -> DocDbError {
        let rendered = match key {
            Some(value) => value.to_string(),
            None => "undefined".to_string(),
        };
        log::error!(
            "Unique constraint violated for key {} on index {}",
            rendered,
            self.field_name()
        );
        DocDbError::new(
            &format!(
                "Unique constraint violated for key {} on index {}",
                rendered,
                self.field_name()
            ),
            ErrorKind::UniqueConstraintViolation,
        )
    }
}

fn flatten(items: Vec<Value>, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(nested) => flatten(nested, out),
            other => out.push(other),
        }
    }
}

use std::cmp::Ordering;

use crate::collection::{Document, Projection};
use crate::common::{compare_values, SortOrder, Value};
use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use crate::filter::Filter;
use crate::Datastore;

#[derive(Clone)]
enum SortKey {
    Field(String, SortOrder),
    Spec(Document),
}

/// A lazily evaluated query.
///
/// Nothing is read until [Cursor::exec] (or [Cursor::count],
/// [Cursor::first]) runs. The documents matching the query are sorted,
/// then `skip` and `limit` are applied, then the projection.
///
/// # Examples
///
/// ```rust,ignore
/// let docs = db
///     .find(doc!{ media: "Card" })?
///     .sort(doc!{ releaseDate: 1 })
///     .skip(1)
///     .limit(2)
///     .projection(doc!{ name: 1, _id: 0 })
///     .exec()?;
/// ```
#[derive(Clone)]
pub struct Cursor {
    datastore: Datastore,
    filter: Filter,
    sort: Vec<SortKey>,
    skip: usize,
    limit: Option<usize>,
    projection: Option<Document>,
}

impl Cursor {
    pub(crate) fn new(datastore: Datastore, filter: Filter) -> Self {
        Cursor {
            datastore,
            filter,
            sort: Vec::new(),
            skip: 0,
            limit: None,
            projection: None,
        }
    }

    /// Adds a sort key. Keys added earlier take precedence.
    pub fn sort_by(mut self, field: &str, order: SortOrder) -> Self {
        self.sort.push(SortKey::Field(field.to_string(), order));
        self
    }

    /// Adds the sort key of a single-field sort document, `1` meaning
    /// ascending and `-1` descending.
    ///
    /// A document does not remember the order its fields were written in,
    /// so a sort document with more than one field fails on [Cursor::exec].
    /// Chain [Cursor::sort] or [Cursor::sort_by] calls instead; keys added
    /// earlier take precedence.
    pub fn sort(mut self, spec: Document) -> Self {
        self.sort.push(SortKey::Spec(spec));
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Picks (`{ field: 1 }`) or omits (`{ field: 0 }`) fields of the
    /// returned documents.
    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Runs the query.
    pub fn exec(&self) -> DocDbResult<Vec<Document>> {
        let sort = self.sort_keys()?;
        let projection = match &self.projection {
            Some(spec) => Some(Projection::parse(spec)?),
            None => None,
        };

        // without sorting, the scan can stop once skip + limit documents matched
        let scan_limit = match (sort.is_empty(), self.limit) {
            (true, Some(limit)) => Some(limit.saturating_add(self.skip)),
            _ => None,
        };

        let mut documents: Vec<Document> = {
            let state = self.datastore.read_state();
            state
                .matching(&self.filter, scan_limit)?
                .into_iter()
                .cloned()
                .collect()
        };

        if !sort.is_empty() {
            documents = sort_documents(documents, &sort);
        }

        let page = documents
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX));

        match projection {
            Some(projection) => page.map(|doc| projection.apply(&doc)).collect(),
            None => Ok(page.collect()),
        }
    }

    /// Number of documents [Cursor::exec] would return.
    pub fn count(&self) -> DocDbResult<usize> {
        let mut counting = self.clone();
        counting.projection = None;
        Ok(counting.exec()?.len())
    }

    /// The first document [Cursor::exec] would return.
    pub fn first(&self) -> DocDbResult<Option<Document>> {
        Ok(self.clone().limit(1).exec()?.into_iter().next())
    }

    fn sort_keys(&self) -> DocDbResult<Vec<(String, SortOrder)>> {
        let mut keys = Vec::with_capacity(self.sort.len());
        for key in &self.sort {
            match key {
                SortKey::Field(field, order) => keys.push((field.clone(), *order)),
                SortKey::Spec(spec) => {
                    if spec.size() > 1 {
                        log::error!("Sort document {} has more than one field, chain sort calls instead", spec);
                        return Err(DocDbError::new(
                            &format!(
                                "Sort document {} has more than one field, chain sort or sort_by calls instead",
                                spec
                            ),
                            ErrorKind::ValidationError,
                        ));
                    }
                    for (field, direction) in spec.iter() {
                        keys.push((field.clone(), SortOrder::from_value(direction)?));
                    }
                }
            }
        }
        Ok(keys)
    }
}

/// Stable sort on the resolved values of the sort fields. Undefined sorts
/// before every defined value.
fn sort_documents(documents: Vec<Document>, sort: &[(String, SortOrder)]) -> Vec<Document> {
    let mut keyed: Vec<(Vec<Option<Value>>, Document)> = documents
        .into_iter()
        .map(|doc| {
            let keys = sort.iter().map(|(field, _)| doc.resolve(field)).collect();
            (keys, doc)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        for (i, (_, order)) in sort.iter().enumerate() {
            let ordering = compare_values(a[i].as_ref(), b[i].as_ref());
            let ordering = match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    keyed.into_iter().map(|(_, doc)| doc).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn datastore() -> Datastore {
        let db = Datastore::in_memory().unwrap();
        db.insert_many(vec![
            doc! { _id: "id1", name: "PS4", price: 39980, year: 2014 },
            doc! { _id: "id2", name: "Vita", price: 24980, year: 2012 },
            doc! { _id: "id3", name: "3DS", price: 25000, year: 2011 },
            doc! { _id: "id4", name: "Switch", price: 29980, year: 2017 },
            doc! { _id: "id5", name: "Xbox One", price: 39980, year: 2013 },
        ])
        .unwrap();
        db
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id().unwrap()).collect()
    }

    #[test]
    fn test_sort_skip_limit() {
        let db = datastore();
        let docs = db.find(doc! {}).unwrap().sort(doc! { year: 1 }).skip(1).limit(2).exec().unwrap();
        assert_eq!(ids(&docs), vec!["id2", "id5"]);
    }

    #[test]
    fn test_sort_descending_is_stable() {
        let db = datastore();
        let docs = db.find(doc! {}).unwrap().sort_by("price", SortOrder::Descending).exec().unwrap();
        assert_eq!(ids(&docs), vec!["id1", "id5", "id4", "id3", "id2"]);
    }

    #[test]
    fn test_secondary_sort_key() {
        let db = datastore();
        let docs = db
            .find(doc! {})
            .unwrap()
            .sort_by("price", SortOrder::Descending)
            .sort_by("year", SortOrder::Ascending)
            .limit(2)
            .exec()
            .unwrap();
        assert_eq!(ids(&docs), vec!["id5", "id1"]);
    }

    #[test]
    fn test_chained_sort_documents_keep_call_order() {
        let db = Datastore::in_memory().unwrap();
        db.insert_many(vec![
            doc! { _id: "a", year: 2011, name: "Z" },
            doc! { _id: "b", year: 2012, name: "A" },
        ])
        .unwrap();

        let docs = db.find(doc! {}).unwrap().sort(doc! { year: 1 }).sort(doc! { name: 1 }).exec().unwrap();
        assert_eq!(ids(&docs), vec!["a", "b"]);

        let cursor = db.find(doc! {}).unwrap().sort(doc! { year: 1, name: 1 });
        assert_eq!(cursor.exec().unwrap_err().kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_limit_without_sort_uses_insertion_order() {
        let db = datastore();
        let docs = db.find(doc! {}).unwrap().skip(3).limit(5).exec().unwrap();
        assert_eq!(ids(&docs), vec!["id4", "id5"]);
    }

    #[test]
    fn test_undefined_sorts_first() {
        let db = datastore();
        db.insert(doc! { _id: "id6", name: "Prototype" }).unwrap();
        let docs = db.find(doc! {}).unwrap().sort_by("year", SortOrder::Ascending).limit(1).exec().unwrap();
        assert_eq!(ids(&docs), vec!["id6"]);
    }

    #[test]
    fn test_projection() {
        let db = datastore();
        let docs = db
            .find(doc! { price: { "$lt": 26000 } })
            .unwrap()
            .projection(doc! { name: 1, _id: 0 })
            .exec()
            .unwrap();
        assert_eq!(docs, vec![doc! { name: "Vita" }, doc! { name: "3DS" }]);
    }

    #[test]
    fn test_invalid_sort_and_projection_reported_on_exec() {
        let db = datastore();
        let cursor = db.find(doc! {}).unwrap().sort(doc! { year: "up" });
        assert_eq!(cursor.exec().unwrap_err().kind(), &ErrorKind::ValidationError);

        let cursor = db.find(doc! {}).unwrap().projection(doc! { name: 1, price: 0 });
        assert_eq!(cursor.exec().unwrap_err().kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_count_and_first() {
        let db = datastore();
        let cursor = db.find(doc! { price: 39980 }).unwrap();
        assert_eq!(cursor.count().unwrap(), 2);
        assert_eq!(cursor.first().unwrap().and_then(|d| d.get("name")), Some(val!("PS4")));
        assert!(db.find(doc! { price: 1 }).unwrap().first().unwrap().is_none());
    }

    #[test]
    fn test_cursor_is_lazy() {
        let db = datastore();
        let cursor = db.find(doc! { name: "Wii" }).unwrap();
        db.insert(doc! { name: "Wii" }).unwrap();
        assert_eq!(cursor.count().unwrap(), 1);
    }
}

//! The datastore handle.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::collection::{Cursor, Document, RemoveOptions, StoreState, UpdateOptions, UpdateResult};
use crate::datastore_builder::DatastoreBuilder;
use crate::datastore_config::DatastoreConfig;
use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use crate::filter::IntoFilter;
use crate::index::IndexOptions;
use crate::persistence::{MemoryPersistence, Persistence};
use crate::update::UpdatePlan;

/// An embedded document store.
///
/// `Datastore` is a cheap handle: clones share the same documents, indexes
/// and persistence. Mutations run one at a time under an exclusive lock and
/// are atomic: a failed insert, update or remove leaves every document and
/// index as it was.
///
/// # Examples
///
/// ```rust,ignore
/// use docdb::{doc, Datastore};
/// use docdb::collection::update_multi;
///
/// let db = Datastore::builder().filename("consoles.db").open()?;
/// db.insert(doc!{ name: "Switch", developer: { name: "Nintendo" }, price: 29980 })?;
///
/// let result = db.update(
///     doc!{ "developer.name": "Nintendo" },
///     &doc!{ "$inc": { price: (-1000) } },
///     update_multi(),
/// )?;
///
/// let cheap = db.find(doc!{ price: { "$lt": 30000 } })?.exec()?;
/// ```
#[derive(Clone)]
pub struct Datastore {
    inner: Arc<DatastoreInner>,
}

struct DatastoreInner {
    config: DatastoreConfig,
    state: RwLock<StoreState>,
}

impl Datastore {
    pub fn builder() -> DatastoreBuilder {
        DatastoreBuilder::new()
    }

    /// Opens an empty datastore kept in memory only.
    pub fn in_memory() -> DocDbResult<Datastore> {
        Self::open(DatastoreConfig::new(), Box::new(MemoryPersistence::new()))
    }

    /// Loads the persisted state and opens the datastore on it.
    pub(crate) fn open(config: DatastoreConfig, persistence: Box<dyn Persistence>) -> DocDbResult<Datastore> {
        let state = StoreState::open(persistence, config.is_timestamp_data())?;
        config.mark_opened();
        Ok(Datastore {
            inner: Arc::new(DatastoreInner {
                config,
                state: RwLock::new(state),
            }),
        })
    }

    pub fn config(&self) -> DatastoreConfig {
        self.inner.config.clone()
    }

    /// Inserts a document and returns it as stored, with its `_id`.
    pub fn insert(&self, document: Document) -> DocDbResult<Document> {
        let inserted = self.inner.state.write().insert(vec![document])?;
        match inserted.into_iter().next() {
            Some(document) => Ok(document),
            None => {
                log::error!("Insert did not produce a document");
                Err(DocDbError::new("Insert did not produce a document", ErrorKind::InternalError))
            }
        }
    }

    /// Inserts every document or, on any failure, none of them.
    pub fn insert_many(&self, documents: Vec<Document>) -> DocDbResult<Vec<Document>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        self.inner.state.write().insert(documents)
    }

    /// Returns a cursor over the documents matching `query`.
    ///
    /// The query is compiled right away, so malformed queries fail here.
    /// The documents are only read when the cursor executes.
    pub fn find<Q: IntoFilter>(&self, query: Q) -> DocDbResult<Cursor> {
        let filter = query.into_filter()?;
        Ok(Cursor::new(self.clone(), filter))
    }

    /// The first document matching `query` in insertion order.
    pub fn find_one<Q: IntoFilter>(&self, query: Q) -> DocDbResult<Option<Document>> {
        let filter = query.into_filter()?;
        let state = self.inner.state.read();
        Ok(state.matching(&filter, Some(1))?.first().map(|doc| (*doc).clone()))
    }

    pub fn find_by_id(&self, id: &str) -> Option<Document> {
        self.inner.state.read().find_by_id(id)
    }

    /// Number of documents matching `query`.
    pub fn count<Q: IntoFilter>(&self, query: Q) -> DocDbResult<usize> {
        let filter = query.into_filter()?;
        let state = self.inner.state.read();
        Ok(state.matching(&filter, None)?.len())
    }

    /// Applies `update` to the documents matching `query`.
    ///
    /// `update` is either a replacement document or a document of
    /// modifiers such as `$set` and `$inc`. See [UpdateOptions] for the
    /// `multi`, `upsert` and `return_updated_docs` switches.
    pub fn update<Q: IntoFilter>(
        &self,
        query: Q,
        update: &Document,
        options: UpdateOptions,
    ) -> DocDbResult<UpdateResult> {
        let filter = query.into_filter()?;
        let plan = UpdatePlan::parse(update)?;
        self.inner.state.write().update(&filter, &plan, &options)
    }

    /// Removes the first document matching `query`, or every one of them
    /// with `multi`. Returns the number of removed documents.
    pub fn remove<Q: IntoFilter>(&self, query: Q, options: RemoveOptions) -> DocDbResult<usize> {
        let filter = query.into_filter()?;
        self.inner.state.write().remove(&filter, &options)
    }

    /// Creates an index unless one with the same options exists.
    pub fn ensure_index(&self, options: IndexOptions) -> DocDbResult<()> {
        self.inner.state.write().ensure_index(options)
    }

    pub fn remove_index(&self, field_name: &str) -> DocDbResult<()> {
        self.inner.state.write().remove_index(field_name)
    }

    /// Options of every index, starting with the implicit `_id` index.
    pub fn indexes(&self) -> Vec<IndexOptions> {
        self.inner.state.read().indexes()
    }

    /// Number of stored documents.
    pub fn size(&self) -> usize {
        self.inner.state.read().size()
    }

    pub fn all_documents(&self) -> Vec<Document> {
        self.inner.state.read().all_documents()
    }

    /// Rewrites the persisted data as a snapshot of the current state.
    pub fn compact(&self) -> DocDbResult<()> {
        let mut state = self.inner.state.write();
        state.purge_expired()?;
        state.compact()
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.inner.state.read()
    }
}

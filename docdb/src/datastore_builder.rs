use std::path::Path;

use crate::datastore::Datastore;
use crate::datastore_config::DatastoreConfig;
use crate::errors::{DocDbError, DocDbResult};
use crate::persistence::{FilePersistence, MemoryPersistence, Persistence};

/// Builder for opening a [Datastore].
///
/// The first invalid setting is remembered and reported by
/// [DatastoreBuilder::open]; later settings are ignored.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Datastore::builder()
///     .filename("data/consoles.db")
///     .timestamp_data(true)
///     .corrupt_alert_threshold(0.2)
///     .open()?;
/// ```
#[derive(Default)]
pub struct DatastoreBuilder {
    error: Option<DocDbError>,
    config: DatastoreConfig,
    persistence: Option<Box<dyn Persistence>>,
}

impl DatastoreBuilder {
    pub fn new() -> Self {
        DatastoreBuilder {
            error: None,
            config: DatastoreConfig::new(),
            persistence: None,
        }
    }

    /// Persists the datastore to an append-only data file.
    pub fn filename<P: AsRef<Path>>(mut self, filename: P) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_filename(filename) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Keeps the data in memory even when a data file is set.
    pub fn in_memory_only(mut self, in_memory_only: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_in_memory_only(in_memory_only) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Maintains `createdAt` and `updatedAt` on every document.
    pub fn timestamp_data(mut self, timestamp_data: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_timestamp_data(timestamp_data) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn corrupt_alert_threshold(mut self, threshold: f64) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_corrupt_alert_threshold(threshold) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Uses a custom persistence collaborator. It takes precedence over
    /// `filename` and `in_memory_only`.
    pub fn persistence<T: Persistence + 'static>(mut self, persistence: T) -> Self {
        self.persistence = Some(Box::new(persistence));
        self
    }

    /// Opens the datastore, loading any persisted data.
    pub fn open(self) -> DocDbResult<Datastore> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let persistence: Box<dyn Persistence> = match (self.persistence, self.config.filename()) {
            (Some(persistence), _) => persistence,
            (None, Some(filename)) if !self.config.is_in_memory_only() => Box::new(
                FilePersistence::new(filename)
                    .with_corrupt_alert_threshold(self.config.corrupt_alert_threshold()),
            ),
            _ => Box::new(MemoryPersistence::new()),
        };
        Datastore::open(self.config, persistence)
    }
}

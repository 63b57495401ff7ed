//! Configuration of a datastore.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::DEFAULT_CORRUPT_ALERT_THRESHOLD;
use crate::errors::{DocDbError, DocDbResult, ErrorKind};

/// Settings a [crate::Datastore] is opened with.
///
/// The configuration is shared between a datastore and its clones. It can
/// only be changed before the datastore opens; afterwards every setter
/// fails.
#[derive(Clone)]
pub struct DatastoreConfig {
    inner: Arc<DatastoreConfigInner>,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DatastoreConfig {
    pub fn new() -> Self {
        DatastoreConfig {
            inner: Arc::new(DatastoreConfigInner::new()),
        }
    }

    /// Path of the data file, if the datastore is file backed.
    pub fn filename(&self) -> Option<PathBuf> {
        self.inner.filename.read().clone()
    }

    pub fn is_in_memory_only(&self) -> bool {
        self.inner.in_memory_only.load(Ordering::Relaxed)
    }

    /// True when the data is kept in memory only, either explicitly or
    /// because no data file is set.
    pub fn is_in_memory(&self) -> bool {
        self.is_in_memory_only() || self.filename().is_none()
    }

    pub fn is_timestamp_data(&self) -> bool {
        self.inner.timestamp_data.load(Ordering::Relaxed)
    }

    /// Fraction of unreadable lines tolerated when loading a data file.
    pub fn corrupt_alert_threshold(&self) -> f64 {
        f64::from_bits(self.inner.corrupt_alert_threshold.load(Ordering::Relaxed))
    }

    pub(crate) fn set_filename<P: AsRef<Path>>(&self, filename: P) -> DocDbResult<()> {
        self.inner.check_not_opened()?;
        let filename = filename.as_ref();
        if filename.as_os_str().is_empty() {
            log::error!("Data file name cannot be empty");
            return Err(DocDbError::new(
                "Data file name cannot be empty",
                ErrorKind::ValidationError,
            ));
        }
        *self.inner.filename.write() = Some(filename.to_path_buf());
        Ok(())
    }

    pub(crate) fn set_in_memory_only(&self, in_memory_only: bool) -> DocDbResult<()> {
        self.inner.check_not_opened()?;
        self.inner.in_memory_only.store(in_memory_only, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn set_timestamp_data(&self, timestamp_data: bool) -> DocDbResult<()> {
        self.inner.check_not_opened()?;
        self.inner.timestamp_data.store(timestamp_data, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn set_corrupt_alert_threshold(&self, threshold: f64) -> DocDbResult<()> {
        self.inner.check_not_opened()?;
        if !(0.0..=1.0).contains(&threshold) {
            log::error!("Corrupt alert threshold must be between 0 and 1, got {}", threshold);
            return Err(DocDbError::new(
                &format!("Corrupt alert threshold must be between 0 and 1, got {}", threshold),
                ErrorKind::ValidationError,
            ));
        }
        self.inner
            .corrupt_alert_threshold
            .store(threshold.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn mark_opened(&self) {
        self.inner.opened.store(true, Ordering::Relaxed);
    }
}

struct DatastoreConfigInner {
    opened: AtomicBool,
    filename: RwLock<Option<PathBuf>>,
    in_memory_only: AtomicBool,
    timestamp_data: AtomicBool,
    corrupt_alert_threshold: AtomicU64,
}

impl DatastoreConfigInner {
    fn new() -> Self {
        DatastoreConfigInner {
            opened: AtomicBool::new(false),
            filename: RwLock::new(None),
            in_memory_only: AtomicBool::new(false),
            timestamp_data: AtomicBool::new(false),
            corrupt_alert_threshold: AtomicU64::new(DEFAULT_CORRUPT_ALERT_THRESHOLD.to_bits()),
        }
    }

    fn check_not_opened(&self) -> DocDbResult<()> {
        if self.opened.load(Ordering::Relaxed) {
            log::error!("Configuration cannot be changed after the datastore is opened");
            return Err(DocDbError::new(
                "Configuration cannot be changed after the datastore is opened",
                ErrorKind::ValidationError,
            ));
        }
        Ok(())
    }
}

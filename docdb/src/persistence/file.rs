use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::collection::Document;
use crate::common::DEFAULT_CORRUPT_ALERT_THRESHOLD;
use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use crate::index::IndexOptions;

use super::codec::{decode_record, encode_record};
use super::{OperationRecord, PersistedState, Persistence};

/// Append-only, line oriented data file.
///
/// Every record is one line of JSON. Documents are written whole; removals
/// are written as `{"$$deleted": true, "_id": ...}`; index creation and
/// removal as `{"$$indexCreated": {...}}` and `{"$$indexRemoved": ...}`.
/// On load the lines are replayed in order, the last line for an `_id`
/// winning.
///
/// Compaction writes a snapshot to `<file>~` and renames it over the data
/// file. If a crash leaves only the temporary file behind, it is picked up
/// on the next load.
pub struct FilePersistence {
    path: PathBuf,
    corrupt_alert_threshold: f64,
    writer: Option<BufWriter<File>>,
}

impl FilePersistence {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FilePersistence {
            path: path.as_ref().to_path_buf(),
            corrupt_alert_threshold: DEFAULT_CORRUPT_ALERT_THRESHOLD,
            writer: None,
        }
    }

    /// Sets the fraction of unreadable lines above which loading fails.
    pub fn with_corrupt_alert_threshold(mut self, threshold: f64) -> Self {
        self.corrupt_alert_threshold = threshold;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push("~");
        PathBuf::from(name)
    }

    /// Makes sure the data file exists, recovering an interrupted
    /// compaction if needed.
    fn ensure_data_file(&self) -> DocDbResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        if self.path.exists() {
            return Ok(());
        }

        let temp = self.temp_path();
        if temp.exists() {
            log::warn!(
                "Data file {} missing, recovering from {}",
                self.path.display(),
                temp.display()
            );
            fs::rename(&temp, &self.path)?;
        } else {
            File::create(&self.path)?;
        }
        Ok(())
    }

    fn writer(&mut self) -> DocDbResult<&mut BufWriter<File>> {
        if self.writer.is_none() {
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            self.writer = Some(BufWriter::new(file));
        }

        match self.writer.as_mut() {
            Some(writer) => Ok(writer),
            None => {
                log::error!("Data file {} is not open", self.path.display());
                Err(DocDbError::new(
                    &format!("Data file {} is not open", self.path.display()),
                    ErrorKind::InternalError,
                ))
            }
        }
    }

    /// Drops whatever is still buffered and cuts the data file back to
    /// `len` bytes, so a partly written batch is never replayed.
    fn truncate_to(&mut self, len: u64) {
        let file = match self.writer.take() {
            Some(writer) => writer.into_parts().0,
            None => match OpenOptions::new().write(true).open(&self.path) {
                Ok(file) => file,
                Err(err) => {
                    log::error!("Failed to reopen {} for truncation: {}", self.path.display(), err);
                    return;
                }
            },
        };
        if let Err(err) = file.set_len(len) {
            log::error!("Failed to truncate {} to {} bytes: {}", self.path.display(), len, err);
        }
    }
}

impl Persistence for FilePersistence {
    fn load(&mut self) -> DocDbResult<PersistedState> {
        self.ensure_data_file()?;
        let content = fs::read_to_string(&self.path)?;

        let mut documents: IndexMap<String, Document> = IndexMap::new();
        let mut indexes: IndexMap<String, IndexOptions> = IndexMap::new();
        let mut total = 0usize;
        let mut corrupt = 0usize;

        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            total += 1;
            match decode_record(line) {
                Ok(OperationRecord::Upsert(doc)) => {
                    if let Some(id) = doc.id() {
                        documents.insert(id.to_string(), doc);
                    }
                }
                Ok(OperationRecord::Delete(id)) => {
                    documents.shift_remove(&id);
                }
                Ok(OperationRecord::IndexCreated(options)) => {
                    indexes.insert(options.field_name().to_string(), options);
                }
                Ok(OperationRecord::IndexRemoved(field_name)) => {
                    indexes.shift_remove(&field_name);
                }
                Err(err) => {
                    log::warn!("Skipping unreadable line in {}: {}", self.path.display(), err);
                    corrupt += 1;
                }
            }
        }

        if total > 0 {
            let ratio = corrupt as f64 / total as f64;
            if ratio > self.corrupt_alert_threshold {
                log::error!(
                    "{:.1}% of the data file {} is corrupt, more than the {:.1}% threshold",
                    ratio * 100.0,
                    self.path.display(),
                    self.corrupt_alert_threshold * 100.0
                );
                return Err(DocDbError::new(
                    &format!(
                        "{:.1}% of the data file {} is corrupt, more than the {:.1}% threshold",
                        ratio * 100.0,
                        self.path.display(),
                        self.corrupt_alert_threshold * 100.0
                    ),
                    ErrorKind::CorruptData,
                ));
            }
        }

        log::debug!(
            "Loaded {} documents and {} indexes from {}",
            documents.len(),
            indexes.len(),
            self.path.display()
        );
        Ok(PersistedState {
            documents: documents.into_values().collect(),
            indexes: indexes.into_values().collect(),
        })
    }

    fn append(&mut self, records: &[OperationRecord]) -> DocDbResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        // encode everything first so a bad record writes nothing
        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&encode_record(record)?);
            buffer.push('\n');
        }

        // every append is flushed, so the file ends where this batch starts
        let start = self.writer()?.get_ref().metadata()?.len();
        let result = self
            .writer()
            .and_then(|writer| Ok(writer.write_all(buffer.as_bytes()).and_then(|_| writer.flush())?));
        if let Err(err) = result {
            log::error!("Failed to append to {}: {}", self.path.display(), err);
            self.truncate_to(start);
            return Err(DocDbError::new_with_cause(
                &format!("Failed to append to {}", self.path.display()),
                ErrorKind::IOError,
                err,
            ));
        }
        Ok(())
    }

    fn compact(&mut self, state: &PersistedState) -> DocDbResult<()> {
        let temp = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            for doc in &state.documents {
                writer.write_all(encode_record(&OperationRecord::Upsert(doc.clone()))?.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            for options in &state.indexes {
                writer.write_all(encode_record(&OperationRecord::IndexCreated(options.clone()))?.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        self.writer = None;
        fs::rename(&temp, &self.path)?;
        log::debug!(
            "Compacted {} to {} documents",
            self.path.display(),
            state.documents.len()
        );
        Ok(())
    }
}

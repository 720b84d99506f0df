use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use watch_core::Record;
use watch_logging::{watch_debug, watch_info};

use crate::persist::{AtomicFileWriter, PersistError};

/// Durable home of the last observed snapshot of each record kind.
pub trait SnapshotStore: Send + Sync {
    /// Last written snapshot of `R`, or an empty one if none was ever written.
    fn read<R: Record>(&self) -> Result<Vec<R>, PersistError>;

    /// Replaces the snapshot of `R` with `records`.
    fn write<R: Record>(&self, records: &[R]) -> Result<PathBuf, PersistError>;
}

/// Snapshots stored as pretty-printed JSON arrays, one file per record kind.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    writer: AtomicFileWriter,
}

impl JsonSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    pub fn path_for<R: Record>(&self) -> PathBuf {
        self.dir().join(file_name::<R>())
    }
}

fn file_name<R: Record>() -> String {
    format!("{}.json", R::KIND.snapshot_name())
}

impl SnapshotStore for JsonSnapshotStore {
    fn read<R: Record>(&self) -> Result<Vec<R>, PersistError> {
        let path = self.path_for::<R>();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                watch_debug!("No {} snapshot at {:?}; starting empty", R::KIND, path);
                return Ok(Vec::new());
            }
            Err(err) => return Err(PersistError::Io(err)),
        };

        let records: Vec<R> =
            serde_json::from_str(&content).map_err(|err| PersistError::Corrupt {
                path: path.clone(),
                message: err.to_string(),
            })?;
        watch_debug!(
            "Loaded {} {} record(s) from {:?}",
            records.len(),
            R::KIND,
            path
        );
        Ok(records)
    }

    fn write<R: Record>(&self, records: &[R]) -> Result<PathBuf, PersistError> {
        let content = serde_json::to_string_pretty(records)
            .map_err(|err| PersistError::Serialize(err.to_string()))?;
        let path = self.writer.write(&file_name::<R>(), &content)?;
        watch_info!(
            "Saved {} {} record(s) to {:?}",
            records.len(),
            R::KIND,
            path
        );
        Ok(path)
    }
}

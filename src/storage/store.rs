//! JSON-file document store.
//!
//! Each collection lives in `<data_dir>/<NAME>.json` as an array of
//! records kept in insertion order. Writes go to a temporary file that is
//! renamed over the original, so a crash never leaves half a collection.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Errors raised by the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt collection {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize {0}: {1}")]
    Serialize(String, #[source] serde_json::Error),
}

/// A stored document with a unique key.
pub trait Record: Serialize + DeserializeOwned + Clone + Debug + Send + Sync {
    type Key: PartialEq + Debug + ?Sized;

    fn key(&self) -> &Self::Key;
}

/// Root directory holding all collections.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles across collections.
    lock: Arc<Mutex<()>>,
}

impl DocumentStore {
    /// Opens (and creates if needed) the store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            lock: Arc::new(Mutex::new(())),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns a handle to the named collection.
    #[must_use]
    pub fn collection<T: Record>(&self, name: &str) -> Collection<T> {
        Collection {
            path: self.dir.join(format!("{name}.json")),
            lock: Arc::clone(&self.lock),
            _record: PhantomData,
        }
    }
}

/// Typed view over one collection file.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Collection<T> {
    /// All records in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn find(&self) -> Result<Vec<T>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load()
    }

    /// The record stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn find_one(&self, key: &T::Key) -> Result<Option<T>, StoreError> {
        Ok(self.find()?.into_iter().find(|r| r.key() == key))
    }

    /// Inserts `record` or replaces the one with the same key in place.
    ///
    /// Returns true when the record was new.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub fn add_data(&self, record: T) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.load()?;
        let inserted = match records.iter_mut().find(|r| r.key() == record.key()) {
            Some(existing) => {
                *existing = record;
                false
            }
            None => {
                records.push(record);
                true
            }
        };
        self.save(&records)?;
        Ok(inserted)
    }

    /// Removes the record stored under `key`.
    ///
    /// Returns true when a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub fn delete_data(&self, key: &T::Key) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.key() != key);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records)?;
        Ok(true)
    }

    fn load(&self) -> Result<Vec<T>, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, records: &[T]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| StoreError::Serialize(self.path.display().to_string(), e))?;
        write_atomic(&self.path, json.as_bytes())?;
        debug!("Saved {} record(s) to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// Writes `contents` to a sibling temp file and renames it over `path`.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    std::fs::write(&tmp, contents).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

//! Record collections with atomic read-modify-write.
//!
//! A [`Collection`] is the repository interface every store in this crate goes
//! through. It owns a single-writer lock so that `load -> mutate -> save` is never
//! interleaved with another mutation of the same collection. The storage itself is
//! pluggable through [`RecordBackend`]: a JSON file on disk in production, a plain
//! vector in memory for tests.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// A persisted record addressable by a string key.
pub trait Record:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn key(&self) -> &str;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Whole-collection storage. Implementations only load and save; locking and
/// record semantics live in [`Collection`].
#[async_trait]
pub trait RecordBackend<T: Record>: Send + Sync {
    async fn load(&self) -> Result<Vec<T>, StoreError>;

    async fn save(&self, records: &[T]) -> Result<(), StoreError>;
}

/// JSON array persisted in a single file.
///
/// A missing file is an empty collection. So is a file that fails to parse: the
/// problem is logged and the next write replaces it.
pub struct JsonFileBackend<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileBackend<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Record> RecordBackend<T> for JsonFileBackend<T> {
    async fn load(&self) -> Result<Vec<T>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&content) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(
                    "Malformed records in {}, treating as empty: {}",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, records: &[T]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let content = serde_json::to_vec_pretty(records)?;

        // Write-then-rename so readers never observe a half-written file.
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        debug!("Saved {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

pub struct MemoryBackend<T> {
    records: RwLock<Vec<T>>,
}

impl<T> MemoryBackend<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl<T> Default for MemoryBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> RecordBackend<T> for MemoryBackend<T> {
    async fn load(&self) -> Result<Vec<T>, StoreError> {
        Ok(self.records.read().await.clone())
    }

    async fn save(&self, records: &[T]) -> Result<(), StoreError> {
        *self.records.write().await = records.to_vec();
        Ok(())
    }
}

pub struct Collection<T: Record> {
    backend: Arc<dyn RecordBackend<T>>,
    write_lock: Arc<Mutex<()>>,
}

impl<T: Record> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            write_lock: Arc::clone(&self.write_lock),
        }
    }
}

impl<T: Record> Collection<T> {
    pub fn new(backend: impl RecordBackend<T> + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonFileBackend::new(path))
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    pub async fn all(&self) -> Result<Vec<T>, StoreError> {
        self.backend.load().await
    }

    pub async fn get(&self, key: &str) -> Result<Option<T>, StoreError> {
        let records = self.backend.load().await?;
        Ok(records.into_iter().find(|r| r.key() == key))
    }

    pub async fn list_by<F>(&self, filter: F) -> Result<Vec<T>, StoreError>
    where
        F: Fn(&T) -> bool + Send,
    {
        let records = self.backend.load().await?;
        Ok(records.into_iter().filter(|r| filter(r)).collect())
    }

    pub async fn find_by<F>(&self, filter: F) -> Result<Option<T>, StoreError>
    where
        F: Fn(&T) -> bool + Send,
    {
        let records = self.backend.load().await?;
        Ok(records.into_iter().find(|r| filter(r)))
    }

    /// Insert or replace the record with the same key.
    pub async fn put(&self, record: T) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.backend.load().await?;

        match records.iter_mut().find(|r| r.key() == record.key()) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }

        self.backend.save(&records).await
    }

    /// Append `record` unless an existing record matches `conflicts`.
    /// Returns `false` when a conflict was found and nothing was written.
    pub async fn insert_unless<F>(&self, record: T, conflicts: F) -> Result<bool, StoreError>
    where
        F: Fn(&T) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.backend.load().await?;

        if records.iter().any(|r| conflicts(r) || r.key() == record.key()) {
            return Ok(false);
        }

        records.push(record);
        self.backend.save(&records).await?;
        Ok(true)
    }

    /// Delete by key. Absent keys are not an error.
    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed = self.retain(|r| r.key() != key).await?;
        Ok(removed > 0)
    }

    /// Keep only records matching `keep`; returns how many were dropped.
    pub async fn retain<F>(&self, keep: F) -> Result<usize, StoreError>
    where
        F: Fn(&T) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.backend.load().await?;

        let before = records.len();
        records.retain(|r| keep(r));
        let removed = before - records.len();

        if removed > 0 {
            self.backend.save(&records).await?;
        }

        Ok(removed)
    }

    /// Atomic read-modify-write of the record stored under `key`.
    ///
    /// `mutate` receives the current record (if any) and returns what should be
    /// stored: `Some` to insert or replace, `None` to delete. The collection is only
    /// rewritten when the result differs from what was there. Returns the stored
    /// record.
    pub async fn update<F>(&self, key: &str, mutate: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(Option<T>) -> Option<T> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.backend.load().await?;

        let position = records.iter().position(|r| r.key() == key);
        let current = position.map(|i| records[i].clone());
        let next = mutate(current.clone());

        if next == current {
            return Ok(next);
        }

        match (position, &next) {
            (Some(i), Some(record)) => records[i] = record.clone(),
            (Some(i), None) => {
                records.remove(i);
            }
            (None, Some(record)) => records.push(record.clone()),
            (None, None) => {}
        }

        self.backend.save(&records).await?;
        Ok(next)
    }
}

//! Persistence for download records.
//!
//! The engine is the only writer; the store exists so records survive
//! restarts. [`JsonFileStore`] keeps the whole record set in a single JSON
//! file, rewritten atomically on every change.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::Download;

#[async_trait]
pub trait DownloadStore: Send + Sync {
    /// Every persisted record, in no particular order.
    async fn load_all(&self) -> io::Result<Vec<Download>>;

    /// Inserts or replaces the record with the same id.
    async fn save(&self, download: &Download) -> io::Result<()>;

    async fn remove(&self, id: &str) -> io::Result<()>;
}

/// File-backed store: one JSON array of records.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_records(&self) -> io::Result<Vec<Download>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(io::Error::other),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    async fn write_records(&self, records: &[Download]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(records).map_err(io::Error::other)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DownloadStore for JsonFileStore {
    async fn load_all(&self) -> io::Result<Vec<Download>> {
        let _guard = self.lock.lock().await;
        self.read_records().await
    }

    async fn save(&self, download: &Download) -> io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records().await?;

        match records.iter_mut().find(|r| r.id == download.id) {
            Some(existing) => *existing = download.clone(),
            None => records.push(download.clone()),
        }

        self.write_records(&records).await?;
        debug!(download_id = %download.id, state = %download.state, "download record saved");
        Ok(())
    }

    async fn remove(&self, id: &str) -> io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records().await?;
        let before = records.len();
        records.retain(|r| r.id != id);

        if records.len() != before {
            self.write_records(&records).await?;
            debug!(download_id = %id, "download record removed");
        }
        Ok(())
    }
}

//! Screenshot Storage
//!
//! Screenshots are write-once, read-many. Only an access-controlled
//! reference is persisted or logged; the bytes live in the configured
//! backend (local filesystem or object store). Retention is an operator
//! knob, swept by the daily background worker.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::config::{ScreenshotBackendKind, StorageConfig};
use crate::types::{PressError, Result};

/// Write-once screenshot sink; returns the stored reference
#[async_trait]
pub trait ScreenshotStore: Send + Sync {
    async fn store(&self, task_id: i64, step: &str, png_bytes: &[u8]) -> Result<String>;
}

pub type SharedScreenshotStore = std::sync::Arc<dyn ScreenshotStore>;

/// Create a store from configuration
pub fn create_store(config: &StorageConfig) -> Result<SharedScreenshotStore> {
    match config.screenshots {
        ScreenshotBackendKind::LocalFs => {
            let directory = config.directory.clone().ok_or_else(|| {
                PressError::Config("storage.directory is required for local_fs".to_string())
            })?;
            Ok(std::sync::Arc::new(LocalFsStore::new(directory)))
        }
        ScreenshotBackendKind::ObjectStore => {
            let bucket = config.bucket.clone().ok_or_else(|| {
                PressError::Config("storage.bucket is required for object_store".to_string())
            })?;
            Ok(std::sync::Arc::new(ObjectStore::new(bucket)?))
        }
    }
}

// =============================================================================
// Local Filesystem
// =============================================================================

pub struct LocalFsStore {
    directory: PathBuf,
}

impl LocalFsStore {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl ScreenshotStore for LocalFsStore {
    async fn store(&self, task_id: i64, step: &str, png_bytes: &[u8]) -> Result<String> {
        let dir = self.directory.join(format!("task-{task_id}"));
        tokio::fs::create_dir_all(&dir).await?;
        let name = format!("{}-{}.png", Utc::now().format("%Y%m%dT%H%M%S%.3f"), step);
        let path = dir.join(&name);
        tokio::fs::write(&path, png_bytes).await?;
        debug!(task_id, step, reference = %path.display(), "screenshot stored");
        Ok(path.display().to_string())
    }
}

/// Sweep local screenshots older than the retention horizon. Returns the
/// number of files removed. No-op when retention is unset.
pub fn sweep_expired(directory: &Path, retention_days: Option<u32>) -> Result<usize> {
    let Some(days) = retention_days else {
        return Ok(0);
    };
    let cutoff = std::time::SystemTime::now()
        .checked_sub(Duration::from_secs(days as u64 * 86_400))
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);

    let mut removed = 0usize;
    if !directory.exists() {
        return Ok(0);
    }
    for entry in walk_files(directory)? {
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        if modified < cutoff {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    if removed > 0 {
        info!(removed, days, "expired screenshots swept");
    }
    Ok(removed)
}

fn walk_files(dir: &Path) -> Result<Vec<std::fs::DirEntry>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            out.extend(walk_files(&entry.path())?);
        } else {
            out.push(entry);
        }
    }
    Ok(out)
}

// =============================================================================
// Object Store
// =============================================================================

/// Object-store backend: one PUT per screenshot under the configured
/// bucket, authenticated with the ambient access token
pub struct ObjectStore {
    bucket: String,
    client: reqwest::Client,
}

impl ObjectStore {
    pub fn new(bucket: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PressError::Storage(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { bucket, client })
    }
}

#[async_trait]
impl ScreenshotStore for ObjectStore {
    async fn store(&self, task_id: i64, step: &str, png_bytes: &[u8]) -> Result<String> {
        let key = format!(
            "screenshots/task-{task_id}/{}-{step}.png",
            Utc::now().format("%Y%m%dT%H%M%S%.3f")
        );
        let url = format!(
            "https://storage.googleapis.com/{}/{}",
            self.bucket, key
        );
        let token = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .map_err(|_| PressError::CredentialMissing("GOOGLE_OAUTH_ACCESS_TOKEN".to_string()))?;

        let response = self
            .client
            .put(&url)
            .bearer_auth(token)
            .header("Content-Type", "image/png")
            .body(png_bytes.to_vec())
            .send()
            .await
            .map_err(|e| PressError::Storage(format!("screenshot upload failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PressError::Storage(format!(
                "screenshot upload rejected: {}",
                response.status()
            )));
        }
        Ok(format!("gs://{}/{}", self.bucket, key))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_store_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path().to_path_buf());
        let reference = store.store(7, "login", b"png-bytes").await.unwrap();
        assert!(reference.contains("task-7"));
        assert!(reference.ends_with("login.png"));
        assert_eq!(std::fs::read(&reference).unwrap(), b"png-bytes");
    }

    #[test]
    fn test_sweep_without_retention_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.png"), b"x").unwrap();
        let removed = sweep_expired(dir.path(), None).unwrap();
        assert_eq!(removed, 0);
        assert!(dir.path().join("old.png").exists());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.png");
        std::fs::write(&old, b"x").unwrap();
        // Age the file far beyond the horizon
        let ancient = std::time::SystemTime::now() - Duration::from_secs(90 * 86_400);
        filetime_set(&old, ancient);

        let fresh = dir.path().join("fresh.png");
        std::fs::write(&fresh, b"y").unwrap();

        let removed = sweep_expired(dir.path(), Some(30)).unwrap();
        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    /// Set mtime without an extra crate; ignores errors on exotic systems
    fn filetime_set(path: &Path, when: std::time::SystemTime) {
        if let Ok(file) = std::fs::OpenOptions::new().write(true).open(path) {
            let _ = file.set_modified(when);
        }
    }

    #[test]
    fn test_create_store_from_config() {
        let config = StorageConfig::default();
        assert!(create_store(&config).is_ok());
    }
}

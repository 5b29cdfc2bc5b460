//! File-backed Credential Backend
//!
//! Reads key=value pairs from a local file. Lines starting with `#` and
//! blank lines are ignored. Writes rewrite the whole file; callers are
//! expected to be rare and serialized.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use super::VaultBackend;
use crate::types::{PressError, Result};

pub struct EnvFileBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl EnvFileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PressError::VaultUnavailable(format!(
                "cannot read credential file {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(Self::parse(&content))
    }

    fn parse(content: &str) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                out.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        out
    }

    fn render(entries: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        for (key, value) in entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }
}

#[async_trait]
impl VaultBackend for EnvFileBackend {
    async fn get(&self, key: &str) -> Result<Option<SecretString>> {
        let entries = self.read_all().await?;
        Ok(entries.get(key).map(|v| SecretString::from(v.clone())))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let entries = self.read_all().await?;
        Ok(entries.into_keys().collect())
    }

    async fn set(&self, key: &str, value: SecretString) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = match self.read_all().await {
            Ok(entries) => entries,
            Err(_) => BTreeMap::new(), // file may not exist yet
        };
        entries.insert(key.to_string(), value.expose_secret().to_string());
        tokio::fs::write(&self.path, Self::render(&entries)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.remove(key);
        tokio::fs::write(&self.path, Self::render(&entries)).await?;
        Ok(())
    }

    fn source(&self) -> &'static str {
        "env_file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let content = "# cms credentials\n\ncms_user=editor\ncms_password = s3cret \n";
        let entries = EnvFileBackend::parse(content);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["cms_user"], "editor");
        assert_eq!(entries["cms_password"], "s3cret");
    }

    #[tokio::test]
    async fn test_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.env");
        std::fs::write(&path, "cms_user=editor\n").unwrap();

        let backend = EnvFileBackend::new(path);
        let value = backend.get("cms_user").await.unwrap().unwrap();
        assert_eq!(value.expose_secret(), "editor");

        backend
            .set("cms_password", SecretString::from("s3cret"))
            .await
            .unwrap();
        assert_eq!(
            backend.list().await.unwrap(),
            vec!["cms_password".to_string(), "cms_user".to_string()]
        );

        backend.delete("cms_user").await.unwrap();
        assert!(backend.get("cms_user").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let backend = EnvFileBackend::new(PathBuf::from("/nonexistent/credentials.env"));
        let err = backend.get("anything").await.unwrap_err();
        assert!(matches!(err, PressError::VaultUnavailable(_)));
    }
}

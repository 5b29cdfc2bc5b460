//! Document Store Client Contract
//!
//! The core consumes this interface; the transport implementation lives
//! with the deployment. An in-memory implementation backs tests and the
//! local demo mode.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PressError, Result};

/// Summary row from a folder listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub modified_at: DateTime<Utc>,
    /// Store-specific metadata (link, owners)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Fetched document content
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub raw_html: String,
    pub metadata: serde_json::Value,
}

/// Read access to the shared document store
#[async_trait]
pub trait DocumentStoreClient: Send + Sync {
    /// List documents under a folder
    async fn list_documents(&self, folder: &str) -> Result<Vec<DocumentSummary>>;

    /// Fetch one document's HTML body and metadata
    async fn fetch_document(&self, id: &str) -> Result<DocumentContent>;
}

// =============================================================================
// In-memory implementation
// =============================================================================

/// In-memory store for tests and the local demo mode
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: tokio::sync::RwLock<BTreeMap<String, (DocumentSummary, String)>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, summary: DocumentSummary, raw_html: impl Into<String>) {
        self.documents
            .write()
            .await
            .insert(summary.id.clone(), (summary, raw_html.into()));
    }

    pub async fn touch(&self, id: &str, modified_at: DateTime<Utc>) {
        if let Some((summary, _)) = self.documents.write().await.get_mut(id) {
            summary.modified_at = modified_at;
        }
    }
}

#[async_trait]
impl DocumentStoreClient for InMemoryDocumentStore {
    async fn list_documents(&self, _folder: &str) -> Result<Vec<DocumentSummary>> {
        Ok(self
            .documents
            .read()
            .await
            .values()
            .map(|(summary, _)| summary.clone())
            .collect())
    }

    async fn fetch_document(&self, id: &str) -> Result<DocumentContent> {
        let documents = self.documents.read().await;
        let (summary, raw_html) = documents
            .get(id)
            .ok_or_else(|| PressError::NotFound(format!("document {id}")))?;
        Ok(DocumentContent {
            raw_html: raw_html.clone(),
            metadata: summary.metadata.clone(),
        })
    }
}

// =============================================================================
// Local folder implementation
// =============================================================================

/// Folder-of-HTML-files store: each `.html` file under the root is one
/// document, its id the file name, its modification time the store-side
/// `modified_at`. Used by the CLI for local operation; shared-drive
/// transports live with the deployment.
pub struct LocalFolderStore {
    root: std::path::PathBuf,
}

impl LocalFolderStore {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, id: &str) -> Result<std::path::PathBuf> {
        // Ids are bare file names; anything path-like is refused
        if id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(PressError::NotFound(format!("document {id}")));
        }
        Ok(self.root.join(id))
    }
}

#[async_trait]
impl DocumentStoreClient for LocalFolderStore {
    async fn list_documents(&self, folder: &str) -> Result<Vec<DocumentSummary>> {
        let dir = self.root.join(folder);
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            PressError::NotFound(format!("document folder {}: {e}", dir.display()))
        })?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let modified_at = entry
                .metadata()
                .await?
                .modified()
                .map(chrono::DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            out.push(DocumentSummary {
                id: format!("{folder}/{name}"),
                name: name.trim_end_matches(".html").to_string(),
                modified_at,
                metadata: serde_json::json!({"link": path.display().to_string()}),
            });
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn fetch_document(&self, id: &str) -> Result<DocumentContent> {
        // Listing ids are folder/name pairs, exactly one level deep
        let path = match id.split_once('/') {
            Some((folder, name))
                if !folder.contains("..") && !name.contains("..") && !name.contains('/') =>
            {
                self.root.join(folder).join(name)
            }
            Some(_) => return Err(PressError::NotFound(format!("document {id}"))),
            None => self.resolve(id)?,
        };
        let raw_html = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PressError::NotFound(format!("document {id}: {e}")))?;
        Ok(DocumentContent {
            raw_html,
            metadata: serde_json::json!({"link": path.display().to_string()}),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str) -> DocumentSummary {
        DocumentSummary {
            id: id.to_string(),
            name: format!("doc {id}"),
            modified_at: Utc::now(),
            metadata: serde_json::json!({"link": format!("https://docs.example.com/{id}")}),
        }
    }

    #[tokio::test]
    async fn test_list_and_fetch() {
        let store = InMemoryDocumentStore::new();
        store.insert(summary("d1"), "<h1>One</h1>").await;
        store.insert(summary("d2"), "<h1>Two</h1>").await;

        let listing = store.list_documents("articles").await.unwrap();
        assert_eq!(listing.len(), 2);

        let content = store.fetch_document("d1").await.unwrap();
        assert_eq!(content.raw_html, "<h1>One</h1>");
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let store = InMemoryDocumentStore::new();
        let err = store.fetch_document("ghost").await.unwrap_err();
        assert!(matches!(err, PressError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_local_folder_store() {
        let dir = tempfile::tempdir().unwrap();
        let articles = dir.path().join("articles");
        std::fs::create_dir_all(&articles).unwrap();
        std::fs::write(articles.join("one.html"), "<h1>One</h1>").unwrap();
        std::fs::write(articles.join("notes.txt"), "ignored").unwrap();

        let store = LocalFolderStore::new(dir.path());
        let listing = store.list_documents("articles").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].id, "articles/one.html");
        assert_eq!(listing[0].name, "one");

        let content = store.fetch_document(&listing[0].id).await.unwrap();
        assert_eq!(content.raw_html, "<h1>One</h1>");
    }

    #[tokio::test]
    async fn test_local_folder_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFolderStore::new(dir.path());
        assert!(store.fetch_document("../etc/passwd").await.is_err());
        assert!(store.fetch_document("articles/../../secret.html").await.is_err());
    }
}

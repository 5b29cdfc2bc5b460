//! Document-Store Synchronization
//!
//! A scheduled job polls the configured folder. Unknown documents become
//! `pending` worklist items; known documents with a newer upstream
//! modification are re-fetched unless the item sits in a review lane, in
//! which case only a note is appended and the operator decides. The job
//! is idempotent and concurrent runs are serialized by a named lock;
//! kicking pending items into parsing is the orchestrator's follow-up,
//! so backpressure never loses work.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::ai::with_timeout;
use crate::clients::{DocumentStoreClient, DocumentSummary};
use crate::constants::timeout as timeout_constants;
use crate::storage::{NewWorklistItem, SharedDatabase};
use crate::types::{DocumentMetadata, Note, Result};

/// Outcome of one sync round
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub discovered: usize,
    pub refreshed: usize,
    pub flagged_in_review: usize,
    pub unchanged: usize,
}

pub struct DocumentStoreSync {
    db: SharedDatabase,
    store: Arc<dyn DocumentStoreClient>,
    folder: String,
    /// Serializes concurrent runs; partial progress is safe either way
    run_lock: Mutex<()>,
}

impl DocumentStoreSync {
    pub fn new(db: SharedDatabase, store: Arc<dyn DocumentStoreClient>, folder: String) -> Self {
        Self {
            db,
            store,
            folder,
            run_lock: Mutex::new(()),
        }
    }

    /// One idempotent sync round
    pub async fn run_once(&self) -> Result<SyncReport> {
        let _guard = self.run_lock.lock().await;
        let mut report = SyncReport::default();

        let listing = with_timeout(
            std::time::Duration::from_secs(timeout_constants::DOCUMENT_FETCH_SECS),
            self.store.list_documents(&self.folder),
            "document listing",
        )
        .await?;

        debug!(folder = %self.folder, documents = listing.len(), "sync round started");

        for summary in listing {
            match self.sync_document(&summary, &mut report).await {
                Ok(()) => {}
                Err(err) => {
                    // One bad document doesn't stop the round
                    warn!(document_id = %summary.id, error = %err, "document sync failed");
                }
            }
        }

        info!(
            discovered = report.discovered,
            refreshed = report.refreshed,
            flagged = report.flagged_in_review,
            unchanged = report.unchanged,
            "sync round complete"
        );
        Ok(report)
    }

    async fn sync_document(
        &self,
        summary: &DocumentSummary,
        report: &mut SyncReport,
    ) -> Result<()> {
        match self.db.find_by_document_id(&summary.id)? {
            None => {
                let content = self.fetch(&summary.id).await?;
                let metadata = document_metadata(summary);
                self.db.create_worklist_item(&NewWorklistItem {
                    document_id: summary.id.clone(),
                    raw_text: strip_tags(&content.raw_html),
                    raw_html: content.raw_html,
                    title: Some(summary.name.clone()),
                    author: None,
                    document_metadata: metadata,
                    auto_process: false,
                })?;
                report.discovered += 1;
            }
            Some(item) => {
                if summary.modified_at <= item.synced_at {
                    report.unchanged += 1;
                    return Ok(());
                }
                if item.status.is_review() {
                    // Never overwrite an item under review; the operator
                    // decides what to do with the upstream change
                    self.db.append_note(
                        item.id,
                        &Note::system(format!(
                            "upstream changed at {}",
                            summary.modified_at.to_rfc3339()
                        )),
                    )?;
                    report.flagged_in_review += 1;
                    return Ok(());
                }
                let content = self.fetch(&summary.id).await?;
                self.db.update_sync_snapshot(
                    item.id,
                    &content.raw_html,
                    &strip_tags(&content.raw_html),
                    &document_metadata(summary),
                )?;
                report.refreshed += 1;
            }
        }
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<crate::clients::DocumentContent> {
        with_timeout(
            std::time::Duration::from_secs(timeout_constants::DOCUMENT_FETCH_SECS),
            self.store.fetch_document(id),
            "document fetch",
        )
        .await
    }
}

fn document_metadata(summary: &DocumentSummary) -> DocumentMetadata {
    DocumentMetadata {
        // Only well-formed links are kept; file paths and fragments from
        // odd stores are dropped rather than rendered as dead links
        link: summary
            .metadata
            .get("link")
            .and_then(|v| v.as_str())
            .filter(|s| url::Url::parse(s).is_ok())
            .map(String::from),
        owners: summary
            .metadata
            .get("owners")
            .and_then(|v| v.as_array())
            .map(|owners| {
                owners
                    .iter()
                    .filter_map(|o| o.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
        last_modified: Some(summary.modified_at),
    }
}

/// Crude tag strip for the raw_text snapshot; the real text comes from
/// the sanitizer once the item parses
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::InMemoryDocumentStore;
    use crate::storage::Database;
    use crate::types::WorklistStatus;
    use chrono::Utc;

    fn summary(id: &str, modified_at: chrono::DateTime<Utc>) -> DocumentSummary {
        DocumentSummary {
            id: id.to_string(),
            name: format!("doc {id}"),
            modified_at,
            metadata: serde_json::json!({"link": format!("https://docs/{id}"), "owners": ["ann"]}),
        }
    }

    async fn setup() -> (DocumentStoreSync, SharedDatabase, Arc<InMemoryDocumentStore>) {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(InMemoryDocumentStore::new());
        let sync = DocumentStoreSync::new(db.clone(), store.clone(), "articles".to_string());
        (sync, db, store)
    }

    #[tokio::test]
    async fn test_discovers_new_documents() {
        let (sync, db, store) = setup().await;
        store.insert(summary("d1", Utc::now()), "<h1>One</h1><p>text</p>").await;

        let report = sync.run_once().await.unwrap();
        assert_eq!(report.discovered, 1);

        let item = db.find_by_document_id("d1").unwrap().unwrap();
        assert_eq!(item.status, WorklistStatus::Pending);
        assert!(item.raw_html.contains("<h1>One</h1>"));
        assert_eq!(item.raw_text, "One text");
        assert_eq!(item.document_metadata.owners, vec!["ann"]);
    }

    #[tokio::test]
    async fn test_idempotent_rounds() {
        let (sync, db, store) = setup().await;
        store.insert(summary("d1", Utc::now()), "<p>text</p>").await;

        sync.run_once().await.unwrap();
        let second = sync.run_once().await.unwrap();
        let third = sync.run_once().await.unwrap();

        assert_eq!(second.discovered, 0);
        assert_eq!(third.discovered, 0);
        assert_eq!(db.list_worklist_items(None, true).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refreshes_changed_document() {
        let (sync, db, store) = setup().await;
        let old = Utc::now() - chrono::Duration::hours(1);
        store.insert(summary("d1", old), "<p>old text</p>").await;
        sync.run_once().await.unwrap();

        store.insert(summary("d1", Utc::now() + chrono::Duration::seconds(5)), "<p>new text</p>").await;
        let report = sync.run_once().await.unwrap();
        assert_eq!(report.refreshed, 1);

        let item = db.find_by_document_id("d1").unwrap().unwrap();
        assert!(item.raw_html.contains("new text"));
    }

    #[tokio::test]
    async fn test_review_item_gets_note_not_overwrite() {
        let (sync, db, store) = setup().await;
        let old = Utc::now() - chrono::Duration::hours(1);
        store.insert(summary("d1", old), "<p>original</p>").await;
        sync.run_once().await.unwrap();

        // The item reaches a review lane
        let item = db.find_by_document_id("d1").unwrap().unwrap();
        db.transition_status(item.id, WorklistStatus::Pending, WorklistStatus::Parsing)
            .unwrap();
        db.transition_status(item.id, WorklistStatus::Parsing, WorklistStatus::ParsingReview)
            .unwrap();

        store
            .insert(summary("d1", Utc::now() + chrono::Duration::seconds(5)), "<p>upstream edit</p>")
            .await;
        let report = sync.run_once().await.unwrap();
        assert_eq!(report.flagged_in_review, 1);
        assert_eq!(report.refreshed, 0);

        let item = db.find_by_document_id("d1").unwrap().unwrap();
        assert!(item.raw_html.contains("original"));
        assert!(item.notes.iter().any(|n| n.text.contains("upstream changed")));
    }

    #[tokio::test]
    async fn test_unchanged_document_noop() {
        let (sync, _db, store) = setup().await;
        let stamp = Utc::now() - chrono::Duration::hours(1);
        store.insert(summary("d1", stamp), "<p>text</p>").await;
        sync.run_once().await.unwrap();

        let report = sync.run_once().await.unwrap();
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>a <b>b</b> c</p>"), "a b c");
        assert_eq!(strip_tags("plain"), "plain");
    }
}

//! Worklist Item Persistence
//!
//! Items are created by document-store sync and never deleted (soft
//! archive only). Status transitions are guarded compare-and-set updates:
//! a lost race surfaces as `StaleState`, an off-graph edge as
//! `InvalidTransition`.

use chrono::Utc;
use rusqlite::{Row, params};

use super::database::{Database, from_json, parse_ts, to_json};
use crate::types::{
    DocumentMetadata, Note, PressError, Result, WorklistItem, WorklistStatus,
};

/// Fields captured when sync discovers a new document
#[derive(Debug, Clone)]
pub struct NewWorklistItem {
    pub document_id: String,
    pub raw_html: String,
    pub raw_text: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub document_metadata: DocumentMetadata,
    pub auto_process: bool,
}

fn map_item(row: &Row<'_>) -> rusqlite::Result<(WorklistItem, String, String, String)> {
    Ok((
        WorklistItem {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            status: WorklistStatus::Pending, // patched below
            article_id: row.get("article_id")?,
            raw_html: row.get("raw_html")?,
            raw_text: row.get("raw_text")?,
            title: row.get("title")?,
            author: row.get("author")?,
            document_metadata: DocumentMetadata::default(), // patched below
            error_message: row.get("error_message")?,
            auto_process: row.get::<_, i64>("auto_process")? != 0,
            notes: Vec::new(), // patched below
            synced_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            archived: row.get::<_, i64>("archived")? != 0,
        },
        row.get("status")?,
        row.get("document_metadata")?,
        row.get("notes")?,
    ))
}

fn finish_item(
    (mut item, status, metadata, notes): (WorklistItem, String, String, String),
    synced_at: String,
    created_at: String,
    updated_at: String,
) -> Result<WorklistItem> {
    item.status = status
        .parse()
        .map_err(PressError::Storage)?;
    item.document_metadata = from_json(&metadata, "worklist_items.document_metadata")?;
    item.notes = from_json(&notes, "worklist_items.notes")?;
    item.synced_at = parse_ts(&synced_at)?;
    item.created_at = parse_ts(&created_at)?;
    item.updated_at = parse_ts(&updated_at)?;
    Ok(item)
}

const ITEM_COLUMNS: &str = "id, document_id, status, article_id, raw_html, raw_text, title, \
     author, document_metadata, error_message, auto_process, notes, archived, \
     synced_at, created_at, updated_at";

impl Database {
    fn read_item(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Option<WorklistItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let core = map_item(row)?;
        let synced_at: String = row.get("synced_at")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        Ok(Some(finish_item(core, synced_at, created_at, updated_at)?))
    }

    /// Create a worklist item in `pending` for a newly synced document
    pub fn create_worklist_item(&self, new: &NewWorklistItem) -> Result<WorklistItem> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO worklist_items
                 (document_id, status, raw_html, raw_text, title, author,
                  document_metadata, auto_process, notes, synced_at, created_at, updated_at)
             VALUES (?1, 'pending', ?2, ?3, ?4, ?5, ?6, ?7, '[]', ?8, ?8, ?8)",
            params![
                new.document_id,
                new.raw_html,
                new.raw_text,
                new.title,
                new.author,
                to_json(&new.document_metadata)?,
                new.auto_process as i64,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_worklist_item(id)
    }

    pub fn get_worklist_item(&self, id: i64) -> Result<WorklistItem> {
        self.read_item(
            &format!("SELECT {ITEM_COLUMNS} FROM worklist_items WHERE id = ?1"),
            &[&id],
        )?
        .ok_or_else(|| PressError::NotFound(format!("worklist item {id}")))
    }

    pub fn find_by_document_id(&self, document_id: &str) -> Result<Option<WorklistItem>> {
        self.read_item(
            &format!("SELECT {ITEM_COLUMNS} FROM worklist_items WHERE document_id = ?1"),
            &[&document_id],
        )
    }

    /// List items, optionally filtered by status, most recently updated first
    pub fn list_worklist_items(
        &self,
        status: Option<WorklistStatus>,
        include_archived: bool,
    ) -> Result<Vec<WorklistItem>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM worklist_items
             WHERE (?1 IS NULL OR status = ?1) AND (archived = 0 OR ?2)
             ORDER BY updated_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let status_str = status.map(|s| s.as_str().to_string());
        let mut rows = stmt.query(params![status_str, include_archived as i64])?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let core = map_item(row)?;
            let synced_at: String = row.get("synced_at")?;
            let created_at: String = row.get("created_at")?;
            let updated_at: String = row.get("updated_at")?;
            items.push(finish_item(core, synced_at, created_at, updated_at)?);
        }
        Ok(items)
    }

    /// Guarded status transition: compare-and-set from the expected lane.
    /// Off-graph edges are rejected before touching the database; a lost
    /// race (the row is no longer in `from`) surfaces as `StaleState`.
    pub fn transition_status(
        &self,
        id: i64,
        from: WorklistStatus,
        to: WorklistStatus,
    ) -> Result<()> {
        if !from.can_transition_to(to) {
            return Err(PressError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE worklist_items SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND status = ?4",
            params![
                to.as_str(),
                Utc::now().to_rfc3339(),
                id,
                from.as_str()
            ],
        )?;
        if changed == 0 {
            return Err(PressError::StaleState(format!(
                "worklist item {id} is no longer in {from}"
            )));
        }
        Ok(())
    }

    /// Operator reset out of `failed`. Requires a note; the note is
    /// recorded as an override since the edge is off-graph.
    pub fn reset_from_failed(
        &self,
        id: i64,
        to: WorklistStatus,
        operator: &str,
        note_text: &str,
    ) -> Result<()> {
        if !to.resettable_from_failed() {
            return Err(PressError::InvalidTransition {
                from: WorklistStatus::Failed.to_string(),
                to: to.to_string(),
            });
        }
        if note_text.trim().is_empty() {
            return Err(PressError::Config(
                "a note is required to reset a failed item".to_string(),
            ));
        }
        if self.get_worklist_item(id)?.status != WorklistStatus::Failed {
            return Err(PressError::StaleState(format!(
                "worklist item {id} is not in failed"
            )));
        }

        self.append_note(id, &Note::override_note(operator, note_text))?;

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE worklist_items
             SET status = ?1, error_message = NULL, updated_at = ?2
             WHERE id = ?3 AND status = 'failed'",
            params![to.as_str(), Utc::now().to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(PressError::StaleState(format!(
                "worklist item {id} is not in failed"
            )));
        }
        Ok(())
    }

    /// Link the article created by a successful parse
    pub fn set_article_id(&self, id: i64, article_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE worklist_items SET article_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![article_id, Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    /// Append to the item's append-only notes list
    pub fn append_note(&self, id: i64, note: &Note) -> Result<()> {
        let mut item = self.get_worklist_item(id)?;
        item.notes.push(note.clone());
        let conn = self.conn()?;
        conn.execute(
            "UPDATE worklist_items SET notes = ?1, updated_at = ?2 WHERE id = ?3",
            params![to_json(&item.notes)?, Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    /// Store the operator-visible failure message
    pub fn set_error_message(&self, id: i64, message: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE worklist_items SET error_message = ?1, updated_at = ?2 WHERE id = ?3",
            params![message, Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    /// Refresh the content snapshot after an upstream change
    pub fn update_sync_snapshot(
        &self,
        id: i64,
        raw_html: &str,
        raw_text: &str,
        metadata: &DocumentMetadata,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE worklist_items
             SET raw_html = ?1, raw_text = ?2, document_metadata = ?3,
                 synced_at = ?4, updated_at = ?4
             WHERE id = ?5",
            params![
                raw_html,
                raw_text,
                to_json(metadata)?,
                Utc::now().to_rfc3339(),
                id
            ],
        )?;
        Ok(())
    }

    /// Soft-archive; items are never deleted
    pub fn archive_worklist_item(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE worklist_items SET archived = 1, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

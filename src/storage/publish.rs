//! Publish Task Persistence
//!
//! Tasks are append-only: one row per publication attempt series, kept
//! for audit. The task row is durably created before the first CMS
//! interaction; progress updates are monotonic and the terminal
//! transition is single-writer.

use chrono::Utc;
use rusqlite::{Row, params};

use super::database::{Database, from_json, parse_ts_opt, to_json};
use crate::types::{
    PressError, PublishProviderKind, PublishStatus, PublishTask, Result, Screenshot,
};

fn map_task(row: &Row<'_>) -> Result<PublishTask> {
    let provider: String = row.get("provider")?;
    let status: String = row.get("status")?;
    let screenshots: String = row.get("screenshots")?;
    let started_at: Option<String> = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    Ok(PublishTask {
        id: row.get("id")?,
        article_id: row.get("article_id")?,
        provider: provider
            .parse::<PublishProviderKind>()
            .map_err(PressError::Storage)?,
        status: status.parse::<PublishStatus>().map_err(PressError::Storage)?,
        progress: row.get::<_, i64>("progress")? as u8,
        current_step: row.get("current_step")?,
        started_at: parse_ts_opt(started_at)?,
        completed_at: parse_ts_opt(completed_at)?,
        duration_seconds: row.get("duration_seconds")?,
        cost_usd: row.get("cost_usd")?,
        retry_count: row.get("retry_count")?,
        max_retries: row.get("max_retries")?,
        screenshots: from_json(&screenshots, "publish_tasks.screenshots")?,
        error_message: row.get("error_message")?,
        cms_article_id: row.get("cms_article_id")?,
        published_url: row.get("published_url")?,
    })
}

const TASK_COLUMNS: &str = "id, article_id, provider, status, progress, current_step, \
     started_at, completed_at, duration_seconds, cost_usd, retry_count, max_retries, \
     screenshots, error_message, cms_article_id, published_url";

impl Database {
    /// Durably create the task before any CMS interaction
    pub fn create_publish_task(
        &self,
        article_id: i64,
        provider: PublishProviderKind,
        max_retries: u32,
    ) -> Result<PublishTask> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO publish_tasks
                 (article_id, provider, status, started_at, max_retries)
             VALUES (?1, ?2, 'pending', ?3, ?4)",
            params![
                article_id,
                provider.as_str(),
                Utc::now().to_rfc3339(),
                max_retries
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_publish_task(id)
    }

    pub fn get_publish_task(&self, id: i64) -> Result<PublishTask> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM publish_tasks WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => map_task(row),
            None => Err(PressError::NotFound(format!("publish task {id}"))),
        }
    }

    /// All tasks for an article, oldest first
    pub fn list_publish_tasks(&self, article_id: i64) -> Result<Vec<PublishTask>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM publish_tasks WHERE article_id = ?1 ORDER BY id"
        ))?;
        let mut rows = stmt.query(params![article_id])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(map_task(row)?);
        }
        Ok(tasks)
    }

    /// Persist a step advance. Progress never decreases; a regressing
    /// update is clamped to the stored value.
    pub fn update_publish_progress(
        &self,
        task_id: i64,
        status: PublishStatus,
        progress: u8,
        current_step: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE publish_tasks
             SET status = ?1, progress = MAX(progress, ?2), current_step = ?3
             WHERE id = ?4 AND status NOT IN ('completed', 'failed', 'cancelled')",
            params![status.as_str(), progress.min(100) as i64, current_step, task_id],
        )?;
        if changed == 0 {
            return Err(PressError::StaleState(format!(
                "publish task {task_id} is terminal"
            )));
        }
        Ok(())
    }

    /// Append a screenshot reference
    pub fn append_screenshot(&self, task_id: i64, screenshot: &Screenshot) -> Result<()> {
        let task = self.get_publish_task(task_id)?;
        let mut screenshots = task.screenshots;
        screenshots.push(screenshot.clone());
        let conn = self.conn()?;
        conn.execute(
            "UPDATE publish_tasks SET screenshots = ?1 WHERE id = ?2",
            params![to_json(&screenshots)?, task_id],
        )?;
        Ok(())
    }

    /// Accumulate provider cost across attempts
    pub fn add_publish_cost(&self, task_id: i64, cost_usd: f64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE publish_tasks SET cost_usd = cost_usd + ?1 WHERE id = ?2",
            params![cost_usd, task_id],
        )?;
        Ok(())
    }

    /// Terminal success: single writer, sets completion audit fields
    pub fn complete_publish_task(
        &self,
        task_id: i64,
        cms_article_id: &str,
        published_url: &str,
    ) -> Result<PublishTask> {
        let task = self.get_publish_task(task_id)?;
        let now = Utc::now();
        let duration = task
            .started_at
            .map(|started| (now - started).num_seconds())
            .unwrap_or(0);

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE publish_tasks
             SET status = 'completed', progress = 100, completed_at = ?1,
                 duration_seconds = ?2, cms_article_id = ?3, published_url = ?4
             WHERE id = ?5 AND status NOT IN ('completed', 'failed', 'cancelled')",
            params![
                now.to_rfc3339(),
                duration,
                cms_article_id,
                published_url,
                task_id
            ],
        )?;
        if changed == 0 {
            return Err(PressError::StaleState(format!(
                "publish task {task_id} is already terminal"
            )));
        }
        drop(conn);
        self.get_publish_task(task_id)
    }

    /// Terminal failure (or cancellation). No compensating delete is ever
    /// attempted against the CMS.
    pub fn fail_publish_task(
        &self,
        task_id: i64,
        status: PublishStatus,
        error_message: &str,
    ) -> Result<PublishTask> {
        if !matches!(status, PublishStatus::Failed | PublishStatus::Cancelled) {
            return Err(PressError::Config(format!(
                "fail_publish_task requires a terminal failure status, got {}",
                status.as_str()
            )));
        }
        let task = self.get_publish_task(task_id)?;
        let now = Utc::now();
        let duration = task
            .started_at
            .map(|started| (now - started).num_seconds())
            .unwrap_or(0);

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE publish_tasks
             SET status = ?1, completed_at = ?2, duration_seconds = ?3, error_message = ?4
             WHERE id = ?5 AND status NOT IN ('completed', 'failed', 'cancelled')",
            params![status.as_str(), now.to_rfc3339(), duration, error_message, task_id],
        )?;
        if changed == 0 {
            return Err(PressError::StaleState(format!(
                "publish task {task_id} is already terminal"
            )));
        }
        drop(conn);
        self.get_publish_task(task_id)
    }

    /// Bump the retry counter; rejected at the bound or on terminal tasks
    pub fn increment_publish_retry(&self, task_id: i64) -> Result<PublishTask> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE publish_tasks SET retry_count = retry_count + 1
             WHERE id = ?1 AND retry_count < max_retries
               AND status NOT IN ('completed', 'failed', 'cancelled')",
            params![task_id],
        )?;
        if changed == 0 {
            return Err(PressError::Config(format!(
                "publish task {task_id} cannot be retried"
            )));
        }
        drop(conn);
        self.get_publish_task(task_id)
    }
}

// =============================================================================
// Tests
// =============================================================================

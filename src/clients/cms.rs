//! CMS Driver Contracts
//!
//! Two seams onto the target CMS: a selector-driven browser session for the
//! scripted provider, and a goal-driven computer-use client for the agent
//! provider. Both also expose the draft search used by the at-most-once
//! adoption check. Transport implementations live with the deployment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Result;

// =============================================================================
// Draft search (adoption check)
// =============================================================================

/// A draft found in the CMS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsDraft {
    pub cms_article_id: String,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Search surface shared by all providers, used to detect a draft created
/// by a prior crashed or timed-out attempt
#[async_trait]
pub trait CmsDraftSearch: Send + Sync {
    /// Find drafts whose title matches exactly, newest first
    async fn find_drafts_by_title(&self, title: &str) -> Result<Vec<CmsDraft>>;
}

// =============================================================================
// Browser session (scripted provider)
// =============================================================================

/// One selector-driven browser session against the CMS admin UI.
/// Implementations drive a real headless browser; the fake used in tests
/// records the scripted sequence instead.
#[async_trait]
pub trait CmsBrowser: CmsDraftSearch {
    /// Navigate to an absolute URL
    async fn goto(&self, url: &str) -> Result<()>;

    /// Type into the element at `selector`, replacing its content
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Click the element at `selector`
    async fn click(&self, selector: &str) -> Result<()>;

    /// Wait until `selector` is present; error on timeout
    async fn wait_for(&self, selector: &str) -> Result<()>;

    /// Whether `selector` currently resolves
    async fn exists(&self, selector: &str) -> Result<bool>;

    /// Upload a local file through the input at `selector`
    async fn upload(&self, selector: &str, path: &str) -> Result<()>;

    /// Capture the current viewport as PNG bytes. Callers must mask or
    /// skip capture while credential fields are on screen.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// The URL of the current page
    async fn current_url(&self) -> Result<String>;
}

// =============================================================================
// Computer-use client (agent provider)
// =============================================================================

/// Outcome reported by the computer-use agent after pursuing a goal
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub success: bool,
    pub cms_article_id: Option<String>,
    pub draft_url: Option<String>,
    pub cost_usd: f64,
    /// PNG screenshots captured along the way, in order
    pub screenshots: Vec<Vec<u8>>,
    pub error: Option<String>,
}

/// Goal-driven computer-use model client. The implementation owns the
/// observe/act loop; the core supplies the goal text and receives the
/// outcome with cost attribution.
#[async_trait]
pub trait ComputerUseClient: CmsDraftSearch {
    /// Pursue a natural-language goal against the CMS, e.g. "create a new
    /// post with this title and body; save as draft; report the URL"
    async fn run_goal(&self, goal: &str) -> Result<AgentOutcome>;
}

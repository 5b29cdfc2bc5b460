//! Publishing Types
//!
//! One PublishTask per publication attempt against the CMS. Tasks are
//! append-only and kept for audit; a terminal task always carries its
//! completion timestamp. Progress percent is monotonic within a task and
//! screenshot timestamps strictly increase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Providers
// =============================================================================

/// Which provider drives the CMS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishProviderKind {
    /// Scripted headless-browser sequence; deterministic, cost ~$0
    Playwright,
    /// Computer-use model observing screenshots; tolerates UI drift
    ComputerUse,
    /// Browser first, agent fallback within the same attempt
    Hybrid,
}

impl PublishProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playwright => "playwright",
            Self::ComputerUse => "computer_use",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for PublishProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PublishProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "playwright" => Ok(Self::Playwright),
            "computer_use" => Ok(Self::ComputerUse),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown publish provider: {other}")),
        }
    }
}

// =============================================================================
// Task Status and Steps
// =============================================================================

/// PublishTask lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Idle,
    Pending,
    Initializing,
    LoggingIn,
    CreatingPost,
    UploadingImages,
    ConfiguringSeo,
    Publishing,
    Completed,
    Failed,
    Cancelled,
}

impl PublishStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Initializing => "initializing",
            Self::LoggingIn => "logging_in",
            Self::CreatingPost => "creating_post",
            Self::UploadingImages => "uploading_images",
            Self::ConfiguringSeo => "configuring_seo",
            Self::Publishing => "publishing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for PublishStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "pending" => Ok(Self::Pending),
            "initializing" => Ok(Self::Initializing),
            "logging_in" => Ok(Self::LoggingIn),
            "creating_post" => Ok(Self::CreatingPost),
            "uploading_images" => Ok(Self::UploadingImages),
            "configuring_seo" => Ok(Self::ConfiguringSeo),
            "publishing" => Ok(Self::Publishing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown publish status: {other}")),
        }
    }
}

/// The scripted publish sequence, in execution order. Used by the browser
/// provider and as the resume point for the hybrid fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStep {
    Login,
    CreatePost,
    PasteBody,
    AttachImages,
    SetSeoFields,
    SaveDraft,
}

impl PublishStep {
    pub const ALL: [PublishStep; 6] = [
        Self::Login,
        Self::CreatePost,
        Self::PasteBody,
        Self::AttachImages,
        Self::SetSeoFields,
        Self::SaveDraft,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::CreatePost => "create_post",
            Self::PasteBody => "paste_body",
            Self::AttachImages => "attach_images",
            Self::SetSeoFields => "set_seo_fields",
            Self::SaveDraft => "save_draft",
        }
    }

    /// Progress percent reported when this step completes
    pub fn percent(&self) -> u8 {
        match self {
            Self::Login => 20,
            Self::CreatePost => 35,
            Self::PasteBody => 55,
            Self::AttachImages => 70,
            Self::SetSeoFields => 85,
            Self::SaveDraft => 100,
        }
    }

    /// The task status shown while this step runs
    pub fn status(&self) -> PublishStatus {
        match self {
            Self::Login => PublishStatus::LoggingIn,
            Self::CreatePost => PublishStatus::CreatingPost,
            Self::PasteBody => PublishStatus::CreatingPost,
            Self::AttachImages => PublishStatus::UploadingImages,
            Self::SetSeoFields => PublishStatus::ConfiguringSeo,
            Self::SaveDraft => PublishStatus::Publishing,
        }
    }
}

impl std::fmt::Display for PublishStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Screenshots
// =============================================================================

/// One captured screenshot reference. The image itself lives in the
/// screenshot store; only the reference is persisted and logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screenshot {
    pub step: String,
    pub timestamp: DateTime<Utc>,
    /// Access-controlled reference into the screenshot store
    pub image_ref: String,
    /// Which provider captured it (browser vs agent, for hybrid audits)
    pub provider: PublishProviderKind,
}

// =============================================================================
// Publish Task
// =============================================================================

/// One publication attempt record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishTask {
    pub id: i64,
    pub article_id: i64,
    pub provider: PublishProviderKind,
    pub status: PublishStatus,
    /// 0-100, never decreases within a task
    pub progress: u8,
    pub current_step: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall clock across attempts
    pub duration_seconds: Option<i64>,
    /// Accumulates across attempts
    pub cost_usd: f64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub screenshots: Vec<Screenshot>,
    pub error_message: Option<String>,
    pub cms_article_id: Option<String>,
    pub published_url: Option<String>,
}

impl PublishTask {
    /// Terminal tasks must carry their completion timestamp
    pub fn terminal_ok(&self) -> bool {
        !self.status.is_terminal() || self.completed_at.is_some()
    }

    /// Only non-terminal tasks below the retry bound may be retried
    pub fn can_retry(&self) -> bool {
        !self.status.is_terminal() && self.retry_count < self.max_retries
    }

    /// Screenshot timestamps must strictly increase
    pub fn screenshots_monotonic(&self) -> bool {
        self.screenshots
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp)
    }
}

// =============================================================================
// Publish Outcome (provider contract)
// =============================================================================

/// Result of one provider invocation
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub success: bool,
    pub cms_article_id: Option<String>,
    pub published_url: Option<String>,
    pub duration: std::time::Duration,
    pub cost_usd: f64,
    pub screenshots: Vec<Screenshot>,
    pub error: Option<String>,
    /// Step the provider failed at, for hybrid resume
    pub failed_step: Option<PublishStep>,
}

impl PublishOutcome {
    pub fn failure(
        step: PublishStep,
        error: impl Into<String>,
        duration: std::time::Duration,
        cost_usd: f64,
        screenshots: Vec<Screenshot>,
    ) -> Self {
        Self {
            success: false,
            cms_article_id: None,
            published_url: None,
            duration,
            cost_usd,
            screenshots,
            error: Some(error.into()),
            failed_step: Some(step),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: PublishStatus) -> PublishTask {
        PublishTask {
            id: 1,
            article_id: 1,
            provider: PublishProviderKind::Playwright,
            status,
            progress: 0,
            current_step: None,
            started_at: Some(Utc::now()),
            completed_at: None,
            duration_seconds: None,
            cost_usd: 0.0,
            retry_count: 0,
            max_retries: 3,
            screenshots: Vec::new(),
            error_message: None,
            cms_article_id: None,
            published_url: None,
        }
    }

    #[test]
    fn test_terminal_requires_completed_at() {
        let mut t = task(PublishStatus::Completed);
        assert!(!t.terminal_ok());
        t.completed_at = Some(Utc::now());
        assert!(t.terminal_ok());
    }

    #[test]
    fn test_retry_bounds() {
        let mut t = task(PublishStatus::Pending);
        assert!(t.can_retry());
        t.retry_count = 3;
        assert!(!t.can_retry());

        let mut done = task(PublishStatus::Completed);
        done.completed_at = Some(Utc::now());
        assert!(!done.can_retry());
    }

    #[test]
    fn test_step_percent_monotonic() {
        let percents: Vec<u8> = PublishStep::ALL.iter().map(|s| s.percent()).collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*percents.last().unwrap(), 100);
    }

    #[test]
    fn test_screenshot_monotonicity_check() {
        let mut t = task(PublishStatus::Publishing);
        let base = Utc::now();
        t.screenshots = vec![
            Screenshot {
                step: "login".into(),
                timestamp: base,
                image_ref: "shots/1.png".into(),
                provider: PublishProviderKind::Playwright,
            },
            Screenshot {
                step: "create_post".into(),
                timestamp: base + chrono::Duration::seconds(2),
                image_ref: "shots/2.png".into(),
                provider: PublishProviderKind::Playwright,
            },
        ];
        assert!(t.screenshots_monotonic());

        t.screenshots[1].timestamp = base;
        assert!(!t.screenshots_monotonic());
    }

    #[test]
    fn test_provider_round_trip() {
        for p in [
            PublishProviderKind::Playwright,
            PublishProviderKind::ComputerUse,
            PublishProviderKind::Hybrid,
        ] {
            let parsed: PublishProviderKind = p.as_str().parse().unwrap();
            assert_eq!(parsed, p);
        }
    }
}

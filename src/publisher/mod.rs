//! Publishing Orchestrator
//!
//! Provider abstraction over the target CMS (browser-automation,
//! computer-use agent, hybrid) plus the task-driving orchestration:
//! durable task creation before any CMS interaction, bounded retries with
//! prior-draft adoption, progress/screenshot persistence, and cost
//! attribution.
//!
//! ## Modules
//!
//! - `browser`: scripted selector-driven provider (cost ~$0)
//! - `agent`: goal-driven computer-use provider
//! - `hybrid`: browser first, agent fallback within the same attempt
//! - `screenshots`: write-once screenshot storage backends

pub mod agent;
pub mod browser;
pub mod hybrid;
pub mod screenshots;

pub use agent::ComputerUseProvider;
pub use browser::{BrowserProvider, SelectorMap};
pub use hybrid::HybridProvider;
pub use screenshots::{
    LocalFsStore, ObjectStore, ScreenshotStore, SharedScreenshotStore, create_store,
    sweep_expired,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use tracing::{info, warn};

use crate::ai::with_timeout;
use crate::clients::CmsDraftSearch;
use crate::constants::publish as publish_constants;
use crate::storage::SharedDatabase;
use crate::types::{
    Article, ArticleImage, PressError, PublishOutcome, PublishProviderKind, PublishStatus,
    PublishStep, PublishTask, Result, Screenshot,
};

// =============================================================================
// Provider Contract
// =============================================================================

/// CMS credentials handed to a provider for one attempt. Values are
/// secrets; they never reach logs or screenshots.
#[derive(Clone)]
pub struct CmsCredentials {
    pub admin_url: String,
    pub username: SecretString,
    pub password: SecretString,
}

/// Per-attempt options
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// First step to execute; later steps for hybrid resume
    pub start_step: PublishStep,
    pub step_timeout: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            start_step: PublishStep::Login,
            step_timeout: Duration::from_secs(crate::constants::timeout::BROWSER_STEP_SECS),
        }
    }
}

/// Everything a provider needs for one attempt
pub struct PublishRequest {
    pub task_id: i64,
    pub article: Article,
    pub images: Vec<ArticleImage>,
    pub options: PublishOptions,
}

/// Receives step advances as the provider works
pub trait ProgressSink: Send + Sync {
    fn on_step(&self, status: PublishStatus, step: &str, percent: u8, screenshot: Option<Screenshot>);
}

/// Sink that drops everything; used by tests and dry runs
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_step(&self, _: PublishStatus, _: &str, _: u8, _: Option<Screenshot>) {}
}

/// One publishing strategy against the CMS
#[async_trait::async_trait]
pub trait PublishProvider: Send + Sync {
    async fn publish(
        &self,
        request: &PublishRequest,
        credentials: &CmsCredentials,
        progress: &dyn ProgressSink,
    ) -> Result<PublishOutcome>;

    fn kind(&self) -> PublishProviderKind;

    /// The draft-search surface used for the adoption check
    fn draft_search(&self) -> Arc<dyn CmsDraftSearch>;
}

// =============================================================================
// Progress persistence
// =============================================================================

/// Sink that persists every step advance on the task row
pub struct DbProgressSink {
    db: SharedDatabase,
    task_id: i64,
}

impl DbProgressSink {
    pub fn new(db: SharedDatabase, task_id: i64) -> Self {
        Self { db, task_id }
    }
}

impl ProgressSink for DbProgressSink {
    fn on_step(
        &self,
        status: PublishStatus,
        step: &str,
        percent: u8,
        screenshot: Option<Screenshot>,
    ) {
        if let Err(err) = self
            .db
            .update_publish_progress(self.task_id, status, percent, step)
        {
            warn!(task_id = self.task_id, error = %err, "progress update failed");
        }
        if let Some(shot) = screenshot
            && let Err(err) = self.db.append_screenshot(self.task_id, &shot)
        {
            warn!(task_id = self.task_id, error = %err, "screenshot append failed");
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives publish tasks end to end with at-most-once CMS insertion
pub struct PublishOrchestrator {
    db: SharedDatabase,
    providers: HashMap<PublishProviderKind, Arc<dyn PublishProvider>>,
    default_provider: PublishProviderKind,
    max_retries: u32,
    total_timeout: Duration,
}

impl PublishOrchestrator {
    pub fn new(
        db: SharedDatabase,
        providers: HashMap<PublishProviderKind, Arc<dyn PublishProvider>>,
        default_provider: PublishProviderKind,
        max_retries: u32,
        total_timeout: Duration,
    ) -> Self {
        Self {
            db,
            providers,
            default_provider,
            max_retries,
            total_timeout,
        }
    }

    fn provider(&self, kind: PublishProviderKind) -> Result<&Arc<dyn PublishProvider>> {
        self.providers.get(&kind).ok_or_else(|| {
            PressError::Config(format!("publish provider {kind} is not configured"))
        })
    }

    /// Create the durable task row. Must happen before the first CMS
    /// interaction; the id is carried through the whole flow.
    pub fn create_task(
        &self,
        article_id: i64,
        provider: Option<PublishProviderKind>,
    ) -> Result<PublishTask> {
        let kind = provider.unwrap_or(self.default_provider);
        self.provider(kind)?; // reject unconfigured providers up front
        self.db.create_publish_task(article_id, kind, self.max_retries)
    }

    /// Run one attempt of a pending task
    pub async fn execute_task(
        &self,
        task: &PublishTask,
        article: &Article,
        images: Vec<ArticleImage>,
        credentials: CmsCredentials,
    ) -> Result<PublishTask> {
        let provider = self.provider(task.provider)?.clone();
        let sink = DbProgressSink::new(self.db.clone(), task.id);
        let request = PublishRequest {
            task_id: task.id,
            article: article.clone(),
            images,
            options: PublishOptions::default(),
        };

        let outcome = with_timeout(
            self.total_timeout,
            provider.publish(&request, &credentials, &sink),
            "publish attempt",
        )
        .await;

        match outcome {
            Ok(outcome) => {
                self.db.add_publish_cost(task.id, outcome.cost_usd)?;
                if outcome.success {
                    let cms_article_id = outcome.cms_article_id.clone().ok_or_else(|| {
                        PressError::invariant("successful publish without cms_article_id")
                    })?;
                    let published_url = outcome.published_url.clone().unwrap_or_default();
                    let done =
                        self.db
                            .complete_publish_task(task.id, &cms_article_id, &published_url)?;
                    self.db
                        .record_publication(article.id, &cms_article_id, &published_url)?;
                    info!(
                        task_id = task.id,
                        article_id = article.id,
                        cms_article_id = %cms_article_id,
                        cost_usd = done.cost_usd,
                        "publish completed"
                    );
                    Ok(done)
                } else {
                    Err(PressError::PublishFailed {
                        step: outcome
                            .failed_step
                            .map(|s| s.as_str().to_string())
                            .unwrap_or_else(|| "unknown".to_string()),
                        message: outcome.error.unwrap_or_else(|| "provider failed".to_string()),
                    })
                }
            }
            Err(err) => {
                // Timeouts and transport errors: the attempt is over, the
                // task row stays non-terminal so a retry can adopt
                Err(err)
            }
        }
    }

    /// Retry a non-terminal task. Before driving the CMS again the prior
    /// attempt's draft is searched for and adopted if present, keeping
    /// the at-most-once guarantee.
    pub async fn retry_task(
        &self,
        task_id: i64,
        article: &Article,
        images: Vec<ArticleImage>,
        credentials: CmsCredentials,
    ) -> Result<PublishTask> {
        let task = self.db.increment_publish_retry(task_id)?;

        let provider = self.provider(task.provider)?.clone();
        if let Some(draft) = self
            .find_adoptable_draft(&task, article, provider.draft_search().as_ref())
            .await?
        {
            info!(
                task_id,
                cms_article_id = %draft.cms_article_id,
                "prior attempt's draft adopted"
            );
            let done = self
                .db
                .complete_publish_task(task_id, &draft.cms_article_id, &draft.url)?;
            self.db
                .record_publication(article.id, &draft.cms_article_id, &draft.url)?;
            return Ok(done);
        }

        self.execute_task(&task, article, images, credentials).await
    }

    /// A draft counts as ours when the title matches exactly and it was
    /// created within the adoption window of the task start
    async fn find_adoptable_draft(
        &self,
        task: &PublishTask,
        article: &Article,
        search: &dyn CmsDraftSearch,
    ) -> Result<Option<crate::clients::CmsDraft>> {
        let Some(started_at) = task.started_at else {
            return Ok(None);
        };
        let title = article.title.display();
        let drafts = search.find_drafts_by_title(&title).await?;
        Ok(drafts.into_iter().find(|draft| {
            (draft.created_at - started_at)
                .num_seconds()
                .abs()
                <= publish_constants::ADOPTION_WINDOW_SECS
        }))
    }

    /// Terminal failure bookkeeping; no compensating delete is attempted
    pub fn mark_failed(&self, task_id: i64, error: &PressError) -> Result<PublishTask> {
        self.db
            .fail_publish_task(task_id, PublishStatus::Failed, &error.operator_message())
    }

    /// Cooperative cancellation: abort further work, keep CMS side effects
    pub fn mark_cancelled(&self, task_id: i64) -> Result<PublishTask> {
        self.db.fail_publish_task(
            task_id,
            PublishStatus::Cancelled,
            "cancelled by operator",
        )
    }
}

/// Screenshot helper shared by the providers
pub(crate) async fn capture(
    store: &dyn ScreenshotStore,
    task_id: i64,
    step: PublishStep,
    provider: PublishProviderKind,
    png_bytes: &[u8],
) -> Result<Screenshot> {
    let image_ref = store.store(task_id, step.as_str(), png_bytes).await?;
    Ok(Screenshot {
        step: step.as_str().to_string(),
        timestamp: Utc::now(),
        image_ref,
        provider,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::CmsDraft;
    use crate::storage::Database;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    pub(crate) fn test_article(db: &Database) -> Article {
        use crate::parser::ParsedArticle;
        use crate::types::{ParsingMethod, TitleParts};
        let parsed = ParsedArticle {
            title: TitleParts::main_only("HOWTO: configure X"),
            author_line: None,
            author_name: None,
            body_html: "<p>body content for publication</p>".into(),
            body_text: "body content for publication".into(),
            offsets: Default::default(),
            meta_description: Some("summary".into()),
            seo_keywords: vec!["x".into()],
            tags: vec!["ops".into()],
            images: vec![],
        };
        db.create_article(1, &parsed, ParsingMethod::Ai, 0.95).unwrap()
    }

    pub(crate) fn credentials() -> CmsCredentials {
        CmsCredentials {
            admin_url: "https://cms.example.com/wp-admin".into(),
            username: SecretString::from("editor"),
            password: SecretString::from("s3cret"),
        }
    }

    /// Provider scripted to fail N times then succeed; search returns a
    /// canned prior draft when primed
    struct ScriptedProvider {
        failures_left: AtomicU32,
        cost_per_attempt: f64,
        search: Arc<ScriptedSearch>,
    }

    struct ScriptedSearch {
        drafts: std::sync::Mutex<Vec<CmsDraft>>,
    }

    #[async_trait]
    impl CmsDraftSearch for ScriptedSearch {
        async fn find_drafts_by_title(&self, title: &str) -> Result<Vec<CmsDraft>> {
            Ok(self
                .drafts
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.title == title)
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl PublishProvider for ScriptedProvider {
        async fn publish(
            &self,
            request: &PublishRequest,
            _credentials: &CmsCredentials,
            progress: &dyn ProgressSink,
        ) -> Result<PublishOutcome> {
            progress.on_step(PublishStatus::LoggingIn, "login", 20, None);
            if self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            }).is_ok()
            {
                return Ok(PublishOutcome::failure(
                    PublishStep::SaveDraft,
                    "saved indicator not present",
                    Duration::from_secs(3),
                    self.cost_per_attempt,
                    vec![],
                ));
            }
            progress.on_step(PublishStatus::Publishing, "save_draft", 100, None);
            Ok(PublishOutcome {
                success: true,
                cms_article_id: Some("12345".into()),
                published_url: Some("https://cms.example.com/draft/12345".into()),
                duration: Duration::from_secs(48),
                cost_usd: self.cost_per_attempt,
                screenshots: vec![],
                error: None,
                failed_step: None,
            })
        }

        fn kind(&self) -> PublishProviderKind {
            PublishProviderKind::Playwright
        }

        fn draft_search(&self) -> Arc<dyn CmsDraftSearch> {
            self.search.clone()
        }
    }

    fn orchestrator(
        db: SharedDatabase,
        failures: u32,
    ) -> (PublishOrchestrator, Arc<ScriptedSearch>) {
        let search = Arc::new(ScriptedSearch {
            drafts: std::sync::Mutex::new(vec![]),
        });
        let provider = Arc::new(ScriptedProvider {
            failures_left: AtomicU32::new(failures),
            cost_per_attempt: 0.0,
            search: search.clone(),
        });
        let mut providers: HashMap<PublishProviderKind, Arc<dyn PublishProvider>> = HashMap::new();
        providers.insert(PublishProviderKind::Playwright, provider);
        (
            PublishOrchestrator::new(
                db,
                providers,
                PublishProviderKind::Playwright,
                3,
                Duration::from_secs(600),
            ),
            search,
        )
    }

    #[tokio::test]
    async fn test_happy_path_completes_task_and_article() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let article = test_article(&db);
        let (orchestrator, _) = orchestrator(db.clone(), 0);

        let task = orchestrator
            .create_task(article.id, Some(PublishProviderKind::Playwright))
            .unwrap();
        let done = orchestrator
            .execute_task(&task, &article, vec![], credentials())
            .await
            .unwrap();

        assert_eq!(done.status, PublishStatus::Completed);
        assert_eq!(done.cms_article_id.as_deref(), Some("12345"));
        assert_eq!(done.cost_usd, 0.0);
        assert!(done.terminal_ok());

        let published = db.get_article(article.id).unwrap();
        assert_eq!(published.cms_article_id.as_deref(), Some("12345"));
        assert!(published.published_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_attempt_leaves_task_retryable() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let article = test_article(&db);
        let (orchestrator, _) = orchestrator(db.clone(), 5);

        let task = orchestrator.create_task(article.id, None).unwrap();
        let err = orchestrator
            .execute_task(&task, &article, vec![], credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, PressError::PublishFailed { .. }));

        let loaded = db.get_publish_task(task.id).unwrap();
        assert!(!loaded.status.is_terminal());
        assert!(loaded.can_retry());
    }

    #[tokio::test]
    async fn test_retry_adopts_prior_draft() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let article = test_article(&db);
        // Provider would fail forever; adoption must short-circuit it
        let (orchestrator, search) = orchestrator(db.clone(), u32::MAX);

        let task = orchestrator.create_task(article.id, None).unwrap();
        let _ = orchestrator
            .execute_task(&task, &article, vec![], credentials())
            .await
            .unwrap_err();

        // The crashed attempt actually created the draft
        search.drafts.lock().unwrap().push(CmsDraft {
            cms_article_id: "777".into(),
            title: article.title.display(),
            url: "https://cms.example.com/draft/777".into(),
            created_at: Utc::now(),
        });

        let done = orchestrator
            .retry_task(task.id, &article, vec![], credentials())
            .await
            .unwrap();
        assert_eq!(done.status, PublishStatus::Completed);
        assert_eq!(done.cms_article_id.as_deref(), Some("777"));
        assert_eq!(done.retry_count, 1);
    }

    #[tokio::test]
    async fn test_adoption_ignores_old_drafts() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let article = test_article(&db);
        let (orchestrator, search) = orchestrator(db.clone(), 1);

        let task = orchestrator.create_task(article.id, None).unwrap();
        let _ = orchestrator
            .execute_task(&task, &article, vec![], credentials())
            .await
            .unwrap_err();

        // A draft from yesterday with the same title is not ours
        search.drafts.lock().unwrap().push(CmsDraft {
            cms_article_id: "888".into(),
            title: article.title.display(),
            url: "https://cms.example.com/draft/888".into(),
            created_at: Utc::now() - chrono::Duration::days(1),
        });

        let done = orchestrator
            .retry_task(task.id, &article, vec![], credentials())
            .await
            .unwrap();
        // The retry ran the provider (now succeeding) instead of adopting
        assert_eq!(done.cms_article_id.as_deref(), Some("12345"));
    }

    #[tokio::test]
    async fn test_retry_exhaustion_rejected() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let article = test_article(&db);
        let (orchestrator, _) = orchestrator(db.clone(), u32::MAX);

        let task = orchestrator.create_task(article.id, None).unwrap();
        for _ in 0..3 {
            let _ = orchestrator
                .retry_task(task.id, &article, vec![], credentials())
                .await;
        }
        let err = orchestrator
            .retry_task(task.id, &article, vec![], credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, PressError::Config(_)));
    }

    #[tokio::test]
    async fn test_mark_failed_records_operator_message() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let article = test_article(&db);
        let (orchestrator, _) = orchestrator(db.clone(), u32::MAX);

        let task = orchestrator.create_task(article.id, None).unwrap();
        let failed = orchestrator
            .mark_failed(
                task.id,
                &PressError::PublishFailed {
                    step: "save_draft".into(),
                    message: "saved indicator not present".into(),
                },
            )
            .unwrap();
        assert_eq!(failed.status, PublishStatus::Failed);
        assert!(failed.error_message.is_some());
        assert!(failed.terminal_ok());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_rejected() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let article = test_article(&db);
        let (orchestrator, _) = orchestrator(db.clone(), 0);
        let err = orchestrator
            .create_task(article.id, Some(PublishProviderKind::ComputerUse))
            .unwrap_err();
        assert!(matches!(err, PressError::Config(_)));
    }
}

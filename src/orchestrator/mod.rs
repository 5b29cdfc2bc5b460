//! Worklist Orchestrator
//!
//! The state machine over worklist items. Each transition is an atomic
//! guarded update bracketed by the per-item lock; stage side effects are
//! background jobs drained by bounded worker pools. Operators drive the
//! review gates; the document-store sync feeds the front of the pipe.
//!
//! ## Modules
//!
//! - `jobs`: job queue, worker pools, cooperative cancellation
//! - `sync`: document-store polling

pub mod jobs;
pub mod sync;

pub use jobs::{CancellationToken, ItemLocks, Job, JobQueue, QueueReceivers, Stage};
pub use sync::{DocumentStoreSync, SyncReport};

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use secrecy::ExposeSecret;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::ai::{MetricsCollector, with_timeout};
use crate::clients::DocumentStoreClient;
use crate::config::{AutoProcessPolicy, Config};
use crate::optimizer::OptimizationEngine;
use crate::parser::{DocumentParser, ParseOptions, sanitize_fragment};
use crate::proofread::{self, RuleEngine};
use crate::publisher::{CmsCredentials, PublishOrchestrator};
use crate::storage::SharedDatabase;
use crate::types::{
    DecisionKind, Note, PressError, ProofreadingDecision, PublishProviderKind, Result,
    WorklistItem, WorklistStatus,
};
use crate::vault::CredentialVault;

/// Wall-clock bounds per stage job
const PARSE_STAGE_SECS: u64 = 120;
const PROOFREAD_STAGE_SECS: u64 = 180;

/// Vault keys the publish stage consumes
const VAULT_CMS_ADMIN_URL: &str = "cms_admin_url";
const VAULT_CMS_USERNAME: &str = "cms_username";
const VAULT_CMS_PASSWORD: &str = "cms_password";

// =============================================================================
// Orchestrator
// =============================================================================

pub struct Orchestrator {
    db: SharedDatabase,
    config: Config,
    parser: DocumentParser,
    optimizer: Option<OptimizationEngine>,
    publisher: PublishOrchestrator,
    vault: Arc<CredentialVault>,
    sync: DocumentStoreSync,
    metrics: Arc<MetricsCollector>,
    locks: ItemLocks,
    queue: JobQueue,
    receivers: Mutex<Option<QueueReceivers>>,
    /// Cooperative cancellation tokens by worklist item id
    cancellations: DashMap<i64, CancellationToken>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SharedDatabase,
        config: Config,
        parser: DocumentParser,
        optimizer: Option<OptimizationEngine>,
        publisher: PublishOrchestrator,
        vault: Arc<CredentialVault>,
        store: Arc<dyn DocumentStoreClient>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let (queue, receivers) = JobQueue::new(&config.orchestrator.workers);
        let sync = DocumentStoreSync::new(
            db.clone(),
            store,
            config.orchestrator.sync_folder.clone(),
        );
        Self {
            db,
            config,
            parser,
            optimizer,
            publisher,
            vault,
            sync,
            metrics,
            locks: ItemLocks::new(),
            queue,
            receivers: Mutex::new(Some(receivers)),
            cancellations: DashMap::new(),
        }
    }

    pub fn database(&self) -> &SharedDatabase {
        &self.db
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    // =========================================================================
    // Worker lifecycle
    // =========================================================================

    /// Spawn the stage worker pools. Call once.
    pub async fn start_workers(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let receivers = self
            .receivers
            .lock()
            .await
            .take()
            .expect("start_workers called twice");

        let mut handles = Vec::new();
        let pools = &self.config.orchestrator.workers;
        for _ in 0..pools.parse {
            handles.push(self.clone().spawn_worker(receivers.parse.clone()));
        }
        for _ in 0..pools.proofread {
            handles.push(self.clone().spawn_worker(receivers.proofread.clone()));
        }
        for _ in 0..pools.publish {
            handles.push(self.clone().spawn_worker(receivers.publish.clone()));
        }
        info!(
            parse = pools.parse,
            proofread = pools.proofread,
            publish = pools.publish,
            "worker pools started"
        );
        handles
    }

    fn spawn_worker(
        self: Arc<Self>,
        receiver: jobs::SharedReceiver,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let job = {
                    let mut rx = receiver.lock().await;
                    rx.recv().await
                };
                let Some(job) = job else { break };
                self.run_job(job).await;
            }
        })
    }

    /// The run loop: sync, kick pending items, daily housekeeping.
    /// Returns when `shutdown` is cancelled.
    pub async fn run_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let interval = Duration::from_secs(self.config.orchestrator.sync_interval_seconds);
        let mut last_housekeeping = std::time::Instant::now();

        loop {
            if shutdown.is_cancelled() {
                info!("orchestrator loop shutting down");
                return;
            }

            match self.sync.run_once().await {
                Ok(report) if report.discovered > 0 => {
                    info!(discovered = report.discovered, "new documents synced");
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "sync round failed"),
            }

            self.kick_pending();

            if last_housekeeping.elapsed() >= Duration::from_secs(86_400) {
                last_housekeeping = std::time::Instant::now();
                if let Err(err) = self.run_housekeeping() {
                    warn!(error = %err, "daily housekeeping failed");
                }
            }

            // Jitter the cadence so several instances against one store
            // don't poll in lockstep
            let jitter_ms = rand::rng().random_range(0..=interval.as_millis() as u64 / 10);
            tokio::time::sleep(interval + Duration::from_millis(jitter_ms)).await;
        }
    }

    /// Move pending items into parsing, respecting queue backpressure:
    /// an item that doesn't fit stays pending for the next round.
    pub fn kick_pending(&self) {
        let pending = match self
            .db
            .list_worklist_items(Some(WorklistStatus::Pending), false)
        {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "cannot list pending items");
                return;
            }
        };

        for item in pending {
            if self.queue.dispatch(Job::parse(item.id)).is_err() {
                // Backpressure: the sync loop retries next round
                return;
            }
            if let Err(err) =
                self.db
                    .transition_status(item.id, WorklistStatus::Pending, WorklistStatus::Parsing)
            {
                warn!(item_id = item.id, error = %err, "pending kick lost a race");
            }
        }
    }

    // =========================================================================
    // Job execution
    // =========================================================================

    /// Execute one job under the per-item lock. Failures move the item to
    /// `failed` with an operator-visible message; the technical trace goes
    /// to the structured log with the job's correlation id.
    pub async fn run_job(&self, job: Job) {
        let _guard = self.locks.acquire(job.item_id).await;
        let token = self
            .cancellations
            .entry(job.item_id)
            .or_insert_with(CancellationToken::new)
            .clone();

        let result = match job.stage {
            Stage::Parse => self.run_parse_job(&job, &token).await,
            Stage::Proofread => self.run_proofread_job(&job, &token).await,
            Stage::Publish => self.run_publish_job(&job, &token).await,
        };

        self.cancellations.remove(&job.item_id);

        if let Err(err) = result {
            error!(
                item_id = job.item_id,
                correlation_id = %job.correlation_id,
                stage = ?job.stage,
                error = %err,
                "job failed"
            );
            self.fail_item(job.item_id, &err);
        }
    }

    fn fail_item(&self, item_id: i64, err: &PressError) {
        if let Err(db_err) = self.db.set_error_message(item_id, &err.operator_message()) {
            error!(item_id, error = %db_err, "cannot record error message");
        }
        let Ok(item) = self.db.get_worklist_item(item_id) else {
            return;
        };
        if item.status.is_transient()
            && let Err(db_err) = self
                .db
                .transition_status(item_id, item.status, WorklistStatus::Failed)
        {
            error!(item_id, error = %db_err, "cannot move item to failed");
        }
    }

    async fn run_parse_job(&self, job: &Job, token: &CancellationToken) -> Result<()> {
        let item = self.db.get_worklist_item(job.item_id)?;
        if item.status != WorklistStatus::Parsing {
            warn!(item_id = item.id, status = %item.status, "parse job skipped, lane changed");
            return Ok(());
        }
        token.checkpoint("parse start")?;

        let result = with_timeout(
            Duration::from_secs(PARSE_STAGE_SECS),
            async { Ok(self.parser.parse_document(&item.raw_html, &ParseOptions::default()).await) },
            "parse stage",
        )
        .await?;

        token.checkpoint("parse complete")?;

        if !result.success {
            return Err(PressError::ParseFailed {
                document_id: item.document_id.clone(),
                message: result.errors.join("; "),
            });
        }
        let parsed = result
            .parsed_article
            .ok_or_else(|| PressError::invariant("successful parse without article"))?;
        let metadata = &result.metadata;
        let method = metadata
            .method
            .ok_or_else(|| PressError::invariant("successful parse without method"))?;

        let article = match item.article_id {
            Some(article_id) => {
                self.db
                    .update_article_from_parse(article_id, &parsed, method, metadata.confidence)?
            }
            None => {
                let article =
                    self.db
                        .create_article(item.id, &parsed, method, metadata.confidence)?;
                self.db.set_article_id(item.id, article.id)?;
                article
            }
        };

        for warning in &result.warnings {
            self.db.append_note(item.id, &Note::system(warning))?;
        }

        info!(
            item_id = item.id,
            article_id = article.id,
            method = %method,
            confidence = metadata.confidence,
            duration_ms = metadata.duration_ms,
            "parse complete"
        );

        self.db.transition_status(
            item.id,
            WorklistStatus::Parsing,
            WorklistStatus::ParsingReview,
        )?;

        if self.auto_process(&item) {
            self.db.confirm_parsing(article.id, "auto-process")?;
            self.db.transition_status(
                item.id,
                WorklistStatus::ParsingReview,
                WorklistStatus::Proofreading,
            )?;
            self.queue.dispatch(Job::proofread(item.id))?;
        }
        Ok(())
    }

    async fn run_proofread_job(&self, job: &Job, token: &CancellationToken) -> Result<()> {
        let item = self.db.get_worklist_item(job.item_id)?;
        if item.status != WorklistStatus::Proofreading {
            warn!(item_id = item.id, status = %item.status, "proofread job skipped, lane changed");
            return Ok(());
        }
        let article_id = item
            .article_id
            .ok_or_else(|| PressError::invariant("proofreading an item without an article"))?;
        let article = self.db.get_article(article_id)?;

        token.checkpoint("optimize start")?;

        // Optimization: advisory output. A failure (including the cost
        // cap) is surfaced to the operator but does not fail the item;
        // existing suggestions stay intact.
        if let Some(optimizer) = &self.optimizer {
            // The engine's budget tracks every dollar this call incurs,
            // including aborted over-cap calls; booking the delta keeps
            // the stored total exact even when a cached result is reused.
            let spent_before = optimizer.budget(article_id).spent_usd();
            let result = optimizer.generate_all_optimizations(&article, false).await;
            let incurred = (optimizer.budget(article_id).spent_usd() - spent_before).max(0.0);
            if incurred > 0.0 {
                self.db.add_generation_cost(article_id, incurred)?;
            }
            match result {
                Ok(result) => {
                    self.db.apply_optimizations(article_id, &result)?;
                }
                Err(err) => {
                    warn!(item_id = item.id, error = %err, "optimization failed, continuing");
                    self.db
                        .set_error_message(item.id, &err.operator_message())?;
                    self.db
                        .append_note(item.id, &Note::system(err.operator_message()))?;
                }
            }
        }

        token.checkpoint("analysis start")?;

        let outcome = with_timeout(
            Duration::from_secs(PROOFREAD_STAGE_SECS),
            self.analyze_article(article_id),
            "proofread stage",
        )
        .await?;

        info!(
            item_id = item.id,
            article_id,
            issues = outcome.0,
            carried = outcome.1,
            "proofreading analysis complete"
        );

        self.db.transition_status(
            item.id,
            WorklistStatus::Proofreading,
            WorklistStatus::ProofreadingReview,
        )?;

        if self.auto_process(&item) {
            self.finalize_review_inner(&self.db.get_worklist_item(item.id)?, "auto-process")?;
            self.db.transition_status(
                item.id,
                WorklistStatus::ReadyToPublish,
                WorklistStatus::Publishing,
            )?;
            self.queue.dispatch(Job::publish(item.id, None))?;
        }
        Ok(())
    }

    /// Run the active ruleset over the article and carry decisions
    /// forward. Returns (issue count, carried count).
    async fn analyze_article(&self, article_id: i64) -> Result<(usize, usize)> {
        let article = self.db.get_article(article_id)?;

        let ruleset = match self.config.proofreading.active_ruleset_id {
            Some(id) => {
                let ruleset = self.db.get_ruleset(id)?;
                let rules = self.db.get_ruleset_rules(id)?;
                Some((ruleset, rules))
            }
            None => self.db.active_ruleset()?,
        };

        let Some((ruleset, rules)) = ruleset else {
            warn!(article_id, "no active ruleset, issue set is empty");
            self.db.replace_issue_set(article_id, &[])?;
            return Ok((0, 0));
        };

        let engine = RuleEngine::compile(rules, ruleset.generation);
        let report = engine.analyze(article_id, &article.body_text)?;

        for rule_error in &report.rule_errors {
            self.db.append_history(
                article_id,
                ruleset.generation,
                "rule_runtime_error",
                &serde_json::json!({
                    "rule_code": rule_error.rule_code,
                    "message": rule_error.message,
                }),
            )?;
        }

        let old_issues = self.db.list_issues(article_id, false)?;
        let old_decisions = self.db.list_decisions(article_id, false)?;

        let new_issues = self.db.replace_issue_set(article_id, &report.issues)?;

        let tolerance = self
            .config
            .proofreading
            .carry_offset_tolerance
            .ok_or_else(|| {
                PressError::Config("proofreading.carry_offset_tolerance is required".to_string())
            })?;
        let plan =
            proofread::plan_carry_forward(&old_decisions, &old_issues, &new_issues, tolerance);
        self.db.carry_decisions(&plan.carried)?;
        self.db.archive_decisions(&plan.archived)?;

        Ok((new_issues.len(), plan.carried.len()))
    }

    async fn run_publish_job(&self, job: &Job, token: &CancellationToken) -> Result<()> {
        let item = self.db.get_worklist_item(job.item_id)?;
        if item.status != WorklistStatus::Publishing {
            warn!(item_id = item.id, status = %item.status, "publish job skipped, lane changed");
            return Ok(());
        }
        let article_id = item
            .article_id
            .ok_or_else(|| PressError::invariant("publishing an item without an article"))?;
        let article = self.db.get_article(article_id)?;
        let images = self.db.list_article_images(article_id)?;

        token.checkpoint("publish start")?;

        // Credentials first: a vault failure must not leave an orphan task
        let credentials = self.cms_credentials().await?;
        let task = self.publisher.create_task(article_id, job.provider)?;

        let mut attempt_error: PressError;
        match self
            .publisher
            .execute_task(&task, &article, images.clone(), credentials.clone())
            .await
        {
            Ok(_) => {
                self.db.transition_status(
                    item.id,
                    WorklistStatus::Publishing,
                    WorklistStatus::Published,
                )?;
                return Ok(());
            }
            Err(err) => attempt_error = err,
        }

        // Bounded retries with backoff; each retry first checks the CMS
        // for a draft the failed attempt may have created
        loop {
            if token.is_cancelled() {
                let _ = self.publisher.mark_cancelled(task.id);
                return Err(PressError::Cancelled("publish".to_string()));
            }
            let current = self.db.get_publish_task(task.id)?;
            if !current.can_retry() {
                break;
            }
            tokio::time::sleep(attempt_error.category().recommended_delay()).await;

            match self
                .publisher
                .retry_task(task.id, &article, images.clone(), credentials.clone())
                .await
            {
                Ok(_) => {
                    self.db.transition_status(
                        item.id,
                        WorklistStatus::Publishing,
                        WorklistStatus::Published,
                    )?;
                    return Ok(());
                }
                Err(err) => attempt_error = err,
            }
        }

        let _ = self.publisher.mark_failed(task.id, &attempt_error);
        Err(attempt_error)
    }

    async fn cms_credentials(&self) -> Result<CmsCredentials> {
        let admin_url = self.vault.get(VAULT_CMS_ADMIN_URL).await?;
        let username = self.vault.get(VAULT_CMS_USERNAME).await?;
        let password = self.vault.get(VAULT_CMS_PASSWORD).await?;
        Ok(CmsCredentials {
            admin_url: admin_url.expose_secret().to_string(),
            username,
            password,
        })
    }

    fn auto_process(&self, item: &WorklistItem) -> bool {
        // Never global: the policy only unlocks the per-item flag
        self.config.orchestrator.auto_process == AutoProcessPolicy::PerItemFlagOnly
            && item.auto_process
    }

    // =========================================================================
    // Operator actions
    // =========================================================================

    /// Operator confirms the parse; the item moves on to proofreading
    pub async fn confirm_parsing(&self, item_id: i64, operator: &str) -> Result<()> {
        let _guard = self.locks.acquire(item_id).await;
        let item = self.db.get_worklist_item(item_id)?;
        let article_id = item
            .article_id
            .ok_or_else(|| PressError::invariant("confirming an item without an article"))?;
        self.db.confirm_parsing(article_id, operator)?;
        self.db.transition_status(
            item_id,
            WorklistStatus::ParsingReview,
            WorklistStatus::Proofreading,
        )?;
        self.queue.dispatch(Job::proofread(item_id))?;
        Ok(())
    }

    /// Operator requests a re-parse from parsing_review
    pub async fn request_reparse(&self, item_id: i64) -> Result<()> {
        let _guard = self.locks.acquire(item_id).await;
        self.db.transition_status(
            item_id,
            WorklistStatus::ParsingReview,
            WorklistStatus::Parsing,
        )?;
        self.queue.dispatch(Job::parse(item_id))?;
        Ok(())
    }

    /// Operator submits a decision on an issue
    pub fn submit_decision(
        &self,
        item_id: i64,
        issue_id: i64,
        decision: DecisionKind,
        modified_content: Option<String>,
        notes: Option<String>,
        operator: &str,
        supersede: bool,
    ) -> Result<ProofreadingDecision> {
        let item = self.db.get_worklist_item(item_id)?;
        if item.status != WorklistStatus::ProofreadingReview {
            return Err(PressError::InvalidTransition {
                from: item.status.to_string(),
                to: "decision submission".to_string(),
            });
        }
        let article_id = item
            .article_id
            .ok_or_else(|| PressError::invariant("deciding on an item without an article"))?;
        self.db.submit_decision(
            article_id,
            issue_id,
            decision,
            modified_content,
            notes,
            operator,
            supersede,
        )
    }

    /// Operator finalizes the review: the applied body is computed,
    /// written through the sanitizer, and the item moves to
    /// ready_to_publish
    pub async fn finalize_review(&self, item_id: i64, operator: &str) -> Result<()> {
        let _guard = self.locks.acquire(item_id).await;
        let item = self.db.get_worklist_item(item_id)?;
        self.finalize_review_inner(&item, operator)
    }

    fn finalize_review_inner(&self, item: &WorklistItem, operator: &str) -> Result<()> {
        let article_id = item
            .article_id
            .ok_or_else(|| PressError::invariant("finalizing an item without an article"))?;
        let article = self.db.get_article(article_id)?;

        let issues = self.db.list_issues(article_id, false)?;
        let decisions = self.db.list_decisions(article_id, false)?;

        let outcome = proofread::apply_decisions(&article.body_text, &issues, &decisions)?;
        if !outcome.conflicts.is_empty() {
            return Err(PressError::Config(format!(
                "{} decision conflicts must be resolved before finalizing",
                outcome.conflicts.len()
            )));
        }

        // The stored body came through the sanitizer, so re-sanitizing
        // reproduces the offset table the issues were anchored against
        let sanitized = sanitize_fragment(&article.body_html)?;
        if sanitized.body_text != article.body_text {
            return Err(PressError::invariant(
                "stored body_text no longer matches its body_html",
            ));
        }
        let new_html =
            proofread::finalize_html(&sanitized.body_html, &sanitized.offsets, &outcome.replacements)?;
        let new_body = sanitize_fragment(&new_html)?;

        self.db
            .finalize_body(article_id, &new_body.body_html, &new_body.body_text)?;
        self.db.append_history(
            article_id,
            issues.first().map(|i| i.ruleset_generation).unwrap_or(0),
            "finalize",
            &serde_json::json!({
                "applied": outcome.replacements.len(),
                "deferred": outcome.deferred,
                "operator": operator,
            }),
        )?;

        self.db.transition_status(
            item.id,
            WorklistStatus::ProofreadingReview,
            WorklistStatus::ReadyToPublish,
        )?;
        Ok(())
    }

    /// Operator re-runs proofreading from the review lane
    pub async fn rerun_proofreading(&self, item_id: i64) -> Result<()> {
        let _guard = self.locks.acquire(item_id).await;
        self.db.transition_status(
            item_id,
            WorklistStatus::ProofreadingReview,
            WorklistStatus::Proofreading,
        )?;
        self.queue.dispatch(Job::proofread(item_id))?;
        Ok(())
    }

    /// Operator sends the item back for a fundamental parsing fix
    pub async fn back_to_parsing_review(&self, item_id: i64) -> Result<()> {
        let _guard = self.locks.acquire(item_id).await;
        self.db.transition_status(
            item_id,
            WorklistStatus::ProofreadingReview,
            WorklistStatus::ParsingReview,
        )
    }

    /// Operator triggers publication, optionally selecting a provider
    pub async fn trigger_publish(
        &self,
        item_id: i64,
        provider: Option<PublishProviderKind>,
    ) -> Result<()> {
        let _guard = self.locks.acquire(item_id).await;
        self.db.transition_status(
            item_id,
            WorklistStatus::ReadyToPublish,
            WorklistStatus::Publishing,
        )?;
        self.queue.dispatch(Job::publish(item_id, provider))?;
        Ok(())
    }

    /// Operator resets a failed item to an earlier lane with a required
    /// note; resets to pending re-enter the pipe on the next kick
    pub async fn reset_failed(
        &self,
        item_id: i64,
        to: WorklistStatus,
        operator: &str,
        note: &str,
    ) -> Result<()> {
        let _guard = self.locks.acquire(item_id).await;
        self.db.reset_from_failed(item_id, to, operator, note)
    }

    /// Operator requests cancellation of the item's running job
    pub fn cancel_item(&self, item_id: i64) {
        if let Some(token) = self.cancellations.get(&item_id) {
            token.cancel();
        }
    }

    /// Operator raises the AI cost cap for one article
    pub fn raise_cost_cap(&self, article_id: i64, new_cap_usd: f64) -> Result<()> {
        let optimizer = self
            .optimizer
            .as_ref()
            .ok_or_else(|| PressError::Config("no optimizer configured".to_string()))?;
        optimizer.raise_cap(article_id, new_cap_usd);
        Ok(())
    }

    // =========================================================================
    // Housekeeping
    // =========================================================================

    /// Daily worker: materialize the rule-quality report and sweep
    /// expired screenshots
    pub fn run_housekeeping(&self) -> Result<()> {
        let report = self.build_rule_quality_report()?;
        let dir = std::path::Path::new(".pressroom/reports");
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "rule-quality-{}.json",
            chrono::Utc::now().format("%Y%m%d")
        ));
        std::fs::write(&path, serde_json::to_vec_pretty(&report)?)?;
        info!(path = %path.display(), rules = report.rules.len(), "rule-quality report written");

        if let Some(directory) = &self.config.storage.directory {
            crate::publisher::sweep_expired(
                directory,
                self.config.storage.screenshot_retention_days,
            )?;
        }
        Ok(())
    }

    /// Aggregate decision tallies across every article
    pub fn build_rule_quality_report(&self) -> Result<proofread::RuleQualityReport> {
        let generation = self
            .db
            .active_ruleset()?
            .map(|(ruleset, _)| ruleset.generation)
            .unwrap_or(0);

        let mut merged = proofread::RuleQualityReport {
            generated_at: chrono::Utc::now(),
            ruleset_generation: generation,
            rules: Default::default(),
        };

        for item in self.db.list_worklist_items(None, true)? {
            let Some(article_id) = item.article_id else {
                continue;
            };
            let issues = self.db.list_issues(article_id, true)?;
            let decisions = self.db.list_decisions(article_id, true)?;
            let report = proofread::build_report(generation, &issues, &decisions);
            for (code, stats) in report.rules {
                let entry = merged.rules.entry(code).or_default();
                entry.accepted += stats.accepted;
                entry.rejected += stats.rejected;
                entry.modified += stats.modified;
                entry.notes.extend(stats.notes);
            }
        }
        Ok(merged)
    }

    /// One sync round, exposed for the CLI
    pub async fn sync_once(&self) -> Result<SyncReport> {
        self.sync.run_once().await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{CmsDraft, CmsDraftSearch, InMemoryDocumentStore};
    use crate::config::ParserConfig;
    use crate::publisher::{ProgressSink, PublishProvider, PublishRequest};
    use crate::storage::Database;
    use crate::types::{IssueSeverity, PublishOutcome, PublishStatus, Rule, RuleClass};
    use crate::vault::{CredentialVault, VaultBackend};
    use async_trait::async_trait;
    use chrono::Utc;
    use secrecy::SecretString;
    use std::collections::HashMap;

    // -------------------------------------------------------------------------
    // Fakes
    // -------------------------------------------------------------------------

    struct StaticVault;

    #[async_trait]
    impl VaultBackend for StaticVault {
        async fn get(&self, key: &str) -> Result<Option<SecretString>> {
            Ok(Some(SecretString::from(match key {
                "cms_admin_url" => "https://cms.example.com/wp-admin",
                "cms_username" => "editor",
                "cms_password" => "s3cret",
                _ => return Ok(None),
            })))
        }
        async fn list(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn set(&self, _: &str, _: SecretString) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _: &str) -> Result<()> {
            Ok(())
        }
        fn source(&self) -> &'static str {
            "static"
        }
    }

    struct HappyProvider;

    #[async_trait]
    impl CmsDraftSearch for HappyProvider {
        async fn find_drafts_by_title(&self, _title: &str) -> Result<Vec<CmsDraft>> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl PublishProvider for HappyProvider {
        async fn publish(
            &self,
            _request: &PublishRequest,
            _credentials: &CmsCredentials,
            progress: &dyn ProgressSink,
        ) -> Result<PublishOutcome> {
            progress.on_step(PublishStatus::Publishing, "save_draft", 100, None);
            Ok(PublishOutcome {
                success: true,
                cms_article_id: Some("12345".into()),
                published_url: Some("https://cms.example.com/draft/12345".into()),
                duration: Duration::from_secs(48),
                cost_usd: 0.0,
                screenshots: vec![],
                error: None,
                failed_step: None,
            })
        }
        fn kind(&self) -> PublishProviderKind {
            PublishProviderKind::Playwright
        }
        fn draft_search(&self) -> Arc<dyn CmsDraftSearch> {
            Arc::new(HappyProvider)
        }
    }

    const DOC: &str = "<h1>HOWTO: configure X</h1>\
        <p>Configuring X correctly matters because teh defaults ship with \
        conservative limits that most production deployments outgrow.</p>\
        <p>Second paragraph with more body text to clear the threshold.</p>";

    async fn orchestrator() -> (Arc<Orchestrator>, Arc<InMemoryDocumentStore>) {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());

        // Active ruleset with one typo rule
        let draft = db
            .create_ruleset_draft(
                "v1",
                &[Rule {
                    id: 0,
                    ruleset_id: 0,
                    code: "B01".into(),
                    class: RuleClass::B,
                    pattern: r"\bteh\b".into(),
                    description: "common typo".into(),
                    severity: IssueSeverity::Error,
                    suggestion: Some("the".into()),
                    enabled: true,
                }],
            )
            .unwrap();
        db.publish_ruleset(draft.id, "admin").unwrap();

        let mut config = Config::default();
        config.proofreading.carry_offset_tolerance = Some(20);
        config.parser.use_ai = false;

        let parser = DocumentParser::new(
            None,
            ParserConfig {
                use_ai: false,
                heuristic_fallback: true,
            },
        );

        let mut providers: HashMap<PublishProviderKind, Arc<dyn PublishProvider>> = HashMap::new();
        providers.insert(PublishProviderKind::Playwright, Arc::new(HappyProvider));
        let publisher = PublishOrchestrator::new(
            db.clone(),
            providers,
            PublishProviderKind::Playwright,
            3,
            Duration::from_secs(600),
        );

        let vault = Arc::new(CredentialVault::new(
            Arc::new(StaticVault),
            Duration::from_secs(300),
        ));
        let store = Arc::new(InMemoryDocumentStore::new());

        let orchestrator = Arc::new(Orchestrator::new(
            db,
            config,
            parser,
            None,
            publisher,
            vault,
            store.clone(),
            Arc::new(MetricsCollector::new()),
        ));
        (orchestrator, store)
    }

    async fn synced_item(
        orchestrator: &Arc<Orchestrator>,
        store: &Arc<InMemoryDocumentStore>,
    ) -> i64 {
        store
            .insert(
                crate::clients::DocumentSummary {
                    id: "d1".into(),
                    name: "HOWTO: configure X".into(),
                    modified_at: Utc::now(),
                    metadata: serde_json::json!({}),
                },
                DOC,
            )
            .await;
        orchestrator.sync_once().await.unwrap();
        orchestrator
            .database()
            .find_by_document_id("d1")
            .unwrap()
            .unwrap()
            .id
    }

    /// Drive the item through parse like a worker would
    async fn parse_item(orchestrator: &Arc<Orchestrator>, item_id: i64) {
        orchestrator.kick_pending();
        orchestrator.run_job(Job::parse(item_id)).await;
    }

    // -------------------------------------------------------------------------
    // Scenarios
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_happy_path_end_to_end() {
        let (orchestrator, store) = orchestrator().await;
        let db = orchestrator.database().clone();
        let item_id = synced_item(&orchestrator, &store).await;

        // Parse
        parse_item(&orchestrator, item_id).await;
        let item = db.get_worklist_item(item_id).unwrap();
        assert_eq!(item.status, WorklistStatus::ParsingReview);
        let article_id = item.article_id.unwrap();

        // Operator confirms; proofreading runs
        orchestrator.confirm_parsing(item_id, "alice").await.unwrap();
        orchestrator.run_job(Job::proofread(item_id)).await;
        let item = db.get_worklist_item(item_id).unwrap();
        assert_eq!(item.status, WorklistStatus::ProofreadingReview);

        // The typo rule fired
        let issues = db.list_issues(article_id, false).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].original_text, "teh");

        // Operator accepts and finalizes
        orchestrator
            .submit_decision(
                item_id,
                issues[0].id,
                DecisionKind::Accepted,
                None,
                None,
                "alice",
                false,
            )
            .unwrap();
        orchestrator.finalize_review(item_id, "alice").await.unwrap();
        let item = db.get_worklist_item(item_id).unwrap();
        assert_eq!(item.status, WorklistStatus::ReadyToPublish);

        // The correction landed in the stored body
        let article = db.get_article(article_id).unwrap();
        assert!(article.body_text.contains("the defaults"));
        assert!(!article.body_text.contains("teh"));

        // Publish
        orchestrator
            .trigger_publish(item_id, Some(PublishProviderKind::Playwright))
            .await
            .unwrap();
        orchestrator.run_job(Job::publish(item_id, Some(PublishProviderKind::Playwright))).await;

        let item = db.get_worklist_item(item_id).unwrap();
        assert_eq!(item.status, WorklistStatus::Published);
        let article = db.get_article(article_id).unwrap();
        assert_eq!(article.cms_article_id.as_deref(), Some("12345"));
        assert!(article.published_at.is_some());
        let tasks = db.list_publish_tasks(article_id).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].cost_usd, 0.0);
    }

    #[tokio::test]
    async fn test_parse_failure_moves_to_failed() {
        let (orchestrator, store) = orchestrator().await;
        let db = orchestrator.database().clone();
        store
            .insert(
                crate::clients::DocumentSummary {
                    id: "empty".into(),
                    name: "empty doc".into(),
                    modified_at: Utc::now(),
                    metadata: serde_json::json!({}),
                },
                "<html><body></body></html>",
            )
            .await;
        orchestrator.sync_once().await.unwrap();
        let item_id = db.find_by_document_id("empty").unwrap().unwrap().id;

        parse_item(&orchestrator, item_id).await;

        let item = db.get_worklist_item(item_id).unwrap();
        assert_eq!(item.status, WorklistStatus::Failed);
        assert!(item.error_message.is_some());
        assert!(item.article_id.is_none());
        assert!(item.article_linkage_ok());
    }

    #[tokio::test]
    async fn test_reset_failed_and_rerun() {
        let (orchestrator, store) = orchestrator().await;
        let db = orchestrator.database().clone();
        store
            .insert(
                crate::clients::DocumentSummary {
                    id: "empty".into(),
                    name: "empty doc".into(),
                    modified_at: Utc::now(),
                    metadata: serde_json::json!({}),
                },
                "<html><body></body></html>",
            )
            .await;
        orchestrator.sync_once().await.unwrap();
        let item_id = db.find_by_document_id("empty").unwrap().unwrap().id;
        parse_item(&orchestrator, item_id).await;

        // Reset requires a note
        assert!(orchestrator
            .reset_failed(item_id, WorklistStatus::Pending, "alice", "")
            .await
            .is_err());
        orchestrator
            .reset_failed(item_id, WorklistStatus::Pending, "alice", "fixed upstream")
            .await
            .unwrap();
        let item = db.get_worklist_item(item_id).unwrap();
        assert_eq!(item.status, WorklistStatus::Pending);
        assert!(item.has_override_note());
    }

    #[tokio::test]
    async fn test_reparse_supersedes_and_returns_to_review() {
        let (orchestrator, store) = orchestrator().await;
        let db = orchestrator.database().clone();
        let item_id = synced_item(&orchestrator, &store).await;
        parse_item(&orchestrator, item_id).await;

        let first_article = db.get_worklist_item(item_id).unwrap().article_id.unwrap();
        orchestrator.request_reparse(item_id).await.unwrap();
        orchestrator.run_job(Job::parse(item_id)).await;

        let item = db.get_worklist_item(item_id).unwrap();
        assert_eq!(item.status, WorklistStatus::ParsingReview);
        // Same article row, updated in place
        assert_eq!(item.article_id.unwrap(), first_article);
    }

    #[tokio::test]
    async fn test_decision_conflict_blocks_finalize() {
        let (orchestrator, store) = orchestrator().await;
        let db = orchestrator.database().clone();
        let item_id = synced_item(&orchestrator, &store).await;
        parse_item(&orchestrator, item_id).await;
        orchestrator.confirm_parsing(item_id, "alice").await.unwrap();
        orchestrator.run_job(Job::proofread(item_id)).await;

        // No decisions at all: finalize succeeds, everything deferred
        orchestrator.finalize_review(item_id, "alice").await.unwrap();
        let item = db.get_worklist_item(item_id).unwrap();
        assert_eq!(item.status, WorklistStatus::ReadyToPublish);
        // Deferred issue kept the original text
        let article = db.get_article(item.article_id.unwrap()).unwrap();
        assert!(article.body_text.contains("teh"));
    }

    #[tokio::test]
    async fn test_concurrent_decisions_stale_state() {
        let (orchestrator, store) = orchestrator().await;
        let db = orchestrator.database().clone();
        let item_id = synced_item(&orchestrator, &store).await;
        parse_item(&orchestrator, item_id).await;
        orchestrator.confirm_parsing(item_id, "alice").await.unwrap();
        orchestrator.run_job(Job::proofread(item_id)).await;

        let article_id = db.get_worklist_item(item_id).unwrap().article_id.unwrap();
        let issues = db.list_issues(article_id, false).unwrap();

        orchestrator
            .submit_decision(item_id, issues[0].id, DecisionKind::Accepted, None, None, "alice", false)
            .unwrap();
        let err = orchestrator
            .submit_decision(item_id, issues[0].id, DecisionKind::Rejected, None, None, "bob", false)
            .unwrap_err();
        assert!(matches!(err, PressError::StaleState(_)));

        // Bob supersedes deliberately after re-reading
        orchestrator
            .submit_decision(item_id, issues[0].id, DecisionKind::Rejected, None, None, "bob", true)
            .unwrap();
        assert_eq!(db.list_decisions(article_id, false).unwrap().len(), 1);
        assert_eq!(db.list_decisions(article_id, true).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_trigger_publish_requires_ready_lane() {
        let (orchestrator, store) = orchestrator().await;
        let item_id = synced_item(&orchestrator, &store).await;
        let err = orchestrator.trigger_publish(item_id, None).await.unwrap_err();
        assert!(matches!(
            err,
            PressError::InvalidTransition { .. } | PressError::StaleState(_)
        ));
    }

    #[tokio::test]
    async fn test_auto_process_skips_review_gates() {
        let (orchestrator, store) = orchestrator().await;
        // Rebuild with auto-process allowed and the item flagged
        let db = orchestrator.database().clone();
        drop(orchestrator);

        let mut config = Config::default();
        config.proofreading.carry_offset_tolerance = Some(20);
        config.orchestrator.auto_process = AutoProcessPolicy::PerItemFlagOnly;

        let parser = DocumentParser::new(
            None,
            ParserConfig {
                use_ai: false,
                heuristic_fallback: true,
            },
        );
        let mut providers: HashMap<PublishProviderKind, Arc<dyn PublishProvider>> = HashMap::new();
        providers.insert(PublishProviderKind::Playwright, Arc::new(HappyProvider));
        let publisher = PublishOrchestrator::new(
            db.clone(),
            providers,
            PublishProviderKind::Playwright,
            3,
            Duration::from_secs(600),
        );
        let orchestrator = Arc::new(Orchestrator::new(
            db.clone(),
            config,
            parser,
            None,
            publisher,
            Arc::new(CredentialVault::new(
                Arc::new(StaticVault),
                Duration::from_secs(300),
            )),
            store.clone(),
            Arc::new(MetricsCollector::new()),
        ));

        // Item flagged for auto-processing
        let item = db
            .create_worklist_item(&crate::storage::NewWorklistItem {
                document_id: "auto-1".into(),
                raw_html: DOC.into(),
                raw_text: "text".into(),
                title: Some("t".into()),
                author: None,
                document_metadata: Default::default(),
                auto_process: true,
            })
            .unwrap();

        orchestrator.kick_pending();
        orchestrator.run_job(Job::parse(item.id)).await;
        // Parse auto-confirmed into proofreading
        assert_eq!(
            db.get_worklist_item(item.id).unwrap().status,
            WorklistStatus::Proofreading
        );
        orchestrator.run_job(Job::proofread(item.id)).await;
        assert_eq!(
            db.get_worklist_item(item.id).unwrap().status,
            WorklistStatus::Publishing
        );
        orchestrator.run_job(Job::publish(item.id, None)).await;
        assert_eq!(
            db.get_worklist_item(item.id).unwrap().status,
            WorklistStatus::Published
        );
    }

    #[tokio::test]
    async fn test_rule_quality_report_aggregates() {
        let (orchestrator, store) = orchestrator().await;
        let db = orchestrator.database().clone();
        let item_id = synced_item(&orchestrator, &store).await;
        parse_item(&orchestrator, item_id).await;
        orchestrator.confirm_parsing(item_id, "alice").await.unwrap();
        orchestrator.run_job(Job::proofread(item_id)).await;

        let article_id = db.get_worklist_item(item_id).unwrap().article_id.unwrap();
        let issues = db.list_issues(article_id, false).unwrap();
        orchestrator
            .submit_decision(item_id, issues[0].id, DecisionKind::Accepted, None, None, "alice", false)
            .unwrap();

        let report = orchestrator.build_rule_quality_report().unwrap();
        assert_eq!(report.rules["B01"].accepted, 1);
        assert_eq!(report.ruleset_generation, 1);
    }
}

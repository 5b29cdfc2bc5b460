//! Browser-Automation Provider
//!
//! Drives the CMS admin UI through a scripted selector sequence:
//! login → create post → paste body → attach images → set SEO → save
//! draft. Deterministic and free of AI cost. Selectors live in a
//! configuration file so CMS UI changes don't require a rebuild.
//!
//! The login screen is never captured; screenshots start after the
//! credential fields are off screen.

use std::path::Path;
use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{CmsCredentials, ProgressSink, PublishProvider, PublishRequest, capture};
use crate::ai::with_timeout;
use crate::clients::{CmsBrowser, CmsDraftSearch};
use crate::constants::publish as publish_constants;
use crate::types::{
    PressError, PublishOutcome, PublishProviderKind, PublishStep, Result, Screenshot,
};

// =============================================================================
// Selector Map
// =============================================================================

/// CSS selector map for the CMS admin UI, loaded from configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorMap {
    pub login: LoginSelectors,
    pub compose: ComposeSelectors,
    pub seo: SeoSelectors,
    pub media: MediaSelectors,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginSelectors {
    pub username: String,
    pub password: String,
    pub submit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComposeSelectors {
    pub new_post: String,
    pub title: String,
    pub body: String,
    pub save_draft: String,
    pub saved_indicator: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeoSelectors {
    pub meta_description: String,
    pub tags: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSelectors {
    pub add_media: String,
    pub upload_input: String,
}

impl SelectorMap {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PressError::Config(format!("cannot read selector map {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| PressError::Config(format!("bad selector map {}: {e}", path.display())))
    }
}

// =============================================================================
// Provider
// =============================================================================

pub struct BrowserProvider {
    browser: Arc<dyn CmsBrowser>,
    selectors: SelectorMap,
    store: super::SharedScreenshotStore,
}

impl BrowserProvider {
    pub fn new(
        browser: Arc<dyn CmsBrowser>,
        selectors: SelectorMap,
        store: super::SharedScreenshotStore,
    ) -> Self {
        Self {
            browser,
            selectors,
            store,
        }
    }

    /// Wait for a selector, retrying up to the bound. Exceeding it is the
    /// step-failure signal the hybrid provider falls back on.
    async fn await_selector(
        &self,
        selector: &str,
        step_timeout: std::time::Duration,
    ) -> Result<()> {
        let mut last_err = None;
        for attempt in 1..=publish_constants::SELECTOR_MAX_TRIES {
            match with_timeout(
                step_timeout,
                self.browser.wait_for(selector),
                "selector wait",
            )
            .await
            {
                Ok(()) => return Ok(()),
                Err(err) => {
                    debug!(selector, attempt, "selector not present yet");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            PressError::PublishFailed {
                step: "selector".into(),
                message: format!("selector {selector} never appeared"),
            }
        }))
    }

    async fn shoot(
        &self,
        task_id: i64,
        step: PublishStep,
        screenshots: &mut Vec<Screenshot>,
        progress: &dyn ProgressSink,
    ) {
        // Login is excluded: credential fields must never be captured
        if step == PublishStep::Login {
            progress.on_step(step.status(), step.as_str(), step.percent(), None);
            return;
        }
        match self.browser.screenshot().await {
            Ok(bytes) => match capture(
                self.store.as_ref(),
                task_id,
                step,
                PublishProviderKind::Playwright,
                &bytes,
            )
            .await
            {
                Ok(shot) => {
                    screenshots.push(shot.clone());
                    progress.on_step(step.status(), step.as_str(), step.percent(), Some(shot));
                }
                Err(err) => {
                    warn!(error = %err, "screenshot store failed, continuing");
                    progress.on_step(step.status(), step.as_str(), step.percent(), None);
                }
            },
            Err(err) => {
                warn!(error = %err, "screenshot capture failed, continuing");
                progress.on_step(step.status(), step.as_str(), step.percent(), None);
            }
        }
    }

    async fn run_step(
        &self,
        step: PublishStep,
        request: &PublishRequest,
        credentials: &CmsCredentials,
    ) -> Result<Option<(String, String)>> {
        let timeout = request.options.step_timeout;
        let selectors = &self.selectors;

        match step {
            PublishStep::Login => {
                self.browser.goto(&credentials.admin_url).await?;
                self.await_selector(&selectors.login.username, timeout).await?;
                self.browser
                    .fill(&selectors.login.username, credentials.username.expose_secret())
                    .await?;
                self.browser
                    .fill(&selectors.login.password, credentials.password.expose_secret())
                    .await?;
                self.browser.click(&selectors.login.submit).await?;
                self.await_selector(&selectors.compose.new_post, timeout).await?;
            }
            PublishStep::CreatePost => {
                self.browser.click(&selectors.compose.new_post).await?;
                self.await_selector(&selectors.compose.title, timeout).await?;
                self.browser
                    .fill(&selectors.compose.title, &request.article.title.display())
                    .await?;
            }
            PublishStep::PasteBody => {
                self.browser
                    .fill(&selectors.compose.body, &request.article.body_html)
                    .await?;
            }
            PublishStep::AttachImages => {
                for image in &request.images {
                    let Some(path) = &image.source_path else {
                        continue;
                    };
                    self.browser.click(&selectors.media.add_media).await?;
                    self.await_selector(&selectors.media.upload_input, timeout).await?;
                    self.browser
                        .upload(&selectors.media.upload_input, path)
                        .await?;
                }
            }
            PublishStep::SetSeoFields => {
                if let Some(meta) = &request.article.meta_description {
                    self.await_selector(&selectors.seo.meta_description, timeout).await?;
                    self.browser
                        .fill(&selectors.seo.meta_description, meta)
                        .await?;
                }
                if !request.article.tags.is_empty() {
                    self.browser
                        .fill(&selectors.seo.tags, &request.article.tags.join(", "))
                        .await?;
                }
            }
            PublishStep::SaveDraft => {
                self.browser.click(&selectors.compose.save_draft).await?;
                // The expected "draft saved" indicator is the assertion
                self.await_selector(&selectors.compose.saved_indicator, timeout).await?;
                let url = self.browser.current_url().await?;
                let cms_article_id = extract_post_id(&url).ok_or_else(|| {
                    PressError::PublishFailed {
                        step: step.as_str().into(),
                        message: format!("no post id in draft URL {url}"),
                    }
                })?;
                return Ok(Some((cms_article_id, url)));
            }
        }
        Ok(None)
    }
}

/// Pull the post id out of the CMS draft URL (`?post=123` or `/post/123`)
fn extract_post_id(url: &str) -> Option<String> {
    if let Some(pos) = url.find("post=") {
        let digits: String = url[pos + 5..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            return Some(digits);
        }
    }
    url.rsplit('/')
        .find(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
        .map(String::from)
}

#[async_trait::async_trait]
impl PublishProvider for BrowserProvider {
    async fn publish(
        &self,
        request: &PublishRequest,
        credentials: &CmsCredentials,
        progress: &dyn ProgressSink,
    ) -> Result<PublishOutcome> {
        let start = std::time::Instant::now();
        let mut screenshots: Vec<Screenshot> = Vec::new();

        let steps: Vec<PublishStep> = PublishStep::ALL
            .into_iter()
            .filter(|step| *step >= request.options.start_step)
            .collect();

        let mut draft: Option<(String, String)> = None;
        for step in steps {
            match self.run_step(step, request, credentials).await {
                Ok(result) => {
                    self.shoot(request.task_id, step, &mut screenshots, progress).await;
                    if let Some(found) = result {
                        draft = Some(found);
                    }
                }
                Err(err) => {
                    warn!(step = %step, error = %err, "browser step failed");
                    return Ok(PublishOutcome::failure(
                        step,
                        err.to_string(),
                        start.elapsed(),
                        0.0,
                        screenshots,
                    ));
                }
            }
        }

        let (cms_article_id, published_url) = draft.ok_or_else(|| PressError::invariant(
            "browser sequence finished without reaching save_draft",
        ))?;

        Ok(PublishOutcome {
            success: true,
            cms_article_id: Some(cms_article_id),
            published_url: Some(published_url),
            duration: start.elapsed(),
            cost_usd: 0.0,
            screenshots,
            error: None,
            failed_step: None,
        })
    }

    fn kind(&self) -> PublishProviderKind {
        PublishProviderKind::Playwright
    }

    fn draft_search(&self) -> Arc<dyn CmsDraftSearch> {
        self.browser.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================

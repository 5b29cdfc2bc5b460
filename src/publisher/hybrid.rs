//! Hybrid Provider
//!
//! Attempts the scripted browser sequence first; on a step failure after
//! login, invokes the computer-use agent starting from the failed step,
//! within the same attempt. The fallback does not consume a retry:
//! `retry_count` is untouched. Screenshots from both providers are kept,
//! labelled by origin; costs add up.

use std::sync::Arc;

use tracing::{info, warn};

use super::{
    BrowserProvider, CmsCredentials, ComputerUseProvider, ProgressSink, PublishProvider,
    PublishRequest,
};
use crate::clients::CmsDraftSearch;
use crate::types::{PublishOutcome, PublishProviderKind, PublishStep, Result};

pub struct HybridProvider {
    browser: BrowserProvider,
    agent: ComputerUseProvider,
}

impl HybridProvider {
    pub fn new(browser: BrowserProvider, agent: ComputerUseProvider) -> Self {
        Self { browser, agent }
    }
}

#[async_trait::async_trait]
impl PublishProvider for HybridProvider {
    async fn publish(
        &self,
        request: &PublishRequest,
        credentials: &CmsCredentials,
        progress: &dyn ProgressSink,
    ) -> Result<PublishOutcome> {
        let browser_outcome = self.browser.publish(request, credentials, progress).await?;
        if browser_outcome.success {
            return Ok(browser_outcome);
        }

        let failed_step = browser_outcome.failed_step.unwrap_or(PublishStep::Login);

        // Login failures are not recoverable by the agent: without a
        // session there is nothing to carry over
        if failed_step == PublishStep::Login {
            warn!(task_id = request.task_id, "browser failed at login, no agent fallback");
            return Ok(browser_outcome);
        }

        info!(
            task_id = request.task_id,
            failed_step = %failed_step,
            "browser step failed, falling back to computer-use agent"
        );

        let mut agent_request = PublishRequest {
            task_id: request.task_id,
            article: request.article.clone(),
            images: request.images.clone(),
            options: request.options.clone(),
        };
        agent_request.options.start_step = failed_step;

        let agent_outcome = self
            .agent
            .publish(&agent_request, credentials, progress)
            .await?;

        // Stitch the attempt together: both providers' screenshots, costs
        // and wall clock combined
        let mut screenshots = browser_outcome.screenshots;
        screenshots.extend(agent_outcome.screenshots);

        Ok(PublishOutcome {
            success: agent_outcome.success,
            cms_article_id: agent_outcome.cms_article_id,
            published_url: agent_outcome.published_url,
            duration: browser_outcome.duration + agent_outcome.duration,
            cost_usd: browser_outcome.cost_usd + agent_outcome.cost_usd,
            screenshots,
            error: agent_outcome.error,
            failed_step: agent_outcome.failed_step,
        })
    }

    fn kind(&self) -> PublishProviderKind {
        PublishProviderKind::Hybrid
    }

    fn draft_search(&self) -> Arc<dyn CmsDraftSearch> {
        self.browser.draft_search()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::agent::tests::FakeAgent;
    use super::super::browser::tests::{FakeBrowser, request, selectors};
    use super::super::{LocalFsStore, NullSink, SharedScreenshotStore};

    fn store() -> SharedScreenshotStore {
        Arc::new(LocalFsStore::new(tempfile::tempdir().unwrap().keep()))
    }

    fn article() -> crate::types::Article {
        let db = crate::storage::Database::open_in_memory().unwrap();
        super::super::tests::test_article(&db)
    }

    fn hybrid(browser: Arc<FakeBrowser>, agent: Arc<FakeAgent>) -> HybridProvider {
        HybridProvider::new(
            BrowserProvider::new(browser, selectors(), store()),
            ComputerUseProvider::new(agent, store()),
        )
    }

    #[tokio::test]
    async fn test_browser_success_skips_agent() {
        let browser = Arc::new(FakeBrowser::new());
        let agent = Arc::new(FakeAgent::succeeding());
        let provider = hybrid(browser, agent.clone());

        let outcome = provider
            .publish(
                &request(article()),
                &super::super::tests::credentials(),
                &NullSink,
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.cms_article_id.as_deref(), Some("12345"));
        assert_eq!(outcome.cost_usd, 0.0);
        assert!(agent.goals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_resumes_from_failed_step() {
        let browser = Arc::new(FakeBrowser::new());
        // The CMS UI changed: the SEO panel selector is gone
        browser.break_selector("#yoast_wpseo_metadesc");
        let agent = Arc::new(FakeAgent::succeeding());
        let provider = hybrid(browser, agent.clone());

        let outcome = provider
            .publish(
                &request(article()),
                &super::super::tests::credentials(),
                &NullSink,
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.cms_article_id.as_deref(), Some("9001"));
        // Agent cost carried through
        assert!((outcome.cost_usd - 0.22).abs() < 1e-9);

        let goals = agent.goals.lock().unwrap();
        assert_eq!(goals.len(), 1);
        assert!(goals[0].contains("continue from the set_seo_fields step"));
    }

    #[tokio::test]
    async fn test_screenshots_labelled_by_provider() {
        let browser = Arc::new(FakeBrowser::new());
        browser.break_selector("#yoast_wpseo_metadesc");
        let agent = Arc::new(FakeAgent::succeeding());
        let provider = hybrid(browser, agent);

        let outcome = provider
            .publish(
                &request(article()),
                &super::super::tests::credentials(),
                &NullSink,
            )
            .await
            .unwrap();

        let browser_shots = outcome
            .screenshots
            .iter()
            .filter(|s| s.provider == PublishProviderKind::Playwright)
            .count();
        let agent_shots = outcome
            .screenshots
            .iter()
            .filter(|s| s.provider == PublishProviderKind::ComputerUse)
            .count();
        assert!(browser_shots > 0, "browser attempt screenshots kept");
        assert!(agent_shots > 0, "agent attempt screenshots kept");
    }

    #[tokio::test]
    async fn test_login_failure_does_not_fall_back() {
        let browser = Arc::new(FakeBrowser::new());
        browser.break_selector("#user_login");
        let agent = Arc::new(FakeAgent::succeeding());
        let provider = hybrid(browser, agent.clone());

        let outcome = provider
            .publish(
                &request(article()),
                &super::super::tests::credentials(),
                &NullSink,
            )
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.failed_step, Some(PublishStep::Login));
        assert!(agent.goals.lock().unwrap().is_empty());
    }
}

//! Computer-Use Agent Provider
//!
//! Hands the CMS a goal description and lets a computer-use model observe
//! screenshots and issue keyboard/mouse actions. Non-deterministic, costs
//! real money per article, and tolerates CMS UI drift the scripted
//! provider cannot. The goal text embeds the article fields and, on a
//! hybrid resume, where to pick up.

use std::sync::Arc;

use tracing::{info, warn};

use super::{
    CmsCredentials, ProgressSink, PublishProvider, PublishRequest, SharedScreenshotStore, capture,
};
use crate::clients::{CmsDraftSearch, ComputerUseClient};
use crate::types::{
    PublishOutcome, PublishProviderKind, PublishStatus, PublishStep, Result, Screenshot,
};

pub struct ComputerUseProvider {
    client: Arc<dyn ComputerUseClient>,
    store: SharedScreenshotStore,
}

impl ComputerUseProvider {
    pub fn new(client: Arc<dyn ComputerUseClient>, store: SharedScreenshotStore) -> Self {
        Self { client, store }
    }

    /// The goal description. Credentials are referenced, never inlined:
    /// the agent runtime injects them into the login form itself.
    fn build_goal(request: &PublishRequest, credentials: &CmsCredentials) -> String {
        let article = &request.article;
        let mut goal = format!(
            "Open the CMS admin at {} and log in with the operator credentials \
             provided by the runtime. Create a new post titled {:?}. Paste the \
             provided HTML into the content editor. ",
            credentials.admin_url,
            article.title.display(),
        );
        if let Some(meta) = &article.meta_description {
            goal.push_str(&format!("Set the SEO meta description to {meta:?}. "));
        }
        if !article.tags.is_empty() {
            goal.push_str(&format!("Add the tags: {}. ", article.tags.join(", ")));
        }
        goal.push_str(
            "Save the post as a draft (do not publish live) and report the \
             resulting draft URL and post id.",
        );
        if request.options.start_step > PublishStep::Login {
            goal.push_str(&format!(
                " The session is already logged in and a partial draft may exist; \
                 continue from the {} step.",
                request.options.start_step
            ));
        }
        goal
    }
}

#[async_trait::async_trait]
impl PublishProvider for ComputerUseProvider {
    async fn publish(
        &self,
        request: &PublishRequest,
        credentials: &CmsCredentials,
        progress: &dyn ProgressSink,
    ) -> Result<PublishOutcome> {
        let start = std::time::Instant::now();
        progress.on_step(PublishStatus::Initializing, "agent_start", 5, None);

        let goal = Self::build_goal(request, credentials);
        info!(task_id = request.task_id, "computer-use agent dispatched");

        let outcome = self.client.run_goal(&goal).await?;

        let mut screenshots: Vec<Screenshot> = Vec::new();
        for bytes in &outcome.screenshots {
            match capture(
                self.store.as_ref(),
                request.task_id,
                PublishStep::SaveDraft,
                PublishProviderKind::ComputerUse,
                bytes,
            )
            .await
            {
                Ok(shot) => screenshots.push(shot),
                Err(err) => warn!(error = %err, "agent screenshot store failed"),
            }
        }

        if outcome.success {
            progress.on_step(PublishStatus::Publishing, "agent_done", 100, None);
        }

        Ok(PublishOutcome {
            success: outcome.success,
            cms_article_id: outcome.cms_article_id,
            published_url: outcome.draft_url,
            duration: start.elapsed(),
            cost_usd: outcome.cost_usd,
            screenshots,
            error: outcome.error,
            failed_step: (!outcome.success).then_some(request.options.start_step),
        })
    }

    fn kind(&self) -> PublishProviderKind {
        PublishProviderKind::ComputerUse
    }

    fn draft_search(&self) -> Arc<dyn CmsDraftSearch> {
        self.client.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================

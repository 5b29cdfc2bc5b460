//! CLI Layer
//!
//! Operator commands over the pipeline: init, run, sync, worklist
//! actions, ruleset management, status, and config inspection.

pub mod commands;

use std::sync::Arc;

use crate::ai::MetricsCollector;
use crate::clients::DocumentStoreClient;
use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::parser::DocumentParser;
use crate::publisher::PublishOrchestrator;
use crate::storage::{Database, SharedDatabase};
use crate::types::Result;
use crate::vault::CredentialVault;

/// Optional CMS drivers supplied by the embedding deployment. The crate
/// ships the publishing orchestration; the transports (headless browser,
/// computer-use runtime) are plug-ins.
#[derive(Default)]
pub struct CmsDrivers {
    pub browser: Option<Arc<dyn crate::clients::CmsBrowser>>,
    pub agent: Option<Arc<dyn crate::clients::ComputerUseClient>>,
}

/// Wire the orchestrator from configuration plus the deployment's
/// document store and CMS drivers.
pub fn build_orchestrator(
    config: Config,
    store: Arc<dyn DocumentStoreClient>,
    drivers: CmsDrivers,
) -> Result<Arc<Orchestrator>> {
    let db: SharedDatabase = Arc::new(Database::open(&config.storage.database_path)?);
    let metrics = Arc::new(MetricsCollector::new());

    // The LLM provider is optional: without it the parser runs heuristics
    // only and optimization is skipped.
    let provider = if config.parser.use_ai {
        match crate::ai::create_provider(&config.llm) {
            Ok(provider) => Some(provider),
            Err(err) => {
                tracing::warn!(error = %err, "LLM provider unavailable, running heuristics only");
                None
            }
        }
    } else {
        None
    };

    let parser = DocumentParser::new(provider.clone(), config.parser.clone());
    let optimizer = provider.map(|p| {
        crate::optimizer::OptimizationEngine::new(
            p,
            config.optimization.max_cost_usd,
            metrics.clone(),
        )
    });

    let screenshot_store = crate::publisher::create_store(&config.storage)?;
    let mut providers: std::collections::HashMap<
        crate::types::PublishProviderKind,
        Arc<dyn crate::publisher::PublishProvider>,
    > = std::collections::HashMap::new();

    if let Some(browser) = drivers.browser.clone() {
        let selectors = match &config.publisher.selector_file {
            Some(path) => crate::publisher::SelectorMap::load(path)?,
            None => {
                return Err(crate::types::PressError::Config(
                    "publisher.selector_file is required for the browser provider".to_string(),
                ));
            }
        };
        let browser_provider = crate::publisher::BrowserProvider::new(
            browser.clone(),
            selectors.clone(),
            screenshot_store.clone(),
        );
        providers.insert(
            crate::types::PublishProviderKind::Playwright,
            Arc::new(crate::publisher::BrowserProvider::new(
                browser,
                selectors,
                screenshot_store.clone(),
            )),
        );
        if let Some(agent) = drivers.agent.clone() {
            let agent_provider = crate::publisher::ComputerUseProvider::new(
                agent,
                screenshot_store.clone(),
            );
            providers.insert(
                crate::types::PublishProviderKind::Hybrid,
                Arc::new(crate::publisher::HybridProvider::new(
                    browser_provider,
                    agent_provider,
                )),
            );
        }
    }
    if let Some(agent) = drivers.agent {
        providers.insert(
            crate::types::PublishProviderKind::ComputerUse,
            Arc::new(crate::publisher::ComputerUseProvider::new(
                agent,
                screenshot_store,
            )),
        );
    }
    if providers.is_empty() {
        tracing::warn!(
            "no CMS drivers registered; publish jobs will fail until the deployment supplies them"
        );
    }

    let publisher = PublishOrchestrator::new(
        db.clone(),
        providers,
        config.publisher.provider,
        config.publisher.max_retries,
        std::time::Duration::from_secs(config.publisher.total_timeout_seconds),
    );

    let vault = Arc::new(CredentialVault::from_config(&config.credentials)?);

    Ok(Arc::new(Orchestrator::new(
        db,
        config,
        parser,
        optimizer,
        publisher,
        vault,
        store,
        metrics,
    )))
}

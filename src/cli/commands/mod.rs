//! Operator Commands

pub mod config;
pub mod init;
pub mod ruleset;
pub mod run;
pub mod status;
pub mod sync;
pub mod worklist;

use std::sync::Arc;

use crate::clients::LocalFolderStore;
use crate::config::{Config, ConfigLoader};
use crate::orchestrator::Orchestrator;
use crate::types::Result;

/// Load config and wire the orchestrator for CLI use. The CLI runs
/// against the local-folder document store; shared-drive transports and
/// CMS drivers are registered by the embedding deployment.
pub(crate) fn bootstrap() -> Result<(Config, Arc<Orchestrator>)> {
    let config = ConfigLoader::load()?;
    let store = Arc::new(LocalFolderStore::new("."));
    let orchestrator =
        super::build_orchestrator(config.clone(), store, super::CmsDrivers::default())?;
    Ok((config, orchestrator))
}

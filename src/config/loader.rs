//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/pressroom/config.toml)
//! 3. Project config (.pressroom/config.toml)
//! 4. Environment variables (PRESSROOM_* prefix, `__` nests sections)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{PressError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // Double underscore nests sections without mangling snake_case
        // field names: PRESSROOM_PUBLISHER__MAX_RETRIES -> publisher.max_retries
        figment = figment.merge(Env::prefixed("PRESSROOM_").split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| PressError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| PressError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/pressroom/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(|p| PathBuf::from(p).join("pressroom"))
            .or_else(|| {
                directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("pressroom"))
            })
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".pressroom/config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".pressroom")
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize project configuration and data directories
    pub fn init_project(force: bool) -> Result<PathBuf> {
        let project_dir = Self::project_dir();

        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(project_dir.join("screenshots"))?;
        fs::create_dir_all(project_dir.join("reports"))?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_project_config())?;
            info!("Created project config: {}", config_path.display());
        } else {
            info!("Project config exists: {}", config_path.display());
        }

        let selector_path = project_dir.join("selectors.toml");
        if !selector_path.exists() || force {
            fs::write(&selector_path, Self::default_selector_config())?;
            info!("Created selector map: {}", selector_path.display());
        }

        Ok(project_dir)
    }

    /// Check if project is initialized
    pub fn is_project_initialized() -> bool {
        Self::project_dir().exists()
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Generate default project config content (TOML)
    fn default_project_config() -> String {
        r#"# Pressroom Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[parser]
use_ai = true
heuristic_fallback = true

[optimization]
max_cost_usd = 0.50

[proofreading]
# Offset window (chars) for carrying decisions across a re-analysis.
carry_offset_tolerance = 20

[orchestrator]
sync_interval_seconds = 60
sync_folder = "articles"
auto_process = "off"

[orchestrator.workers]
parse = 4
proofread = 4
publish = 2

[publisher]
provider = "hybrid"
max_retries = 3
step_timeout_seconds = 15
total_timeout_seconds = 600
selector_file = ".pressroom/selectors.toml"

[credentials]
backend = "env_file"
path = ".pressroom/credentials.env"

[storage]
database_path = ".pressroom/pressroom.db"
screenshots = "local_fs"
directory = ".pressroom/screenshots"

[llm]
provider = "openai"
timeout_secs = 60
temperature = 0.0
"#
        .to_string()
    }

    /// Generate the default CMS selector map (TOML)
    fn default_selector_config() -> String {
        r##"# CMS selector map for the browser publishing provider.
# Edit when the CMS UI changes; no rebuild required.

[login]
username = "#user_login"
password = "#user_pass"
submit = "#wp-submit"

[compose]
new_post = "a.page-title-action"
title = "#title"
body = "#content"
save_draft = "#save-post"
saved_indicator = "#message.updated"

[seo]
meta_description = "#yoast_wpseo_metadesc"
tags = "#new-tag-post_tag"

[media]
add_media = "#insert-media-button"
upload_input = "input[type=file]"
"##
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_missing_file_uses_defaults_and_fails_validation() {
        // Defaults omit carry_offset_tolerance, so validation must reject.
        let err = ConfigLoader::load_from_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("carry_offset_tolerance"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, ConfigLoader::default_project_config()).unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.proofreading.carry_offset_tolerance, Some(20));
        assert_eq!(config.orchestrator.workers.publish, 2);
    }

    #[test]
    fn test_default_project_config_parses() {
        let config: Config = toml::from_str(&ConfigLoader::default_project_config()).unwrap();
        assert!(config.validate().is_ok());
    }
}

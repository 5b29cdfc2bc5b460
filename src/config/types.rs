//! Configuration Types
//!
//! Closed configuration record with enumerated recognized options.
//! Unknown keys are rejected at extraction. Supports global
//! (~/.config/pressroom/) and project (.pressroom/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants;
use crate::types::PublishProviderKind;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Document parser settings
    pub parser: ParserConfig,

    /// Optimization engine settings
    pub optimization: OptimizationConfig,

    /// Proofreading engine settings
    pub proofreading: ProofreadingConfig,

    /// Worklist orchestrator settings
    pub orchestrator: OrchestratorConfig,

    /// Publishing settings
    pub publisher: PublisherConfig,

    /// Credential vault settings
    pub credentials: CredentialsConfig,

    /// Artifact storage settings
    pub storage: StorageConfig,

    /// LLM provider settings
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            parser: ParserConfig::default(),
            optimization: OptimizationConfig::default(),
            proofreading: ProofreadingConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            publisher: PublisherConfig::default(),
            credentials: CredentialsConfig::default(),
            storage: StorageConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `PressError::Config` on validation failure.
    pub fn validate(&self) -> crate::types::Result<()> {
        use crate::types::PressError;

        if self.optimization.max_cost_usd <= 0.0 {
            return Err(PressError::Config(format!(
                "optimization.max_cost_usd must be positive, got {}",
                self.optimization.max_cost_usd
            )));
        }

        // The carry-forward window has no safe default; analyses cannot be
        // re-run without it.
        if self.proofreading.carry_offset_tolerance.is_none() {
            return Err(PressError::Config(
                "proofreading.carry_offset_tolerance is required (recommended: 20)".to_string(),
            ));
        }

        if self.orchestrator.sync_interval_seconds == 0 {
            return Err(PressError::Config(
                "orchestrator.sync_interval_seconds must be greater than 0".to_string(),
            ));
        }

        let workers = &self.orchestrator.workers;
        if workers.parse == 0 || workers.proofread == 0 || workers.publish == 0 {
            return Err(PressError::Config(
                "orchestrator.workers pool sizes must be greater than 0".to_string(),
            ));
        }

        if self.publisher.step_timeout_seconds == 0
            || self.publisher.total_timeout_seconds < self.publisher.step_timeout_seconds
        {
            return Err(PressError::Config(
                "publisher timeouts must be positive and total >= step".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(PressError::Config(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(PressError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.credentials.validate()?;
        self.storage.validate()?;

        Ok(())
    }
}

// =============================================================================
// Parser Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Enable the AI-primary strategy
    pub use_ai: bool,
    /// Run the heuristic strategy when the AI strategy fails
    pub heuristic_fallback: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            use_ai: true,
            heuristic_fallback: true,
        }
    }
}

// =============================================================================
// Optimization Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizationConfig {
    /// Hard per-article AI spend cap (USD)
    pub max_cost_usd: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_cost_usd: constants::budget::DEFAULT_ARTICLE_CAP_CENTS as f64 / 100.0,
        }
    }
}

// =============================================================================
// Proofreading Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProofreadingConfig {
    /// Which ruleset analyses bind to; absent = the active published one
    pub active_ruleset_id: Option<i64>,
    /// Offset window (chars) for carrying decisions across a re-analysis.
    /// Required; there is intentionally no default.
    pub carry_offset_tolerance: Option<usize>,
}

// =============================================================================
// Orchestrator Configuration
// =============================================================================

/// Auto-process policy. Never global: even `per_item_flag_only` requires
/// the individual item to carry the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoProcessPolicy {
    #[default]
    Off,
    PerItemFlagOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerPools {
    pub parse: usize,
    pub proofread: usize,
    pub publish: usize,
}

impl Default for WorkerPools {
    fn default() -> Self {
        Self {
            parse: constants::orchestrator::DEFAULT_PARSE_WORKERS,
            proofread: constants::orchestrator::DEFAULT_PROOFREAD_WORKERS,
            publish: constants::orchestrator::DEFAULT_PUBLISH_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Document-store poll cadence (seconds)
    pub sync_interval_seconds: u64,
    /// Document-store folder to watch
    pub sync_folder: String,
    /// Worker pool sizes per stage
    pub workers: WorkerPools,
    /// Review-gate skipping policy
    pub auto_process: AutoProcessPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            sync_interval_seconds: constants::orchestrator::DEFAULT_SYNC_INTERVAL_SECS,
            sync_folder: "articles".to_string(),
            workers: WorkerPools::default(),
            auto_process: AutoProcessPolicy::Off,
        }
    }
}

// =============================================================================
// Publisher Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublisherConfig {
    /// Default provider when the operator doesn't specify one
    pub provider: PublishProviderKind,
    pub max_retries: u32,
    pub step_timeout_seconds: u64,
    pub total_timeout_seconds: u64,
    /// CSS selector map for the browser provider; tolerates CMS UI changes
    /// without a rebuild
    pub selector_file: Option<PathBuf>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            provider: PublishProviderKind::Hybrid,
            max_retries: constants::publish::DEFAULT_MAX_RETRIES,
            step_timeout_seconds: constants::timeout::BROWSER_STEP_SECS,
            total_timeout_seconds: constants::timeout::FULL_PUBLISH_SECS,
            selector_file: None,
        }
    }
}

// =============================================================================
// Credentials Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackendKind {
    #[default]
    EnvFile,
    CloudSecretManager,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    pub backend: CredentialBackendKind,
    /// env_file backend: path to the key=value file
    pub path: Option<PathBuf>,
    /// cloud backend: project, secret name, region
    pub project_id: Option<String>,
    pub secret_name: Option<String>,
    pub region: Option<String>,
    /// Per-key cache TTL (seconds)
    pub cache_ttl_seconds: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            backend: CredentialBackendKind::EnvFile,
            path: None,
            project_id: None,
            secret_name: None,
            region: None,
            cache_ttl_seconds: constants::vault::DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl CredentialsConfig {
    fn validate(&self) -> crate::types::Result<()> {
        use crate::types::PressError;
        match self.backend {
            CredentialBackendKind::EnvFile => {
                if self.path.is_none() {
                    return Err(PressError::Config(
                        "credentials.path is required for the env_file backend".to_string(),
                    ));
                }
            }
            CredentialBackendKind::CloudSecretManager => {
                if self.project_id.is_none() || self.secret_name.is_none() {
                    return Err(PressError::Config(
                        "credentials.project_id and credentials.secret_name are required for the cloud_secret_manager backend"
                            .to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenshotBackendKind {
    #[default]
    LocalFs,
    ObjectStore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Database file path
    pub database_path: PathBuf,
    /// Screenshot storage backend
    pub screenshots: ScreenshotBackendKind,
    /// local_fs backend: directory
    pub directory: Option<PathBuf>,
    /// object_store backend: bucket
    pub bucket: Option<String>,
    /// Operator knob: sweep screenshots older than this many days.
    /// Absent = retain indefinitely.
    pub screenshot_retention_days: Option<u32>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(".pressroom/pressroom.db"),
            screenshots: ScreenshotBackendKind::LocalFs,
            directory: Some(PathBuf::from(".pressroom/screenshots")),
            bucket: None,
            screenshot_retention_days: None,
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> crate::types::Result<()> {
        use crate::types::PressError;
        match self.screenshots {
            ScreenshotBackendKind::LocalFs => {
                if self.directory.is_none() {
                    return Err(PressError::Config(
                        "storage.directory is required for the local_fs backend".to_string(),
                    ));
                }
            }
            ScreenshotBackendKind::ObjectStore => {
                if self.bucket.is_none() {
                    return Err(PressError::Config(
                        "storage.bucket is required for the object_store backend".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// Provider type: "openai" (chat-completions compatible)
    pub provider: String,
    pub model: Option<String>,
    pub timeout_secs: u64,
    /// 0.0 pins parsing and optimization output as far as the API allows
    pub temperature: f32,
    /// Deterministic seed, forwarded when the provider supports it
    pub seed: Option<u64>,
    pub api_base: Option<String>,
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            timeout_secs: crate::constants::timeout::AI_CALL_SECS,
            temperature: 0.0,
            seed: Some(0),
            api_base: None,
            max_tokens: 8192,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.proofreading.carry_offset_tolerance = Some(20);
        config.credentials.path = Some(PathBuf::from("credentials.env"));
        config
    }

    #[test]
    fn test_default_config_requires_carry_tolerance() {
        let mut config = Config::default();
        config.credentials.path = Some(PathBuf::from("credentials.env"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("carry_offset_tolerance"));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_cloud_backend_requires_project_and_secret() {
        let mut config = valid_config();
        config.credentials.backend = CredentialBackendKind::CloudSecretManager;
        config.credentials.project_id = None;
        assert!(config.validate().is_err());

        config.credentials.project_id = Some("proj".into());
        config.credentials.secret_name = Some("pressroom-secrets".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_object_store_requires_bucket() {
        let mut config = valid_config();
        config.storage.screenshots = ScreenshotBackendKind::ObjectStore;
        config.storage.bucket = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = valid_config();
        config.orchestrator.workers.publish = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_ordering_enforced() {
        let mut config = valid_config();
        config.publisher.step_timeout_seconds = 120;
        config.publisher.total_timeout_seconds = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let toml = r#"
            version = "1.0"
            [publisher]
            provider = "hybrid"
            frobnicate = true
        "#;
        let result: std::result::Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_auto_process_defaults_off() {
        assert_eq!(
            Config::default().orchestrator.auto_process,
            AutoProcessPolicy::Off
        );
    }
}

//! Configuration
//!
//! Closed configuration record (unknown keys rejected) with figment-based
//! loading: defaults → global TOML → project TOML → environment.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AutoProcessPolicy, Config, CredentialBackendKind, CredentialsConfig, LlmConfig,
    OptimizationConfig, OrchestratorConfig, ParserConfig, ProofreadingConfig, PublisherConfig,
    ScreenshotBackendKind, StorageConfig, WorkerPools,
};

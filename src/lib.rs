//! Pressroom - Editorial Pipeline and CMS Publishing Orchestrator
//!
//! Ingests long-form articles from a shared document store, runs each one
//! through a multi-stage preparation pipeline (structured parsing → AI
//! optimization → proofreading → human review → publication), and drives
//! a target CMS to produce a published draft.
//!
//! ## Core Features
//!
//! - **Worklist State Machine**: fixed status lanes with guarded
//!   transitions under concurrent operators
//! - **Two-Strategy Parsing**: AI-primary extraction with a deterministic
//!   heuristic fallback
//! - **Single-Call Optimization**: titles, SEO tiers, meta description,
//!   tags, and FAQs from one cost-bounded model call
//! - **Versioned Proofreading**: rule engine, decision merge, and
//!   carry-forward across re-analyses
//! - **At-Most-Once Publishing**: durable tasks, bounded retries, and
//!   prior-draft adoption against the CMS
//!
//! ## Quick Start
//!
//! ```ignore
//! use pressroom::cli::{CmsDrivers, build_orchestrator};
//! use pressroom::clients::LocalFolderStore;
//! use pressroom::config::ConfigLoader;
//!
//! let config = ConfigLoader::load()?;
//! let store = std::sync::Arc::new(LocalFolderStore::new("."));
//! let orchestrator = build_orchestrator(config, store, CmsDrivers::default())?;
//! let workers = orchestrator.clone().start_workers().await;
//! ```
//!
//! ## Modules
//!
//! - [`orchestrator`]: worklist state machine, worker pools, sync
//! - [`parser`]: document parsing and HTML sanitization
//! - [`optimizer`]: single-call AI optimization with cost caps
//! - [`proofread`]: rule engine, decision merge, ruleset lifecycle
//! - [`publisher`]: CMS providers and at-most-once task orchestration
//! - [`vault`]: credential access with pluggable backends
//! - [`storage`]: SQLite persistence with connection pooling

pub mod ai;
pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod optimizer;
pub mod orchestrator;
pub mod parser;
pub mod proofread;
pub mod publisher;
pub mod storage;
pub mod types;
pub mod vault;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::{ErrorCategory, PressError, Result, ResultExt};

// Storage
pub use storage::{Database, PoolConfig, SharedDatabase};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use orchestrator::{CancellationToken, DocumentStoreSync, Job, Orchestrator, SyncReport};
pub use parser::{DocumentParser, ParsedArticle, ParsingResult};
pub use publisher::{PublishOrchestrator, PublishProvider};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    CostBudget,
    LlmProvider,
    LlmResponse,
    MetricsCollector,
    SharedProvider,
    TimeoutConfig,
    TokenUsage,
    with_timeout,
};

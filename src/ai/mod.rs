//! AI Layer
//!
//! LLM provider abstraction, cost budgeting, retry/timeout policy, output
//! validation, and prompt templates.
//!
//! ## Modules
//!
//! - `provider`: LlmProvider trait and response types
//! - `openai`: OpenAI-compatible chat-completions provider
//! - `budget`: per-article USD spend cap
//! - `retry`: timeouts and exponential backoff
//! - `validation`: JSON extraction from model output
//! - `metrics`: process-wide usage aggregation
//! - `prompt`: plug-in prompt templates

pub mod budget;
pub mod metrics;
mod openai;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod validation;

pub use budget::{CostBudget, usd_to_cents};
pub use metrics::{MetricsCollector, MetricsSummary};
pub use openai::OpenAiProvider;
pub use provider::{
    LlmProvider, LlmResponse, ResponseMetadata, ResponseTiming, SharedProvider, TokenUsage,
    create_provider,
};
pub use retry::{TimeoutConfig, retry_transient, standard_backoff, with_timeout};
pub use validation::{extract_json_from_response, require_fields};

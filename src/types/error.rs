//! Unified Error Type System
//!
//! Centralized error types for the entire pipeline.
//! Provides behavior-based error classification for retry and escalation
//! decisions.
//!
//! ## Error Categories
//!
//! - **Transient**: Temporary issues that may resolve (retry with backoff)
//! - **RateLimit**: Upstream rate limiting (wait and retry)
//! - **InvalidData**: Upstream data violates the contract (surface, don't retry)
//! - **Auth**: Credential missing or rejected (fail fast)
//! - **Network**: Connectivity issues (retry with backoff)
//! - **CostCap**: Per-article AI spend cap reached (operator override only)
//!
//! ## Design Principles
//!
//! - Single unified error type (PressError) for the entire application
//! - Structured error variants with context for better debugging
//! - Category-based routing for retry and escalation decisions
//! - No panic/unwrap - all errors are recoverable

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Behavior-based error categories for retry and escalation routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Temporary upstream issue (5xx, overloaded) - retry with backoff
    Transient,
    /// Network/connectivity issue - retry with backoff
    Network,
    /// Upstream data violates the contract - surface to operator, no retry
    InvalidData,
    /// Credential missing or rejected - fail fast, operator must fix
    Auth,
    /// Per-article AI cost cap reached - manual override only
    CostCap,
    /// Internal consistency check failed - no retry, correlation id logged
    Invariant,
    /// Invalid operator request (bad transition, missing field) - reject at boundary
    BadRequest,
    /// Concurrent modification lost the race - caller re-reads and re-submits
    StaleState,
    /// Unknown error - conservative retry
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Network => write!(f, "NETWORK"),
            Self::InvalidData => write!(f, "INVALID_DATA"),
            Self::Auth => write!(f, "AUTH"),
            Self::CostCap => write!(f, "COST_CAP"),
            Self::Invariant => write!(f, "INVARIANT"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::StaleState => write!(f, "STALE_STATE"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is retryable with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Transient | Self::Network)
    }

    /// Check if this category requires operator intervention before retry
    pub fn needs_operator(&self) -> bool {
        matches!(
            self,
            Self::InvalidData | Self::Auth | Self::CostCap | Self::Invariant
        )
    }

    /// Get recommended retry delay for this category
    pub fn recommended_delay(&self) -> Duration {
        match self {
            Self::RateLimit => Duration::from_secs(30),
            Self::Network => Duration::from_secs(5),
            Self::Transient => Duration::from_secs(2),
            _ => Duration::from_millis(500),
        }
    }
}

// =============================================================================
// External Call Error
// =============================================================================

/// Error from an outbound call (AI model, document store, CMS) with
/// category, origin, and retry hints
#[derive(Debug, Clone)]
pub struct ExternalError {
    /// Error category for routing decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// System that produced the error ("llm", "document_store", "cms", ...)
    pub origin: Option<String>,
    /// Suggested wait time before retry (if applicable)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for ExternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(origin) = &self.origin {
            write!(f, "[{}:{}] {}", origin, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for ExternalError {}

impl ExternalError {
    /// Create a new external error
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            origin: None,
            retry_after: None,
        }
    }

    /// Create error with origin context
    pub fn with_origin(
        category: ErrorCategory,
        message: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            origin: Some(origin.into()),
            retry_after: None,
        }
    }

    /// Add origin context to existing error
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    /// Check if error is retryable with backoff
    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    /// Get recommended retry delay
    pub fn recommended_delay(&self) -> Duration {
        self.retry_after
            .unwrap_or_else(|| self.category.recommended_delay())
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Classifier mapping raw failures from any external system onto categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any origin
    pub fn classify(message: &str, origin: &str) -> ExternalError {
        let lower = message.to_lowercase();

        // Rate limiting patterns
        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return ExternalError::with_origin(ErrorCategory::RateLimit, message, origin)
                .retry_after(Duration::from_secs(30));
        }

        // Authentication patterns
        if lower.contains("auth")
            || lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("invalid key")
            || lower.contains("unauthorized")
            || lower.contains("permission denied")
        {
            return ExternalError::with_origin(ErrorCategory::Auth, message, origin);
        }

        // Network patterns
        if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("unreachable")
        {
            return ExternalError::with_origin(ErrorCategory::Network, message, origin)
                .retry_after(Duration::from_secs(5));
        }

        // Transient server-side patterns
        if lower.contains("503")
            || lower.contains("502")
            || lower.contains("500")
            || lower.contains("service unavailable")
            || lower.contains("server error")
            || lower.contains("internal error")
            || lower.contains("overloaded")
            || lower.contains("temporary")
        {
            return ExternalError::with_origin(ErrorCategory::Transient, message, origin)
                .retry_after(Duration::from_secs(2));
        }

        // Contract violation patterns
        if lower.contains("schema")
            || lower.contains("malformed")
            || lower.contains("invalid")
            || lower.contains("parse")
            || lower.contains("unexpected token")
        {
            return ExternalError::with_origin(ErrorCategory::InvalidData, message, origin);
        }

        ExternalError::with_origin(ErrorCategory::Unknown, message, origin)
    }

    /// Classify HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16, message: &str, origin: &str) -> ExternalError {
        match status {
            429 => ExternalError::with_origin(ErrorCategory::RateLimit, message, origin)
                .retry_after(Duration::from_secs(30)),
            401 | 403 => ExternalError::with_origin(ErrorCategory::Auth, message, origin),
            400 | 422 => ExternalError::with_origin(ErrorCategory::InvalidData, message, origin),
            500 | 502 | 503 | 504 => {
                ExternalError::with_origin(ErrorCategory::Transient, message, origin)
                    .retry_after(Duration::from_secs(5))
            }
            _ => ExternalError::with_origin(ErrorCategory::Unknown, message, origin),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum PressError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // External Call Errors
    // -------------------------------------------------------------------------
    /// Structured external error with category and retry hints
    #[error("External error: {0}")]
    External(ExternalError),

    /// Operation timeout with context
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    /// A worklist transition outside the adjacency graph was requested
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Concurrent modification lost the race; caller must re-read
    #[error("Stale state: {0}")]
    StaleState(String),

    /// Parsing failed after both strategies
    #[error("Parse failed for document {document_id}: {message}")]
    ParseFailed { document_id: String, message: String },

    /// AI generation failed without producing usable output
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Per-article AI spend would exceed the configured cap
    #[error("Cost cap exceeded: spent {spent_cents}c of {cap_cents}c cap")]
    CostCapExceeded { spent_cents: u64, cap_cents: u64 },

    /// A proofreading rule pattern crashed at runtime
    #[error("Rule {rule_code} failed: {message}")]
    RuleRuntime { rule_code: String, message: String },

    /// Internal consistency check failed
    #[error("Invariant violation [{correlation_id}]: {message}")]
    Invariant {
        correlation_id: String,
        message: String,
    },

    /// Publish attempt failed after exhausting providers
    #[error("Publish failed at step '{step}': {message}")]
    PublishFailed { step: String, message: String },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Credential vault unavailable: {0}")]
    VaultUnavailable(String),

    #[error("Credential missing: {0}")]
    CredentialMissing(String),

    #[error("{0}")]
    Sanitizer(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl From<ExternalError> for PressError {
    fn from(err: ExternalError) -> Self {
        PressError::External(err)
    }
}

pub type Result<T> = std::result::Result<T, PressError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl PressError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create an invariant-violation error with a fresh correlation id
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            message: message.into(),
        }
    }

    /// Create an external error with category
    pub fn external(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::External(ExternalError::new(category, message))
    }

    /// The category this error routes under
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::External(e) => e.category,
            Self::Timeout { .. } | Self::Io(_) => ErrorCategory::Network,
            Self::CostCapExceeded { .. } => ErrorCategory::CostCap,
            Self::InvalidTransition { .. } => ErrorCategory::BadRequest,
            Self::StaleState(_) => ErrorCategory::StaleState,
            Self::ParseFailed { .. } | Self::GenerationFailed(_) | Self::Sanitizer(_) => {
                ErrorCategory::InvalidData
            }
            Self::Invariant { .. } => ErrorCategory::Invariant,
            Self::VaultUnavailable(_) => ErrorCategory::Transient,
            Self::CredentialMissing(_) => ErrorCategory::Auth,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Check if this error is recoverable by retrying with backoff
    pub fn is_recoverable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Short, action-oriented message for the operator UI. Never contains
    /// credentials, raw bodies, or stack traces.
    pub fn operator_message(&self) -> String {
        match self {
            Self::CostCapExceeded { cap_cents, .. } => format!(
                "optimization aborted: cost cap reached at ${:.2}; raise cap or simplify article",
                *cap_cents as f64 / 100.0
            ),
            Self::StaleState(_) => {
                "another operator changed this item; refresh and re-submit".to_string()
            }
            Self::CredentialMissing(key) => {
                format!("credential '{key}' missing; fix credentials before retry")
            }
            Self::Timeout { operation, .. } => format!("{operation} timed out; retry or escalate"),
            Self::ParseFailed { message, .. } => format!("parsing failed: {message}"),
            other => other.to_string(),
        }
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| PressError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| PressError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::CostCap.to_string(), "COST_CAP");
        assert_eq!(ErrorCategory::StaleState.to_string(), "STALE_STATE");
    }

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::InvalidData.is_retryable());
        assert!(!ErrorCategory::CostCap.is_retryable());
    }

    #[test]
    fn test_error_category_needs_operator() {
        assert!(ErrorCategory::Auth.needs_operator());
        assert!(ErrorCategory::CostCap.needs_operator());
        assert!(ErrorCategory::Invariant.needs_operator());
        assert!(!ErrorCategory::Transient.needs_operator());
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = ErrorClassifier::classify("Rate limit exceeded, slow down", "llm");
        assert_eq!(err.category, ErrorCategory::RateLimit);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_auth() {
        let err = ErrorClassifier::classify("Invalid API key provided", "llm");
        assert_eq!(err.category, ErrorCategory::Auth);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_classify_network() {
        let err = ErrorClassifier::classify("Connection timed out after 30s", "document_store");
        assert_eq!(err.category, ErrorCategory::Network);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_http_status() {
        let rate_limit = ErrorClassifier::classify_http_status(429, "Rate limited", "llm");
        assert_eq!(rate_limit.category, ErrorCategory::RateLimit);

        let auth = ErrorClassifier::classify_http_status(401, "Unauthorized", "cms");
        assert_eq!(auth.category, ErrorCategory::Auth);

        let transient = ErrorClassifier::classify_http_status(503, "Unavailable", "llm");
        assert_eq!(transient.category, ErrorCategory::Transient);
        assert!(transient.is_retryable());
    }

    #[test]
    fn test_press_error_category_routing() {
        let err = PressError::CostCapExceeded {
            spent_cents: 52,
            cap_cents: 50,
        };
        assert_eq!(err.category(), ErrorCategory::CostCap);
        assert!(!err.is_recoverable());

        let stale = PressError::StaleState("decision superseded".into());
        assert_eq!(stale.category(), ErrorCategory::StaleState);
    }

    #[test]
    fn test_operator_message_never_leaks_detail() {
        let err = PressError::CostCapExceeded {
            spent_cents: 50,
            cap_cents: 50,
        };
        let msg = err.operator_message();
        assert!(msg.contains("cost cap"));
        assert!(msg.contains("$0.50"));
    }

    #[test]
    fn test_invariant_has_correlation_id() {
        let err = PressError::invariant("decision references missing issue");
        if let PressError::Invariant { correlation_id, .. } = &err {
            assert!(!correlation_id.is_empty());
        } else {
            panic!("expected invariant variant");
        }
    }

    #[test]
    fn test_external_error_display() {
        let err = ExternalError::with_origin(ErrorCategory::RateLimit, "Too many requests", "llm");
        assert_eq!(err.to_string(), "[llm:RATE_LIMIT] Too many requests");
    }
}

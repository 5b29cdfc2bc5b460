//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Retry/backoff constants for transient external failures
pub mod retry {
    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 2_000;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;

    /// Maximum attempts for a transient failure
    pub const MAX_ATTEMPTS: usize = 3;

    /// Jitter applied to each delay, as a fraction of the delay
    pub const JITTER_FRACTION: f64 = 0.25;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;
}

/// AI cost budget constants (USD, tracked in integer cents)
pub mod budget {
    /// Nominal per-article optimization spend (cents)
    pub const NOMINAL_ARTICLE_CENTS: u64 = 10;

    /// Hard per-article cap unless configured otherwise (cents)
    pub const DEFAULT_ARTICLE_CAP_CENTS: u64 = 50;

    /// Warning threshold (fraction of cap)
    pub const WARNING_THRESHOLD: f64 = 0.75;
}

/// Document parser constants
pub mod parser {
    /// Confidence declared by the AI parsing strategy on success
    pub const AI_CONFIDENCE: f32 = 0.95;

    /// Confidence declared by the heuristic parsing strategy
    pub const HEURISTIC_CONFIDENCE: f32 = 0.70;

    /// Minimum body length for a successful parse (bytes)
    pub const MIN_BODY_BYTES: usize = 100;

    /// Substantive-paragraph bounds for title fallback (chars)
    pub const TITLE_PARA_MIN_CHARS: usize = 10;
    pub const TITLE_PARA_MAX_CHARS: usize = 200;

    /// Meta description target length (chars)
    pub const META_DESCRIPTION_MIN_CHARS: usize = 150;
    pub const META_DESCRIPTION_MAX_CHARS: usize = 160;

    /// Keyword extraction bounds
    pub const MIN_KEYWORDS: usize = 5;
    pub const MAX_KEYWORDS: usize = 10;

    /// A first paragraph with more than this fraction of non-body tokens
    /// is treated as metadata and dropped
    pub const METADATA_TOKEN_FRACTION: f64 = 0.5;
}

/// Worklist orchestrator constants
pub mod orchestrator {
    /// Default document-store poll cadence (seconds)
    pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

    /// Default worker pool sizes per stage
    pub const DEFAULT_PARSE_WORKERS: usize = 4;
    pub const DEFAULT_PROOFREAD_WORKERS: usize = 4;
    pub const DEFAULT_PUBLISH_WORKERS: usize = 2;

    /// Dispatch queue depth, as a multiple of pool size
    pub const QUEUE_DEPTH_FACTOR: usize = 4;
}

/// Per-operation timeouts (seconds)
pub mod timeout {
    /// Single AI call
    pub const AI_CALL_SECS: u64 = 60;

    /// Document-store fetch
    pub const DOCUMENT_FETCH_SECS: u64 = 30;

    /// One CMS browser step
    pub const BROWSER_STEP_SECS: u64 = 15;

    /// A full publish attempt, wall clock
    pub const FULL_PUBLISH_SECS: u64 = 600;
}

/// Publishing constants
pub mod publish {
    /// Default bounded retries per publish task
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Selector retry count before the browser provider declares a step failed
    pub const SELECTOR_MAX_TRIES: u32 = 3;

    /// Window for adopting a draft created by a prior attempt (seconds)
    pub const ADOPTION_WINDOW_SECS: i64 = 300;

    /// Approximate cost of one AI-agent publish (cents)
    pub const AGENT_COST_CENTS: u64 = 20;
}

/// Credential vault constants
pub mod vault {
    /// Default per-key cache TTL (seconds)
    pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

    /// Typical upper bound for a cloud backend fetch (milliseconds)
    pub const CLOUD_FETCH_BUDGET_MS: u64 = 500;
}

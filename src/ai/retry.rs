//! Timeouts and Retry Policy
//!
//! Every outbound network call is a suspension point with a per-operation
//! timeout. Transient failures retry with exponential backoff and jitter;
//! categories that need an operator never retry.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::constants::retry as retry_constants;
use crate::types::{PressError, Result};

/// Per-operation timeouts, defaulted from the stage budget table
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub ai_call: Duration,
    pub document_fetch: Duration,
    pub browser_step: Duration,
    pub full_publish: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        use crate::constants::timeout;
        Self {
            ai_call: Duration::from_secs(timeout::AI_CALL_SECS),
            document_fetch: Duration::from_secs(timeout::DOCUMENT_FETCH_SECS),
            browser_step: Duration::from_secs(timeout::BROWSER_STEP_SECS),
            full_publish: Duration::from_secs(timeout::FULL_PUBLISH_SECS),
        }
    }
}

/// Run a fallible future under a wall-clock timeout
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(PressError::timeout(operation_name, timeout)),
    }
}

/// The standard backoff: initial 2s, factor 2, max 3 attempts, jitter
pub fn standard_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(retry_constants::BASE_DELAY_MS))
        .with_max_delay(Duration::from_secs(retry_constants::MAX_DELAY_SECS))
        .with_factor(retry_constants::BACKOFF_FACTOR)
        .with_max_times(retry_constants::MAX_ATTEMPTS - 1)
        .with_jitter()
}

/// Retry `op` on transient failures with the standard backoff. Errors whose
/// category is not retryable propagate immediately.
pub async fn retry_transient<T, F, Fut>(op: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    op.retry(standard_backoff())
        .when(|err: &PressError| err.is_recoverable())
        .notify(|err, delay| {
            tracing::warn!(
                operation = operation_name,
                error = %err,
                retry_in_ms = delay.as_millis() as u64,
                "transient failure, retrying"
            );
        })
        .await
}

//! AI Usage Metrics
//!
//! Process-wide aggregation of LLM calls, tokens, spend, and latency.
//! Thread-safe for concurrent pipeline stages; counters are atomic and
//! cost is stored in microdollars.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use super::provider::LlmResponse;

/// Thread-safe metrics collector for AI usage
pub struct MetricsCollector {
    start_time: Instant,
    api_calls: AtomicU32,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    total_latency_ms: AtomicU64,
    /// Cost in microdollars for atomic ops
    cost_microusd: AtomicU64,
}

/// Point-in-time metrics summary
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub api_calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost_usd: f64,
    pub avg_latency_ms: u64,
    pub uptime_secs: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            api_calls: AtomicU32::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            cost_microusd: AtomicU64::new(0),
        }
    }

    /// Record one completed LLM response
    pub fn record_response(&self, response: &LlmResponse) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(response.usage.input_tokens as u64, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(response.usage.output_tokens as u64, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(response.timing.total_ms, Ordering::Relaxed);
        self.cost_microusd
            .fetch_add((response.cost_usd * 1e6) as u64, Ordering::Relaxed);
    }

    pub fn summary(&self) -> MetricsSummary {
        let calls = self.api_calls.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);
        MetricsSummary {
            api_calls: calls,
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            total_cost_usd: self.cost_microusd.load(Ordering::Relaxed) as f64 / 1e6,
            avg_latency_ms: if calls > 0 {
                total_latency / calls as u64
            } else {
                0
            },
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{ResponseMetadata, ResponseTiming, TokenUsage};

    fn response(cost_usd: f64, latency_ms: u64) -> LlmResponse {
        LlmResponse::with_metrics(
            serde_json::json!({}),
            TokenUsage::new(100, 50),
            cost_usd,
            ResponseTiming { total_ms: latency_ms },
            ResponseMetadata::default(),
        )
    }

    #[test]
    fn test_record_and_summarize() {
        let metrics = MetricsCollector::new();
        metrics.record_response(&response(0.03, 1200));
        metrics.record_response(&response(0.05, 800));

        let summary = metrics.summary();
        assert_eq!(summary.api_calls, 2);
        assert_eq!(summary.input_tokens, 200);
        assert_eq!(summary.output_tokens, 100);
        assert!((summary.total_cost_usd - 0.08).abs() < 1e-6);
        assert_eq!(summary.avg_latency_ms, 1000);
    }

    #[test]
    fn test_empty_summary() {
        let summary = MetricsCollector::new().summary();
        assert_eq!(summary.api_calls, 0);
        assert_eq!(summary.avg_latency_ms, 0);
    }
}

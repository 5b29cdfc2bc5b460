//! OpenAI API Provider
//!
//! LLM provider using an OpenAI-compatible Chat Completions API.
//! Requests pin temperature and seed for reproducible parsing and
//! optimization output; responses carry token usage which is priced
//! through a static per-model table.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::provider::{LlmProvider, LlmResponse, ResponseMetadata, ResponseTiming, TokenUsage};
use super::validation::extract_json_from_response;
use crate::config::LlmConfig;
use crate::types::{ErrorClassifier, PressError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Per-million-token pricing (input, output) used to derive `cost_usd`.
/// Unknown models fall back to the most expensive known row.
const PRICING_PER_MTOK: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4-turbo", 10.00, 30.00),
];

fn price_usd(model: &str, usage: &TokenUsage) -> f64 {
    let (input_rate, output_rate) = PRICING_PER_MTOK
        .iter()
        .find(|(name, _, _)| model.starts_with(name))
        .map(|(_, i, o)| (*i, *o))
        .unwrap_or((10.00, 30.00));
    (usage.input_tokens as f64 * input_rate + usage.output_tokens as f64 * output_rate) / 1e6
}

/// OpenAI API Provider with secure API key handling
pub struct OpenAiProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    seed: Option<u64>,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("seed", &self.seed)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let api_key_str = std::env::var("OPENAI_API_KEY").map_err(|_| {
            PressError::Config(
                "OpenAI API key not found. Set the OPENAI_API_KEY env var".to_string(),
            )
        })?;

        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                PressError::external(
                    crate::types::ErrorCategory::Network,
                    format!("Failed to create HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            api_key: SecretString::from(api_key_str),
            api_base,
            model,
            temperature: config.temperature,
            seed: config.seed,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn build_request(&self, prompt: &str, schema: &Value) -> ChatCompletionRequest {
        let system_content = if schema.is_null() {
            "You are an editorial content assistant. Always respond with valid JSON.".to_string()
        } else {
            let schema_str = match serde_json::to_string_pretty(schema) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Failed to pretty-print schema, using compact format: {}", e);
                    serde_json::to_string(schema).unwrap_or_else(|_| "{}".to_string())
                }
            };
            format!(
                "You are an editorial content assistant. Always respond with valid JSON matching this schema:\n\n```json\n{}\n```\n\nRespond ONLY with valid JSON, no explanation.",
                schema_str
            )
        };

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_content,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            seed: self.seed,
            max_tokens: Some(self.max_tokens),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        info!(
            model = %self.model,
            temperature = self.temperature,
            "Generating with OpenAI-compatible API"
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt, schema);
        let url = format!("{}/chat/completions", self.api_base);

        debug!("Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                PressError::from(ErrorClassifier::classify(&e.to_string(), "llm"))
            })?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(status, &body, "llm").into());
        }

        let response_body: ChatCompletionResponse = response.json().await.map_err(|e| {
            PressError::GenerationFailed(format!("Failed to parse model response: {}", e))
        })?;

        let usage = response_body
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let content_str = response_body
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| {
                PressError::GenerationFailed("No content in model response".to_string())
            })?;

        debug!("Received model response, extracting JSON");
        let content = extract_json_from_response(content_str)?;

        let cost_usd = price_usd(&self.model, &usage);

        Ok(LlmResponse::with_metrics(
            content,
            usage,
            cost_usd,
            ResponseTiming::from_duration(elapsed),
            ResponseMetadata {
                model: self.model.clone(),
                provider: "openai".to_string(),
            },
        ))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.api_base);

        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                warn!("LLM API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("LLM API check failed: {}", e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_known_model() {
        let usage = TokenUsage::new(1_000_000, 0);
        assert!((price_usd("gpt-4o-mini", &usage) - 0.15).abs() < 1e-9);

        let out = TokenUsage::new(0, 1_000_000);
        assert!((price_usd("gpt-4o-mini", &out) - 0.60).abs() < 1e-9);
    }

    #[test]
    fn test_pricing_unknown_model_uses_ceiling() {
        let usage = TokenUsage::new(1_000_000, 0);
        assert!((price_usd("experimental-x", &usage) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_pricing_prefix_match() {
        // Dated snapshots price as their base model
        let usage = TokenUsage::new(1_000_000, 0);
        assert!((price_usd("gpt-4o-2024-08-06", &usage) - 2.50).abs() < 1e-9);
    }
}

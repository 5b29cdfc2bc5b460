//! Optimization Engine
//!
//! Generates every downstream AI artifact (title variants, SEO keyword
//! tiers, meta description, tags, FAQ set) in a single outbound call to
//! bound cost and latency. Concurrent requests for the same article
//! collapse onto one outstanding call; the rest subscribe to its result.
//!
//! Failure policy: transient errors retry with exponential backoff;
//! schema violations surface as `GenerationFailed` without retry and
//! leave existing suggestions intact. Partial output is acceptable when
//! titles and SEO are present.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::ai::prompt::OPTIMIZE_ARTICLE;
use crate::ai::{
    CostBudget, MetricsCollector, SharedProvider, require_fields, retry_transient, with_timeout,
};
use crate::constants::timeout as timeout_constants;
use crate::types::{
    Article, FaqProposal, KeywordTiers, PressError, Result, TitleParts, TitleSuggestion,
};

// =============================================================================
// Output Types
// =============================================================================

/// SEO artifact bundle
#[derive(Debug, Clone)]
pub struct SeoSuggestions {
    pub keywords: KeywordTiers,
    pub meta_description: String,
    pub meta_reasoning: String,
    pub meta_score: f32,
    pub tags: Vec<String>,
    pub tag_reasoning: String,
}

/// Call-level bookkeeping
#[derive(Debug, Clone)]
pub struct GenerationMetadata {
    pub total_tokens: u32,
    pub total_cost_usd: f64,
    pub duration_ms: u64,
    pub model: String,
}

/// Everything one optimization call produces
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub title_suggestions: Vec<TitleSuggestion>,
    pub seo_suggestions: SeoSuggestions,
    pub faqs: Vec<FaqProposal>,
    pub generation_metadata: GenerationMetadata,
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct WireOptimization {
    title_suggestions: Vec<WireTitle>,
    seo_suggestions: WireSeo,
    #[serde(default)]
    faqs: Vec<WireFaq>,
}

#[derive(Debug, Deserialize)]
struct WireTitle {
    prefix: Option<String>,
    main: String,
    suffix: Option<String>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct WireSeo {
    keywords: WireKeywords,
    meta_description: String,
    #[serde(default)]
    meta_reasoning: String,
    #[serde(default)]
    meta_score: f32,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    tag_reasoning: String,
}

#[derive(Debug, Deserialize)]
struct WireKeywords {
    focus: String,
    #[serde(default)]
    primary: Vec<String>,
    #[serde(default)]
    secondary: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireFaq {
    question: String,
    answer: String,
    #[serde(default)]
    question_type: String,
    #[serde(default)]
    search_intent: String,
    #[serde(default)]
    ai_confidence: f32,
}

fn output_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["title_suggestions", "seo_suggestions"],
        "properties": {
            "title_suggestions": {
                "type": "array", "minItems": 2, "maxItems": 3,
                "items": {
                    "type": "object",
                    "required": ["main"],
                    "properties": {
                        "prefix": {"type": ["string", "null"]},
                        "main": {"type": "string"},
                        "suffix": {"type": ["string", "null"]},
                        "reasoning": {"type": "string"},
                        "confidence": {"type": "number"}
                    }
                }
            },
            "seo_suggestions": {
                "type": "object",
                "required": ["keywords", "meta_description"],
                "properties": {
                    "keywords": {
                        "type": "object",
                        "required": ["focus"],
                        "properties": {
                            "focus": {"type": "string"},
                            "primary": {"type": "array", "minItems": 3, "maxItems": 5},
                            "secondary": {"type": "array", "minItems": 5, "maxItems": 10}
                        }
                    },
                    "meta_description": {"type": "string"},
                    "meta_reasoning": {"type": "string"},
                    "meta_score": {"type": "number", "minimum": 0, "maximum": 1},
                    "tags": {"type": "array", "minItems": 3, "maxItems": 6},
                    "tag_reasoning": {"type": "string"}
                }
            },
            "faqs": {
                "type": "array", "minItems": 8, "maxItems": 10,
                "items": {
                    "type": "object",
                    "required": ["question", "answer"],
                    "properties": {
                        "question": {"type": "string"},
                        "answer": {"type": "string"},
                        "question_type": {"type": "string"},
                        "search_intent": {"type": "string"},
                        "ai_confidence": {"type": "number"}
                    }
                }
            }
        }
    })
}

// =============================================================================
// Engine
// =============================================================================

/// Single-call optimization engine with per-article coalescing
pub struct OptimizationEngine {
    provider: SharedProvider,
    max_cost_usd: f64,
    metrics: Arc<MetricsCollector>,
    /// Per-article slot: mutex serializes callers, the Option holds the
    /// result the in-flight call produced for subscribers
    slots: DashMap<i64, Arc<Mutex<Option<OptimizationResult>>>>,
    /// Per-article budgets, kept across regenerations so total spend is capped
    budgets: DashMap<i64, Arc<CostBudget>>,
}

impl OptimizationEngine {
    pub fn new(
        provider: SharedProvider,
        max_cost_usd: f64,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            provider,
            max_cost_usd,
            metrics,
            slots: DashMap::new(),
            budgets: DashMap::new(),
        }
    }

    /// The spend budget for one article
    pub fn budget(&self, article_id: i64) -> Arc<CostBudget> {
        self.budgets
            .entry(article_id)
            .or_insert_with(|| Arc::new(CostBudget::new(self.max_cost_usd)))
            .clone()
    }

    /// Operator override: raise the cap for one article
    pub fn raise_cap(&self, article_id: i64, new_cap_usd: f64) {
        self.budget(article_id).raise_cap(new_cap_usd);
    }

    /// Generate all optimization artifacts for the article. With
    /// `regenerate = false` a result already produced by a concurrent or
    /// earlier call is returned as-is.
    pub async fn generate_all_optimizations(
        &self,
        article: &Article,
        regenerate: bool,
    ) -> Result<OptimizationResult> {
        let slot = self
            .slots
            .entry(article.id)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut guard = slot.lock().await;

        if !regenerate
            && let Some(existing) = guard.as_ref()
        {
            info!(article_id = article.id, "optimization result reused");
            return Ok(existing.clone());
        }

        let budget = self.budget(article.id);
        budget.check(crate::constants::budget::NOMINAL_ARTICLE_CENTS as f64 / 100.0)?;

        let result = self.call_model(article, &budget).await?;
        *guard = Some(result.clone());
        Ok(result)
    }

    async fn call_model(
        &self,
        article: &Article,
        budget: &CostBudget,
    ) -> Result<OptimizationResult> {
        let start = Instant::now();

        let mut vars = HashMap::new();
        vars.insert("title", article.title.display());
        vars.insert("body_text", article.body_text.clone());
        let prompt = OPTIMIZE_ARTICLE.render(&vars);
        let schema = output_schema();

        let response = retry_transient(
            || async {
                with_timeout(
                    std::time::Duration::from_secs(timeout_constants::AI_CALL_SECS),
                    self.provider.generate(&prompt, &schema),
                    "optimization call",
                )
                .await
            },
            "generate_all_optimizations",
        )
        .await?;

        self.metrics.record_response(&response);

        // The money is spent either way; over-cap output is discarded.
        if let Err(cap_err) = budget.record(response.cost_usd) {
            warn!(
                article_id = article.id,
                cost_usd = response.cost_usd,
                "optimization aborted at cost cap, discarding output"
            );
            return Err(cap_err);
        }

        require_fields(&response.content, &["title_suggestions", "seo_suggestions"])?;

        let wire: WireOptimization =
            serde_json::from_value(response.content.clone()).map_err(|e| {
                PressError::GenerationFailed(format!("optimization output violates schema: {e}"))
            })?;

        let result = convert(wire, &response, start.elapsed())?;

        if result.faqs.is_empty() {
            warn!(
                article_id = article.id,
                "optimization produced no FAQs; titles and SEO accepted"
            );
        }

        info!(
            article_id = article.id,
            cost_usd = result.generation_metadata.total_cost_usd,
            duration_ms = result.generation_metadata.duration_ms,
            titles = result.title_suggestions.len(),
            faqs = result.faqs.len(),
            "optimization complete"
        );

        Ok(result)
    }
}

fn convert(
    wire: WireOptimization,
    response: &crate::ai::LlmResponse,
    elapsed: std::time::Duration,
) -> Result<OptimizationResult> {
    let title_suggestions: Vec<TitleSuggestion> = wire
        .title_suggestions
        .into_iter()
        .map(|t| TitleSuggestion {
            title: TitleParts {
                prefix: t.prefix.filter(|p| !p.trim().is_empty()),
                main: t.main.trim().to_string(),
                suffix: t.suffix.filter(|s| !s.trim().is_empty()),
            },
            reasoning: t.reasoning,
            confidence: t.confidence.clamp(0.0, 1.0),
        })
        .filter(|t| !t.title.is_empty())
        .collect();

    if title_suggestions.is_empty() {
        return Err(PressError::GenerationFailed(
            "optimization produced no usable title suggestions".to_string(),
        ));
    }

    if wire.seo_suggestions.keywords.focus.trim().is_empty() {
        return Err(PressError::GenerationFailed(
            "optimization produced no focus keyword".to_string(),
        ));
    }

    Ok(OptimizationResult {
        title_suggestions,
        seo_suggestions: SeoSuggestions {
            keywords: KeywordTiers {
                focus: wire.seo_suggestions.keywords.focus,
                primary: wire.seo_suggestions.keywords.primary,
                secondary: wire.seo_suggestions.keywords.secondary,
            },
            meta_description: wire.seo_suggestions.meta_description,
            meta_reasoning: wire.seo_suggestions.meta_reasoning,
            meta_score: wire.seo_suggestions.meta_score.clamp(0.0, 1.0),
            tags: wire.seo_suggestions.tags,
            tag_reasoning: wire.seo_suggestions.tag_reasoning,
        },
        faqs: wire
            .faqs
            .into_iter()
            .map(|f| FaqProposal {
                question: f.question,
                answer: f.answer,
                question_type: f.question_type,
                search_intent: f.search_intent,
                ai_confidence: f.ai_confidence.clamp(0.0, 1.0),
            })
            .collect(),
        generation_metadata: GenerationMetadata {
            total_tokens: response.usage.total(),
            total_cost_usd: response.cost_usd,
            duration_ms: elapsed.as_millis() as u64,
            model: response.metadata.model.clone(),
        },
    })
}

// =============================================================================
// Tests
// =============================================================================

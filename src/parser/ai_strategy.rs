//! AI Parsing Strategy
//!
//! Submits the raw HTML to the configured model with temperature 0 and a
//! structured-output contract for the seven article fields. The returned
//! body is re-run through the sanitizer so downstream offsets always come
//! from the same place. Declared confidence 0.95.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;

use super::sanitize::sanitize_fragment;
use super::{ParsedArticle, ParsedImage};
use crate::ai::prompt::PARSE_DOCUMENT;
use crate::ai::{SharedProvider, TokenUsage, require_fields};
use crate::types::{PressError, Result, TitleParts};

/// Wire shape the model is asked to produce
#[derive(Debug, Deserialize)]
struct WireArticle {
    title_prefix: Option<String>,
    title_main: String,
    title_suffix: Option<String>,
    author_name: Option<String>,
    body_html: String,
    meta_description: Option<String>,
    #[serde(default)]
    seo_keywords: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    images: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    position: u32,
    source_url: String,
    caption: Option<String>,
}

fn output_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["title_main", "body_html"],
        "properties": {
            "title_prefix": {"type": ["string", "null"]},
            "title_main": {"type": "string"},
            "title_suffix": {"type": ["string", "null"]},
            "author_name": {"type": ["string", "null"]},
            "body_html": {"type": "string"},
            "meta_description": {"type": ["string", "null"]},
            "seo_keywords": {"type": "array", "items": {"type": "string"}},
            "tags": {"type": "array", "items": {"type": "string"}},
            "images": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["position", "source_url"],
                    "properties": {
                        "position": {"type": "integer", "minimum": 0},
                        "source_url": {"type": "string"},
                        "caption": {"type": ["string", "null"]}
                    }
                }
            }
        }
    })
}

/// Parse via the model. Errors from here (network, schema violation,
/// empty title) route the caller into the heuristic fallback.
pub async fn parse(provider: &SharedProvider, raw_html: &str) -> Result<(ParsedArticle, TokenUsage, f64)> {
    let mut vars = HashMap::new();
    vars.insert("raw_html", raw_html.to_string());
    let prompt = PARSE_DOCUMENT.render(&vars);

    let response = provider.generate(&prompt, &output_schema()).await?;

    require_fields(&response.content, &["title_main", "body_html"])?;

    let wire: WireArticle = serde_json::from_value(response.content.clone()).map_err(|e| {
        PressError::GenerationFailed(format!("parse output violates schema: {}", e))
    })?;

    if wire.title_main.trim().is_empty() {
        return Err(PressError::GenerationFailed(
            "parse output has empty title_main".to_string(),
        ));
    }

    let sanitized = sanitize_fragment(&wire.body_html)?;

    let mut images: Vec<ParsedImage> = wire
        .images
        .into_iter()
        .map(|img| ParsedImage {
            position: img.position,
            source_url: img.source_url,
            caption: img.caption,
            width: None,
            height: None,
        })
        .collect();
    images.sort_by_key(|img| img.position);
    images.dedup_by_key(|img| img.position);

    let parsed = ParsedArticle {
        title: TitleParts {
            prefix: wire.title_prefix.filter(|p| !p.trim().is_empty()),
            main: wire.title_main.trim().to_string(),
            suffix: wire.title_suffix.filter(|s| !s.trim().is_empty()),
        },
        author_line: None,
        author_name: wire.author_name.filter(|a| !a.trim().is_empty()),
        body_html: sanitized.body_html,
        body_text: sanitized.body_text,
        offsets: sanitized.offsets,
        meta_description: wire.meta_description.filter(|m| !m.trim().is_empty()),
        seo_keywords: wire.seo_keywords,
        tags: wire.tags,
        images,
    };

    Ok((parsed, response.usage, response.cost_usd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{
        LlmProvider, LlmResponse, ResponseMetadata, ResponseTiming,
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    struct CannedProvider {
        content: serde_json::Value,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn generate(&self, _prompt: &str, _schema: &serde_json::Value) -> Result<LlmResponse> {
            Ok(LlmResponse::with_metrics(
                self.content.clone(),
                TokenUsage::new(500, 200),
                0.01,
                ResponseTiming::default(),
                ResponseMetadata::default(),
            ))
        }

        fn name(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned-1"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn provider(content: serde_json::Value) -> SharedProvider {
        Arc::new(CannedProvider { content })
    }

    #[tokio::test]
    async fn test_well_formed_output() {
        let provider = provider(json!({
            "title_prefix": null,
            "title_main": "Configure X",
            "title_suffix": null,
            "author_name": "Jane Doe",
            "body_html": "<p>body paragraph one with real content</p>",
            "meta_description": "A summary.",
            "seo_keywords": ["x", "configuration"],
            "tags": ["ops"],
            "images": [{"position": 0, "source_url": "https://img/a.png", "caption": null}]
        }));

        let (parsed, usage, cost) = parse(&provider, "<h1>x</h1>").await.unwrap();
        assert_eq!(parsed.title.main, "Configure X");
        assert_eq!(parsed.author_name.as_deref(), Some("Jane Doe"));
        assert_eq!(parsed.images.len(), 1);
        assert_eq!(usage.total(), 700);
        assert!(cost > 0.0);
        // Body went through the sanitizer
        assert!(parsed.body_text.contains("body paragraph one"));
    }

    #[tokio::test]
    async fn test_empty_title_rejected() {
        let provider = provider(json!({
            "title_main": "   ",
            "body_html": "<p>content</p>"
        }));
        let err = parse(&provider, "x").await.unwrap_err();
        assert!(matches!(err, PressError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let provider = provider(json!({"title_main": "ok"}));
        let err = parse(&provider, "x").await.unwrap_err();
        assert!(matches!(err, PressError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_duplicate_image_positions_deduped() {
        let provider = provider(json!({
            "title_main": "T",
            "body_html": "<p>content body</p>",
            "images": [
                {"position": 2, "source_url": "https://img/b.png"},
                {"position": 0, "source_url": "https://img/a.png"},
                {"position": 2, "source_url": "https://img/c.png"}
            ]
        }));
        let (parsed, _, _) = parse(&provider, "x").await.unwrap();
        let positions: Vec<u32> = parsed.images.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 2]);
    }
}

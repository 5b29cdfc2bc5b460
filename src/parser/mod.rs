//! Document Parser
//!
//! Turns raw HTML (optionally with a YAML front-matter preamble) into a
//! `ParsedArticle`. Two strategies: AI-primary and heuristic fallback.
//! Strategy selection and the fallback policy live here; the strategies
//! themselves are `ai_strategy` and `heuristic`.
//!
//! Fallback triggers: network error, model-output schema violation, empty
//! `title_main`, or a body under 100 bytes. If both strategies fail the
//! result carries `success = false` with the causes listed.

pub mod ai_strategy;
pub mod heuristic;
pub mod sanitize;

pub use sanitize::{OffsetSpan, OffsetTable, SanitizedBody, sanitize_fragment};

use std::time::Instant;

use serde::Deserialize;
use tracing::{info, warn};

use crate::ai::{SharedProvider, TokenUsage};
use crate::config::ParserConfig;
use crate::constants::parser as parser_constants;
use crate::types::{ParsingMethod, Result, TitleParts};

// =============================================================================
// Output Types
// =============================================================================

/// An image reference lifted out of the document body
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedImage {
    /// Paragraph index in the final body
    pub position: u32,
    pub source_url: String,
    pub caption: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Structured fields extracted from one document
#[derive(Debug, Clone)]
pub struct ParsedArticle {
    pub title: TitleParts,
    /// The raw byline as found, e.g. "文/ 張三"
    pub author_line: Option<String>,
    pub author_name: Option<String>,
    pub body_html: String,
    pub body_text: String,
    pub offsets: OffsetTable,
    pub meta_description: Option<String>,
    pub seo_keywords: Vec<String>,
    pub tags: Vec<String>,
    pub images: Vec<ParsedImage>,
}

/// Bookkeeping attached to every parse
#[derive(Debug, Clone)]
pub struct ParsingMetadata {
    pub duration_ms: u64,
    pub method: Option<ParsingMethod>,
    pub confidence: f32,
    pub token_usage: Option<TokenUsage>,
    pub ai_cost_usd: f64,
}

/// The parser's public result: success or the accumulated causes
#[derive(Debug)]
pub struct ParsingResult {
    pub success: bool,
    pub parsed_article: Option<ParsedArticle>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metadata: ParsingMetadata,
}

// =============================================================================
// Front matter
// =============================================================================

/// YAML front-matter fields recognized on documents that carry a preamble
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Split an optional `---`-fenced YAML preamble off the document
pub fn split_front_matter(raw: &str) -> (Option<FrontMatter>, &str) {
    let trimmed = raw.trim_start();
    let Some(rest) = trimmed.strip_prefix("---") else {
        return (None, raw);
    };
    let Some(end) = rest.find("\n---") else {
        return (None, raw);
    };
    let yaml = &rest[..end];
    let body_start = end + "\n---".len();
    let body = rest[body_start..].trim_start_matches(['-']).trim_start();

    match serde_yaml::from_str::<FrontMatter>(yaml) {
        Ok(front) => (Some(front), body),
        Err(_) => (None, raw),
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Options for a single parse call
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Skip the AI strategy for this call regardless of configuration
    pub force_heuristic: bool,
}

/// Strategy-selecting document parser
pub struct DocumentParser {
    provider: Option<SharedProvider>,
    config: ParserConfig,
}

impl DocumentParser {
    pub fn new(provider: Option<SharedProvider>, config: ParserConfig) -> Self {
        Self { provider, config }
    }

    /// Parse one document. Never returns Err: failures of both strategies
    /// are reported through `ParsingResult.errors`.
    pub async fn parse_document(&self, raw_html: &str, options: &ParseOptions) -> ParsingResult {
        let start = Instant::now();
        let mut errors: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        let (front_matter, content) = split_front_matter(raw_html);

        // Strategy A: AI-primary
        if self.config.use_ai && !options.force_heuristic {
            if let Some(provider) = &self.provider {
                match ai_strategy::parse(provider, content).await {
                    Ok((mut parsed, usage, cost)) => {
                        if parsed.body_html.len() >= parser_constants::MIN_BODY_BYTES {
                            apply_front_matter(&mut parsed, front_matter);
                            info!(
                                method = "ai",
                                duration_ms = start.elapsed().as_millis() as u64,
                                "document parsed"
                            );
                            return ParsingResult {
                                success: true,
                                parsed_article: Some(parsed),
                                errors,
                                warnings,
                                metadata: ParsingMetadata {
                                    duration_ms: start.elapsed().as_millis() as u64,
                                    method: Some(ParsingMethod::Ai),
                                    confidence: parser_constants::AI_CONFIDENCE,
                                    token_usage: Some(usage),
                                    ai_cost_usd: cost,
                                },
                            };
                        }
                        warn!(
                            body_bytes = parsed.body_html.len(),
                            "AI parse produced an undersized body, falling back"
                        );
                        errors.push(format!(
                            "ai: body_html under {} bytes",
                            parser_constants::MIN_BODY_BYTES
                        ));
                    }
                    Err(err) => {
                        warn!(error = %err, "AI parse failed, falling back");
                        errors.push(format!("ai: {err}"));
                    }
                }
            } else {
                warnings.push("parser.use_ai set but no provider configured".to_string());
            }
        }

        // Strategy B: heuristic fallback
        if self.config.heuristic_fallback || !self.config.use_ai || options.force_heuristic {
            match heuristic::parse(content) {
                Ok(mut parsed) => {
                    if parsed.body_html.len() < parser_constants::MIN_BODY_BYTES {
                        errors.push(format!(
                            "heuristic: body_html under {} bytes",
                            parser_constants::MIN_BODY_BYTES
                        ));
                    } else {
                        apply_front_matter(&mut parsed, front_matter);
                        if !errors.is_empty() {
                            warnings.push("parsed via fallback — please verify".to_string());
                        }
                        return ParsingResult {
                            success: true,
                            parsed_article: Some(parsed),
                            errors,
                            warnings,
                            metadata: ParsingMetadata {
                                duration_ms: start.elapsed().as_millis() as u64,
                                method: Some(ParsingMethod::Heuristic),
                                confidence: parser_constants::HEURISTIC_CONFIDENCE,
                                token_usage: None,
                                ai_cost_usd: 0.0,
                            },
                        };
                    }
                }
                Err(err) => errors.push(format!("heuristic: {err}")),
            }
        } else {
            errors.push("heuristic fallback disabled".to_string());
        }

        ParsingResult {
            success: false,
            parsed_article: None,
            errors,
            warnings,
            metadata: ParsingMetadata {
                duration_ms: start.elapsed().as_millis() as u64,
                method: None,
                confidence: 0.0,
                token_usage: None,
                ai_cost_usd: 0.0,
            },
        }
    }
}

/// Front matter wins over extracted fields when present
fn apply_front_matter(parsed: &mut ParsedArticle, front: Option<FrontMatter>) {
    let Some(front) = front else { return };
    if let Some(title) = front.title
        && !title.trim().is_empty()
    {
        parsed.title = TitleParts::main_only(title.trim());
    }
    if let Some(author) = front.author
        && !author.trim().is_empty()
    {
        parsed.author_name = Some(author.trim().to_string());
    }
    if !front.tags.is_empty() {
        parsed.tags = front.tags;
    }
}

// =============================================================================
// Tests
// =============================================================================

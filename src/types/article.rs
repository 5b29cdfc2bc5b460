//! Article Types
//!
//! The parsed, structured representation of a document, one-to-one with a
//! worklist item once parsing succeeds. Suggestion fields are AI-generated
//! advice and treated as immutable; SEO fields are operator-editable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Parsing Audit
// =============================================================================

/// Which strategy produced the parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsingMethod {
    Ai,
    Heuristic,
}

impl ParsingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Heuristic => "heuristic",
        }
    }
}

impl std::fmt::Display for ParsingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParsingMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ai" => Ok(Self::Ai),
            "heuristic" => Ok(Self::Heuristic),
            other => Err(format!("unknown parsing method: {other}")),
        }
    }
}

// =============================================================================
// Article Workflow Status
// =============================================================================

/// Workflow-scoped article status, narrower than the worklist lane graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    InReview,
    ReadyToPublish,
    Publishing,
    Published,
    Failed,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "in_review",
            Self::ReadyToPublish => "ready_to_publish",
            Self::Publishing => "publishing",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ArticleStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "in_review" => Ok(Self::InReview),
            "ready_to_publish" => Ok(Self::ReadyToPublish),
            "publishing" => Ok(Self::Publishing),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown article status: {other}")),
        }
    }
}

// =============================================================================
// Title
// =============================================================================

/// Display title split into optional prefix/suffix around the main part
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleParts {
    pub prefix: Option<String>,
    pub main: String,
    pub suffix: Option<String>,
}

impl TitleParts {
    pub fn main_only(main: impl Into<String>) -> Self {
        Self {
            prefix: None,
            main: main.into(),
            suffix: None,
        }
    }

    /// Concatenated display form
    pub fn display(&self) -> String {
        let mut out = String::new();
        if let Some(prefix) = &self.prefix {
            out.push_str(prefix);
        }
        out.push_str(&self.main);
        if let Some(suffix) = &self.suffix {
            out.push_str(suffix);
        }
        out
    }

    /// A title set is usable only if its concatenation is non-empty
    pub fn is_empty(&self) -> bool {
        self.display().trim().is_empty()
    }
}

// =============================================================================
// AI Suggestions (immutable advice)
// =============================================================================

/// One AI-suggested title variant with its rationale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleSuggestion {
    #[serde(flatten)]
    pub title: TitleParts,
    pub reasoning: String,
    pub confidence: f32,
}

/// Tiered SEO keyword proposal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordTiers {
    pub focus: String,
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
}

/// One FAQ proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqProposal {
    pub question: String,
    pub answer: String,
    pub question_type: String,
    pub search_intent: String,
    pub ai_confidence: f32,
}

// =============================================================================
// Article
// =============================================================================

/// The parsed/optimized content record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub worklist_item_id: Option<i64>,

    // Display header
    pub title: TitleParts,
    pub author_name: Option<String>,

    // Body
    /// Sanitized HTML; free of scripts and inline event handlers
    pub body_html: String,
    /// Plain text derived from body_html through the sanitizer
    pub body_text: String,

    // SEO fields (operator-editable)
    pub meta_description: Option<String>,
    #[serde(default)]
    pub seo_keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,

    // Suggestion fields (AI-generated, immutable advice)
    #[serde(default)]
    pub suggested_title_sets: Vec<TitleSuggestion>,
    pub suggested_meta_description: Option<String>,
    pub suggested_seo_keywords: Option<KeywordTiers>,
    #[serde(default)]
    pub faq_proposals: Vec<FaqProposal>,

    // Parsing audit
    pub parsing_method: ParsingMethod,
    pub parsing_confidence: f32,
    pub parsing_confirmed: bool,
    pub parsing_confirmed_by: Option<String>,
    pub parsing_confirmed_at: Option<DateTime<Utc>>,

    // Publication audit
    pub status: ArticleStatus,
    pub cms_article_id: Option<String>,
    pub published_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,

    // Cost bookkeeping
    pub ai_model_used: Option<String>,
    /// Sum across optimization calls for this article, USD
    pub generation_cost_usd: f64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Check the confirmation audit invariant
    pub fn confirmation_ok(&self) -> bool {
        !self.parsing_confirmed || self.parsing_confirmed_at.is_some()
    }

    /// Check that each suggested title set is non-empty
    pub fn suggestions_ok(&self) -> bool {
        self.suggested_title_sets.iter().all(|s| !s.title.is_empty())
    }
}

// =============================================================================
// Article Images
// =============================================================================

/// Operator decision on an extracted image
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ImageReviewAction {
    Keep,
    Remove,
    ReplaceCaption { new_value: String },
    ReplaceSource { new_value: String },
}

/// Zero-or-one review decision per image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReview {
    #[serde(flatten)]
    pub action: ImageReviewAction,
    pub notes: Option<String>,
}

/// Technical specs captured for an extracted image
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageSpecs {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub file_size_bytes: Option<u64>,
    pub format: Option<String>,
}

/// An image reference extracted from the article body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleImage {
    pub id: i64,
    pub article_id: i64,
    /// Paragraph index in the body; unique per article, dense but not
    /// guaranteed gap-free after removals
    pub position: u32,
    /// Original hosted location
    pub source_url: String,
    /// Thumbnail path, if generated
    pub preview_path: Option<String>,
    /// Downloaded full-res path, if fetched
    pub source_path: Option<String>,
    pub caption: Option<String>,
    pub specs: ImageSpecs,
    pub review: Option<ImageReview>,
}

/// Validate that image positions form a strictly increasing sequence
pub fn positions_strictly_increasing(images: &[ArticleImage]) -> bool {
    images.windows(2).all(|w| w[0].position < w[1].position)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn image(position: u32) -> ArticleImage {
        ArticleImage {
            id: position as i64,
            article_id: 1,
            position,
            source_url: format!("https://img.example.com/{position}.png"),
            preview_path: None,
            source_path: None,
            caption: None,
            specs: ImageSpecs::default(),
            review: None,
        }
    }

    #[test]
    fn test_title_display() {
        let title = TitleParts {
            prefix: Some("【HOWTO】".into()),
            main: "configure X".into(),
            suffix: Some(" — part 1".into()),
        };
        assert_eq!(title.display(), "【HOWTO】configure X — part 1");
        assert!(!title.is_empty());
    }

    #[test]
    fn test_empty_title_detected() {
        let title = TitleParts {
            prefix: Some("  ".into()),
            main: "".into(),
            suffix: None,
        };
        assert!(title.is_empty());
    }

    #[test]
    fn test_positions_strictly_increasing() {
        let images = vec![image(0), image(2), image(5)];
        assert!(positions_strictly_increasing(&images));

        let bad = vec![image(0), image(0)];
        assert!(!positions_strictly_increasing(&bad));
    }

    #[test]
    fn test_image_review_action_serde() {
        let review = ImageReview {
            action: ImageReviewAction::ReplaceCaption {
                new_value: "new caption".into(),
            },
            notes: Some("original was truncated".into()),
        };
        let json = serde_json::to_string(&review).unwrap();
        assert!(json.contains("replace_caption"));
        let back: ImageReview = serde_json::from_str(&json).unwrap();
        match back.action {
            ImageReviewAction::ReplaceCaption { new_value } => {
                assert_eq!(new_value, "new caption")
            }
            _ => panic!("wrong action"),
        }
    }

    #[test]
    fn test_parsing_method_round_trip() {
        for m in [ParsingMethod::Ai, ParsingMethod::Heuristic] {
            let parsed: ParsingMethod = m.as_str().parse().unwrap();
            assert_eq!(parsed, m);
        }
    }
}

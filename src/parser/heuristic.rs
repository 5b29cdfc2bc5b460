//! Heuristic Parsing Strategy
//!
//! DOM-traversal extraction used when the AI strategy is disabled or
//! fails. Deterministic: repeated runs over the same input produce the
//! same structural result. Declared confidence 0.70.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;

use super::sanitize::sanitize_fragment;
use super::{ParsedArticle, ParsedImage};
use crate::constants::parser as parser_constants;
use crate::types::{PressError, Result, TitleParts};

/// Containers whose content never contributes to the article body
const DROPPED_ANCESTORS: &[&str] = &["nav", "header", "footer", "script", "style", "iframe"];

/// Block elements that make up the article body, in document order
const BLOCK_NAMES: &[&str] = &[
    "p", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "blockquote", "pre", "figure", "table",
];

static BLOCK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("p, h2, h3, h4, h5, h6, ul, ol, blockquote, pre, figure, table")
        .expect("static selector")
});

static H1_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("static selector"));
static P_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").expect("static selector"));
static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("static selector"));
static FIGCAPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("figcaption").expect("static selector"));

static IMG_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<img\b[^>]*>").expect("static regex"));

/// Byline patterns, tried in order: `文/名前`, `作者：名前`, `By Name`
static AUTHOR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"文\s*[/／]\s*(\S+)").expect("static regex"),
        Regex::new(r"作者\s*[:：]\s*(\S+)").expect("static regex"),
        Regex::new(r"\b[Bb]y\s+([\p{Lu}][\w.\- ]{1,60}?)\s*$").expect("static regex"),
    ]
});

/// Bracketed title prefix, e.g. 【HOWTO】
static BRACKET_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(【[^】]*】|\[[^\]]{1,40}\])\s*").expect("static regex"));

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one", "our",
    "out", "his", "has", "had", "how", "man", "new", "now", "old", "see", "two", "way", "who",
    "its", "did", "get", "may", "him", "she", "use", "your", "from", "they", "this", "that",
    "with", "have", "will", "been", "were", "when", "what", "more", "some", "than", "then",
    "them", "these", "would", "there", "their", "which", "about", "into", "also", "other",
    "only", "just", "over", "such", "most", "very", "after", "before", "because", "while",
    "where", "being", "does", "each", "between",
];

// =============================================================================
// Entry point
// =============================================================================

/// Parse a document with DOM heuristics. Fails when no usable body text
/// survives extraction.
pub fn parse(raw_html: &str) -> Result<ParsedArticle> {
    let doc = Html::parse_document(raw_html);

    let title = extract_title(&doc).ok_or_else(|| PressError::ParseFailed {
        document_id: String::new(),
        message: "no title candidate found".to_string(),
    })?;

    let (author_line, author_name) = extract_author(&doc);
    let (body_source, images) = extract_body(&doc, &title.main);

    if body_source.trim().is_empty() {
        return Err(PressError::ParseFailed {
            document_id: String::new(),
            message: "document body is empty after cleanup".to_string(),
        });
    }

    let sanitized = sanitize_fragment(&body_source)?;

    let meta_description = synthesize_meta_description(&sanitized.body_text);
    let seo_keywords = extract_keywords(&sanitized.body_text);

    Ok(ParsedArticle {
        title,
        author_line,
        author_name,
        body_html: sanitized.body_html,
        body_text: sanitized.body_text,
        offsets: sanitized.offsets,
        meta_description,
        seo_keywords,
        tags: Vec::new(),
        images,
    })
}

// =============================================================================
// Title
// =============================================================================

fn extract_title(doc: &Html) -> Option<TitleParts> {
    // Prefer the first <h1>
    if let Some(h1) = doc.select(&H1_SELECTOR).next() {
        let text = element_text(&h1);
        if !text.trim().is_empty() {
            return Some(split_title(&text));
        }
    }

    // Else the first substantive paragraph
    for p in doc.select(&P_SELECTOR) {
        if has_dropped_ancestor(&p) {
            continue;
        }
        let text = element_text(&p);
        let len = text.chars().count();
        if (parser_constants::TITLE_PARA_MIN_CHARS..=parser_constants::TITLE_PARA_MAX_CHARS)
            .contains(&len)
        {
            return Some(split_title(&text));
        }
    }

    None
}

/// Split a raw title into prefix/main/suffix: a recognized bracketed
/// prefix peels off first, then the first spaced separator (`:`, `-`,
/// `—`, `─`) splits main from suffix.
fn split_title(raw: &str) -> TitleParts {
    let raw = raw.trim();
    let (prefix, rest) = match BRACKET_PREFIX_RE.find(raw) {
        Some(m) => (
            Some(m.as_str().trim().to_string()),
            raw[m.end()..].trim_start(),
        ),
        None => (None, raw),
    };

    for separator in [": ", "：", " - ", " — ", " ─ "] {
        if let Some(pos) = rest.find(separator) {
            let (main, suffix) = rest.split_at(pos);
            let suffix = suffix[separator.len()..].trim();
            if !main.trim().is_empty() && !suffix.is_empty() {
                return TitleParts {
                    prefix,
                    main: main.trim().to_string(),
                    suffix: Some(suffix.to_string()),
                };
            }
        }
    }

    TitleParts {
        prefix,
        main: rest.to_string(),
        suffix: None,
    }
}

// =============================================================================
// Author
// =============================================================================

/// Scan text lines for byline patterns. Returns (raw line, trimmed name).
fn extract_author(doc: &Html) -> (Option<String>, Option<String>) {
    let text: String = doc.root_element().text().collect::<Vec<_>>().join("\n");
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.chars().count() > 120 {
            continue;
        }
        for pattern in AUTHOR_PATTERNS.iter() {
            if let Some(captures) = pattern.captures(line) {
                let name = captures
                    .get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|n| !n.is_empty());
                return (Some(line.to_string()), name);
            }
        }
    }
    (None, None)
}

// =============================================================================
// Body and images
// =============================================================================

fn has_dropped_ancestor(element: &ElementRef<'_>) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|el| DROPPED_ANCESTORS.contains(&el.name()))
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// Walk block elements in document order, dropping images (tracked
/// separately with their paragraph index) and a metadata-looking first
/// paragraph. Returns the rebuilt body HTML and the extracted images.
fn extract_body(doc: &Html, title_main: &str) -> (String, Vec<ParsedImage>) {
    let mut blocks: Vec<String> = Vec::new();
    let mut images: Vec<ParsedImage> = Vec::new();
    let mut first_paragraph_seen = false;

    for element in doc.select(&BLOCK_SELECTOR) {
        if has_dropped_ancestor(&element) {
            continue;
        }
        // Nested block elements (p inside blockquote, table inside figure)
        // are serialized with their parent
        if element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| BLOCK_NAMES.contains(&a.value().name()))
        {
            continue;
        }

        let name = element.value().name();

        if name == "figure" {
            collect_images(&element, blocks.len() as u32, &mut images);
            continue;
        }

        let text = element_text(&element);

        // Skip the element repeating the extracted title
        if text == title_main || text.trim() == title_main {
            continue;
        }

        collect_images(&element, blocks.len() as u32, &mut images);

        if name == "p" && !first_paragraph_seen {
            first_paragraph_seen = true;
            if looks_like_metadata(&text) {
                continue;
            }
        }

        if text.is_empty() {
            continue;
        }

        let html = IMG_TAG_RE.replace_all(&element.html(), "").to_string();
        blocks.push(html);
    }

    (blocks.join("\n"), images)
}

fn collect_images(element: &ElementRef<'_>, position: u32, images: &mut Vec<ParsedImage>) {
    for img in element.select(&IMG_SELECTOR) {
        let Some(source_url) = img.value().attr("src") else {
            continue;
        };
        if source_url.trim().is_empty() {
            continue;
        }

        // Caption preference: figcaption, then alt, then title
        let caption = element
            .select(&FIGCAPTION_SELECTOR)
            .next()
            .map(|fc| element_text(&fc))
            .filter(|c| !c.is_empty())
            .or_else(|| {
                img.value()
                    .attr("alt")
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(String::from)
            })
            .or_else(|| {
                img.value()
                    .attr("title")
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
            });

        // Positions track the paragraph index but always strictly increase,
        // even when one paragraph carries several images
        let next = images.last().map(|i| i.position + 1).unwrap_or(0);
        images.push(ParsedImage {
            position: position.max(next),
            source_url: source_url.to_string(),
            caption,
            width: img.value().attr("width").and_then(|w| w.parse().ok()),
            height: img.value().attr("height").and_then(|h| h.parse().ok()),
        });
    }
}

/// A first paragraph dominated by non-body tokens (dates, separators,
/// links, bylines) is upstream metadata, not article text
fn looks_like_metadata(text: &str) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return true;
    }
    let non_body = tokens
        .iter()
        .filter(|t| {
            t.contains(':')
                || t.contains('：')
                || t.contains('/')
                || t.contains('@')
                || t.contains('|')
                || t.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '.')
        })
        .count();
    non_body as f64 / tokens.len() as f64 > parser_constants::METADATA_TOKEN_FRACTION
}

// =============================================================================
// SEO synthesis
// =============================================================================

/// First substantive paragraph, truncated into the 150-160 char window
fn synthesize_meta_description(body_text: &str) -> Option<String> {
    let paragraph = body_text
        .split("\n\n")
        .map(str::trim)
        .find(|p| p.chars().count() >= parser_constants::TITLE_PARA_MIN_CHARS)?;

    let max = parser_constants::META_DESCRIPTION_MAX_CHARS;
    let min = parser_constants::META_DESCRIPTION_MIN_CHARS;

    if paragraph.chars().count() <= max {
        return Some(paragraph.to_string());
    }

    let hard_cut: String = paragraph.chars().take(max).collect();
    // Prefer a word boundary inside the window
    match hard_cut.rfind(char::is_whitespace) {
        Some(pos) if hard_cut[..pos].chars().count() >= min => {
            Some(hard_cut[..pos].trim_end().to_string())
        }
        _ => Some(hard_cut),
    }
}

/// Frequency-ranked keywords minus stop words, top 5-10
fn extract_keywords(body_text: &str) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in body_text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
    {
        let lower = token.to_lowercase();
        if STOP_WORDS.contains(&lower.as_str()) || lower.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        *counts.entry(lower).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    // Deterministic ordering: frequency desc, then lexicographic
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let keep = ranked
        .iter()
        .filter(|(_, count)| *count >= 2)
        .count()
        .clamp(parser_constants::MIN_KEYWORDS, parser_constants::MAX_KEYWORDS);

    ranked
        .into_iter()
        .take(keep)
        .map(|(word, _)| word)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><head><title>ignored</title></head><body>
        <nav><a href="/">home</a></nav>
        <h1>【HOWTO】configure X: a field guide</h1>
        <p>2024/05/01 | category: ops | https://example.com/post</p>
        <p>文/ 張三</p>
        <p>Configuring X correctly matters because the defaults ship with
        conservative limits that most production deployments outgrow quickly,
        and the failure modes are silent until load arrives at the worst time.</p>
        <figure><img src="https://img.example.com/a.png"><figcaption>figure one</figcaption></figure>
        <p>Second paragraph with an inline image <img src="https://img.example.com/b.png" alt="inline b"> inside.</p>
        <footer>copyright</footer>
        </body></html>
    "#;

    #[test]
    fn test_title_from_h1_with_prefix_and_suffix() {
        let parsed = parse(SAMPLE).unwrap();
        assert_eq!(parsed.title.prefix.as_deref(), Some("【HOWTO】"));
        assert_eq!(parsed.title.main, "configure X");
        assert_eq!(parsed.title.suffix.as_deref(), Some("a field guide"));
    }

    #[test]
    fn test_author_cjk_byline() {
        let parsed = parse(SAMPLE).unwrap();
        assert_eq!(parsed.author_name.as_deref(), Some("張三"));
        assert!(parsed.author_line.as_deref().unwrap().contains("文/"));
    }

    #[test]
    fn test_author_english_byline() {
        let html = "<h1>A sufficiently long heading</h1><p>By Jane Doe</p><p>Body paragraph with enough text to be substantive for the extractor.</p>";
        let parsed = parse(html).unwrap();
        assert_eq!(parsed.author_name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_metadata_first_paragraph_dropped() {
        let parsed = parse(SAMPLE).unwrap();
        assert!(!parsed.body_text.contains("2024/05/01"));
        assert!(parsed.body_text.contains("Configuring X correctly"));
    }

    #[test]
    fn test_nav_and_footer_excluded() {
        let parsed = parse(SAMPLE).unwrap();
        assert!(!parsed.body_text.contains("home"));
        assert!(!parsed.body_text.contains("copyright"));
    }

    #[test]
    fn test_images_extracted_with_captions() {
        let parsed = parse(SAMPLE).unwrap();
        assert_eq!(parsed.images.len(), 2);

        let figure_img = &parsed.images[0];
        assert_eq!(figure_img.source_url, "https://img.example.com/a.png");
        assert_eq!(figure_img.caption.as_deref(), Some("figure one"));

        let inline_img = &parsed.images[1];
        assert_eq!(inline_img.caption.as_deref(), Some("inline b"));
    }

    #[test]
    fn test_images_removed_from_body() {
        let parsed = parse(SAMPLE).unwrap();
        assert!(!parsed.body_html.contains("<img"));
    }

    #[test]
    fn test_image_positions_strictly_increase() {
        let parsed = parse(SAMPLE).unwrap();
        let positions: Vec<u32> = parsed.images.iter().map(|i| i.position).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_title_fallback_to_substantive_paragraph() {
        let html = "<p>hi</p><p>This paragraph is long enough to stand in as a title.</p>\
                    <p>And this is the body of the article, also long enough to matter.</p>";
        let parsed = parse(html).unwrap();
        assert!(parsed.title.main.starts_with("This paragraph"));
    }

    #[test]
    fn test_meta_description_window() {
        let long_para = format!("<h1>A heading that works</h1><p>{}</p>", "word ".repeat(100));
        let parsed = parse(&long_para).unwrap();
        let desc = parsed.meta_description.unwrap();
        let len = desc.chars().count();
        assert!(len <= 160, "description too long: {len}");
    }

    #[test]
    fn test_short_meta_description_kept_whole() {
        let html = "<h1>A heading that works</h1><p>A short but substantive paragraph.</p>";
        let parsed = parse(html).unwrap();
        assert_eq!(
            parsed.meta_description.as_deref(),
            Some("A short but substantive paragraph.")
        );
    }

    #[test]
    fn test_keywords_exclude_stop_words() {
        let html = format!(
            "<h1>A heading that works</h1><p>{}</p>",
            "kubernetes deployment rollout kubernetes deployment kubernetes because the and for \
             monitoring alerts monitoring latency budget error budget latency"
                .repeat(2)
        );
        let parsed = parse(&html).unwrap();
        assert!(parsed.seo_keywords.contains(&"kubernetes".to_string()));
        assert!(!parsed.seo_keywords.contains(&"because".to_string()));
        assert!(parsed.seo_keywords.len() >= 5);
        assert!(parsed.seo_keywords.len() <= 10);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let a = parse(SAMPLE).unwrap();
        let b = parse(SAMPLE).unwrap();
        assert_eq!(a.title.main, b.title.main);
        assert_eq!(a.author_name, b.author_name);
        assert_eq!(a.seo_keywords, b.seo_keywords);
        assert_eq!(a.body_text, b.body_text);
    }

    #[test]
    fn test_empty_document_fails() {
        assert!(parse("<html><body></body></html>").is_err());
    }

    #[test]
    fn test_split_title_plain() {
        let title = split_title("Just a plain title");
        assert_eq!(title.main, "Just a plain title");
        assert!(title.prefix.is_none());
        assert!(title.suffix.is_none());
    }

    #[test]
    fn test_split_title_dash_separator() {
        let title = split_title("Main part - trailing part");
        assert_eq!(title.main, "Main part");
        assert_eq!(title.suffix.as_deref(), Some("trailing part"));
    }

    #[test]
    fn test_split_title_hyphenated_word_not_split() {
        let title = split_title("A well-known approach");
        assert_eq!(title.main, "A well-known approach");
        assert!(title.suffix.is_none());
    }
}

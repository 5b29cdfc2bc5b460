//! Prompt Templates
//!
//! One template per AI use: parse, optimize, analyze. The template text is
//! a plug-in resource; the functions here only render placeholders. Exact
//! wording is owned by the editorial team, not this crate.

use std::collections::HashMap;

/// Named template with `{placeholder}` substitution
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: &'static str,
    template: &'static str,
}

impl PromptTemplate {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Render with placeholder substitution. Unknown placeholders are left
    /// intact so a template mismatch is visible in the output.
    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        let mut out = self.template.to_string();
        for (key, value) in vars {
            out = out.replace(&format!("{{{key}}}"), value);
        }
        out
    }
}

/// Structured extraction of the seven article fields from raw HTML
pub const PARSE_DOCUMENT: PromptTemplate = PromptTemplate {
    name: "parse_document",
    template: r#"Extract the structured article fields from the HTML document below.

Return a JSON object with exactly these fields:
- title_prefix (string or null): bracketed or separator-delimited prefix, e.g. 【…】
- title_main (string): the main title, required
- title_suffix (string or null)
- author_name (string or null): the author's name without the byline marker
- body_html (string): the article body as clean HTML, images removed
- meta_description (string): 150-160 character summary
- seo_keywords (array of strings): 5-10 keywords
- tags (array of strings)
- images (array of {position, source_url, caption}): every inline image,
  position = paragraph index

HTML document:
{raw_html}"#,
};

/// Single-call generation of all optimization artifacts
pub const OPTIMIZE_ARTICLE: PromptTemplate = PromptTemplate {
    name: "optimize_article",
    template: r#"You are optimizing an article for search and readability.

Article title: {title}
Article body text:
{body_text}

Return a JSON object with:
- title_suggestions: 2-3 variants of {prefix, main, suffix, reasoning, confidence}
- seo_suggestions: {keywords: {focus, primary (3-5), secondary (5-10)},
  meta_description, meta_reasoning, meta_score (0-1), tags (3-6), tag_reasoning}
- faqs: 8-10 of {question, answer, question_type, search_intent, ai_confidence}"#,
};

/// Semantic-predicate evaluation for proofreading rules that need it
pub const ANALYZE_TEXT: PromptTemplate = PromptTemplate {
    name: "analyze_text",
    template: r#"Apply the following editorial rule to the text and report every violation.

Rule: {rule_description}

Return a JSON object {issues: [{start_offset, end_offset, original_text,
suggested_text, reasoning, confidence}]} with offsets into the text exactly
as given below.

Text:
{body_text}"#,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes() {
        let mut vars = HashMap::new();
        vars.insert("raw_html", "<h1>T</h1>".to_string());
        let rendered = PARSE_DOCUMENT.render(&vars);
        assert!(rendered.contains("<h1>T</h1>"));
        assert!(!rendered.contains("{raw_html}"));
    }

    #[test]
    fn test_unknown_placeholder_left_intact() {
        let vars = HashMap::new();
        let rendered = OPTIMIZE_ARTICLE.render(&vars);
        assert!(rendered.contains("{title}"));
    }
}

//! HTML Sanitizer with Offset Mapping
//!
//! Rebuilds untrusted HTML into a safe form: `<script>`/`<style>` and
//! other non-content containers are dropped, inline `on*` event handlers
//! and `javascript:` URLs are stripped. Alongside the sanitized HTML the
//! sanitizer derives `body_text` and an offset table mapping byte ranges
//! of the text back to byte ranges of the sanitized HTML, so issues found
//! in text can be re-anchored for rendering.
//!
//! All offsets are byte offsets; text spans always start on UTF-8
//! boundaries because they are whole text runs.

use scraper::{Html, Node};

use crate::types::{PressError, Result};

/// Tags removed wholesale, including their content
const DROP_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "iframe"];

/// Tags that terminate a text block; a paragraph break is inserted into
/// the derived text when one closes
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "figure", "table",
    "tr", "section", "article",
];

/// Tags serialized without a closing tag
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

// =============================================================================
// Offset Table
// =============================================================================

/// One contiguous text run: `len` bytes of `body_text` starting at
/// `text_start` correspond to the same bytes of `body_html` starting at
/// `html_start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetSpan {
    pub text_start: usize,
    pub html_start: usize,
    pub len: usize,
}

/// Mapping from `body_text` offsets back to `body_html` offsets
#[derive(Debug, Clone, Default)]
pub struct OffsetTable {
    spans: Vec<OffsetSpan>,
}

impl OffsetTable {
    /// Map a text offset to the corresponding HTML offset, treating the
    /// offset as the START of a range. Offsets in synthetic gaps
    /// (paragraph breaks) map to the start of the following run.
    pub fn text_to_html(&self, text_offset: usize) -> Option<usize> {
        for span in &self.spans {
            if text_offset < span.text_start {
                return Some(span.html_start);
            }
            if text_offset < span.text_start + span.len {
                return Some(span.html_start + (text_offset - span.text_start));
            }
        }
        self.spans
            .last()
            .map(|last| last.html_start + last.len)
            .filter(|_| {
                self.spans
                    .last()
                    .is_some_and(|last| text_offset <= last.text_start + last.len + 2)
            })
    }

    /// Map a text offset treating it as the END of a range: an offset
    /// sitting exactly on a run boundary maps to the end of that run, not
    /// the start of the next one, so markup between runs survives a
    /// replacement.
    pub fn text_to_html_end(&self, text_offset: usize) -> Option<usize> {
        for span in &self.spans {
            if text_offset <= span.text_start {
                return Some(span.html_start);
            }
            if text_offset <= span.text_start + span.len {
                return Some(span.html_start + (text_offset - span.text_start));
            }
        }
        self.spans
            .last()
            .map(|last| last.html_start + last.len)
            .filter(|_| {
                self.spans
                    .last()
                    .is_some_and(|last| text_offset <= last.text_start + last.len + 2)
            })
    }

    pub fn spans(&self) -> &[OffsetSpan] {
        &self.spans
    }

    fn push(&mut self, span: OffsetSpan) {
        if span.len > 0 {
            self.spans.push(span);
        }
    }
}

// =============================================================================
// Sanitized Output
// =============================================================================

/// The sanitizer's three-part output
#[derive(Debug, Clone)]
pub struct SanitizedBody {
    pub body_html: String,
    pub body_text: String,
    pub offsets: OffsetTable,
}

// =============================================================================
// Sanitizer
// =============================================================================

/// Sanitize an HTML fragment. Fails only when the rebuilt body is empty
/// of both markup and text, which callers treat as invalid upstream data.
pub fn sanitize_fragment(raw_html: &str) -> Result<SanitizedBody> {
    let fragment = Html::parse_fragment(raw_html);
    let mut builder = Builder::default();
    // Fragment parsing wraps content in a synthetic <html> element; the
    // wrapper itself is never part of the body
    let root = fragment.root_element();
    if root.value().name() == "html" {
        builder.walk_children(*root);
    } else {
        builder.walk_children(fragment.tree.root());
    }

    if builder.html.trim().is_empty() {
        return Err(PressError::Sanitizer(
            "sanitized body is empty".to_string(),
        ));
    }

    Ok(SanitizedBody {
        body_html: builder.html,
        body_text: builder.text.trim_end().to_string(),
        offsets: builder.offsets,
    })
}

#[derive(Default)]
struct Builder {
    html: String,
    text: String,
    offsets: OffsetTable,
}

impl Builder {
    fn walk_children(&mut self, node: ego_tree::NodeRef<'_, Node>) {
        for child in node.children() {
            self.walk(child);
        }
    }

    fn walk(&mut self, node: ego_tree::NodeRef<'_, Node>) {
        match node.value() {
            Node::Text(text) => {
                let content: &str = &text.text;
                if content.trim().is_empty() {
                    // Preserve a single space between runs so words don't fuse
                    if !content.is_empty()
                        && !self.html.is_empty()
                        && !self.html.ends_with(char::is_whitespace)
                    {
                        self.html.push(' ');
                        self.text.push(' ');
                    }
                    return;
                }
                let escaped = escape_text(content);
                self.offsets.push(OffsetSpan {
                    text_start: self.text.len(),
                    html_start: self.html.len(),
                    len: escaped.len(),
                });
                self.html.push_str(&escaped);
                self.text.push_str(&escaped);
            }
            Node::Element(element) => {
                let name = element.name();
                if DROP_TAGS.contains(&name) {
                    return;
                }

                self.html.push('<');
                self.html.push_str(name);
                for (attr_name, attr_value) in element.attrs() {
                    if !attribute_allowed(attr_name, attr_value) {
                        continue;
                    }
                    self.html.push(' ');
                    self.html.push_str(attr_name);
                    self.html.push_str("=\"");
                    self.html.push_str(&escape_attr(attr_value));
                    self.html.push('"');
                }
                self.html.push('>');

                if !VOID_TAGS.contains(&name) {
                    self.walk_children(node);
                    self.html.push_str("</");
                    self.html.push_str(name);
                    self.html.push('>');
                }

                if BLOCK_TAGS.contains(&name) && !self.text.ends_with("\n\n") {
                    // Synthetic paragraph break; no HTML mapping
                    self.text.push_str("\n\n");
                }
            }
            _ => {
                // Comments, doctype, processing instructions are dropped
            }
        }
    }
}

/// Reject inline event handlers and script-scheme URLs
fn attribute_allowed(name: &str, value: &str) -> bool {
    if name.to_ascii_lowercase().starts_with("on") {
        return false;
    }
    if matches!(name, "href" | "src" | "action")
        && value
            .trim_start()
            .to_ascii_lowercase()
            .starts_with("javascript:")
    {
        return false;
    }
    true
}

fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(input: &str) -> String {
    escape_text(input).replace('"', "&quot;")
}

// =============================================================================
// Tests
// =============================================================================

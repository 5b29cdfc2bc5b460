//! Proofreading Rule Engine
//!
//! Applies a compiled ruleset to an article's body text and emits issues
//! anchored to byte offsets of `body_text`. A rule that fails to compile
//! or crashes at match time is contained: it is skipped, recorded as a
//! `RuleRuntimeError` on the analysis, and the remaining rules still run.

use chrono::Utc;
use regex::Regex;
use tracing::{debug, warn};

use crate::types::{ProofreadingIssue, Rule, Result, sort_issues};

/// Cap on issues one rule may emit on one article, so a degenerate
/// pattern cannot flood the review queue
const MAX_ISSUES_PER_RULE: usize = 200;

/// Confidence attached to deterministic pattern matches
const PATTERN_CONFIDENCE: f32 = 0.95;

// =============================================================================
// Compiled Rules
// =============================================================================

/// A rule whose pattern compiled successfully
struct CompiledRule {
    rule: Rule,
    regex: Regex,
}

/// One contained rule failure
#[derive(Debug, Clone)]
pub struct RuleRuntimeError {
    pub rule_code: String,
    pub message: String,
}

/// Result of one analysis run
#[derive(Debug)]
pub struct AnalysisReport {
    /// Unpersisted issues (id = 0 until stored), sorted by offset then
    /// severity
    pub issues: Vec<ProofreadingIssue>,
    pub rule_errors: Vec<RuleRuntimeError>,
    pub ruleset_generation: u32,
}

// =============================================================================
// Engine
// =============================================================================

/// Rule engine bound to one ruleset generation
pub struct RuleEngine {
    compiled: Vec<CompiledRule>,
    compile_errors: Vec<RuleRuntimeError>,
    generation: u32,
}

impl RuleEngine {
    /// Compile the enabled rules of a ruleset. Rules that fail to compile
    /// are carried as errors and skipped at analysis time.
    pub fn compile(rules: Vec<Rule>, generation: u32) -> Self {
        let mut compiled = Vec::new();
        let mut compile_errors = Vec::new();

        for rule in rules.into_iter().filter(|r| r.enabled) {
            match Regex::new(&rule.pattern) {
                Ok(regex) => compiled.push(CompiledRule { rule, regex }),
                Err(err) => {
                    warn!(rule_code = %rule.code, error = %err, "rule pattern failed to compile");
                    compile_errors.push(RuleRuntimeError {
                        rule_code: rule.code,
                        message: err.to_string(),
                    });
                }
            }
        }

        Self {
            compiled,
            compile_errors,
            generation,
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn rule_count(&self) -> usize {
        self.compiled.len()
    }

    /// Run every rule over the body text. Always returns the full issue
    /// list for the rules that ran.
    pub fn analyze(&self, article_id: i64, body_text: &str) -> Result<AnalysisReport> {
        let mut issues: Vec<ProofreadingIssue> = Vec::new();
        let mut rule_errors = self.compile_errors.clone();

        for compiled in &self.compiled {
            match run_rule(compiled, article_id, body_text, self.generation) {
                Ok(mut rule_issues) => issues.append(&mut rule_issues),
                Err(err) => {
                    warn!(rule_code = %compiled.rule.code, error = %err, "rule crashed, skipping");
                    rule_errors.push(RuleRuntimeError {
                        rule_code: compiled.rule.code.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        sort_issues(&mut issues);

        debug!(
            article_id,
            issues = issues.len(),
            rule_errors = rule_errors.len(),
            generation = self.generation,
            "analysis complete"
        );

        Ok(AnalysisReport {
            issues,
            rule_errors,
            ruleset_generation: self.generation,
        })
    }
}

/// One rule over one body, bounded and panic-contained
fn run_rule(
    compiled: &CompiledRule,
    article_id: i64,
    body_text: &str,
    generation: u32,
) -> std::result::Result<Vec<ProofreadingIssue>, String> {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut issues = Vec::new();
        for m in compiled.regex.find_iter(body_text).take(MAX_ISSUES_PER_RULE) {
            let suggested_text = compiled.rule.suggestion.as_ref().map(|template| {
                compiled
                    .regex
                    .replace(m.as_str(), template.as_str())
                    .into_owned()
            });

            issues.push(ProofreadingIssue {
                id: 0,
                article_id,
                rule_id: compiled.rule.id,
                rule_code: compiled.rule.code.clone(),
                rule_class: compiled.rule.class,
                severity: compiled.rule.severity,
                start_offset: m.start(),
                end_offset: m.end(),
                original_text: m.as_str().to_string(),
                suggested_text,
                reasoning: Some(compiled.rule.description.clone()),
                confidence: PATTERN_CONFIDENCE,
                ruleset_generation: generation,
                created_at: Utc::now(),
            });
        }
        issues
    }));

    outcome.map_err(|panic| {
        panic
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "rule panicked".to_string())
    })
}

// =============================================================================
// Tests
// =============================================================================

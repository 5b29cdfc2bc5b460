//! Rule-Quality Feedback
//!
//! Operators' decision patterns roll up into a per-rule report: counts of
//! accept/reject/modify plus the free-text notes. A background worker
//! materializes the report daily. The report is advisory input for the
//! next ruleset draft; rules are never altered automatically.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DecisionKind, ProofreadingDecision, ProofreadingIssue};

/// Per-rule decision tallies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleStats {
    pub accepted: u32,
    pub rejected: u32,
    pub modified: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl RuleStats {
    pub fn total(&self) -> u32 {
        self.accepted + self.rejected + self.modified
    }

    /// Share of decisions that took the suggestion as-is
    pub fn accept_rate(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.accepted as f32 / total as f32
        }
    }
}

/// The materialized daily report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleQualityReport {
    pub generated_at: DateTime<Utc>,
    pub ruleset_generation: u32,
    pub rules: BTreeMap<String, RuleStats>,
}

impl RuleQualityReport {
    /// Rules operators reject most; candidates for the next draft's review
    pub fn worst_rules(&self, limit: usize) -> Vec<(&str, &RuleStats)> {
        let mut ranked: Vec<(&str, &RuleStats)> = self
            .rules
            .iter()
            .filter(|(_, stats)| stats.total() >= 3)
            .map(|(code, stats)| (code.as_str(), stats))
            .collect();
        ranked.sort_by(|a, b| {
            a.1.accept_rate()
                .partial_cmp(&b.1.accept_rate())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(limit);
        ranked
    }
}

/// Build the report from an issue set and the decisions taken on it.
/// Superseded decisions count too: the revision history is signal.
pub fn build_report(
    generation: u32,
    issues: &[ProofreadingIssue],
    decisions: &[ProofreadingDecision],
) -> RuleQualityReport {
    let mut rules: BTreeMap<String, RuleStats> = BTreeMap::new();

    for decision in decisions {
        let Some(issue) = issues.iter().find(|i| i.id == decision.issue_id) else {
            continue;
        };
        let stats = rules.entry(issue.rule_code.clone()).or_default();
        match decision.decision {
            DecisionKind::Accepted => stats.accepted += 1,
            DecisionKind::Rejected => stats.rejected += 1,
            DecisionKind::Modified => stats.modified += 1,
        }
        if let Some(note) = &decision.notes
            && !note.trim().is_empty()
        {
            stats.notes.push(note.clone());
        }
    }

    RuleQualityReport {
        generated_at: Utc::now(),
        ruleset_generation: generation,
        rules,
    }
}

// =============================================================================
// Tests
// =============================================================================

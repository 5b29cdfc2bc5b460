//! Proofreading Types
//!
//! Rules live in versioned rulesets with a draft/publish lifecycle. An
//! issue is one rule firing on one article, anchored to a text range in
//! `body_text`. Decisions are operator actions on issues; a superseded
//! decision is retained for the feedback loop, never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Rule Classes and Severity
// =============================================================================

/// Severity/category bucket of a rule. A is most severe, F is stylistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleClass {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl RuleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
        }
    }

    /// Default severity an operator should assume for the class
    pub fn default_severity(&self) -> IssueSeverity {
        match self {
            Self::A => IssueSeverity::Critical,
            Self::B => IssueSeverity::Error,
            Self::C | Self::D => IssueSeverity::Warning,
            Self::E | Self::F => IssueSeverity::Info,
        }
    }
}

impl std::str::FromStr for RuleClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "E" => Ok(Self::E),
            "F" => Ok(Self::F),
            other => Err(format!("unknown rule class: {other}")),
        }
    }
}

/// Issue severity. Ordering is critical > error > warning > info, used as
/// the tie-break when sorting issues at the same offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl std::str::FromStr for IssueSeverity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

// =============================================================================
// Rules and Rulesets
// =============================================================================

/// Ruleset lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RulesetStatus {
    Draft,
    Published,
    Archived,
}

impl RulesetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl std::str::FromStr for RulesetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown ruleset status: {other}")),
        }
    }
}

/// A versioned rule corpus. Exactly one ruleset is published at any instant;
/// publishing bumps the generation counter and archives the predecessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: i64,
    pub version: String,
    pub status: RulesetStatus,
    /// Increments on each publication; stamped on analyses for provenance
    pub generation: u32,
    pub published_at: Option<DateTime<Utc>>,
    pub publisher: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One proofreading rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub ruleset_id: i64,
    /// Class letter + sequence, e.g. "A03"; unique within the ruleset
    pub code: String,
    pub class: RuleClass,
    /// Regex applied against the article's body text
    pub pattern: String,
    pub description: String,
    pub severity: IssueSeverity,
    /// Replacement template; absent for detect-only rules
    pub suggestion: Option<String>,
    pub enabled: bool,
}

impl Rule {
    /// Rule codes start with the class letter
    pub fn code_matches_class(&self) -> bool {
        self.code.starts_with(self.class.as_str())
    }
}

// =============================================================================
// Issues
// =============================================================================

/// An issue identified on an article: one rule firing on one text range.
/// Never mutated after creation; re-analysis creates a new set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofreadingIssue {
    pub id: i64,
    pub article_id: i64,
    pub rule_id: i64,
    pub rule_code: String,
    pub rule_class: RuleClass,
    pub severity: IssueSeverity,
    /// Character offsets into `body_text` (not `body_html`);
    /// `start_offset == end_offset` is a zero-width insertion point
    pub start_offset: usize,
    pub end_offset: usize,
    pub original_text: String,
    pub suggested_text: Option<String>,
    pub reasoning: Option<String>,
    pub confidence: f32,
    /// Ruleset generation the producing analysis ran against
    pub ruleset_generation: u32,
    pub created_at: DateTime<Utc>,
}

/// Sort issues by start offset ascending, severity descending as tie-break.
/// Overlapping issues at the same offset render as a stack in this order.
pub fn sort_issues(issues: &mut [ProofreadingIssue]) {
    issues.sort_by(|a, b| {
        a.start_offset
            .cmp(&b.start_offset)
            .then(b.severity.cmp(&a.severity))
    });
}

// =============================================================================
// Decisions
// =============================================================================

/// Operator verdict on an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Accepted,
    Rejected,
    Modified,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Modified => "modified",
        }
    }
}

impl std::str::FromStr for DecisionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "modified" => Ok(Self::Modified),
            other => Err(format!("unknown decision: {other}")),
        }
    }
}

/// Operator action on an issue. At most one active decision per issue;
/// a revision supersedes the previous one, which is retained for feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofreadingDecision {
    pub id: i64,
    pub article_id: i64,
    pub issue_id: i64,
    pub decision: DecisionKind,
    /// Required when decision = modified
    pub modified_content: Option<String>,
    pub notes: Option<String>,
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
    /// Set when this decision was carried forward across a re-analysis
    pub carried: bool,
    /// Set when the decision's issue no longer exists after a re-analysis
    pub archived: bool,
    /// Set when a later decision on the same issue replaced this one
    pub superseded: bool,
}

impl ProofreadingDecision {
    /// The modified-content invariant
    pub fn content_ok(&self) -> bool {
        match self.decision {
            DecisionKind::Modified => self
                .modified_content
                .as_deref()
                .is_some_and(|c| !c.is_empty()),
            _ => true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(start: usize, severity: IssueSeverity) -> ProofreadingIssue {
        ProofreadingIssue {
            id: 0,
            article_id: 1,
            rule_id: 1,
            rule_code: "A01".into(),
            rule_class: RuleClass::A,
            severity,
            start_offset: start,
            end_offset: start + 2,
            original_text: "xx".into(),
            suggested_text: None,
            reasoning: None,
            confidence: 0.9,
            ruleset_generation: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(IssueSeverity::Critical > IssueSeverity::Error);
        assert!(IssueSeverity::Error > IssueSeverity::Warning);
        assert!(IssueSeverity::Warning > IssueSeverity::Info);
    }

    #[test]
    fn test_issue_ordering() {
        let mut issues = vec![
            issue(10, IssueSeverity::Warning),
            issue(5, IssueSeverity::Info),
            issue(10, IssueSeverity::Critical),
        ];
        sort_issues(&mut issues);
        assert_eq!(issues[0].start_offset, 5);
        assert_eq!(issues[1].start_offset, 10);
        assert_eq!(issues[1].severity, IssueSeverity::Critical);
        assert_eq!(issues[2].severity, IssueSeverity::Warning);
    }

    #[test]
    fn test_class_default_severity() {
        assert_eq!(RuleClass::A.default_severity(), IssueSeverity::Critical);
        assert_eq!(RuleClass::F.default_severity(), IssueSeverity::Info);
    }

    #[test]
    fn test_modified_decision_requires_content() {
        let mut decision = ProofreadingDecision {
            id: 1,
            article_id: 1,
            issue_id: 7,
            decision: DecisionKind::Modified,
            modified_content: None,
            notes: None,
            decided_by: "alice".into(),
            decided_at: Utc::now(),
            carried: false,
            archived: false,
            superseded: false,
        };
        assert!(!decision.content_ok());

        decision.modified_content = Some("better wording".into());
        assert!(decision.content_ok());

        decision.decision = DecisionKind::Rejected;
        decision.modified_content = None;
        assert!(decision.content_ok());
    }

    #[test]
    fn test_rule_code_class_prefix() {
        let rule = Rule {
            id: 1,
            ruleset_id: 1,
            code: "B12".into(),
            class: RuleClass::B,
            pattern: r"\bteh\b".into(),
            description: "common typo".into(),
            severity: IssueSeverity::Error,
            suggestion: Some("the".into()),
            enabled: true,
        };
        assert!(rule.code_matches_class());
    }
}

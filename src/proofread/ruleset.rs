//! Ruleset Validation and Lifecycle Rules
//!
//! Rulesets move draft → published → archived. Exactly one ruleset is
//! published at any instant; publication is transactional (the storage
//! layer owns the transaction) and is preceded by the validation here:
//! every rule's pattern must compile and codes must be unique within the
//! set. In-flight analyses keep the generation they started with.

use std::collections::HashSet;

use regex::Regex;

use crate::types::{PressError, Result, Rule, RuleSet, RulesetStatus};

/// Validation failures for a candidate ruleset, all reported at once
#[derive(Debug)]
pub struct RulesetValidationError {
    pub problems: Vec<String>,
}

impl std::fmt::Display for RulesetValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ruleset validation failed: {}", self.problems.join("; "))
    }
}

/// Validate a candidate ruleset before publication.
///
/// Checks: at least one rule, every pattern compiles, no duplicate codes,
/// codes carry their class prefix.
pub fn validate_rules(rules: &[Rule]) -> Result<()> {
    let mut problems: Vec<String> = Vec::new();

    if rules.is_empty() {
        problems.push("ruleset has no rules".to_string());
    }

    let mut seen_codes: HashSet<&str> = HashSet::new();
    for rule in rules {
        if !seen_codes.insert(rule.code.as_str()) {
            problems.push(format!("duplicate rule code {}", rule.code));
        }
        if !rule.code_matches_class() {
            problems.push(format!(
                "rule code {} does not start with class {}",
                rule.code,
                rule.class.as_str()
            ));
        }
        if let Err(err) = Regex::new(&rule.pattern) {
            problems.push(format!("rule {} pattern does not compile: {err}", rule.code));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(PressError::Config(
            RulesetValidationError { problems }.to_string(),
        ))
    }
}

/// Publication state check: only drafts can be published
pub fn check_publishable(ruleset: &RuleSet) -> Result<()> {
    match ruleset.status {
        RulesetStatus::Draft => Ok(()),
        other => Err(PressError::InvalidTransition {
            from: other.as_str().to_string(),
            to: RulesetStatus::Published.as_str().to_string(),
        }),
    }
}

/// The snapshot invariant: at most one published ruleset (zero only inside
/// a publication transaction)
pub fn exactly_one_active(rulesets: &[RuleSet]) -> bool {
    rulesets
        .iter()
        .filter(|r| r.status == RulesetStatus::Published)
        .count()
        == 1
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::types::{IssueSeverity, RuleClass};

    fn rule(code: &str, class: RuleClass, pattern: &str) -> Rule {
        Rule {
            id: 0,
            ruleset_id: 1,
            code: code.into(),
            class,
            pattern: pattern.into(),
            description: "test".into(),
            severity: IssueSeverity::Warning,
            suggestion: None,
            enabled: true,
        }
    }

    fn ruleset(status: RulesetStatus, generation: u32) -> RuleSet {
        RuleSet {
            id: 1,
            version: "v1".into(),
            status,
            generation,
            published_at: None,
            publisher: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_ruleset_passes() {
        let rules = vec![
            rule("A01", RuleClass::A, r"\bplaceholder\b"),
            rule("B01", RuleClass::B, r"\bteh\b"),
        ];
        assert!(validate_rules(&rules).is_ok());
    }

    #[test]
    fn test_empty_ruleset_rejected() {
        assert!(validate_rules(&[]).is_err());
    }

    #[test]
    fn test_duplicate_codes_rejected() {
        let rules = vec![
            rule("A01", RuleClass::A, r"x"),
            rule("A01", RuleClass::A, r"y"),
        ];
        let err = validate_rules(&rules).unwrap_err();
        assert!(err.to_string().contains("duplicate rule code A01"));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let rules = vec![rule("A01", RuleClass::A, r"([unclosed")];
        let err = validate_rules(&rules).unwrap_err();
        assert!(err.to_string().contains("does not compile"));
    }

    #[test]
    fn test_class_prefix_mismatch_rejected() {
        let rules = vec![rule("B01", RuleClass::A, r"x")];
        assert!(validate_rules(&rules).is_err());
    }

    #[test]
    fn test_all_problems_reported_together() {
        let rules = vec![
            rule("A01", RuleClass::A, r"([bad"),
            rule("A01", RuleClass::A, r"(also["),
        ];
        let err = validate_rules(&rules).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("duplicate"));
        assert!(message.matches("does not compile").count() == 2);
    }

    #[test]
    fn test_only_draft_publishable() {
        assert!(check_publishable(&ruleset(RulesetStatus::Draft, 0)).is_ok());
        assert!(check_publishable(&ruleset(RulesetStatus::Published, 1)).is_err());
        assert!(check_publishable(&ruleset(RulesetStatus::Archived, 1)).is_err());
    }

    #[test]
    fn test_exactly_one_active() {
        let sets = vec![
            ruleset(RulesetStatus::Archived, 1),
            ruleset(RulesetStatus::Published, 2),
            ruleset(RulesetStatus::Draft, 0),
        ];
        assert!(exactly_one_active(&sets));

        let none_active = vec![ruleset(RulesetStatus::Draft, 0)];
        assert!(!exactly_one_active(&none_active));
    }
}

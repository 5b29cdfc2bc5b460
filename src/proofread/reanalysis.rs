//! Re-analysis Decision Carry-Forward
//!
//! When an article's body changes and analysis re-runs, the new issue set
//! is computed from scratch. Decisions whose issue no longer exists are
//! archived (retained for feedback, excluded from merge). Decisions whose
//! issue survives (same rule, identical original text, start offset
//! within the configured tolerance window) are carried forward with a
//! `carried` audit flag.

use std::collections::HashSet;

use tracing::debug;

use crate::types::{ProofreadingDecision, ProofreadingIssue};

/// The plan produced by matching old decisions against the new issue set
#[derive(Debug, Default)]
pub struct CarryPlan {
    /// (decision id, new issue id) pairs to carry forward
    pub carried: Vec<(i64, i64)>,
    /// Decision ids to archive
    pub archived: Vec<i64>,
}

/// Match each active decision's old issue against the new issue set.
///
/// `tolerance` is the `proofreading.carry_offset_tolerance` configuration
/// value: the maximum distance (bytes) the issue's start offset may have
/// moved.
pub fn plan_carry_forward(
    decisions: &[ProofreadingDecision],
    old_issues: &[ProofreadingIssue],
    new_issues: &[ProofreadingIssue],
    tolerance: usize,
) -> CarryPlan {
    let mut plan = CarryPlan::default();
    let mut claimed_new: HashSet<i64> = HashSet::new();

    for decision in decisions.iter().filter(|d| !d.archived && !d.superseded) {
        let Some(old_issue) = old_issues.iter().find(|i| i.id == decision.issue_id) else {
            // The referenced issue is gone entirely
            plan.archived.push(decision.id);
            continue;
        };

        let matched = new_issues.iter().find(|candidate| {
            !claimed_new.contains(&candidate.id)
                && candidate.rule_code == old_issue.rule_code
                && candidate.original_text == old_issue.original_text
                && offset_distance(candidate.start_offset, old_issue.start_offset) <= tolerance
        });

        match matched {
            Some(new_issue) => {
                claimed_new.insert(new_issue.id);
                plan.carried.push((decision.id, new_issue.id));
            }
            None => plan.archived.push(decision.id),
        }
    }

    debug!(
        carried = plan.carried.len(),
        archived = plan.archived.len(),
        tolerance,
        "carry-forward plan computed"
    );

    plan
}

fn offset_distance(a: usize, b: usize) -> usize {
    a.abs_diff(b)
}

// =============================================================================
// Tests
// =============================================================================

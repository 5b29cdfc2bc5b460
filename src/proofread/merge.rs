//! Decision Merge
//!
//! Computes the applied body from an issue set and the operators'
//! decisions. The applied body is derived on demand and persisted only
//! when the operator finalizes the review, at which point the same
//! replacements are patched into `body_html` through the sanitizer's
//! offset table and the result re-sanitized.
//!
//! Overlapping accepted/modified ranges are a conflict: the later-starting
//! decision is skipped and surfaced as a `DecisionConflict` for manual
//! resolution.

use tracing::debug;

use crate::parser::{OffsetTable, sanitize_fragment};
use crate::types::{
    DecisionKind, PressError, ProofreadingDecision, ProofreadingIssue, Result, sort_issues,
};

// =============================================================================
// Outcome Types
// =============================================================================

/// One replacement the merge decided to apply, in body_text offsets
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedReplacement {
    pub issue_id: i64,
    pub start_offset: usize,
    pub end_offset: usize,
    pub replacement: String,
}

/// A skipped decision whose range overlapped an earlier applied one
#[derive(Debug, Clone)]
pub struct DecisionConflict {
    pub issue_id: i64,
    pub overlaps_issue_id: i64,
    pub message: String,
}

/// The merge result
#[derive(Debug)]
pub struct MergeOutcome {
    pub applied_body: String,
    pub replacements: Vec<AppliedReplacement>,
    pub conflicts: Vec<DecisionConflict>,
    /// Issues with no decision, kept as original text
    pub deferred: usize,
}

// =============================================================================
// Merge
// =============================================================================

/// Walk issues in offset order and apply each operator decision.
///
/// - accepted: replace `original_text` with `suggested_text`
/// - rejected: keep `original_text`
/// - modified: replace with `modified_content`
/// - no decision: keep (deferred)
pub fn apply_decisions(
    body_text: &str,
    issues: &[ProofreadingIssue],
    decisions: &[ProofreadingDecision],
) -> Result<MergeOutcome> {
    let mut ordered: Vec<ProofreadingIssue> = issues.to_vec();
    sort_issues(&mut ordered);

    let mut replacements: Vec<AppliedReplacement> = Vec::new();
    let mut conflicts: Vec<DecisionConflict> = Vec::new();
    let mut deferred = 0usize;

    for issue in &ordered {
        if issue.end_offset < issue.start_offset || issue.end_offset > body_text.len() {
            return Err(PressError::invariant(format!(
                "issue {} range {}..{} exceeds body of {} bytes",
                issue.id,
                issue.start_offset,
                issue.end_offset,
                body_text.len()
            )));
        }
        if &body_text[issue.start_offset..issue.end_offset] != issue.original_text {
            return Err(PressError::invariant(format!(
                "issue {} original_text no longer matches the body at {}..{}",
                issue.id, issue.start_offset, issue.end_offset
            )));
        }

        let decision = active_decision(decisions, issue.id);

        let replacement = match decision {
            None => {
                deferred += 1;
                continue;
            }
            Some(d) => match d.decision {
                DecisionKind::Rejected => continue,
                DecisionKind::Accepted => match &issue.suggested_text {
                    Some(suggested) => suggested.clone(),
                    None => {
                        return Err(PressError::invariant(format!(
                            "decision {} accepts issue {} which has no suggested_text",
                            d.id, issue.id
                        )));
                    }
                },
                DecisionKind::Modified => match &d.modified_content {
                    Some(content) if !content.is_empty() => content.clone(),
                    _ => {
                        return Err(PressError::invariant(format!(
                            "decision {} is modified without modified_content",
                            d.id
                        )));
                    }
                },
            },
        };

        // Overlap with an already-applied range: later-starting loses
        if let Some(previous) = replacements
            .iter()
            .find(|r| ranges_overlap(r.start_offset, r.end_offset, issue.start_offset, issue.end_offset))
        {
            debug!(
                issue_id = issue.id,
                overlaps = previous.issue_id,
                "decision conflict, skipping later-starting decision"
            );
            conflicts.push(DecisionConflict {
                issue_id: issue.id,
                overlaps_issue_id: previous.issue_id,
                message: format!(
                    "range {}..{} overlaps issue {} applied at {}..{}",
                    issue.start_offset,
                    issue.end_offset,
                    previous.issue_id,
                    previous.start_offset,
                    previous.end_offset
                ),
            });
            continue;
        }

        replacements.push(AppliedReplacement {
            issue_id: issue.id,
            start_offset: issue.start_offset,
            end_offset: issue.end_offset,
            replacement,
        });
    }

    let applied_body = splice(body_text, &replacements);

    Ok(MergeOutcome {
        applied_body,
        replacements,
        conflicts,
        deferred,
    })
}

/// The one non-archived, non-superseded decision for an issue
fn active_decision<'a>(
    decisions: &'a [ProofreadingDecision],
    issue_id: i64,
) -> Option<&'a ProofreadingDecision> {
    decisions
        .iter()
        .filter(|d| d.issue_id == issue_id && !d.archived && !d.superseded)
        .max_by_key(|d| d.decided_at)
}

/// Two ranges overlap; zero-width ranges conflict only when strictly inside
fn ranges_overlap(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> bool {
    a_start < b_end && b_start < a_end
        || (a_start == a_end && b_start < a_start && a_start < b_end)
        || (b_start == b_end && a_start < b_start && b_start < a_end)
}

/// Apply non-overlapping, offset-sorted replacements to a string
fn splice(body: &str, replacements: &[AppliedReplacement]) -> String {
    let mut out = String::with_capacity(body.len());
    let mut cursor = 0usize;
    for r in replacements {
        out.push_str(&body[cursor..r.start_offset]);
        out.push_str(&r.replacement);
        cursor = r.end_offset;
    }
    out.push_str(&body[cursor..]);
    out
}

// =============================================================================
// Finalize
// =============================================================================

/// Patch the merge's replacements into `body_html` through the offset
/// table and re-sanitize. Used when the operator finalizes the review.
pub fn finalize_html(
    body_html: &str,
    offsets: &OffsetTable,
    replacements: &[AppliedReplacement],
) -> Result<String> {
    let mut out = String::with_capacity(body_html.len());
    let mut cursor = 0usize;

    for r in replacements {
        let html_start = offsets.text_to_html(r.start_offset).ok_or_else(|| {
            PressError::invariant(format!(
                "text offset {} has no HTML mapping",
                r.start_offset
            ))
        })?;
        let html_end = if r.end_offset == r.start_offset {
            html_start
        } else {
            offsets.text_to_html_end(r.end_offset).ok_or_else(|| {
                PressError::invariant(format!("text offset {} has no HTML mapping", r.end_offset))
            })?
        };
        if html_start < cursor || html_end < html_start || html_end > body_html.len() {
            return Err(PressError::invariant(format!(
                "replacement maps to invalid HTML range {html_start}..{html_end}"
            )));
        }
        out.push_str(&body_html[cursor..html_start]);
        out.push_str(&escape_text(&r.replacement));
        cursor = html_end;
    }
    out.push_str(&body_html[cursor..]);

    // Rewrap through the sanitizer so the stored body stays canonical
    Ok(sanitize_fragment(&out)?.body_html)
}

fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// =============================================================================
// Tests
// =============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use super::tests::{decision, issue};
    use proptest::prelude::*;

    proptest! {
        /// Applying the same decision set twice yields the same applied body
        #[test]
        fn merge_idempotent(seed in 0u64..1000) {
            let body = "alpha beta gamma delta epsilon";
            // Deterministic pseudo-random decision mix from the seed
            let kinds = [DecisionKind::Accepted, DecisionKind::Rejected, DecisionKind::Modified];
            let kind = kinds[(seed % 3) as usize];
            let modified = matches!(kind, DecisionKind::Modified).then(|| "X");

            let issues = vec![
                issue(1, 0, 5, "alpha", Some("ALPHA")),
                issue(2, 6, 10, "beta", Some("BETA")),
            ];
            let decisions = vec![
                decision(1, 1, kind, modified),
                decision(2, 2, DecisionKind::Accepted, None),
            ];

            let a = apply_decisions(body, &issues, &decisions).unwrap();
            let b = apply_decisions(body, &issues, &decisions).unwrap();
            prop_assert_eq!(a.applied_body, b.applied_body);
        }

        /// Decision list order never changes the outcome
        #[test]
        fn merge_order_independent(shuffle in any::<bool>()) {
            let body = "alpha beta gamma";
            let issues = vec![
                issue(1, 0, 5, "alpha", Some("A")),
                issue(2, 6, 10, "beta", Some("B")),
            ];
            let mut decisions = vec![
                decision(1, 1, DecisionKind::Accepted, None),
                decision(2, 2, DecisionKind::Accepted, None),
            ];
            if shuffle {
                decisions.reverse();
            }
            let outcome = apply_decisions(body, &issues, &decisions).unwrap();
            prop_assert_eq!(outcome.applied_body, "A B gamma");
        }
    }
}

//! Worklist Types
//!
//! The worklist item is the unit of work tracked by the orchestrator: one
//! per document ingested from the document store. Status moves through a
//! fixed lane graph; any edge outside the adjacency set is rejected unless
//! an operator override is recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Status Lanes
// =============================================================================

/// Worklist status lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorklistStatus {
    /// Synced from document store, not yet processed
    Pending,
    /// Document parser executing
    Parsing,
    /// Parser done; operator may confirm or re-parse
    ParsingReview,
    /// Proofreading engine executing
    Proofreading,
    /// Issues presented, operator deciding
    ProofreadingReview,
    /// All review gates passed
    ReadyToPublish,
    /// Publishing orchestrator executing
    Publishing,
    /// CMS draft created; terminal success
    Published,
    /// Unrecoverable in current state; terminal unless operator resets
    Failed,
}

impl WorklistStatus {
    /// All lanes, in pipeline order
    pub const ALL: [WorklistStatus; 9] = [
        Self::Pending,
        Self::Parsing,
        Self::ParsingReview,
        Self::Proofreading,
        Self::ProofreadingReview,
        Self::ReadyToPublish,
        Self::Publishing,
        Self::Published,
        Self::Failed,
    ];

    /// Whether the lane is terminal (published) or terminal-unless-reset (failed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }

    /// Lanes where the item sits waiting for operator input. No per-item
    /// lock is held in these lanes.
    pub fn is_review(&self) -> bool {
        matches!(
            self,
            Self::ParsingReview | Self::ProofreadingReview | Self::ReadyToPublish
        )
    }

    /// Lanes where a background job is (or should be) running
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Parsing | Self::Proofreading | Self::Publishing)
    }

    /// The adjacency set: legal `(from, to)` edges of the lane graph.
    /// Operator resets from `failed` are handled separately and require
    /// a recorded override note.
    pub fn can_transition_to(&self, to: WorklistStatus) -> bool {
        use WorklistStatus::*;
        matches!(
            (*self, to),
            (Pending, Parsing)
                | (Parsing, ParsingReview)
                | (Parsing, Failed)
                | (ParsingReview, Proofreading)
                | (ParsingReview, Parsing)
                | (Proofreading, ProofreadingReview)
                | (Proofreading, Failed)
                | (ProofreadingReview, ReadyToPublish)
                | (ProofreadingReview, Proofreading)
                | (ProofreadingReview, ParsingReview)
                | (ReadyToPublish, Publishing)
                | (Publishing, Published)
                | (Publishing, Failed)
        )
    }

    /// Lanes an operator may reset a failed item back to
    pub fn resettable_from_failed(&self) -> bool {
        !self.is_terminal() && !self.is_transient()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Parsing => "parsing",
            Self::ParsingReview => "parsing_review",
            Self::Proofreading => "proofreading",
            Self::ProofreadingReview => "proofreading_review",
            Self::ReadyToPublish => "ready_to_publish",
            Self::Publishing => "publishing",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for WorklistStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorklistStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "parsing" => Ok(Self::Parsing),
            "parsing_review" => Ok(Self::ParsingReview),
            "proofreading" => Ok(Self::Proofreading),
            "proofreading_review" => Ok(Self::ProofreadingReview),
            "ready_to_publish" => Ok(Self::ReadyToPublish),
            "publishing" => Ok(Self::Publishing),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown worklist status: {other}")),
        }
    }
}

// =============================================================================
// Notes
// =============================================================================

/// Append-only operator annotation on a worklist item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Set when this note records an operator override of the lane graph
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_override: bool,
}

impl Note {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            created_at: Utc::now(),
            is_override: false,
        }
    }

    /// A note recording an explicit operator override (lane reset)
    pub fn override_note(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            is_override: true,
            ..Self::new(author, text)
        }
    }

    /// System-authored note, e.g. "upstream changed at T"
    pub fn system(text: impl Into<String>) -> Self {
        Self::new("system", text)
    }
}

// =============================================================================
// Document Metadata
// =============================================================================

/// Metadata captured from the document store at sync time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Link back to the document in the store
    pub link: Option<String>,
    /// Owner display names
    #[serde(default)]
    pub owners: Vec<String>,
    /// Store-side last-modified timestamp
    pub last_modified: Option<DateTime<Utc>>,
}

// =============================================================================
// Worklist Item
// =============================================================================

/// The central entity: one per ingested document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorklistItem {
    pub id: i64,
    /// External id, unique within the document store
    pub document_id: String,
    pub status: WorklistStatus,
    /// Set once parsing succeeds and creates an Article
    pub article_id: Option<i64>,
    /// Content snapshot at sync time
    pub raw_html: String,
    pub raw_text: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub document_metadata: DocumentMetadata,
    /// Operator-visible error message for the failed lane
    pub error_message: Option<String>,
    /// Per-item opt-in to the review-gate-skipping auto-process path
    pub auto_process: bool,
    pub notes: Vec<Note>,
    pub synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-archive flag; items are never deleted
    pub archived: bool,
}

impl WorklistItem {
    /// Check the article linkage invariant: `article_id` is null exactly in
    /// the lanes before parsing has succeeded.
    pub fn article_linkage_ok(&self) -> bool {
        let pre_parse = matches!(
            self.status,
            WorklistStatus::Pending | WorklistStatus::Parsing
        ) || (self.status == WorklistStatus::Failed && self.article_id.is_none());
        if self.article_id.is_none() {
            pre_parse
        } else {
            !matches!(self.status, WorklistStatus::Pending)
        }
    }

    /// Whether an override note exists (required for any off-graph edge)
    pub fn has_override_note(&self) -> bool {
        self.notes.iter().any(|n| n.is_override)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_edges() {
        use WorklistStatus::*;
        let path = [
            Pending,
            Parsing,
            ParsingReview,
            Proofreading,
            ProofreadingReview,
            ReadyToPublish,
            Publishing,
            Published,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} must be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_backward_edges() {
        use WorklistStatus::*;
        assert!(ParsingReview.can_transition_to(Parsing));
        assert!(ProofreadingReview.can_transition_to(Proofreading));
        assert!(ProofreadingReview.can_transition_to(ParsingReview));
    }

    #[test]
    fn test_illegal_edges() {
        use WorklistStatus::*;
        assert!(!Pending.can_transition_to(Published));
        assert!(!Pending.can_transition_to(Proofreading));
        assert!(!ParsingReview.can_transition_to(Publishing));
        assert!(!Published.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Pending)); // resets go through the override path
        assert!(!ReadyToPublish.can_transition_to(Published)); // must pass through publishing
    }

    #[test]
    fn test_review_lanes() {
        assert!(WorklistStatus::ParsingReview.is_review());
        assert!(WorklistStatus::ProofreadingReview.is_review());
        assert!(WorklistStatus::ReadyToPublish.is_review());
        assert!(!WorklistStatus::Parsing.is_review());
    }

    #[test]
    fn test_terminal_lanes() {
        assert!(WorklistStatus::Published.is_terminal());
        assert!(WorklistStatus::Failed.is_terminal());
        assert!(!WorklistStatus::Publishing.is_terminal());
    }

    #[test]
    fn test_resettable_targets() {
        use WorklistStatus::*;
        assert!(Pending.resettable_from_failed());
        assert!(ParsingReview.resettable_from_failed());
        assert!(ReadyToPublish.resettable_from_failed());
        assert!(!Parsing.resettable_from_failed());
        assert!(!Published.resettable_from_failed());
        assert!(!Failed.resettable_from_failed());
    }

    #[test]
    fn test_status_round_trip() {
        for status in WorklistStatus::ALL {
            let parsed: WorklistStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_override_note_flag() {
        let note = Note::override_note("alice", "reset to parsing_review after CMS outage");
        assert!(note.is_override);
        let plain = Note::new("bob", "looks fine");
        assert!(!plain.is_override);
    }
}

//! Core Domain Types
//!
//! Entities of the pipeline (worklist items, articles, proofreading
//! artifacts, publish tasks) and the unified error system.

pub mod article;
pub mod error;
pub mod proofreading;
pub mod publish;
pub mod worklist;

pub use article::{
    Article, ArticleImage, ArticleStatus, FaqProposal, ImageReview, ImageReviewAction, ImageSpecs,
    KeywordTiers, ParsingMethod, TitleParts, TitleSuggestion, positions_strictly_increasing,
};
pub use error::{
    ErrorCategory, ErrorClassifier, ExternalError, PressError, Result, ResultExt,
};
pub use proofreading::{
    DecisionKind, IssueSeverity, ProofreadingDecision, ProofreadingIssue, Rule, RuleClass,
    RuleSet, RulesetStatus, sort_issues,
};
pub use publish::{
    PublishOutcome, PublishProviderKind, PublishStatus, PublishStep, PublishTask, Screenshot,
};
pub use worklist::{DocumentMetadata, Note, WorklistItem, WorklistStatus};

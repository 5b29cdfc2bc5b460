//! Proofreading Engine
//!
//! A versioned rule corpus applied to article text, operator decisions
//! merged into a final corrected body, and a feedback loop over decision
//! patterns.
//!
//! ## Modules
//!
//! - `engine`: compiled rules over body text, contained failures
//! - `merge`: decision merge into the applied body, conflict handling
//! - `reanalysis`: carry-forward of decisions across body changes
//! - `ruleset`: validation and lifecycle checks (draft/publish/archive)
//! - `feedback`: rule-quality report for the next draft

pub mod engine;
pub mod feedback;
pub mod merge;
pub mod reanalysis;
pub mod ruleset;

pub use engine::{AnalysisReport, RuleEngine, RuleRuntimeError};
pub use feedback::{RuleQualityReport, RuleStats, build_report};
pub use merge::{
    AppliedReplacement, DecisionConflict, MergeOutcome, apply_decisions, finalize_html,
};
pub use reanalysis::{CarryPlan, plan_carry_forward};
pub use ruleset::{check_publishable, exactly_one_active, validate_rules};

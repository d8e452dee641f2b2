//! The rule renderer.
//!
//! A node's rule is the conjunction of the split decisions
//! from the root to the node, combined into one condition per variable:
//! intervals for thresholds, level sets for subsets
//! (and for thresholds on ordered levels).

mod constraint;
mod renderer;


pub use renderer::{
    render_rule,
    Condition,
    ResponseSummary,
    Rule,
    RuleRenderer,
    RuleStats,
};

pub(crate) use constraint::{ConstraintKey, PathConstraints};

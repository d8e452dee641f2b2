//! The traversal engine.
//!
//! [`Predictor`] pushes a [`Sample`](crate::Sample) through every tree
//! of a [`Forest`](crate::Forest). One traversal yields
//! the terminal node per tree, the membership of every visited node,
//! and the aggregated prediction.

mod engine;
mod membership;
mod output;


pub use engine::{
    MissingPolicy,
    OutputMode,
    Predictor,
};
pub use membership::{
    MembershipMatrix,
    NodeColumn,
};
pub use output::{
    Aggregate,
    ForestOutput,
    TerminalNodes,
    Traversal,
};

//! Exports the types needed to build a forest,
//! traverse it, and describe its nodes.
//! 
pub use crate::variable::{
    RawVariable,
    VariableDescriptor,
    VariableKind,
};


pub use crate::tree::{
    LeftRight,
    MissingBranch,
    Node,
    NodeId,
    NodeTable,
    Prediction,
    Split,
    SplitValue,
    Status,
};


pub use crate::adapter::{
    // Adapter trait
    BackendAdapter,

    ModelKind,
    RawModel,
    Target,

    // Reference adapters -----------------------
    GradientBoostingModel,
    RandomForestModel,
};


pub use crate::forest::{
    Forest,
    ForestBuilder,
};


pub use crate::sample::{
    Response,
    Sample,
};


pub use crate::traversal::{
    Aggregate,
    ForestOutput,
    MembershipMatrix,
    MissingPolicy,
    NodeColumn,
    OutputMode,
    Predictor,
    TerminalNodes,
    Traversal,
};


pub use crate::duplicate::{
    duplicate_pairs,
    find_duplicates,
    find_forest_duplicates,
};


pub use crate::rule::{
    render_rule,
    Condition,
    ResponseSummary,
    Rule,
    RuleRenderer,
    RuleStats,
};


pub use crate::error::{
    ForestError,
    Location,
    Result,
};

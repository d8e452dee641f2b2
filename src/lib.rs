#![warn(missing_docs)]

//!
//! A crate that provides a model-agnostic representation
//! of decision-tree ensembles.
//!
//! Every tree-growing backend (random forest, gradient boosting, ...)
//! is translated into the same **canonical node table**,
//! so that the code working on the tree structure
//! behaves identically regardless of the backend.
//!
//! - [`adapter`]
//!     Translates the raw arrays of a backend into [`NodeTable`]s.
//!     The backend is selected by an explicit [`ModelKind`] tag.
//!
//! - [`traversal`]
//!     Pushes a batch of observations through a [`Forest`]
//!     and reports the terminal nodes, the full node membership,
//!     or the aggregated prediction.
//!
//! - [`duplicate`]
//!     Finds the nodes whose split paths are logically equivalent
//!     to the path of another node.
//!
//! - [`rule`]
//!     Renders the split path of a node as a readable predicate.
//!
//! # Example
//! ```no_run
//! use unitree::prelude::*;
//!
//! let json = std::fs::read_to_string("/path/to/model.json").unwrap();
//! let model = RawModel::from_json(&json).unwrap();
//! let forest = ForestBuilder::new(&model)
//!     .verbose(true)
//!     .build()
//!     .unwrap();
//!
//! let sample = Sample::from_columns(
//!     ["x", "y"],
//!     vec![vec![1.0, 4.0], vec![0.0, 1.0]],
//! ).unwrap();
//! let membership = Predictor::new(&forest)
//!     .membership(&sample)
//!     .unwrap();
//! println!("{:?}", membership.shape());
//! ```

pub mod constants;
pub mod error;
pub mod variable;
pub mod tree;
pub mod adapter;
pub mod forest;
pub mod sample;
pub mod traversal;
pub mod duplicate;
pub mod rule;
pub mod prelude;


pub use error::{ForestError, Location, Result};

pub use variable::{
    RawVariable,
    VariableDescriptor,
    VariableKind,
};

pub use tree::{
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

pub use adapter::{
    BackendAdapter,
    ModelKind,
    RawModel,
    Target,
};

pub use forest::{Forest, ForestBuilder};

pub use sample::{Response, Sample};

pub use traversal::{
    Aggregate,
    MembershipMatrix,
    MissingPolicy,
    NodeColumn,
    OutputMode,
    Predictor,
    ForestOutput,
    TerminalNodes,
    Traversal,
};

pub use duplicate::{
    find_duplicates,
    find_forest_duplicates,
    duplicate_pairs,
};

pub use rule::{
    render_rule,
    Condition,
    Rule,
    RuleRenderer,
    RuleStats,
    ResponseSummary,
};

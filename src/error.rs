//! Defines the error type returned by this crate.
//!
//! Every variant carries the tree, node, or variable that triggered it
//! since a forest holds many trees.
use thiserror::Error;

use std::fmt;

use crate::tree::NodeId;
use crate::adapter::ModelKind;


/// Where a [`ForestError::Schema`] was detected.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// The model as a whole (e.g., the target description).
    Model,
    /// The `index`-th predictor, named `name`.
    Variable {
        /// Position in the descriptor sequence.
        index: usize,
        /// Predictor label.
        name: String,
    },
    /// A tree as a whole.
    Tree(usize),
    /// A node of a tree.
    Node {
        /// Tree index in the forest.
        tree: usize,
        /// Node id within the tree.
        node: NodeId,
    },
    /// A column of an observation batch.
    Column(String),
}


impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Variable { index, name } => {
                write!(f, "variable #{index} (`{name}`)")
            },
            Self::Tree(tree) => write!(f, "tree {tree}"),
            Self::Node { tree, node } => {
                write!(f, "tree {tree}, node {node}")
            },
            Self::Column(name) => write!(f, "column `{name}`"),
        }
    }
}


/// Errors raised while building or querying a [`Forest`](crate::Forest).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForestError {
    /// Malformed or incomplete backend metadata.
    /// Fails the whole forest build.
    #[error("schema error at {location}: {reason}")]
    Schema {
        /// What was malformed.
        location: Location,
        /// Human readable description.
        reason: String,
    },

    /// A backend feature this crate declines to support.
    #[error("unsupported {model} model: {reason}")]
    UnsupportedModel {
        /// The backend that produced the model.
        model: ModelKind,
        /// Human readable description.
        reason: String,
    },

    /// An observation reached a split on a missing value,
    /// and the node does not define where missing values go.
    #[error(
        "row {row} has a missing value for `{variable}` \
         at tree {tree}, node {node}, \
         which has no defined missing branch"
    )]
    MissingValue {
        /// Tree index in the forest.
        tree: usize,
        /// Node id of the split.
        node: NodeId,
        /// Label of the split variable.
        variable: String,
        /// Row of the observation batch.
        row: usize,
    },

    /// A node table violates the canonical tree invariants.
    #[error("structural invariant violated at tree {tree}, node {node}: {reason}")]
    StructuralInvariant {
        /// Tree index in the forest.
        tree: usize,
        /// Node id where the violation was found.
        node: NodeId,
        /// Human readable description.
        reason: String,
    },

    /// A JSON document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(String),

    /// A polars operation failed while reading a data frame.
    #[error("data frame error: {0}")]
    Polars(String),
}


impl ForestError {
    pub(crate) fn schema<S: ToString>(location: Location, reason: S) -> Self {
        Self::Schema { location, reason: reason.to_string() }
    }

    pub(crate) fn structural<S: ToString>(
        tree: usize,
        node: NodeId,
        reason: S,
    ) -> Self
    {
        Self::StructuralInvariant { tree, node, reason: reason.to_string() }
    }

    pub(crate) fn unsupported<S: ToString>(model: ModelKind, reason: S)
        -> Self
    {
        Self::UnsupportedModel { model, reason: reason.to_string() }
    }
}


impl From<serde_json::Error> for ForestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}


impl From<polars::prelude::PolarsError> for ForestError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::Polars(err.to_string())
    }
}


/// Result type for the operations of this crate.
pub type Result<T> = std::result::Result<T, ForestError>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_value_display() {
        let err = ForestError::MissingValue {
            tree: 2,
            node: NodeId::from(5),
            variable: "age".to_string(),
            row: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("row 7"), "got {msg}");
        assert!(msg.contains("`age`"), "got {msg}");
        assert!(msg.contains("tree 2, node 5"), "got {msg}");
    }

    #[test]
    fn test_schema_display() {
        let location = Location::Variable { index: 1, name: "x".into() };
        let err = ForestError::schema(location, "flag `numeric` is missing");
        let msg = err.to_string();
        assert_eq!(
            msg,
            "schema error at variable #1 (`x`): flag `numeric` is missing"
        );
    }

    #[test]
    fn test_structural_display() {
        let err = ForestError::structural(0, NodeId::from(3), "shared child");
        let msg = err.to_string();
        assert!(msg.contains("tree 0, node 3"), "got {msg}");
    }
}

//! A row of the canonical node table.
use serde::{Serialize, Deserialize};

use std::fmt;

use super::split::{LeftRight, Split};


/// The 1-based position of a node in its tree. The root is always `1`.
/// This is just a wrapper for `usize`.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug,
    Serialize, Deserialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct NodeId(pub usize);


impl NodeId {
    /// The id of the root node.
    pub const ROOT: Self = Self(1);


    /// Returns the 0-based position of the node in its table.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 - 1
    }


    /// Returns the id of the node at the 0-based position `index`.
    #[inline]
    pub fn from_index(index: usize) -> Self {
        Self(index + 1)
    }


    /// Returns `true` if this is the root id.
    #[inline]
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}


impl From<usize> for NodeId {
    #[inline]
    fn from(id: usize) -> Self {
        Self(id)
    }
}


impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.0;
        write!(f, "{id}")
    }
}


/// Terminal (leaf) or internal (split) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// A node that has no child.
    Terminal,
    /// A node that has two children.
    Internal,
}


/// The child an observation with a missing split value follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingBranch {
    /// Missing values go to the left child.
    Left,
    /// Missing values go to the right child.
    Right,
    /// The backend cannot route missing values.
    #[default]
    Undefined,
}


impl MissingBranch {
    /// Returns the direction, or `None` if no branch is defined.
    #[inline]
    pub fn route(&self) -> Option<LeftRight> {
        match self {
            Self::Left => Some(LeftRight::Left),
            Self::Right => Some(LeftRight::Right),
            Self::Undefined => None,
        }
    }
}


/// The output of a node, defined for every node
/// so that a tree can be cut at any depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Prediction {
    /// Regression output.
    Value(f64),
    /// Index into the class labels of the target.
    Class(usize),
}


impl Prediction {
    /// Returns the prediction as `f64`.
    /// A class prediction returns its index.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Value(value) => *value,
            Self::Class(class) => *class as f64,
        }
    }
}


impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Class(class) => write!(f, "class {class}"),
        }
    }
}


/// One node of a canonical node table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    #[serde(default)]
    pub(crate) missing: MissingBranch,
    pub(crate) split: Option<Split>,
    pub(crate) status: Status,
    pub(crate) prediction: Prediction,
}


impl Node {
    /// Returns a terminal node.
    pub fn leaf(id: usize, prediction: Prediction) -> Self {
        Self {
            id: NodeId(id),
            left: None,
            right: None,
            missing: MissingBranch::Undefined,
            split: None,
            status: Status::Terminal,
            prediction,
        }
    }


    /// Returns an internal node.
    /// Missing values are not routed unless [`Node::missing`] is called.
    pub fn branch(
        id: usize,
        split: Split,
        left: usize,
        right: usize,
        prediction: Prediction,
    ) -> Self
    {
        Self {
            id: NodeId(id),
            left: Some(NodeId(left)),
            right: Some(NodeId(right)),
            missing: MissingBranch::Undefined,
            split: Some(split),
            status: Status::Internal,
            prediction,
        }
    }


    /// Set the branch taken by missing values.
    pub fn missing(mut self, missing: MissingBranch) -> Self {
        self.missing = missing;
        self
    }


    /// Returns the node id.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }


    /// Returns the left child.
    #[inline]
    pub fn left(&self) -> Option<NodeId> {
        self.left
    }


    /// Returns the right child.
    #[inline]
    pub fn right(&self) -> Option<NodeId> {
        self.right
    }


    /// Returns the child in direction `lr`.
    #[inline]
    pub fn child(&self, lr: LeftRight) -> Option<NodeId> {
        match lr {
            LeftRight::Left => self.left,
            LeftRight::Right => self.right,
        }
    }


    /// Returns the missing-value branch.
    #[inline]
    pub fn missing_branch(&self) -> MissingBranch {
        self.missing
    }


    /// Returns the split rule, `None` for terminal nodes.
    #[inline]
    pub fn split(&self) -> Option<&Split> {
        self.split.as_ref()
    }


    /// Returns the node status.
    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }


    /// Returns `true` if this is a terminal node.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status == Status::Terminal
    }


    /// Returns the prediction of this node.
    #[inline]
    pub fn prediction(&self) -> Prediction {
        self.prediction
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_index() {
        let id = NodeId::from(4);
        assert_eq!(id.index(), 3);
        assert_eq!(NodeId::from_index(3), id);
        assert!(NodeId::ROOT.is_root());
    }

    #[test]
    fn test_leaf() {
        let node = Node::leaf(3, Prediction::Value(1.5));
        assert!(node.is_terminal());
        assert_eq!(node.left(), None);
        assert_eq!(node.split(), None);
        assert_eq!(node.missing_branch(), MissingBranch::Undefined);
    }

    #[test]
    fn test_branch() {
        let split = Split::threshold(0, 2.5);
        let node = Node::branch(1, split, 2, 3, Prediction::Class(0))
            .missing(MissingBranch::Right);
        assert!(!node.is_terminal());
        assert_eq!(node.child(LeftRight::Left), Some(NodeId(2)));
        assert_eq!(node.child(LeftRight::Right), Some(NodeId(3)));
        assert_eq!(node.missing_branch().route(), Some(LeftRight::Right));
    }
}

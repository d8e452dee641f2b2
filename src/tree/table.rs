//! The canonical node table of one tree.
//! The tree invariants are checked once, in [`NodeTable::new`].
use std::fmt::Write as _;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

use crate::error::{ForestError, Location, Result};
use crate::variable::{VariableDescriptor, VariableKind};

use super::node::{Node, NodeId, Status};
use super::split::{LeftRight, SplitValue};


/// Normalized, backend-independent node list of one tree.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTable {
    tree: usize,
    nodes: Vec<Node>,
    parents: Vec<Option<(NodeId, LeftRight)>>,
    depths: Vec<usize>,
}


impl NodeTable {
    /// Validates `nodes` and returns the table of the `tree`-th tree.
    ///
    /// Fails with [`ForestError::StructuralInvariant`] if `nodes` is not
    /// a binary tree rooted at id `1`, and with [`ForestError::Schema`]
    /// if a split does not match the kind of its variable.
    pub fn new(
        tree: usize,
        nodes: Vec<Node>,
        variables: &[VariableDescriptor],
    ) -> Result<Self>
    {
        if nodes.is_empty() {
            return Err(ForestError::structural(
                tree, NodeId::ROOT, "the tree has no nodes"
            ));
        }

        let n_nodes = nodes.len();
        let mut parents = vec![None; n_nodes];

        for (pos, node) in nodes.iter().enumerate() {
            let id = node.id;
            if id != NodeId::from_index(pos) {
                let reason = format!(
                    "expected id {} at position {pos}", pos + 1
                );
                return Err(ForestError::structural(tree, id, reason));
            }

            match node.status {
                Status::Terminal => {
                    if node.left.is_some() || node.right.is_some() {
                        return Err(ForestError::structural(
                            tree, id, "a terminal node has children"
                        ));
                    }
                    if node.split.is_some() {
                        return Err(ForestError::structural(
                            tree, id, "a terminal node has a split"
                        ));
                    }
                },
                Status::Internal => {
                    check_split(tree, node, variables)?;

                    let (left, right) = match (node.left, node.right) {
                        (Some(l), Some(r)) => (l, r),
                        _ => {
                            return Err(ForestError::structural(
                                tree, id, "an internal node needs two children"
                            ));
                        },
                    };
                    if left == right {
                        return Err(ForestError::structural(
                            tree, id, "both children are the same node"
                        ));
                    }

                    for (child, lr) in [(left, LeftRight::Left), (right, LeftRight::Right)] {
                        if child.0 == 0 || child.0 > n_nodes {
                            let reason = format!(
                                "child {child} does not exist \
                                 (the tree has {n_nodes} nodes)"
                            );
                            return Err(ForestError::structural(tree, id, reason));
                        }
                        if child.is_root() {
                            return Err(ForestError::structural(
                                tree, id, "the root is referenced as a child"
                            ));
                        }
                        if let Some((parent, _)) = parents[child.index()] {
                            let reason = format!(
                                "child {child} is shared with node {parent}"
                            );
                            return Err(ForestError::structural(tree, id, reason));
                        }
                        parents[child.index()] = Some((id, lr));
                    }
                },
            }
        }

        if let Some(pos) = parents.iter().skip(1).position(|p| p.is_none()) {
            let id = NodeId::from_index(pos + 1);
            return Err(ForestError::structural(
                tree, id, "the node is not referenced by any parent"
            ));
        }

        // Every non-root node has exactly one parent at this point,
        // so a node unreachable from the root lies on a cycle.
        let mut depths = vec![usize::MAX; n_nodes];
        depths[0] = 0;
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            let node = &nodes[id.index()];
            let depth = depths[id.index()];
            for child in [node.left, node.right].into_iter().flatten() {
                depths[child.index()] = depth + 1;
                stack.push(child);
            }
        }
        if let Some(pos) = depths.iter().position(|&d| d == usize::MAX) {
            return Err(ForestError::structural(
                tree, NodeId::from_index(pos), "the node is its own ancestor"
            ));
        }

        Ok(Self { tree, nodes, parents, depths, })
    }


    /// Returns the index of this tree in its forest.
    #[inline]
    pub fn tree_index(&self) -> usize {
        self.tree
    }


    /// Returns the number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }


    /// A validated table always has a root,
    /// so this returns `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }


    /// Returns the nodes in id order.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes[..]
    }


    /// Mutable access for adapters that fill in the predictions
    /// after the structure has been validated.
    #[inline]
    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes[..]
    }


    /// Returns the node ids, deepest first.
    /// Every child comes before its parent.
    pub(crate) fn bottom_up(&self) -> Vec<NodeId> {
        let mut ids = (0..self.len())
            .map(NodeId::from_index)
            .collect::<Vec<_>>();
        ids.sort_by_key(|id| std::cmp::Reverse(self.depth(*id)));
        ids
    }


    /// Returns the root node.
    #[inline]
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }


    /// Returns the node of id `id`, if exists.
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if id.0 == 0 { return None; }
        self.nodes.get(id.index())
    }


    /// Returns the node of id `id`.
    /// Panics if `id` is out of range.
    #[inline]
    pub(crate) fn at(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }


    /// Returns the parent of `id` and the direction from the parent,
    /// `None` for the root.
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<(NodeId, LeftRight)> {
        self.parents[id.index()]
    }


    /// Returns the depth of `id`. The root has depth `0`.
    #[inline]
    pub fn depth(&self, id: NodeId) -> usize {
        self.depths[id.index()]
    }


    /// Returns the maximal depth over all nodes.
    pub fn max_depth(&self) -> usize {
        self.depths.iter()
            .copied()
            .max()
            .unwrap_or(0)
    }


    /// Returns the split path from the root to `id`:
    /// each ancestor together with the direction taken from it.
    pub fn path(&self, id: NodeId) -> Vec<(NodeId, LeftRight)> {
        let mut path = Vec::with_capacity(self.depth(id));
        let mut current = id;
        while let Some((parent, lr)) = self.parent(current) {
            path.push((parent, lr));
            current = parent;
        }
        path.reverse();
        path
    }


    /// Returns the ids of the terminal nodes.
    pub fn terminal_ids(&self) -> Vec<NodeId> {
        self.nodes.iter()
            .filter(|node| node.is_terminal())
            .map(|node| node.id)
            .collect()
    }


    /// Returns this tree in Graphviz `dot` format.
    pub fn to_dot(&self, variables: &[VariableDescriptor]) -> String {
        let mut dot = String::from("graph DecisionTree {\n");
        for node in self.nodes.iter() {
            let id = node.id;
            match &node.split {
                Some(split) => {
                    let var = &variables[split.variable];
                    let label = match &split.value {
                        SplitValue::Threshold(thr) => {
                            format!("{} <= {thr:.2} ?", var.name())
                        },
                        SplitValue::Subset(bits) => {
                            let levels = bits.ones()
                                .map(|code| var.level_name(code))
                                .collect::<Vec<_>>()
                                .join(", ");
                            format!("{} in {{{levels}}} ?", var.name())
                        },
                    };
                    let _ = writeln!(dot, "\tnode_{id} [ label = \"{label}\" ];");
                },
                None => {
                    let p = node.prediction;
                    let _ = writeln!(
                        dot,
                        "\tnode_{id} [ label = \"{p}\", shape = box ];"
                    );
                },
            }
            if let (Some(l), Some(r)) = (node.left, node.right) {
                let _ = writeln!(dot, "\tnode_{id} -- node_{l} [ label = \"Yes\" ];");
                let _ = writeln!(dot, "\tnode_{id} -- node_{r} [ label = \"No\" ];");
            }
        }
        dot.push('}');
        dot
    }


    /// Write this tree to a dot file.
    #[inline]
    pub fn to_dot_file<P>(&self, path: P, variables: &[VariableDescriptor])
        -> std::io::Result<()>
        where P: AsRef<Path>
    {
        let mut f = File::create(path)?;
        f.write_all(self.to_dot(variables).as_bytes())?;
        Ok(())
    }
}


/// Checks that the split of an internal node
/// matches the kind of its variable.
fn check_split(tree: usize, node: &Node, variables: &[VariableDescriptor])
    -> Result<()>
{
    let location = || Location::Node { tree, node: node.id };
    let split = match &node.split {
        Some(split) => split,
        None => {
            return Err(ForestError::structural(
                tree, node.id, "an internal node has no split"
            ));
        },
    };

    let var = variables.get(split.variable)
        .ok_or_else(|| {
            let reason = format!(
                "split variable #{} does not exist \
                 (the model has {} variables)",
                split.variable, variables.len()
            );
            ForestError::schema(location(), reason)
        })?;

    match (&split.value, var.kind()) {
        (SplitValue::Threshold(thr), VariableKind::Numeric | VariableKind::Ordered) => {
            if thr.is_nan() {
                return Err(ForestError::schema(location(), "threshold is NaN"));
            }
        },
        (SplitValue::Subset(bits), VariableKind::Factor) => {
            if bits.len() != var.cardinality() {
                let reason = format!(
                    "subset over {} levels, but `{}` has {} levels",
                    bits.len(), var.name(), var.cardinality()
                );
                return Err(ForestError::schema(location(), reason));
            }
        },
        (_, kind) => {
            let reason = format!(
                "split value does not match the {kind} variable `{}`",
                var.name()
            );
            return Err(ForestError::schema(location(), reason));
        },
    }
    Ok(())
}

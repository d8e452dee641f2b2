//! The duplicate detector.
//!
//! Two nodes are duplicates when the conjunctions of the split decisions
//! on their root paths are equivalent after normalization:
//! the tightest interval per threshold variable
//! and the level set per categorical variable,
//! with constraints admitting every level dropped.
//! Nodes are scanned in ascending `(tree, id)` order,
//! and the later node of an equivalent pair is marked.
use rayon::prelude::*;

use std::collections::HashMap;

use crate::forest::Forest;
use crate::rule::{ConstraintKey, PathConstraints};
use crate::traversal::NodeColumn;
use crate::tree::{NodeId, NodeTable};
use crate::variable::VariableDescriptor;


type PathKey = Vec<(usize, ConstraintKey)>;


/// Returns the normalized path key of every node of `tree`, in id order.
fn path_keys(tree: &NodeTable, variables: &[VariableDescriptor])
    -> Vec<PathKey>
{
    (0..tree.len()).into_par_iter()
        .map(|ix| {
            PathConstraints::of(tree, NodeId::from_index(ix), variables).key()
        })
        .collect()
}


/// Scans the keys of `trees` in `(tree, id)` order.
/// Returns the `(duplicate, original)` pairs.
fn scan(keys: Vec<Vec<PathKey>>) -> Vec<(NodeColumn, NodeColumn)> {
    let mut first = HashMap::<PathKey, NodeColumn>::new();
    let mut pairs = Vec::new();
    for (tree, keys) in keys.into_iter().enumerate() {
        for (ix, key) in keys.into_iter().enumerate() {
            let column = NodeColumn { tree, node: NodeId::from_index(ix) };
            match first.get(&key) {
                Some(original) => pairs.push((column, *original)),
                None => { first.insert(key, column); },
            }
        }
    }
    pairs
}


/// Marks the nodes of `tree` whose rule is equivalent
/// to the rule of a node with a smaller id.
/// The result is indexed by `id - 1`.
pub fn find_duplicates(tree: &NodeTable, variables: &[VariableDescriptor])
    -> Vec<bool>
{
    let mut marks = vec![false; tree.len()];
    scan(vec![path_keys(tree, variables)])
        .into_iter()
        .for_each(|(duplicate, _)| marks[duplicate.node.index()] = true);
    marks
}


/// Marks the nodes of `forest` whose rule is equivalent
/// to the rule of an earlier node in `(tree, id)` order,
/// possibly in another tree.
/// Returns one vector per tree, indexed by `id - 1`.
pub fn find_forest_duplicates(forest: &Forest) -> Vec<Vec<bool>> {
    let mut marks = forest.trees()
        .iter()
        .map(|tree| vec![false; tree.len()])
        .collect::<Vec<_>>();
    duplicate_pairs(forest)
        .into_iter()
        .for_each(|(duplicate, _)| {
            marks[duplicate.tree][duplicate.node.index()] = true;
        });
    marks
}


/// Returns every forest-wide duplicate together with
/// the earliest node it duplicates.
pub fn duplicate_pairs(forest: &Forest) -> Vec<(NodeColumn, NodeColumn)> {
    let variables = forest.variables();
    let keys = forest.trees()
        .par_iter()
        .map(|tree| path_keys(tree, variables))
        .collect::<Vec<_>>();
    scan(keys)
}

//! Adapter for XGBoost-style tree dumps.
//!
//! Differences from the canonical schema that this adapter removes:
//! - node ids are 0-based and `-1` marks a leaf,
//! - a numeric split sends `value < condition` to the left,
//! - a categorical split lists the categories that go **right**,
//! - `default_left` tells where missing values go.
use fixedbitset::FixedBitSet;
use serde::{Serialize, Deserialize};

use crate::error::{ForestError, Location, Result};
use crate::tree::{
    MissingBranch,
    Node,
    NodeId,
    NodeTable,
    Prediction,
    Split,
    SplitValue,
};
use crate::variable::{RawVariable, VariableDescriptor, VariableKind};

use super::{check_lengths, BackendAdapter, ModelKind, Target};


/// The raw columns of one boosted tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoostedTree {
    /// 0-based id of the left child, `-1` for leaves.
    pub left_children: Vec<i32>,
    /// 0-based id of the right child, `-1` for leaves.
    pub right_children: Vec<i32>,
    /// 0-based index of the split variable.
    pub split_indices: Vec<usize>,
    /// Split condition: `value < condition` goes left.
    pub split_conditions: Vec<f64>,
    /// `true` if missing values go left.
    pub default_left: Vec<bool>,
    /// Right-going categories of categorical splits.
    /// Empty (or absent) for numeric splits.
    #[serde(default)]
    pub categories: Vec<Vec<usize>>,
    /// Node output (margin), defined for every node.
    pub base_weights: Vec<f64>,
}


/// A fitted gradient boosting model.
/// Node outputs are margins, so the target is always
/// reported as [`Target::Regression`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingModel {
    /// Per-predictor metadata.
    pub variables: Vec<RawVariable>,
    /// `0`/`1` for regression and binary models,
    /// the number of classes for multi-class models.
    #[serde(default)]
    pub num_class: usize,
    /// The trees of the ensemble.
    pub trees: Vec<BoostedTree>,
}


impl BackendAdapter for GradientBoostingModel {
    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoosting
    }


    fn n_trees(&self) -> usize {
        self.trees.len()
    }


    fn variables(&self) -> &[RawVariable] {
        &self.variables[..]
    }


    fn target(&self) -> Result<Target> {
        if self.num_class > 2 {
            let reason = format!(
                "{} classes; one tree per class cannot be \
                 encoded into a single node prediction",
                self.num_class,
            );
            return Err(ForestError::unsupported(self.kind(), reason));
        }
        Ok(Target::Regression)
    }


    fn node_table(
        &self,
        tree: usize,
        variables: &[VariableDescriptor],
        _target: &Target,
    ) -> Result<NodeTable>
    {
        let raw = &self.trees[tree];
        let n_nodes = check_lengths(tree, &[
            ("left_children", raw.left_children.len()),
            ("right_children", raw.right_children.len()),
            ("split_indices", raw.split_indices.len()),
            ("split_conditions", raw.split_conditions.len()),
            ("default_left", raw.default_left.len()),
            ("base_weights", raw.base_weights.len()),
        ])?;

        let nodes = (0..n_nodes)
            .map(|row| convert_node(raw, tree, row, variables))
            .collect::<Result<Vec<_>>>()?;

        NodeTable::new(tree, nodes, variables)
    }
}


fn convert_node(
    raw: &BoostedTree,
    tree: usize,
    row: usize,
    variables: &[VariableDescriptor],
) -> Result<Node>
{
    let id = NodeId::from_index(row);
    let location = || Location::Node { tree, node: id };
    let prediction = Prediction::Value(raw.base_weights[row]);

    let (left, right) = (raw.left_children[row], raw.right_children[row]);
    match (left, right) {
        (-1, -1) => return Ok(Node::leaf(id.0, prediction)),
        (l, r) if l < 0 || r < 0 => {
            let reason = format!("invalid children ({l}, {r})");
            return Err(ForestError::schema(location(), reason));
        },
        _ => {},
    }

    let variable = raw.split_indices[row];
    let descriptor = variables.get(variable)
        .ok_or_else(|| {
            let reason = format!(
                "split variable #{variable} does not exist"
            );
            ForestError::schema(location(), reason)
        })?;

    let categories = raw.categories.get(row)
        .map(|c| &c[..])
        .unwrap_or(&[]);
    let split = match descriptor.kind() {
        VariableKind::Factor => {
            let cardinality = descriptor.cardinality();
            let mut bits = FixedBitSet::with_capacity(cardinality);
            bits.insert_range(..);
            for &code in categories {
                if code >= cardinality {
                    let reason = format!(
                        "category {code} is not a level of `{}`",
                        descriptor.name()
                    );
                    return Err(ForestError::schema(location(), reason));
                }
                bits.set(code, false);
            }
            Split { variable, value: SplitValue::Subset(bits) }
        },
        VariableKind::Numeric | VariableKind::Ordered => {
            if !categories.is_empty() {
                let reason = format!(
                    "categorical split on the {} variable `{}`",
                    descriptor.kind(), descriptor.name()
                );
                return Err(ForestError::schema(location(), reason));
            }
            let condition = raw.split_conditions[row];
            Split::threshold(variable, next_down(condition))
        },
    };

    let missing = if raw.default_left[row] {
        MissingBranch::Left
    } else {
        MissingBranch::Right
    };

    let node = Node::branch(
        id.0, split, left as usize + 1, right as usize + 1, prediction
    )
    .missing(missing);
    Ok(node)
}


/// Returns the largest `f64` strictly less than `x`,
/// so that `v < x` is equivalent to `v <= next_down(x)`.
pub(crate) fn next_down(x: f64) -> f64 {
    if x.is_nan() || x == f64::NEG_INFINITY {
        return x;
    }
    if x == 0f64 {
        return -f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0f64 {
        f64::from_bits(bits - 1)
    } else {
        f64::from_bits(bits + 1)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_down() {
        for x in [1.0, 0.5, -2.0, 1e300, 0.0, f64::INFINITY] {
            let y = next_down(x);
            assert!(y < x, "next_down({x}) = {y} is not below {x}");
            // Nothing lies strictly between `y` and `x`.
            let mid = y + (x - y) / 2.0;
            assert!(mid == y || mid == x || !mid.is_finite());
        }
    }

    #[test]
    fn test_strict_threshold_is_canonical() {
        let raw = BoostedTree {
            left_children: vec![1, -1, -1],
            right_children: vec![2, -1, -1],
            split_indices: vec![0, 0, 0],
            split_conditions: vec![2.0, 0.0, 0.0],
            default_left: vec![true, false, false],
            categories: Vec::new(),
            base_weights: vec![0.0, -1.0, 1.0],
        };
        let variables = vec![VariableDescriptor::numeric("x")];
        let node = convert_node(&raw, 0, 0, &variables).unwrap();
        let split = node.split().unwrap();

        // `2.0 < 2.0` is false, so 2.0 must go right.
        assert_eq!(split.route(2.0), crate::LeftRight::Right);
        assert_eq!(split.route(1.999), crate::LeftRight::Left);
        assert_eq!(node.missing_branch(), MissingBranch::Left);
        assert_eq!(node.left(), Some(NodeId(2)));
    }

    #[test]
    fn test_categories_go_right() {
        let raw = BoostedTree {
            left_children: vec![1, -1, -1],
            right_children: vec![2, -1, -1],
            split_indices: vec![0, 0, 0],
            split_conditions: vec![0.0, 0.0, 0.0],
            default_left: vec![false, false, false],
            categories: vec![vec![1], vec![], vec![]],
            base_weights: vec![0.0, -1.0, 1.0],
        };
        let variables = vec![VariableDescriptor::factor("c", ["a", "b", "c"])];
        let node = convert_node(&raw, 0, 0, &variables).unwrap();
        match node.split().unwrap().value() {
            SplitValue::Subset(bits) => {
                let res = bits.ones().collect::<Vec<_>>();
                assert_eq!(vec![0, 2], res);
            },
            other => panic!("expected a subset, got {other:?}"),
        }
    }
}

//! Normalized constraints implied by a split path.
use fixedbitset::FixedBitSet;

use std::collections::BTreeMap;
use std::ops::BitAnd;

use crate::tree::{LeftRight, NodeId, NodeTable, SplitValue};
use crate::variable::VariableDescriptor;


/// The tightest constraint on one variable.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Constraint {
    /// `lower < x <= upper`. A missing bound is unbounded.
    Range {
        lower: Option<f64>,
        upper: Option<f64>,
    },
    /// `x in levels`, as level codes.
    Levels(FixedBitSet),
}


impl Constraint {
    /// The constraint of one split decision on `variable`.
    fn of_split(
        value: &SplitValue,
        direction: LeftRight,
        variable: &VariableDescriptor,
    ) -> Self
    {
        match value {
            SplitValue::Threshold(t) if variable.has_levels() => {
                // Ordered levels: codes `c <= t` go left.
                let n = variable.cardinality();
                let mut left = FixedBitSet::with_capacity(n);
                (0..n).filter(|&c| c as f64 <= *t)
                    .for_each(|c| left.insert(c));
                Self::Levels(side(left, direction))
            },
            SplitValue::Threshold(t) => {
                let t = normalize(*t);
                match direction {
                    LeftRight::Left => Self::Range { lower: None, upper: Some(t) },
                    LeftRight::Right => Self::Range { lower: Some(t), upper: None },
                }
            },
            SplitValue::Subset(bits) => {
                Self::Levels(side(bits.clone(), direction))
            },
        }
    }


    /// Returns `true` if this constraint admits every level
    /// of a variable with `cardinality` levels.
    fn is_trivial(&self, cardinality: usize) -> bool {
        match self {
            Self::Range { lower: None, upper: None } => true,
            Self::Range { .. } => false,
            Self::Levels(bits) => {
                cardinality > 0 && bits.count_ones(..) == cardinality
            },
        }
    }
}


/// Keeps `left` or flips it to the levels that go right.
fn side(mut left: FixedBitSet, direction: LeftRight) -> FixedBitSet {
    if direction == LeftRight::Right {
        left.toggle_range(..);
    }
    left
}


/// Maps `-0.0` to `0.0` so that equal bounds compare bit-equal.
#[inline]
fn normalize(x: f64) -> f64 {
    x + 0f64
}


impl BitAnd for Constraint {
    type Output = Self;

    fn bitand(self, other: Self) -> Self {
        match (self, other) {
            (
                Self::Range { lower: l1, upper: u1 },
                Self::Range { lower: l2, upper: u2 },
            ) => {
                let lower = match (l1, l2) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
                let upper = match (u1, u2) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                Self::Range { lower, upper }
            },
            (Self::Levels(mut a), Self::Levels(b)) => {
                a.intersect_with(&b);
                Self::Levels(a)
            },
            // A variable is either split by thresholds or by subsets.
            (lhs, _) => lhs,
        }
    }
}


/// A hashable image of a [`Constraint`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum ConstraintKey {
    Range(Option<u64>, Option<u64>),
    Levels(Vec<usize>),
}


impl From<&Constraint> for ConstraintKey {
    fn from(constraint: &Constraint) -> Self {
        match constraint {
            Constraint::Range { lower, upper } => {
                Self::Range(lower.map(f64::to_bits), upper.map(f64::to_bits))
            },
            Constraint::Levels(bits) => Self::Levels(bits.ones().collect()),
        }
    }
}


/// The conjunction of the split decisions from the root to a node,
/// one constraint per variable, keyed by variable index.
/// Constraints admitting every level are dropped.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PathConstraints {
    constraints: BTreeMap<usize, Constraint>,
}


impl PathConstraints {
    /// Combines the ancestors of `node` in `tree`.
    /// `node` must be a node of `tree`.
    pub(crate) fn of(
        tree: &NodeTable,
        node: NodeId,
        variables: &[VariableDescriptor],
    ) -> Self
    {
        let mut constraints = BTreeMap::<usize, Constraint>::new();
        for (ancestor, direction) in tree.path(node) {
            let split = match tree.at(ancestor).split() {
                Some(split) => split,
                None => continue,
            };
            let index = split.variable();
            let constraint = Constraint::of_split(
                split.value(), direction, &variables[index]
            );
            let combined = match constraints.remove(&index) {
                Some(current) => current & constraint,
                None => constraint,
            };
            constraints.insert(index, combined);
        }

        constraints.retain(|&index, constraint| {
            !constraint.is_trivial(variables[index].cardinality())
        });
        Self { constraints }
    }


    /// Returns the constraints in ascending variable order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &Constraint)> {
        self.constraints.iter()
            .map(|(&index, constraint)| (index, constraint))
    }


    /// Returns `true` if no variable is constrained.
    pub(crate) fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }


    /// Returns a key equal for logically equivalent paths.
    pub(crate) fn key(&self) -> Vec<(usize, ConstraintKey)> {
        self.iter()
            .map(|(index, constraint)| (index, ConstraintKey::from(constraint)))
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Node, Prediction, Split};

    fn variables() -> Vec<VariableDescriptor> {
        vec![
            VariableDescriptor::numeric("x"),
            VariableDescriptor::factor("y", ["a", "b", "c"]),
            VariableDescriptor::ordered("z", ["lo", "mid", "hi"]),
        ]
    }

    #[test]
    fn test_range_intersection() {
        let a = Constraint::Range { lower: Some(1.0), upper: None };
        let b = Constraint::Range { lower: Some(2.0), upper: Some(5.0) };
        let exp = Constraint::Range { lower: Some(2.0), upper: Some(5.0) };
        let res = a & b;
        assert_eq!(exp, res, "expected {exp:?}, got {res:?}.");
    }

    #[test]
    fn test_path_constraints() {
        // x <= 5 -> y in {a, b} -> x > 2 (right) -> z <= 1 (right)
        let variables = variables();
        let nodes = vec![
            Node::branch(1, Split::threshold(0, 5.0), 2, 3, Prediction::Value(0.0)),
            Node::branch(2, Split::subset(1, 3, [0, 1]), 4, 5, Prediction::Value(0.0)),
            Node::leaf(3, Prediction::Value(0.0)),
            Node::branch(4, Split::threshold(0, 2.0), 6, 7, Prediction::Value(0.0)),
            Node::leaf(5, Prediction::Value(0.0)),
            Node::leaf(6, Prediction::Value(0.0)),
            Node::branch(7, Split::threshold(2, 1.0), 8, 9, Prediction::Value(0.0)),
            Node::leaf(8, Prediction::Value(0.0)),
            Node::leaf(9, Prediction::Value(0.0)),
        ];
        let tree = NodeTable::new(0, nodes, &variables).unwrap();
        let path = PathConstraints::of(&tree, NodeId(9), &variables);
        let res = path.iter().collect::<Vec<_>>();

        let mut y = FixedBitSet::with_capacity(3);
        y.insert_range(0..2);
        let mut z = FixedBitSet::with_capacity(3);
        z.insert(2);
        assert_eq!(res.len(), 3);
        assert_eq!(res[0], (0, &Constraint::Range { lower: Some(2.0), upper: Some(5.0) }));
        assert_eq!(res[1], (1, &Constraint::Levels(y)));
        assert_eq!(res[2], (2, &Constraint::Levels(z)));

        assert!(PathConstraints::of(&tree, NodeId::ROOT, &variables).is_empty());
    }

    #[test]
    fn test_full_level_set_is_dropped() {
        // y in {a} -> right: y in {b, c} -> left of {b, c}: y in {b, c}
        let variables = variables();
        let nodes = vec![
            Node::branch(1, Split::subset(1, 3, [0]), 2, 3, Prediction::Value(0.0)),
            Node::leaf(2, Prediction::Value(0.0)),
            Node::branch(3, Split::subset(1, 3, [0, 1, 2]), 4, 5, Prediction::Value(0.0)),
            Node::leaf(4, Prediction::Value(0.0)),
            Node::leaf(5, Prediction::Value(0.0)),
        ];
        let tree = NodeTable::new(0, nodes, &variables).unwrap();
        let parent = PathConstraints::of(&tree, NodeId(3), &variables);
        let child = PathConstraints::of(&tree, NodeId(4), &variables);
        assert_eq!(parent.key(), child.key());

        let mut all = FixedBitSet::with_capacity(3);
        all.insert_range(..);
        assert!(Constraint::Levels(all).is_trivial(3));
    }
}

//! Adapter for `randomForest`-style tree dumps.
//!
//! Each tree is a set of parallel columns:
//!
//! ```txt
//!  row | left  right  split_var  split_point  status  prediction
//!   1  |   2     3        1         2.5          1       NA
//!   2  |   0     0        0         0.0         -1       1.0
//!  ...
//! ```
//! - ids are 1-based and `0` means "no child",
//! - `split_var` is 1-based,
//! - status `-1` is terminal, `1` or `-3` internal, `0` an unused row,
//! - a factor split point is a packed integer:
//!   bit `k` is set if level `k` goes left,
//! - an ordered split point is over the 1-based level codes
//!   and is shifted to the 0-based codes of the crate.
//!
//! The backend rejects missing values at fit time,
//! so no node has a missing branch.
use fixedbitset::FixedBitSet;
use serde::{Serialize, Deserialize};

use crate::constants::MAX_PACKED_LEVELS;
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


const STATUS_TERMINAL: i32 = -1;
const STATUS_INTERNAL: i32 = 1;
const STATUS_TO_SPLIT: i32 = -3;
const STATUS_UNUSED:   i32 = 0;


/// The raw columns of one `randomForest` tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RandomForestTree {
    /// 1-based id of the left child, `0` if none.
    pub left_daughter: Vec<usize>,
    /// 1-based id of the right child, `0` if none.
    pub right_daughter: Vec<usize>,
    /// 1-based index of the split variable, `0` if none.
    pub split_var: Vec<usize>,
    /// Threshold, or packed subset of left-going levels.
    pub split_point: Vec<f64>,
    /// Node status code.
    pub status: Vec<i32>,
    /// Node prediction. Class predictions are 1-based class codes.
    /// Internal nodes may omit it.
    pub prediction: Vec<Option<f64>>,
}


/// A fitted `randomForest` model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestModel {
    /// Per-predictor metadata.
    pub variables: Vec<RawVariable>,
    /// The target of the forest.
    pub target: Target,
    /// The trees of the forest.
    pub trees: Vec<RandomForestTree>,
}


impl BackendAdapter for RandomForestModel {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }


    fn n_trees(&self) -> usize {
        self.trees.len()
    }


    fn variables(&self) -> &[RawVariable] {
        &self.variables[..]
    }


    fn target(&self) -> Result<Target> {
        if let Target::Classification { classes } = &self.target {
            if classes.is_empty() {
                return Err(ForestError::schema(
                    Location::Model, "a classification target has no class"
                ));
            }
            if classes.len() > 2 {
                let reason = format!(
                    "{} classes; only binary classification is supported",
                    classes.len()
                );
                return Err(ForestError::unsupported(self.kind(), reason));
            }
        }
        Ok(self.target.clone())
    }


    fn node_table(
        &self,
        tree: usize,
        variables: &[VariableDescriptor],
        target: &Target,
    ) -> Result<NodeTable>
    {
        let raw = &self.trees[tree];
        let n_rows = check_lengths(tree, &[
            ("left_daughter", raw.left_daughter.len()),
            ("right_daughter", raw.right_daughter.len()),
            ("split_var", raw.split_var.len()),
            ("split_point", raw.split_point.len()),
            ("status", raw.status.len()),
            ("prediction", raw.prediction.len()),
        ])?;

        // Unused rows pad the end of the table.
        let n_nodes = raw.status.iter()
            .position(|&s| s == STATUS_UNUSED)
            .unwrap_or(n_rows);
        if let Some(pos) = raw.status[n_nodes..].iter().position(|&s| s != STATUS_UNUSED) {
            let location = Location::Node {
                tree, node: NodeId::from_index(n_nodes + pos)
            };
            return Err(ForestError::schema(
                location, "a used row follows an unused row"
            ));
        }

        let mut known = Vec::with_capacity(n_nodes);
        let mut nodes = Vec::with_capacity(n_nodes);
        for row in 0..n_nodes {
            let id = NodeId::from_index(row);
            let location = || Location::Node { tree, node: id };

            let prediction = raw.prediction[row]
                .map(|p| decode_prediction(p, target, location()))
                .transpose()?;
            known.push(prediction);
            let placeholder = prediction.unwrap_or(Prediction::Value(f64::NAN));

            let node = match raw.status[row] {
                STATUS_TERMINAL => {
                    let has_child = raw.left_daughter[row] != 0
                        || raw.right_daughter[row] != 0;
                    if has_child {
                        return Err(ForestError::schema(
                            location(), "a terminal row references children"
                        ));
                    }
                    if prediction.is_none() {
                        return Err(ForestError::schema(
                            location(), "a terminal row has no prediction"
                        ));
                    }
                    Node::leaf(id.0, placeholder)
                },
                STATUS_INTERNAL | STATUS_TO_SPLIT => {
                    let split = decode_split(
                        raw.split_var[row],
                        raw.split_point[row],
                        variables,
                        location(),
                    )?;
                    Node::branch(
                        id.0,
                        split,
                        raw.left_daughter[row],
                        raw.right_daughter[row],
                        placeholder,
                    )
                    .missing(MissingBranch::Undefined)
                },
                code => {
                    let reason = format!("unknown status code {code}");
                    return Err(ForestError::schema(location(), reason));
                },
            };
            nodes.push(node);
        }

        let mut table = NodeTable::new(tree, nodes, variables)?;
        fill_predictions(&mut table, &known, target);
        Ok(table)
    }
}


/// Converts a raw prediction into the canonical one.
fn decode_prediction(raw: f64, target: &Target, location: Location)
    -> Result<Prediction>
{
    match target {
        Target::Regression => Ok(Prediction::Value(raw)),
        Target::Classification { classes } => {
            let n_classes = classes.len() as f64;
            if raw.fract() != 0f64 || raw < 1f64 || raw > n_classes {
                let reason = format!(
                    "class code {raw} is not in 1..={n_classes}"
                );
                return Err(ForestError::schema(location, reason));
            }
            Ok(Prediction::Class(raw as usize - 1))
        },
    }
}


/// Converts a raw `(split_var, split_point)` pair into a [`Split`].
fn decode_split(
    split_var: usize,
    split_point: f64,
    variables: &[VariableDescriptor],
    location: Location,
) -> Result<Split>
{
    if split_var == 0 || split_var > variables.len() {
        let reason = format!(
            "split variable {split_var} is not in 1..={}", variables.len()
        );
        return Err(ForestError::schema(location, reason));
    }
    let variable = split_var - 1;
    let descriptor = &variables[variable];

    if descriptor.kind() != VariableKind::Factor {
        let threshold = if descriptor.has_levels() {
            split_point - 1f64
        } else {
            split_point
        };
        return Ok(Split::threshold(variable, threshold));
    }

    let cardinality = descriptor.cardinality();
    if cardinality > MAX_PACKED_LEVELS {
        let reason = format!(
            "factor `{}` has {cardinality} levels; \
             packed subsets hold at most {MAX_PACKED_LEVELS}",
            descriptor.name(),
        );
        return Err(ForestError::unsupported(ModelKind::RandomForest, reason));
    }
    let bits = unpack_levels(split_point, cardinality)
        .ok_or_else(|| {
            let reason = format!(
                "{split_point} is not a subset of the {cardinality} levels \
                 of `{}`",
                descriptor.name(),
            );
            ForestError::schema(location, reason)
        })?;

    Ok(Split { variable, value: SplitValue::Subset(bits) })
}


/// Unpacks an integer-valued `f64` into the set of its one-bits.
/// Returns `None` if `packed` is not a subset of `cardinality` levels.
fn unpack_levels(packed: f64, cardinality: usize) -> Option<FixedBitSet> {
    if packed < 0f64 || packed.fract() != 0f64 {
        return None;
    }
    let packed = packed as u64;
    if cardinality < 64 && packed >> cardinality != 0 {
        return None;
    }

    let mut bits = FixedBitSet::with_capacity(cardinality);
    (0..cardinality)
        .filter(|k| packed >> k & 1 == 1)
        .for_each(|k| bits.insert(k));
    Some(bits)
}


/// Fills the predictions the backend left out.
/// Regression: mean of the child predictions.
/// Classification: majority of the leaf classes in the subtree,
/// ties go to the lower class.
fn fill_predictions(
    table: &mut NodeTable,
    known: &[Option<Prediction>],
    target: &Target,
)
{
    let n_classes = target.n_classes();
    let order = table.bottom_up();
    let mut values = vec![0f64; table.len()];
    let mut votes = vec![vec![0usize; n_classes]; table.len()];

    for id in order {
        let node = table.at(id);
        let ix = id.index();
        let children = node.left().zip(node.right());

        match (known[ix], children) {
            (Some(prediction), _) => {
                values[ix] = prediction.as_f64();
                if let Prediction::Class(c) = prediction {
                    if node.is_terminal() {
                        votes[ix][c] += 1;
                    }
                }
            },
            (None, Some(_)) => {},
            (None, None) => unreachable!("terminal rows carry predictions"),
        }

        if let Some((l, r)) = children {
            let (l, r) = (l.index(), r.index());
            for c in 0..n_classes {
                votes[ix][c] = votes[l][c] + votes[r][c];
            }
            if known[ix].is_none() {
                values[ix] = (values[l] + values[r]) / 2f64;
            }
        }
    }

    for (ix, node) in table.nodes_mut().iter_mut().enumerate() {
        if known[ix].is_some() { continue; }
        node.prediction = match target {
            Target::Regression => Prediction::Value(values[ix]),
            Target::Classification { .. } => {
                let class = votes[ix].iter()
                    .enumerate()
                    .fold((0, 0), |best, (c, &n)| if n > best.1 { (c, n) } else { best })
                    .0;
                Prediction::Class(class)
            },
        };
    }
}

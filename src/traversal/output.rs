//! Outputs of a traversal.
use fixedbitset::FixedBitSet;

use crate::adapter::Target;
use crate::error::ForestError;
use crate::forest::Forest;
use crate::tree::{NodeId, Prediction};

use super::membership::MembershipMatrix;


/// The node where each observation stopped, per tree.
/// `None` marks an observation that failed on a missing value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalNodes {
    n_rows: usize,
    // `ids[tree][row]`
    ids: Vec<Vec<Option<NodeId>>>,
}


impl TerminalNodes {
    /// Returns `(#observations, #trees)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.ids.len())
    }


    /// Returns the node id reached by the `row`-th observation
    /// on the `tree`-th tree.
    #[inline]
    pub fn get(&self, row: usize, tree: usize) -> Option<NodeId> {
        self.ids[tree][row]
    }


    /// Returns the node ids reached by the `row`-th observation,
    /// one per tree.
    pub fn row(&self, row: usize) -> Vec<Option<NodeId>> {
        self.ids.iter()
            .map(|ids| ids[row])
            .collect()
    }


    /// Returns the node ids reached on the `tree`-th tree,
    /// one per observation.
    #[inline]
    pub fn tree(&self, tree: usize) -> &[Option<NodeId>] {
        &self.ids[tree][..]
    }
}


/// The ensemble prediction per observation.
/// `None` marks an observation that failed on a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    /// Mean of the tree outputs.
    Mean(Vec<Option<f64>>),
    /// Majority vote over the trees. Ties go to the lower class.
    Votes {
        /// The winning class per observation.
        classes: Vec<Option<usize>>,
        /// Vote share of every class per observation.
        /// Empty for a failed observation.
        proportions: Vec<Vec<f64>>,
    },
}


/// The output of [`Predictor::predict`](super::Predictor::predict).
#[derive(Debug, Clone, PartialEq)]
pub enum ForestOutput {
    /// See [`OutputMode::TerminalNodes`](super::OutputMode::TerminalNodes).
    TerminalNodes(TerminalNodes),
    /// See [`OutputMode::FullMembership`](super::OutputMode::FullMembership).
    Membership(MembershipMatrix),
    /// See [`OutputMode::Aggregated`](super::OutputMode::Aggregated).
    Aggregated(Aggregate),
}


/// Everything recorded by one traversal of a sample.
#[derive(Debug, Clone)]
pub struct Traversal {
    terminals: TerminalNodes,
    membership: Option<MembershipMatrix>,
    failures: Vec<ForestError>,
    failed_rows: FixedBitSet,
}


impl Traversal {
    pub(crate) fn new(
        n_rows: usize,
        ids: Vec<Vec<Option<NodeId>>>,
        membership: Option<MembershipMatrix>,
        failures: Vec<ForestError>,
        failed_rows: FixedBitSet,
    ) -> Self
    {
        let terminals = TerminalNodes { n_rows, ids };
        Self { terminals, membership, failures, failed_rows, }
    }


    /// Returns the terminal node per observation and tree.
    #[inline]
    pub fn terminal_nodes(&self) -> TerminalNodes {
        self.terminals.clone()
    }


    /// Returns the membership matrix,
    /// if the traversal recorded one.
    #[inline]
    pub fn membership(&self) -> Option<&MembershipMatrix> {
        self.membership.as_ref()
    }


    /// Takes the membership matrix out of this traversal.
    #[inline]
    pub fn into_membership(self) -> Option<MembershipMatrix> {
        self.membership
    }


    /// Returns the missing-value failures,
    /// sorted by observation then tree.
    /// Always empty under `MissingPolicy::Strict`.
    #[inline]
    pub fn failures(&self) -> &[ForestError] {
        &self.failures[..]
    }


    /// Returns the failed observations in ascending order.
    pub fn failed_rows(&self) -> Vec<usize> {
        self.failed_rows.ones().collect()
    }


    /// Aggregates the tree outputs of `forest`,
    /// the forest this traversal was computed on.
    pub fn aggregate(&self, forest: &Forest) -> Aggregate {
        let (n_rows, n_trees) = self.terminals.shape();
        let predictions = |row: usize| {
            (0..n_trees)
                .map(|t| {
                    self.terminals.get(row, t)
                        .and_then(|id| forest.tree(t).node(id))
                        .map(|node| node.prediction())
                })
                .collect::<Option<Vec<_>>>()
        };

        match forest.target() {
            Target::Regression => {
                let means = (0..n_rows)
                    .map(|row| {
                        if n_trees == 0 { return None; }
                        let preds = predictions(row)?;
                        let sum = preds.iter()
                            .map(Prediction::as_f64)
                            .sum::<f64>();
                        Some(sum / n_trees as f64)
                    })
                    .collect();
                Aggregate::Mean(means)
            },
            Target::Classification { classes } => {
                let n_classes = classes.len();
                let mut winners = Vec::with_capacity(n_rows);
                let mut proportions = Vec::with_capacity(n_rows);
                for row in 0..n_rows {
                    match predictions(row) {
                        Some(preds) if n_trees > 0 => {
                            let (winner, share) = vote(&preds, n_classes);
                            winners.push(Some(winner));
                            proportions.push(share);
                        },
                        _ => {
                            winners.push(None);
                            proportions.push(Vec::new());
                        },
                    }
                }
                Aggregate::Votes { classes: winners, proportions }
            },
        }
    }
}


/// Returns the most voted class and the vote share of every class.
fn vote(predictions: &[Prediction], n_classes: usize) -> (usize, Vec<f64>) {
    let mut counts = vec![0_usize; n_classes];
    for prediction in predictions {
        if let Prediction::Class(c) = prediction {
            counts[*c] += 1;
        }
    }

    let mut winner = 0;
    for (c, &count) in counts.iter().enumerate() {
        if count > counts[winner] { winner = c; }
    }

    let total = predictions.len() as f64;
    let share = counts.into_iter()
        .map(|count| count as f64 / total)
        .collect();
    (winner, share)
}

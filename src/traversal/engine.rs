//! Pushes observations through the trees of a forest.
use colored::Colorize;
use fixedbitset::FixedBitSet;
use rayon::prelude::*;

use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_OUTPUT_MODE, WIDTH};
use crate::error::{ForestError, Result};
use crate::forest::Forest;
use crate::sample::Sample;
use crate::tree::{NodeId, NodeTable};
use crate::variable::VariableDescriptor;

use super::membership::{MembershipMatrix, NodeColumn};
use super::output::{
    Aggregate,
    ForestOutput,
    TerminalNodes,
    Traversal,
};


/// The output shape of [`Predictor::predict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// The terminal node id per observation and tree.
    TerminalNodes,
    /// Membership of every node of every tree.
    FullMembership,
    /// Ensemble prediction: mean for regression,
    /// majority vote for classification.
    Aggregated,
}


/// What happens when an observation reaches a split
/// on a missing value without a defined missing branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPolicy {
    /// The whole call fails.
    #[default]
    Strict,
    /// Only the observation fails.
    /// It is reported by [`Traversal::failures`]
    /// and left empty in every output.
    Streaming,
}


/// Follows the splits of `tree` for the `row`-th observation.
/// `visit` is called on every node of the path, root first.
/// Returns the node where the walk stopped.
fn walk<F>(
    tree: &NodeTable,
    sample: &Sample,
    columns: &[usize],
    variables: &[VariableDescriptor],
    row: usize,
    max_depth: Option<usize>,
    mut visit: F,
) -> Result<NodeId>
    where F: FnMut(NodeId)
{
    let mut id = NodeId::ROOT;
    let mut depth = 0;
    visit(id);
    loop {
        let node = tree.at(id);
        let split = match node.split() {
            Some(split) => split,
            None => return Ok(id),
        };
        if max_depth.is_some_and(|max| depth >= max) {
            return Ok(id);
        }

        let direction = match sample.value(row, columns[split.variable()]) {
            Some(value) => split.route(value),
            None => {
                node.missing_branch()
                    .route()
                    .ok_or_else(|| ForestError::MissingValue {
                        tree: tree.tree_index(),
                        node: id,
                        variable: variables[split.variable()].name().to_string(),
                        row,
                    })?
            },
        };

        id = node.child(direction)
            .ok_or_else(|| ForestError::structural(
                tree.tree_index(), id, "an internal node without a child"
            ))?;
        depth += 1;
        visit(id);
    }
}


/// The result of one chunk of rows on one tree.
struct ChunkPass {
    start: usize,
    terminal: Vec<Option<NodeId>>,
    // `hits[node]` holds the chunk rows, offset by `start`.
    hits: Option<Vec<FixedBitSet>>,
    failures: Vec<ForestError>,
}


/// The result of all rows on one tree.
struct TreePass {
    terminal: Vec<Option<NodeId>>,
    hits: Option<Vec<FixedBitSet>>,
    failures: Vec<ForestError>,
}


/// A struct that pushes observations through a [`Forest`].
///
/// # Example
/// ```no_run
/// use unitree::prelude::*;
///
/// # fn run(forest: &Forest, sample: &Sample) -> unitree::Result<()> {
/// let traversal = Predictor::new(forest)
///     .mode(OutputMode::FullMembership)
///     .missing_policy(MissingPolicy::Streaming)
///     .chunk_size(1024)
///     .traverse(sample)?;
///
/// let membership = traversal.membership().unwrap();
/// let terminal = traversal.terminal_nodes();
/// let prediction = traversal.aggregate(forest);
/// # Ok(())
/// # }
/// ```
pub struct Predictor<'a> {
    forest: &'a Forest,
    mode: OutputMode,
    policy: MissingPolicy,
    chunk_size: usize,
    max_depth: Option<usize>,
    verbose: bool,
}


impl<'a> Predictor<'a> {
    /// Construct a new instance of [`Predictor`].
    pub fn new(forest: &'a Forest) -> Self {
        Self {
            forest,
            mode: DEFAULT_OUTPUT_MODE,
            policy: MissingPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_depth: None,
            verbose: false,
        }
    }


    /// Set the output shape.
    /// Default value is `OutputMode::FullMembership`.
    #[inline]
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }


    /// Set the missing-value policy.
    /// Default value is `MissingPolicy::Strict`.
    #[inline]
    pub fn missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.policy = policy;
        self
    }


    /// Set the number of observations handled by one parallel task.
    /// Default value is `256`.
    #[inline]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        self.chunk_size = chunk_size;
        self
    }


    /// Cut every tree at depth `depth`.
    /// An observation stops at the first node of depth `depth`
    /// and takes its prediction. By default, trees are not cut.
    #[inline]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }


    /// Set the verbose parameter.
    /// If `true`, `Predictor` prints a summary per call.
    /// Default value is `false.`
    #[inline]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }


    /// Returns the output selected by [`Predictor::mode`].
    pub fn predict(&self, sample: &Sample) -> Result<ForestOutput> {
        let output = match self.mode {
            OutputMode::TerminalNodes => {
                ForestOutput::TerminalNodes(self.terminal_nodes(sample)?)
            },
            OutputMode::FullMembership => {
                ForestOutput::Membership(self.membership(sample)?)
            },
            OutputMode::Aggregated => {
                ForestOutput::Aggregated(self.aggregate(sample)?)
            },
        };
        Ok(output)
    }


    /// Returns the membership matrix, whatever the mode is.
    pub fn membership(&self, sample: &Sample) -> Result<MembershipMatrix> {
        let membership = self.run(sample, true)?.into_membership();
        Ok(membership.unwrap_or_else(|| {
            MembershipMatrix::new(sample.shape().0, Vec::new(), Vec::new())
        }))
    }


    /// Returns the terminal nodes, whatever the mode is.
    pub fn terminal_nodes(&self, sample: &Sample) -> Result<TerminalNodes> {
        let traversal = self.run(sample, false)?;
        Ok(traversal.terminal_nodes())
    }


    /// Returns the aggregated prediction, whatever the mode is.
    pub fn aggregate(&self, sample: &Sample) -> Result<Aggregate> {
        let traversal = self.run(sample, false)?;
        Ok(traversal.aggregate(self.forest))
    }


    /// Traverses every tree once.
    /// The membership is recorded only in `FullMembership` mode.
    pub fn traverse(&self, sample: &Sample) -> Result<Traversal> {
        self.run(sample, self.mode == OutputMode::FullMembership)
    }


    fn run(&self, sample: &Sample, record: bool) -> Result<Traversal> {
        let forest = self.forest;
        let columns = sample.align(forest.variables())?;
        let n_rows = sample.shape().0;

        let passes = forest.trees()
            .par_iter()
            .map(|tree| self.tree_pass(tree, sample, &columns, record))
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let mut failures = passes.iter()
            .flat_map(|pass| pass.failures.iter().cloned())
            .collect::<Vec<_>>();
        failures.sort_by_key(|err| match err {
            ForestError::MissingValue { row, tree, .. } => (*row, *tree),
            _ => (usize::MAX, usize::MAX),
        });
        let mut failed_rows = FixedBitSet::with_capacity(n_rows);
        for err in failures.iter() {
            if let ForestError::MissingValue { row, .. } = err {
                failed_rows.insert(*row);
            }
        }

        let mut terminals = Vec::with_capacity(passes.len());
        let mut node_columns = Vec::with_capacity(forest.n_nodes());
        let mut bits = Vec::with_capacity(forest.n_nodes());
        for (t, pass) in passes.into_iter().enumerate() {
            let mut terminal = pass.terminal;
            failed_rows.ones()
                .for_each(|row| { terminal[row] = None; });
            terminals.push(terminal);

            if let Some(hits) = pass.hits {
                for (ix, mut column) in hits.into_iter().enumerate() {
                    column.difference_with(&failed_rows);
                    node_columns.push(NodeColumn {
                        tree: t, node: NodeId::from_index(ix)
                    });
                    bits.push(column);
                }
            }
        }

        let membership = record.then(|| {
            MembershipMatrix::new(n_rows, node_columns, bits)
        });

        if self.verbose {
            println!(
                "{}    {}    {}",
                format!("  [ROWS {: >WIDTH$}]", n_rows).bold().red(),
                format!("[TREES {: >WIDTH$}]", forest.n_trees()).bold().green(),
                format!("[FAILED {: >WIDTH$}]", failed_rows.count_ones(..)).bold().yellow(),
            );
        }

        Ok(Traversal::new(n_rows, terminals, membership, failures, failed_rows))
    }


    fn tree_pass(
        &self,
        tree: &NodeTable,
        sample: &Sample,
        columns: &[usize],
        record: bool,
    ) -> Result<TreePass>
    {
        let n_rows = sample.shape().0;
        let chunk_size = self.chunk_size;
        let n_chunks = n_rows.div_ceil(chunk_size);

        let chunks = (0..n_chunks)
            .into_par_iter()
            .map(|c| {
                let start = c * chunk_size;
                let end = (start + chunk_size).min(n_rows);
                self.chunk_pass(tree, sample, columns, start..end, record)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let mut terminal = Vec::with_capacity(n_rows);
        let mut failures = Vec::new();
        let mut hits = record.then(|| {
            vec![FixedBitSet::with_capacity(n_rows); tree.len()]
        });
        for chunk in chunks {
            terminal.extend(chunk.terminal);
            failures.extend(chunk.failures);
            if let Some((hits, local)) = hits.as_mut().zip(chunk.hits) {
                for (column, local) in hits.iter_mut().zip(local) {
                    local.ones()
                        .for_each(|row| column.insert(chunk.start + row));
                }
            }
        }

        Ok(TreePass { terminal, hits, failures })
    }


    fn chunk_pass(
        &self,
        tree: &NodeTable,
        sample: &Sample,
        columns: &[usize],
        rows: std::ops::Range<usize>,
        record: bool,
    ) -> Result<ChunkPass>
    {
        let variables = self.forest.variables();
        let start = rows.start;
        let mut terminal = Vec::with_capacity(rows.len());
        let mut hits = record.then(|| {
            vec![FixedBitSet::with_capacity(rows.len()); tree.len()]
        });
        let mut failures = Vec::new();

        for row in rows {
            let result = walk(
                tree, sample, columns, variables, row, self.max_depth,
                |id| if let Some(hits) = hits.as_mut() {
                    hits[id.index()].insert(row - start);
                },
            );
            match result {
                Ok(id) => terminal.push(Some(id)),
                Err(err) if self.policy == MissingPolicy::Streaming => {
                    if let Some(hits) = hits.as_mut() {
                        hits.iter_mut()
                            .for_each(|bits| bits.set(row - start, false));
                    }
                    terminal.push(None);
                    failures.push(err);
                },
                Err(err) => return Err(err),
            }
        }

        Ok(ChunkPass { start, terminal, hits, failures })
    }
}

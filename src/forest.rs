//! Defines [`Forest`], the ordered collection of node tables
//! sharing one sequence of variable descriptors.
use colored::Colorize;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

use crate::adapter::{BackendAdapter, ModelKind, RawModel, Target};
use crate::constants::WIDTH;
use crate::error::{ForestError, Location, Result};
use crate::tree::{Node, NodeId, NodeTable, Prediction};
use crate::variable::{
    check_unique_names,
    describe_variables,
    VariableDescriptor,
};


/// A fitted ensemble in canonical form.
/// Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    kind: Option<ModelKind>,
    variables: Vec<VariableDescriptor>,
    target: Target,
    trees: Vec<NodeTable>,
    offsets: Vec<usize>,
}


/// The persisted form of a [`Forest`].
#[derive(Serialize, Deserialize)]
struct ForestDocument {
    kind: Option<ModelKind>,
    variables: Vec<VariableDescriptor>,
    target: Target,
    trees: Vec<Vec<Node>>,
}


impl Forest {
    /// Construct a forest from explicit node lists.
    /// Every list is validated as a [`NodeTable`].
    pub fn new(
        variables: Vec<VariableDescriptor>,
        target: Target,
        trees: Vec<Vec<Node>>,
    ) -> Result<Self>
    {
        check_unique_names(&variables)?;
        let trees = trees.into_iter()
            .enumerate()
            .map(|(t, nodes)| NodeTable::new(t, nodes, &variables))
            .collect::<Result<Vec<_>>>()?;
        check_predictions(&target, &trees)?;
        Ok(Self::from_tables(None, variables, target, trees))
    }


    fn from_tables(
        kind: Option<ModelKind>,
        variables: Vec<VariableDescriptor>,
        target: Target,
        trees: Vec<NodeTable>,
    ) -> Self
    {
        let offsets = trees.iter()
            .scan(0, |acc, tree| {
                let offset = *acc;
                *acc += tree.len();
                Some(offset)
            })
            .collect();
        Self { kind, variables, target, trees, offsets, }
    }


    /// Returns the backend that produced this forest, if known.
    #[inline]
    pub fn kind(&self) -> Option<ModelKind> {
        self.kind
    }


    /// Returns the variable descriptors.
    #[inline]
    pub fn variables(&self) -> &[VariableDescriptor] {
        &self.variables[..]
    }


    /// Returns the target.
    #[inline]
    pub fn target(&self) -> &Target {
        &self.target
    }


    /// Returns the trees.
    #[inline]
    pub fn trees(&self) -> &[NodeTable] {
        &self.trees[..]
    }


    /// Returns the `tree`-th tree.
    /// Panics if `tree` is out of range.
    #[inline]
    pub fn tree(&self, tree: usize) -> &NodeTable {
        assert!(
            tree < self.trees.len(),
            "tree {tree} does not exist. The forest has {} trees.",
            self.trees.len()
        );
        &self.trees[tree]
    }


    /// Returns the number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }


    /// Returns the total number of nodes over all trees.
    pub fn n_nodes(&self) -> usize {
        self.trees.iter()
            .map(|tree| tree.len())
            .sum()
    }


    /// Returns the position of `(tree, node)` among the columns
    /// of a full [`MembershipMatrix`](crate::MembershipMatrix)
    /// computed on this forest.
    #[inline]
    pub fn column_of(&self, tree: usize, node: NodeId) -> usize {
        self.offsets[tree] + node.index()
    }


    /// Writes this forest as JSON.
    pub fn to_json(&self) -> Result<String> {
        let document = ForestDocument {
            kind: self.kind,
            variables: self.variables.clone(),
            target: self.target.clone(),
            trees: self.trees.iter()
                .map(|tree| tree.nodes().to_vec())
                .collect(),
        };
        let json = serde_json::to_string(&document)?;
        Ok(json)
    }


    /// Reads a forest written by [`Forest::to_json`].
    /// Every tree is validated again.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: ForestDocument = serde_json::from_str(json)?;
        let mut forest = Self::new(
            document.variables, document.target, document.trees
        )?;
        forest.kind = document.kind;
        Ok(forest)
    }
}


/// A struct that builds [`Forest`] from a backend model.
///
/// # Example
/// ```no_run
/// use unitree::{ForestBuilder, RawModel};
///
/// let json = std::fs::read_to_string("/path/to/model.json").unwrap();
/// let model = RawModel::from_json(&json).unwrap();
/// let forest = ForestBuilder::new(&model)
///     .verbose(true)
///     .build()
///     .unwrap();
/// println!("{} trees", forest.n_trees());
/// ```
pub struct ForestBuilder<'a> {
    adapter: &'a dyn BackendAdapter,
    verbose: bool,
}


impl<'a> ForestBuilder<'a> {
    /// Construct a new instance of [`ForestBuilder`].
    /// The adapter is selected by the tag of `model`.
    pub fn new(model: &'a RawModel) -> Self {
        Self::from_adapter(model.adapter())
    }


    /// Construct a new instance of [`ForestBuilder`]
    /// from any adapter.
    pub fn from_adapter(adapter: &'a dyn BackendAdapter) -> Self {
        Self { adapter, verbose: false, }
    }


    /// Set the verbose parameter.
    /// If `true`, `ForestBuilder` prints a line per converted tree.
    /// Default value is `false.`
    #[inline]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }


    /// Runs the adapter over every tree.
    /// Fails as a whole on the first failing tree (in tree order);
    /// no partially built forest is returned.
    pub fn build(self) -> Result<Forest> {
        let adapter = self.adapter;
        let variables = describe_variables(adapter.variables())?;
        let target = adapter.target()?;

        let tables = (0..adapter.n_trees())
            .into_par_iter()
            .map(|t| adapter.node_table(t, &variables[..], &target))
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        check_predictions(&target, &tables)?;

        if self.verbose {
            print_summary(adapter.kind(), &tables);
        }

        let forest = Forest::from_tables(
            Some(adapter.kind()), variables, target, tables
        );
        Ok(forest)
    }
}


/// Every prediction must be of the target's type,
/// and a class must be one of the target's classes.
fn check_predictions(target: &Target, trees: &[NodeTable]) -> Result<()> {
    for tree in trees {
        for node in tree.nodes() {
            let reason = match (target, node.prediction()) {
                (Target::Regression, Prediction::Value(_)) => continue,
                (Target::Classification { classes }, Prediction::Class(c)) => {
                    if c < classes.len() { continue; }
                    format!("class {c} of {} classes", classes.len())
                },
                (Target::Regression, Prediction::Class(_)) => {
                    "a class prediction for a regression target".to_string()
                },
                (Target::Classification { .. }, Prediction::Value(_)) => {
                    "a value prediction for a classification target".to_string()
                },
            };
            let location = Location::Node {
                tree: tree.tree_index(),
                node: node.id(),
            };
            return Err(ForestError::schema(location, reason));
        }
    }
    Ok(())
}


fn print_summary(kind: ModelKind, tables: &[NodeTable]) {
    println!(
        "{}",
        format!("  [{kind}] {} trees", tables.len()).bold().red()
    );
    for tree in tables {
        println!(
            "{}    {}    {}",
            format!("  [TREE {: >WIDTH$}]", tree.tree_index()).bold().red(),
            format!("[NODES {: >WIDTH$}]", tree.len()).bold().green(),
            format!("[DEPTH {: >WIDTH$}]", tree.max_depth()).bold().yellow(),
        );
    }
}

//! Backend adapters.
//!
//! A [`BackendAdapter`] converts the native arrays of one
//! tree-growing backend into [`NodeTable`]s.
//! The backend is selected by the explicit [`ModelKind`] tag
//! carried by [`RawModel`].
//!
//! Every adapter must guarantee:
//! - "left" means "value `<=` threshold" or "level in subset",
//! - rows the backend marks as unused are dropped,
//! - `missing` is [`MissingBranch::Undefined`](crate::MissingBranch)
//!   when the backend cannot route missing values.
use serde::{Serialize, Deserialize};

use std::fmt;

use crate::error::{ForestError, Location, Result};
use crate::tree::NodeTable;
use crate::variable::{RawVariable, VariableDescriptor};

mod random_forest;
pub(crate) mod gradient_boosting;


pub use random_forest::{RandomForestModel, RandomForestTree};
pub use gradient_boosting::{BoostedTree, GradientBoostingModel};


/// The tree-growing algorithm that produced a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Bagged CART trees, `randomForest`-style dump.
    RandomForest,
    /// Boosted trees, XGBoost-style dump.
    GradientBoosting,
}


impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RandomForest => "random forest",
            Self::GradientBoosting => "gradient boosting",
        };
        write!(f, "{name}")
    }
}


/// What the trees of a model predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    /// Real valued output.
    Regression,
    /// Class output. Node predictions index into `classes`.
    Classification {
        /// Class labels.
        classes: Vec<String>,
    },
}


impl Target {
    /// Returns the number of classes, `0` for regression.
    #[inline]
    pub fn n_classes(&self) -> usize {
        match self {
            Self::Regression => 0,
            Self::Classification { classes } => classes.len(),
        }
    }


    /// Returns `true` for classification targets.
    #[inline]
    pub fn is_classification(&self) -> bool {
        matches!(self, Self::Classification { .. })
    }


    /// Returns the label of class `class`.
    pub fn class_name(&self, class: usize) -> String {
        match self {
            Self::Classification { classes } => {
                classes.get(class)
                    .cloned()
                    .unwrap_or_else(|| class.to_string())
            },
            Self::Regression => class.to_string(),
        }
    }
}


/// A trait that every backend adapter implements.
///
/// The adapter is queried once per tree;
/// [`ForestBuilder`](crate::ForestBuilder) runs it over all trees.
pub trait BackendAdapter: Sync {
    /// The backend this adapter reads.
    fn kind(&self) -> ModelKind;


    /// The number of trees of the model.
    fn n_trees(&self) -> usize;


    /// Per-predictor metadata.
    fn variables(&self) -> &[RawVariable];


    /// The target of the model.
    /// Fails with [`ForestError::UnsupportedModel`]
    /// if the adapter cannot encode the predictions.
    fn target(&self) -> Result<Target>;


    /// Converts the `tree`-th tree into a validated [`NodeTable`].
    fn node_table(
        &self,
        tree: usize,
        variables: &[VariableDescriptor],
        target: &Target,
    ) -> Result<NodeTable>;
}


/// A fitted model as reported by a backend,
/// tagged with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawModel {
    /// See [`RandomForestModel`].
    RandomForest(RandomForestModel),
    /// See [`GradientBoostingModel`].
    GradientBoosting(GradientBoostingModel),
}


impl RawModel {
    /// Reads a model from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        let model = serde_json::from_str(json)?;
        Ok(model)
    }


    /// Returns the tag of this model.
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::RandomForest(_) => ModelKind::RandomForest,
            Self::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }


    /// Returns the adapter selected by the tag.
    pub fn adapter(&self) -> &dyn BackendAdapter {
        match self {
            Self::RandomForest(model) => model,
            Self::GradientBoosting(model) => model,
        }
    }
}


/// Checks that every column of a raw tree has `n_rows` entries.
pub(crate) fn check_lengths(
    tree: usize,
    columns: &[(&str, usize)],
) -> Result<usize>
{
    let n_rows = columns.first()
        .map(|(_, len)| *len)
        .unwrap_or(0);
    for (name, len) in columns {
        if *len != n_rows {
            let reason = format!(
                "column `{name}` has {len} rows, expected {n_rows}"
            );
            return Err(ForestError::schema(Location::Tree(tree), reason));
        }
    }
    Ok(n_rows)
}

//! The node-membership matrix handed to downstream modeling.
use fixedbitset::FixedBitSet;
use polars::prelude::*;

use std::fmt;
use std::str::FromStr;

use crate::error::{ForestError, Location, Result};
use crate::tree::NodeId;


/// A column of a [`MembershipMatrix`]: node `node` of tree `tree`.
/// Printed as `t{tree}_n{node}`, and parsed back by [`str::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeColumn {
    /// 0-based tree index.
    pub tree: usize,
    /// 1-based node id.
    pub node: NodeId,
}


impl fmt::Display for NodeColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}_n{}", self.tree, self.node)
    }
}


impl FromStr for NodeColumn {
    type Err = ForestError;

    fn from_str(label: &str) -> Result<Self> {
        let invalid = || ForestError::schema(
            Location::Column(label.to_string()),
            "expected a label of the form `t<tree>_n<node>`",
        );
        let (tree, node) = label.strip_prefix('t')
            .and_then(|rest| rest.split_once("_n"))
            .ok_or_else(invalid)?;
        let tree = tree.parse::<usize>().map_err(|_| invalid())?;
        let node = node.parse::<usize>().map_err(|_| invalid())?;
        if node == 0 {
            return Err(invalid());
        }
        Ok(Self { tree, node: NodeId(node) })
    }
}


/// Boolean matrix whose rows are observations and whose columns are
/// `(tree, node)` pairs in tree-major, id-ascending order.
/// A cell is `true` iff the observation's path passes through the node.
///
/// Stored column-wise: one bitset over the rows per node.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipMatrix {
    n_rows: usize,
    columns: Vec<NodeColumn>,
    bits: Vec<FixedBitSet>,
}


impl MembershipMatrix {
    pub(crate) fn new(
        n_rows: usize,
        columns: Vec<NodeColumn>,
        bits: Vec<FixedBitSet>,
    ) -> Self
    {
        debug_assert_eq!(columns.len(), bits.len());
        Self { n_rows, columns, bits }
    }


    /// Returns `(#observations, #nodes over all trees)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }


    /// Returns the column keys.
    #[inline]
    pub fn columns(&self) -> &[NodeColumn] {
        &self.columns[..]
    }


    /// Returns the position of `column`, if exists.
    pub fn column_index(&self, column: NodeColumn) -> Option<usize> {
        self.columns.binary_search(&column).ok()
    }


    /// Returns the rows that pass through the `col`-th column.
    #[inline]
    pub fn column(&self, col: usize) -> &FixedBitSet {
        &self.bits[col]
    }


    /// Returns the cell at `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.bits[col].contains(row)
    }


    /// Returns the nodes the `row`-th observation passes through.
    pub fn row(&self, row: usize) -> Vec<NodeColumn> {
        self.columns.iter()
            .zip(&self.bits)
            .filter(|(_, bits)| bits.contains(row))
            .map(|(column, _)| *column)
            .collect()
    }


    /// Returns the number of observations in every column.
    pub fn support(&self) -> Vec<usize> {
        self.bits.iter()
            .map(|bits| bits.count_ones(..))
            .collect()
    }


    /// Converts the matrix into a polars [`DataFrame`]
    /// of boolean columns named by [`NodeColumn`] labels.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let series = self.columns.iter()
            .zip(&self.bits)
            .map(|(column, bits)| {
                let values = (0..self.n_rows)
                    .map(|row| bits.contains(row))
                    .collect::<Vec<_>>();
                Series::new(&column.to_string(), values)
            })
            .collect::<Vec<_>>();
        let df = DataFrame::new(series)?;
        Ok(df)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        let column = NodeColumn { tree: 12, node: NodeId(7) };
        let label = column.to_string();
        assert_eq!(label, "t12_n7");
        let res = label.parse::<NodeColumn>().unwrap();
        assert_eq!(column, res);
    }

    #[test]
    fn test_invalid_labels() {
        for label in ["12_n7", "t12n7", "t_n7", "t1_n0", "t1_nx"] {
            assert!(
                label.parse::<NodeColumn>().is_err(),
                "`{label}` should not parse"
            );
        }
    }

    #[test]
    fn test_matrix_queries() {
        let columns = vec![
            NodeColumn { tree: 0, node: NodeId(1) },
            NodeColumn { tree: 0, node: NodeId(2) },
            NodeColumn { tree: 1, node: NodeId(1) },
        ];
        let mut bits = vec![FixedBitSet::with_capacity(2); 3];
        bits[0].insert_range(..);
        bits[1].insert(1);
        bits[2].insert_range(..);
        let matrix = MembershipMatrix::new(2, columns.clone(), bits);

        assert_eq!(matrix.shape(), (2, 3));
        assert_eq!(matrix.row(0), vec![columns[0], columns[2]]);
        assert_eq!(matrix.support(), vec![2, 1, 2]);
        assert_eq!(matrix.column_index(columns[2]), Some(2));
        assert!(matrix.get(1, 1));

        let df = matrix.to_dataframe().unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.get_column_names(), vec!["t0_n1", "t0_n2", "t1_n1"]);
    }
}

//! Struct `Sample` represents a batch of observations.
//!
//! Values are stored column-wise as `f64`.
//! `NaN` marks a missing value,
//! and categorical values are 0-based level codes.
use polars::prelude::*;

use std::collections::{BTreeSet, HashMap};

use crate::error::{ForestError, Location, Result};
use crate::variable::VariableDescriptor;


/// A batch of observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
    columns: Vec<Vec<f64>>,
    n_sample: usize,
}


impl Sample {
    /// Construct a sample from named columns.
    /// Fails if the columns differ in length or a name repeats.
    pub fn from_columns<T, S>(names: T, columns: Vec<Vec<f64>>)
        -> Result<Self>
        where T: IntoIterator<Item = S>,
              S: ToString,
    {
        let names = names.into_iter()
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        if names.len() != columns.len() {
            let reason = format!(
                "{} names are given for {} columns",
                names.len(), columns.len()
            );
            return Err(ForestError::schema(Location::Model, reason));
        }

        let n_sample = columns.first()
            .map(|col| col.len())
            .unwrap_or(0);
        for (name, col) in names.iter().zip(&columns) {
            if col.len() != n_sample {
                let reason = format!(
                    "{} rows, expected {n_sample}", col.len()
                );
                return Err(ForestError::schema(
                    Location::Column(name.clone()), reason
                ));
            }
        }

        let mut name_to_index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name_to_index.insert(name.clone(), i).is_some() {
                return Err(ForestError::schema(
                    Location::Column(name.clone()), "duplicated column"
                ));
            }
        }

        Ok(Self { names, name_to_index, columns, n_sample, })
    }


    /// Construct a sample from rows.
    pub fn from_rows<T, S>(names: T, rows: Vec<Vec<f64>>) -> Result<Self>
        where T: IntoIterator<Item = S>,
              S: ToString,
    {
        let names = names.into_iter()
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        let n_feature = names.len();
        let mut columns = vec![Vec::with_capacity(rows.len()); n_feature];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_feature {
                let reason = format!(
                    "row {i} has {} values, expected {n_feature}", row.len()
                );
                return Err(ForestError::schema(Location::Model, reason));
            }
            columns.iter_mut()
                .zip(row)
                .for_each(|(col, x)| col.push(x));
        }
        Self::from_columns(names, columns)
    }


    /// Convert a polars [`DataFrame`] into a sample.
    ///
    /// String columns whose name matches a descriptor with levels
    /// are mapped to level codes; every other column is cast to `f64`.
    /// Nulls become missing values.
    pub fn from_dataframe(df: &DataFrame, variables: &[VariableDescriptor])
        -> Result<Self>
    {
        let mut names = Vec::with_capacity(df.width());
        let mut columns = Vec::with_capacity(df.width());

        for series in df.get_columns() {
            let name = series.name().to_string();
            let descriptor = variables.iter()
                .find(|var| var.name() == name);

            let column = match (series.dtype(), descriptor) {
                (DataType::Utf8, Some(var)) if var.has_levels() => {
                    series.utf8()?
                        .into_iter()
                        .map(|level| encode_level(level, var))
                        .collect::<Result<Vec<_>>>()?
                },
                _ => {
                    series.cast(&DataType::Float64)?
                        .f64()?
                        .into_iter()
                        .map(|x| x.unwrap_or(f64::NAN))
                        .collect::<Vec<_>>()
                },
            };
            names.push(name);
            columns.push(column);
        }

        Self::from_columns(names, columns)
    }


    /// Returns the pair of the number of observations and
    /// the number of columns.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_sample, self.columns.len())
    }


    /// Returns the column names.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names[..]
    }


    /// Returns the column named `name`, if exists.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.name_to_index.get(name)
            .map(|&i| &self.columns[i][..])
    }


    /// Returns the value at `(row, col)`, `None` if missing.
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        let x = self.columns[col][row];
        if x.is_nan() { None } else { Some(x) }
    }


    /// Maps every descriptor to its column.
    /// Fails if a predictor has no column.
    pub(crate) fn align(&self, variables: &[VariableDescriptor])
        -> Result<Vec<usize>>
    {
        variables.iter()
            .enumerate()
            .map(|(index, var)| {
                self.name_to_index.get(var.name())
                    .copied()
                    .ok_or_else(|| {
                        let location = Location::Variable {
                            index,
                            name: var.name().to_string(),
                        };
                        ForestError::schema(
                            location, "the sample has no such column"
                        )
                    })
            })
            .collect()
    }
}


fn encode_level(level: Option<&str>, var: &VariableDescriptor)
    -> Result<f64>
{
    match level {
        None => Ok(f64::NAN),
        Some(level) => {
            var.code_of(level)
                .map(|code| code as f64)
                .ok_or_else(|| {
                    let reason = format!("unknown level `{level}`");
                    ForestError::schema(
                        Location::Column(var.name().to_string()), reason
                    )
                })
        },
    }
}


/// The response used to summarize the observations
/// that satisfy a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Real valued response.
    Numeric(Vec<f64>),
    /// Class response: a code per observation and the class labels.
    Classes {
        /// Class index of each observation.
        codes: Vec<usize>,
        /// Class labels.
        labels: Vec<String>,
    },
}


impl Response {
    /// Construct a class response from raw labels.
    /// The classes are the sorted distinct labels.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let classes = labels.iter()
            .map(|l| l.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let codes = labels.iter()
            .map(|l| {
                classes.iter()
                    .position(|c| c == l.as_ref())
                    .unwrap_or_default()
            })
            .collect();
        Self::Classes { codes, labels: classes }
    }


    /// Returns the number of observations.
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Classes { codes, .. } => codes.len(),
        }
    }


    /// Returns `true` if there is no observation.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let sample = Sample::from_rows(
            ["x", "y"],
            vec![vec![1.0, 2.0], vec![3.0, f64::NAN]],
        ).unwrap();
        assert_eq!(sample.shape(), (2, 2));
        assert_eq!(sample.column("x"), Some(&[1.0, 3.0][..]));
        assert_eq!(sample.value(1, 1), None);
        assert_eq!(sample.value(0, 1), Some(2.0));
    }

    #[test]
    fn test_ragged_columns() {
        let res = Sample::from_columns(
            ["x", "y"],
            vec![vec![1.0, 2.0], vec![3.0]],
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_align() {
        let sample = Sample::from_columns(
            ["b", "a"],
            vec![vec![1.0], vec![2.0]],
        ).unwrap();
        let vars = vec![
            VariableDescriptor::numeric("a"),
            VariableDescriptor::numeric("b"),
        ];
        assert_eq!(sample.align(&vars).unwrap(), vec![1, 0]);

        let vars = vec![VariableDescriptor::numeric("c")];
        assert!(sample.align(&vars).is_err());
    }

    #[test]
    fn test_from_dataframe() {
        let x = Series::new("x", &[Some(1.0), None, Some(3.0)]);
        let y = Series::new("y", &["b", "a", "b"]);
        let df = DataFrame::new(vec![x, y]).unwrap();
        let vars = vec![
            VariableDescriptor::numeric("x"),
            VariableDescriptor::factor("y", ["a", "b"]),
        ];
        let sample = Sample::from_dataframe(&df, &vars).unwrap();
        assert_eq!(sample.shape(), (3, 2));
        assert_eq!(sample.value(1, 0), None);
        assert_eq!(sample.column("y"), Some(&[1.0, 0.0, 1.0][..]));
    }

    #[test]
    fn test_response_from_labels() {
        let res = Response::from_labels(&["yes", "no", "yes"]);
        let exp = Response::Classes {
            codes: vec![1, 0, 1],
            labels: vec!["no".to_string(), "yes".to_string()],
        };
        assert_eq!(exp, res);
    }
}

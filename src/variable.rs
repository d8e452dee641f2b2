//! Classifies the predictors of a model.
//!
//! Split semantics depend on the kind of the split variable:
//! thresholds for `Numeric`/`Ordered`, level subsets for `Factor`.
use serde::{Serialize, Deserialize};

use std::fmt;
use std::collections::HashSet;

use crate::error::{ForestError, Location, Result};


/// The kind of a predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    /// Unordered categorical variable. Splits on a subset of levels.
    Factor,
    /// Ordered variable. Splits on a threshold over the level codes.
    Ordered,
    /// Numeric variable. Splits on a threshold.
    Numeric,
}


impl VariableKind {
    /// Derives the kind from the two flags reported by a backend.
    ///
    /// The flags are added as `0/1` signals:
    /// `0` gives `Factor`, `1` gives `Ordered`, `2` gives `Numeric`.
    #[inline]
    pub fn classify(numeric: bool, multi_category: bool) -> Self {
        match numeric as u8 + multi_category as u8 {
            0 => Self::Factor,
            1 => Self::Ordered,
            _ => Self::Numeric,
        }
    }
}


impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Factor => "Factor",
            Self::Ordered => "Ordered",
            Self::Numeric => "Numeric",
        };
        write!(f, "{name}")
    }
}


/// Per-predictor metadata as reported by a backend.
/// Both flags are optional so that incomplete metadata
/// is reported as an error instead of being guessed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawVariable {
    /// Predictor label.
    pub name: String,
    /// `true` if the values are inherently numeric.
    #[serde(default)]
    pub numeric: Option<bool>,
    /// `true` if the model treats the variable
    /// as having more than one category.
    #[serde(default)]
    pub multi_category: Option<bool>,
    /// Category labels, ordered by their codes.
    #[serde(default)]
    pub levels: Vec<String>,
}


impl RawVariable {
    /// Construct a new instance of [`RawVariable`] with both flags set.
    pub fn new<S: ToString>(name: S, numeric: bool, multi_category: bool)
        -> Self
    {
        Self {
            name: name.to_string(),
            numeric: Some(numeric),
            multi_category: Some(multi_category),
            levels: Vec::new(),
        }
    }


    /// Set the category labels.
    pub fn levels<T, S>(mut self, levels: T) -> Self
        where T: IntoIterator<Item = S>,
              S: ToString,
    {
        self.levels = levels.into_iter()
            .map(|level| level.to_string())
            .collect();
        self
    }
}


/// Describes one predictor column. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    pub(crate) name: String,
    pub(crate) kind: VariableKind,
    pub(crate) levels: Vec<String>,
}


impl VariableDescriptor {
    /// Construct a numeric descriptor.
    pub fn numeric<S: ToString>(name: S) -> Self {
        Self {
            name: name.to_string(),
            kind: VariableKind::Numeric,
            levels: Vec::new(),
        }
    }


    /// Construct a factor descriptor with the given levels.
    pub fn factor<S, T, L>(name: S, levels: T) -> Self
        where S: ToString,
              T: IntoIterator<Item = L>,
              L: ToString,
    {
        Self {
            name: name.to_string(),
            kind: VariableKind::Factor,
            levels: levels.into_iter().map(|l| l.to_string()).collect(),
        }
    }


    /// Construct an ordered descriptor with the given levels.
    /// An ordered variable without levels splits on its raw values.
    pub fn ordered<S, T, L>(name: S, levels: T) -> Self
        where S: ToString,
              T: IntoIterator<Item = L>,
              L: ToString,
    {
        Self {
            name: name.to_string(),
            kind: VariableKind::Ordered,
            levels: levels.into_iter().map(|l| l.to_string()).collect(),
        }
    }


    /// Builds the descriptor of the `index`-th predictor
    /// from the backend metadata.
    pub fn from_raw(index: usize, raw: &RawVariable) -> Result<Self> {
        let location = || Location::Variable {
            index,
            name: raw.name.clone(),
        };
        let numeric = raw.numeric.ok_or_else(|| {
            ForestError::schema(location(), "flag `numeric` is missing")
        })?;
        let multi_category = raw.multi_category.ok_or_else(|| {
            ForestError::schema(location(), "flag `multi_category` is missing")
        })?;

        let kind = VariableKind::classify(numeric, multi_category);
        if kind == VariableKind::Factor && raw.levels.is_empty() {
            return Err(ForestError::schema(
                location(), "a factor variable must have levels"
            ));
        }

        Ok(Self {
            name: raw.name.clone(),
            kind,
            levels: raw.levels.clone(),
        })
    }


    /// Returns the predictor label.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }


    /// Returns the kind of the predictor.
    #[inline]
    pub fn kind(&self) -> VariableKind {
        self.kind
    }


    /// Returns the category labels.
    #[inline]
    pub fn levels(&self) -> &[String] {
        &self.levels[..]
    }


    /// Number of levels for `Factor`/`Ordered`, `0` for `Numeric`.
    #[inline]
    pub fn cardinality(&self) -> usize {
        match self.kind {
            VariableKind::Numeric => 0,
            _ => self.levels.len(),
        }
    }


    /// Returns `true` if splits on this variable are rendered
    /// and normalized as sets of level codes.
    #[inline]
    pub fn has_levels(&self) -> bool {
        self.kind != VariableKind::Numeric && !self.levels.is_empty()
    }


    /// Returns the code of `level`, if exists.
    pub fn code_of(&self, level: &str) -> Option<usize> {
        self.levels.iter().position(|l| l == level)
    }


    /// Returns the label of the level with code `code`.
    /// Falls back to the code itself if it is out of range.
    pub fn level_name(&self, code: usize) -> String {
        self.levels.get(code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}


/// Builds the descriptor sequence of a model.
/// The predictor labels must be unique
/// since observation columns are aligned by name.
pub fn describe_variables(raws: &[RawVariable])
    -> Result<Vec<VariableDescriptor>>
{
    let descriptors = raws.iter()
        .enumerate()
        .map(|(i, raw)| VariableDescriptor::from_raw(i, raw))
        .collect::<Result<Vec<_>>>()?;

    check_unique_names(&descriptors)?;
    Ok(descriptors)
}


pub(crate) fn check_unique_names(descriptors: &[VariableDescriptor])
    -> Result<()>
{
    let mut seen = HashSet::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        if !seen.insert(descriptor.name()) {
            let location = Location::Variable {
                index,
                name: descriptor.name.clone(),
            };
            return Err(ForestError::schema(location, "duplicated name"));
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_01() {
        let res = VariableKind::classify(true, false);
        let exp = VariableKind::Ordered;
        assert_eq!(exp, res, "expected {exp:?}, got {res:?}.");
    }

    #[test]
    fn test_classify_02() {
        let res = VariableKind::classify(true, true);
        let exp = VariableKind::Numeric;
        assert_eq!(exp, res, "expected {exp:?}, got {res:?}.");
    }

    #[test]
    fn test_classify_03() {
        let res = VariableKind::classify(false, false);
        let exp = VariableKind::Factor;
        assert_eq!(exp, res, "expected {exp:?}, got {res:?}.");
    }

    #[test]
    fn test_classify_04() {
        let res = VariableKind::classify(false, true);
        let exp = VariableKind::Ordered;
        assert_eq!(exp, res, "expected {exp:?}, got {res:?}.");
    }

    #[test]
    fn test_missing_flag() {
        let raw = RawVariable {
            name: "x".into(),
            numeric: Some(true),
            multi_category: None,
            levels: Vec::new(),
        };
        let err = VariableDescriptor::from_raw(3, &raw).unwrap_err();
        match err {
            ForestError::Schema { location, .. } => {
                let exp = Location::Variable { index: 3, name: "x".into() };
                assert_eq!(exp, location);
            },
            other => panic!("expected a schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_factor_without_levels() {
        let raw = RawVariable::new("color", false, false);
        assert!(VariableDescriptor::from_raw(0, &raw).is_err());
    }

    #[test]
    fn test_cardinality() {
        let raw = RawVariable::new("color", false, false)
            .levels(["red", "green", "blue"]);
        let desc = VariableDescriptor::from_raw(0, &raw).unwrap();
        assert_eq!(desc.kind(), VariableKind::Factor);
        assert_eq!(desc.cardinality(), 3);
        assert_eq!(desc.code_of("blue"), Some(2));

        let desc = VariableDescriptor::numeric("age");
        assert_eq!(desc.cardinality(), 0);
        assert!(!desc.has_levels());
    }

    #[test]
    fn test_duplicated_names() {
        let raws = vec![
            RawVariable::new("x", true, true),
            RawVariable::new("x", true, true),
        ];
        assert!(describe_variables(&raws).is_err());
    }
}

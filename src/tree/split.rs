//! This file defines split rules for the canonical node table.
use fixedbitset::FixedBitSet;
use serde::{Serialize, Deserialize};

use std::fmt;


/// The output of [`Split::route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeftRight {
    /// The value satisfies the split predicate.
    Left,
    /// The value does not satisfy the split predicate.
    Right,
}


impl fmt::Display for LeftRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}


/// The value a split compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitValue {
    /// `Numeric`/`Ordered` split: go left iff `value <= threshold`.
    Threshold(f64),
    /// `Factor` split: go left iff the level code is in the subset.
    Subset(FixedBitSet),
}


/// The split rule of an internal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub(crate) variable: usize,
    pub(crate) value: SplitValue,
}


impl Split {
    /// Construct a threshold split on the `variable`-th predictor.
    #[inline]
    pub fn threshold(variable: usize, threshold: f64) -> Self {
        Self { variable, value: SplitValue::Threshold(threshold), }
    }


    /// Construct a subset split on the `variable`-th predictor
    /// that has `cardinality` levels.
    /// `levels` are the codes that go left.
    pub fn subset<T>(variable: usize, cardinality: usize, levels: T) -> Self
        where T: IntoIterator<Item = usize>,
    {
        let mut bits = FixedBitSet::with_capacity(cardinality);
        // Out-of-range codes grow the set so that
        // `NodeTable::new` reports the mismatch.
        levels.into_iter()
            .for_each(|code| {
                if code >= bits.len() { bits.grow(code + 1); }
                bits.insert(code);
            });
        Self { variable, value: SplitValue::Subset(bits), }
    }


    /// Returns the index of the split variable.
    #[inline]
    pub fn variable(&self) -> usize {
        self.variable
    }


    /// Returns the split value.
    #[inline]
    pub fn value(&self) -> &SplitValue {
        &self.value
    }


    /// Defines the splitting for a non-missing `value`.
    /// A level code outside of the subset's domain goes right.
    #[inline]
    pub fn route(&self, value: f64) -> LeftRight {
        match &self.value {
            SplitValue::Threshold(threshold) => {
                if value <= *threshold { LeftRight::Left } else { LeftRight::Right }
            },
            SplitValue::Subset(bits) => {
                let is_code = value >= 0f64 && value.fract() == 0f64;
                if is_code && bits.contains(value as usize) {
                    LeftRight::Left
                } else {
                    LeftRight::Right
                }
            },
        }
    }
}

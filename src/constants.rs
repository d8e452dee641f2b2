//! Default values shared by the builders of this crate.

use crate::traversal::OutputMode;

/// The number of observations processed by one parallel task.
pub const DEFAULT_CHUNK_SIZE:  usize = 256;
/// The output shape of [`Predictor`](crate::Predictor) set as default.
pub const DEFAULT_OUTPUT_MODE: OutputMode = OutputMode::FullMembership;

/// The largest number of levels a packed-integer subset can hold.
/// An `f64` represents every integer below `2^53` exactly.
pub const MAX_PACKED_LEVELS:   usize = 53;

/// Placeholder printed for the root node, whose path has no condition.
pub const EMPTY_RULE:          &str = "TRUE";
/// Separator between the conditions of a rendered rule.
pub const RULE_SEPARATOR:      &str = " & ";

/// Column width of the verbose progress lines.
pub const WIDTH:               usize = 8;
/// Number of digits printed for proportions and means.
pub const PREC_WIDTH:          usize = 3;

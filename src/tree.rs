//! The canonical node table.
//! Every backend tree is translated into a [`NodeTable`],
//! a list of strongly-typed [`Node`]s indexed by their 1-based ids.

mod node;
mod split;
mod table;


pub use node::{
    MissingBranch,
    Node,
    NodeId,
    Prediction,
    Status,
};
pub use split::{
    LeftRight,
    Split,
    SplitValue,
};
pub use table::NodeTable;

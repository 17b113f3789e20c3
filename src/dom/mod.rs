//! The in-memory output tree the renderer patches.

mod node;
mod parse;

pub use node::{escape, unescape, Node, NodeId, NodeKind};
pub use parse::parse_fragment;

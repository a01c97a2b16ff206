//! lsra_ir: SSA control-flow graph consumed by the interval builder.
//!
//! The graph is a pair of arenas (nodes and blocks) addressed by u32 handles.
//! It is constructed once with [`builder::GraphBuilder`] and is read-only
//! afterwards.

pub mod builder;
pub mod display;
pub mod graph;
pub mod value;

pub use builder::GraphBuilder;
pub use graph::{Block, Graph, Node, PHI};
pub use value::{BlockRef, NodeRef};

#[cfg(test)]
mod tests;

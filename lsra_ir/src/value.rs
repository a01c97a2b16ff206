//! Opaque handles for graph entities.
//!
//! All references into the graph are u32 indices, not pointers.
//! Intervals, positions and live sets are keyed by these indices.

use std::fmt;

/// Reference to a node (an SSA value or a control instruction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef(pub(crate) u32);

impl NodeRef {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw index into the node arena.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Reference to a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockRef(pub(crate) u32);

impl BlockRef {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw index into the block arena.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

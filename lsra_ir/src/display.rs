//! Text format for graphs.
//!
//! Output format:
//! ```text
//! bb0:
//!   v0 = literal
//!   v1 = add v0, v0
//!   jump -> bb1
//! bb1: preds(bb0, bb2)
//!   v2 = ssa:phi v1, v4
//! ```

use std::fmt;

use crate::graph::Graph;
use crate::value::{BlockRef, NodeRef};

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Graph {
    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, r: NodeRef) -> fmt::Result {
        let node = self.node(r);
        write!(f, "  ")?;
        if !node.is_control() {
            write!(f, "{r} = ")?;
        }
        write!(f, "{}", node.opcode)?;
        if !node.inputs.is_empty() {
            write!(f, " {}", join(&node.inputs))?;
        }
        if !node.targets.is_empty() {
            write!(f, " -> {}", join(&node.targets))?;
        }
        writeln!(f)
    }

    fn fmt_block(&self, f: &mut fmt::Formatter<'_>, r: BlockRef) -> fmt::Result {
        let block = self.block(r);
        write!(f, "{r}:")?;
        if !block.predecessors.is_empty() {
            write!(f, " preds({})", join(&block.predecessors))?;
        }
        writeln!(f)?;
        for &node in &block.nodes {
            self.fmt_node(f, node)?;
        }
        Ok(())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in self.block_refs() {
            self.fmt_block(f, block)?;
        }
        Ok(())
    }
}

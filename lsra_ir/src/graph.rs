//! Nodes, blocks and the control-flow graph that owns them.
//!
//! Blocks are laid out in index order; that order is also the linear order
//! used for position assignment. φ nodes must be the leading nodes of their
//! block and list one input per predecessor, in predecessor order.

use crate::value::{BlockRef, NodeRef};

/// Opcode name reserved for SSA merge nodes.
pub const PHI: &str = "ssa:phi";

/// An SSA value or control instruction.
#[derive(Debug, Clone)]
pub struct Node {
    pub opcode: String,
    pub inputs: Vec<NodeRef>,
    pub block: BlockRef,
    /// Whether this node transfers control (branch, jump, return).
    pub control: bool,
    /// Control-flow targets, in successor order.
    pub targets: Vec<BlockRef>,
}

impl Node {
    pub fn is_phi(&self) -> bool {
        self.opcode == PHI
    }

    pub fn is_control(&self) -> bool {
        self.control
    }
}

/// A basic block: an ordered list of nodes plus its CFG edges.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub nodes: Vec<NodeRef>,
    pub predecessors: Vec<BlockRef>,
    pub successors: Vec<BlockRef>,
}

/// A control-flow graph in SSA form.
#[derive(Debug, Default)]
pub struct Graph {
    /// Node arena, indexed by `NodeRef`.
    pub nodes: Vec<Node>,
    /// Block arena, indexed by `BlockRef`. Index order is layout order.
    pub blocks: Vec<Block>,
}

impl Graph {
    pub fn node(&self, r: NodeRef) -> &Node {
        &self.nodes[r.index() as usize]
    }

    pub fn block(&self, r: BlockRef) -> &Block {
        &self.blocks[r.index() as usize]
    }

    /// Iterate block references in layout order.
    pub fn block_refs(&self) -> impl DoubleEndedIterator<Item = BlockRef> + use<> {
        (0..self.blocks.len() as u32).map(BlockRef)
    }

    /// The leading φ nodes of a block.
    pub fn phis(&self, r: BlockRef) -> impl Iterator<Item = NodeRef> + '_ {
        self.block(r)
            .nodes
            .iter()
            .copied()
            .take_while(|&n| self.node(n).is_phi())
    }

    /// The block's final node, if it is a control instruction.
    pub fn last_control(&self, r: BlockRef) -> Option<NodeRef> {
        self.block(r)
            .nodes
            .last()
            .copied()
            .filter(|&n| self.node(n).is_control())
    }

    /// Position of `pred` in `succ`'s predecessor list.
    pub fn predecessor_index(&self, succ: BlockRef, pred: BlockRef) -> Option<usize> {
        self.block(succ).predecessors.iter().position(|&p| p == pred)
    }

    /// Loop header heuristic: exactly two predecessors, the second one being
    /// the back edge (laid out after the header).
    pub fn is_loop_header(&self, r: BlockRef) -> bool {
        let preds = &self.block(r).predecessors;
        preds.len() == 2 && preds[1].index() > r.index()
    }

    /// Back-edge predecessor of a loop header.
    pub fn loop_back_edge(&self, r: BlockRef) -> Option<BlockRef> {
        if self.is_loop_header(r) {
            Some(self.block(r).predecessors[1])
        } else {
            None
        }
    }
}

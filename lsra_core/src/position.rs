//! Position space: one slot per instruction and per move-insertion gap.
//!
//! Block layout:
//! ```text
//! start  gap            block entry
//! +1     gap            before the first instruction
//! +2     instruction    node 0
//! +3     gap            after node 0
//! ...
//! end-1  gap            block exit
//! ```

use lsra_ir::{BlockRef, Graph, NodeRef};

/// A point in the position space.
pub type Position = u32;

/// What occupies a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Gap,
    Instruction(NodeRef),
}

/// Position assignment for every node and block of a graph.
#[derive(Debug, Default)]
pub struct Layout {
    node_pos: Vec<Position>,
    /// `[start, end)` per block.
    block_span: Vec<(Position, Position)>,
    kinds: Vec<SlotKind>,
}

impl Layout {
    /// Single forward pass over blocks in layout order.
    pub fn new(graph: &Graph) -> Self {
        let mut layout = Layout {
            node_pos: vec![0; graph.nodes.len()],
            block_span: Vec::with_capacity(graph.blocks.len()),
            kinds: Vec::with_capacity(graph.blocks.len() * 3 + graph.nodes.len() * 2),
        };

        for block in graph.block_refs() {
            let start = layout.kinds.len() as Position;

            // Gap at block start, gap before the first instruction.
            layout.kinds.push(SlotKind::Gap);
            layout.kinds.push(SlotKind::Gap);

            for &node in &graph.block(block).nodes {
                layout.node_pos[node.index() as usize] = layout.kinds.len() as Position;
                layout.kinds.push(SlotKind::Instruction(node));
                layout.kinds.push(SlotKind::Gap);
            }

            // Gap at block end.
            layout.kinds.push(SlotKind::Gap);
            layout.block_span.push((start, layout.kinds.len() as Position));
        }

        layout
    }

    /// Total number of positions.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn node(&self, node: NodeRef) -> Position {
        self.node_pos[node.index() as usize]
    }

    pub fn block_start(&self, block: BlockRef) -> Position {
        self.block_span[block.index() as usize].0
    }

    pub fn block_end(&self, block: BlockRef) -> Position {
        self.block_span[block.index() as usize].1
    }

    pub fn kind(&self, pos: Position) -> Option<SlotKind> {
        self.kinds.get(pos as usize).copied()
    }

    /// The node at an instruction position.
    pub fn instruction_at(&self, pos: Position) -> Option<NodeRef> {
        match self.kind(pos)? {
            SlotKind::Instruction(node) => Some(node),
            SlotKind::Gap => None,
        }
    }

    /// The gap position moves requested at `pos` land in: instruction
    /// positions map to the gap right before them.
    pub fn gap_for(&self, pos: Position) -> Position {
        match self.kind(pos) {
            Some(SlotKind::Instruction(_)) => pos - 1,
            _ => pos,
        }
    }
}

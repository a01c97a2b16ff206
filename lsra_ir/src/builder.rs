//! Builder API for constructing a control-flow graph.
//!
//! Edges are derived from control nodes: `control` appends its targets to the
//! current block's successors and the current block to each target's
//! predecessors, in call order. φ inputs follow that predecessor order.

use crate::graph::{Block, Graph, Node, PHI};
use crate::value::{BlockRef, NodeRef};

/// Builder for constructing a graph.
pub struct GraphBuilder {
    graph: Graph,
    current_block: Option<BlockRef>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: Graph::default(),
            current_block: None,
        }
    }

    /// Create a new, empty basic block and return its reference.
    pub fn create_block(&mut self) -> BlockRef {
        let idx = self.graph.blocks.len() as u32;
        self.graph.blocks.push(Block::default());
        BlockRef(idx)
    }

    /// Set the current block for subsequent nodes.
    pub fn switch_to_block(&mut self, block: BlockRef) {
        self.current_block = Some(block);
    }

    fn current(&self) -> BlockRef {
        self.current_block
            .expect("switch_to_block must be called before adding nodes")
    }

    fn push_node(&mut self, node: Node) -> NodeRef {
        let idx = self.graph.nodes.len() as u32;
        let block = node.block;
        self.graph.nodes.push(node);
        self.graph.blocks[block.index() as usize]
            .nodes
            .push(NodeRef(idx));
        NodeRef(idx)
    }

    /// Append a plain value-producing (or side-effecting) node.
    ///
    /// # Panics
    ///
    /// Panics if no block was selected with [`switch_to_block`].
    ///
    /// [`switch_to_block`]: GraphBuilder::switch_to_block
    pub fn node(&mut self, opcode: &str, inputs: &[NodeRef]) -> NodeRef {
        let block = self.current();
        self.push_node(Node {
            opcode: opcode.to_string(),
            inputs: inputs.to_vec(),
            block,
            control: false,
            targets: Vec::new(),
        })
    }

    /// Append a φ node. Inputs may be completed later with `add_phi_input`
    /// when they are defined further down the layout (loop back edges).
    pub fn phi(&mut self, inputs: &[NodeRef]) -> NodeRef {
        self.node(PHI, inputs)
    }

    /// Append one more input to an existing φ node.
    pub fn add_phi_input(&mut self, phi: NodeRef, input: NodeRef) {
        let node = &mut self.graph.nodes[phi.index() as usize];
        debug_assert!(node.is_phi(), "{phi} is not a phi");
        node.inputs.push(input);
    }

    /// Append a control node that ends the current block and record the CFG
    /// edges to `targets`. A node without targets is a return.
    ///
    /// # Panics
    ///
    /// Panics if no block was selected with [`switch_to_block`].
    ///
    /// [`switch_to_block`]: GraphBuilder::switch_to_block
    pub fn control(&mut self, opcode: &str, inputs: &[NodeRef], targets: &[BlockRef]) -> NodeRef {
        let block = self.current();
        let node = self.push_node(Node {
            opcode: opcode.to_string(),
            inputs: inputs.to_vec(),
            block,
            control: true,
            targets: targets.to_vec(),
        });
        for &target in targets {
            self.graph.blocks[block.index() as usize]
                .successors
                .push(target);
            self.graph.blocks[target.index() as usize]
                .predecessors
                .push(block);
        }
        node
    }

    /// Finish construction and return the graph.
    pub fn finish(self) -> Graph {
        self.graph
    }
}

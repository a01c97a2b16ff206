//! Output stream entities: resolved instructions and gaps of parallel moves.

use lsra_ir::NodeRef;

use crate::Operand;
use crate::position::Position;

/// A real instruction bound to its position.
#[derive(Debug, Clone)]
pub struct Instruction {
    node: NodeRef,
    opcode: String,
    pos: Position,
    output: Option<Operand>,
    inputs: Vec<Operand>,
    links: Vec<Position>,
}

impl Instruction {
    /// Placeholder created during position assignment; operands are bound by
    /// the resolver.
    pub fn new(node: NodeRef, opcode: impl Into<String>, pos: Position) -> Self {
        Self {
            node,
            opcode: opcode.into(),
            pos,
            output: None,
            inputs: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn node(&self) -> NodeRef {
        self.node
    }

    pub fn opcode(&self) -> &str {
        &self.opcode
    }

    pub fn pos(&self) -> Position {
        self.pos
    }

    pub fn output(&self) -> Option<Operand> {
        self.output
    }

    pub fn inputs(&self) -> &[Operand] {
        &self.inputs
    }

    /// Positions of the slots this branch transfers control to.
    pub fn links(&self) -> &[Position] {
        &self.links
    }

    pub(crate) fn bind(&mut self, output: Option<Operand>, inputs: Vec<Operand>) {
        self.output = output;
        self.inputs = inputs;
    }

    pub(crate) fn link(&mut self, target: Position) {
        self.links.push(target);
    }
}

/// `from -> to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Operand,
    pub to: Operand,
}

/// Moves scheduled at one gap position.
///
/// `moves` form one parallel permutation: all sources are read before any
/// destination is written. `post_moves` run after the whole permutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gap {
    pos: Position,
    moves: Vec<Move>,
    post_moves: Vec<Move>,
}

impl Gap {
    pub fn new(pos: Position) -> Self {
        Self {
            pos,
            moves: Vec::new(),
            post_moves: Vec::new(),
        }
    }

    pub fn pos(&self) -> Position {
        self.pos
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn post_moves(&self) -> &[Move] {
        &self.post_moves
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.post_moves.is_empty()
    }

    pub fn add_move(&mut self, from: Operand, to: Operand) {
        self.moves.push(Move { from, to });
    }

    pub fn add_post_move(&mut self, from: Operand, to: Operand) {
        self.post_moves.push(Move { from, to });
    }
}

/// What the output stream holds at one position.
#[derive(Debug, Clone, Copy)]
pub enum Slot<'a> {
    Instruction(&'a Instruction),
    Gap(&'a Gap),
    Empty,
}

impl Slot<'_> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

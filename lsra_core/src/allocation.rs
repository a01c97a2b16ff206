//! Allocation context threaded through builder, external allocator and
//! resolver.

use std::collections::{BTreeMap, BTreeSet};

use lsra_ir::{BlockRef, NodeRef};

use crate::instruction::{Gap, Instruction, Slot};
use crate::interval::{Interval, IntervalId, Intervals};
use crate::position::{Layout, Position};
use crate::{GroupId, Operand};

/// Values live at a block's entry.
pub type LiveSet = BTreeSet<NodeRef>;

/// Positions, intervals and the instruction/gap stream of one graph.
#[derive(Debug)]
pub struct Allocation {
    pub(crate) layout: Layout,
    pub(crate) intervals: Intervals,
    /// One killed interval per block covering the block's span.
    pub(crate) blocks: Vec<Interval>,
    /// Reservation track per physical register.
    pub(crate) registers: Vec<Interval>,
    /// Placeholder or resolved instruction per instruction position.
    pub(crate) instructions: Vec<Option<Instruction>>,
    pub(crate) gaps: BTreeMap<Position, Gap>,
    pub(crate) live_in: Vec<LiveSet>,
    /// Intervals awaiting a location, per allocation group.
    pub(crate) groups: Vec<Vec<IntervalId>>,
}

impl Allocation {
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn intervals(&self) -> &Intervals {
        &self.intervals
    }

    pub fn interval(&self, id: IntervalId) -> &Interval {
        self.intervals.get(id)
    }

    pub fn interval_mut(&mut self, id: IntervalId) -> &mut Interval {
        self.intervals.get_mut(id)
    }

    /// Head interval of a node's split chain.
    pub fn interval_of(&self, node: NodeRef) -> &Interval {
        self.intervals.of(node)
    }

    /// Segment of `node`'s chain active at `pos`.
    pub fn child_at(&self, node: NodeRef, pos: Position) -> IntervalId {
        self.intervals.child_at(node, pos)
    }

    /// Give an interval its location. Called by the external allocator.
    pub fn assign(&mut self, id: IntervalId, value: Operand) {
        self.intervals.get_mut(id).set_value(value);
    }

    /// Split a segment on behalf of the external allocator. The new segment
    /// is not added to any group list.
    ///
    /// Returns `None` unless `pos` lies strictly inside the segment.
    pub fn split(&mut self, id: IntervalId, pos: Position) -> Option<IntervalId> {
        let interval = self.intervals.get(id);
        if pos <= interval.start() || pos >= interval.end() {
            return None;
        }
        Some(self.intervals.split(id, pos))
    }

    pub fn block_interval(&self, block: BlockRef) -> &Interval {
        &self.blocks[block.index() as usize]
    }

    /// Reservation track of physical register `reg`.
    pub fn register(&self, reg: u32) -> &Interval {
        &self.registers[reg as usize]
    }

    pub fn registers(&self) -> &[Interval] {
        &self.registers
    }

    pub fn position(&self, node: NodeRef) -> Position {
        self.layout.node(node)
    }

    pub fn live_in(&self, block: BlockRef) -> &LiveSet {
        &self.live_in[block.index() as usize]
    }

    pub fn groups(&self) -> &[Vec<IntervalId>] {
        &self.groups
    }

    pub fn group(&self, group: GroupId) -> &[IntervalId] {
        self.groups
            .get(group.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn instruction(&self, pos: Position) -> Option<&Instruction> {
        self.instructions.get(pos as usize)?.as_ref()
    }

    pub(crate) fn instruction_mut(&mut self, pos: Position) -> Option<&mut Instruction> {
        self.instructions.get_mut(pos as usize)?.as_mut()
    }

    /// The gap at `pos`, if one was created.
    pub fn gap_at(&self, pos: Position) -> Option<&Gap> {
        self.gaps.get(&pos)
    }

    /// The gap serving `pos`, created on first access. Requests at an
    /// instruction position land in the gap right before it.
    pub fn gap(&mut self, pos: Position) -> &mut Gap {
        let at = self.layout.gap_for(pos);
        self.gaps.entry(at).or_insert_with(|| Gap::new(at))
    }

    pub fn gaps(&self) -> impl Iterator<Item = &Gap> {
        self.gaps.values()
    }

    pub fn slot(&self, pos: Position) -> Slot<'_> {
        if let Some(instr) = self.instruction(pos) {
            Slot::Instruction(instr)
        } else if let Some(gap) = self.gaps.get(&pos) {
            Slot::Gap(gap)
        } else {
            Slot::Empty
        }
    }

    /// The position-indexed output stream.
    pub fn slots(&self) -> impl Iterator<Item = (Position, Slot<'_>)> {
        (0..self.layout.len() as Position).map(|pos| (pos, self.slot(pos)))
    }
}

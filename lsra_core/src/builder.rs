//! Liveness analysis and interval construction.
//!
//! Blocks are visited in reverse layout order and nodes in reverse order
//! within a block, so one backward pass computes every block's live-in set.
//! Values live across a loop are patched afterwards by extending them over
//! the whole loop body from the loop header.

use std::collections::BTreeMap;

use log::{debug, trace};
use lsra_ir::{BlockRef, Graph, NodeRef};

use crate::allocation::{Allocation, LiveSet};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::instruction::Instruction;
use crate::interval::{Interval, IntervalId, Intervals, Use};
use crate::position::{Layout, Position};
use crate::{GroupId, Operand};

/// Builds the intervals of one graph.
pub struct Builder<'a> {
    graph: &'a Graph,
    config: &'a Config,
    alloc: Allocation,
}

impl<'a> Builder<'a> {
    /// Assign positions and prepare empty intervals for `graph`.
    pub fn new(graph: &'a Graph, config: &'a Config) -> Self {
        let layout = Layout::new(graph);
        let alloc = Allocation {
            instructions: vec![None; layout.len()],
            layout,
            intervals: Intervals::new(graph.nodes.len()),
            blocks: vec![Interval::new(None); graph.blocks.len()],
            registers: (0..config.registers().len() as u32)
                .map(|r| {
                    let mut track = Interval::new(None);
                    track.set_value(Operand::fixed(r));
                    track
                })
                .collect(),
            gaps: BTreeMap::new(),
            live_in: vec![LiveSet::new(); graph.blocks.len()],
            groups: vec![Vec::new(); config.groups().len()],
        };
        let mut builder = Self {
            graph,
            config,
            alloc,
        };
        builder.init_block_ranges();
        builder.assign_groups();
        builder
    }

    /// Positions assigned so far.
    pub fn layout(&self) -> &Layout {
        &self.alloc.layout
    }

    /// Run liveness, fixed-use splitting and grouping.
    pub fn build(mut self) -> Result<Allocation> {
        self.build_intervals()?;
        self.split_into_groups();
        debug!(
            "built {} intervals over {} positions",
            self.alloc.intervals.len(),
            self.alloc.layout.len()
        );
        Ok(self.alloc)
    }

    /// Place a placeholder instruction in every instruction slot and freeze
    /// each block's interval over its span.
    fn init_block_ranges(&mut self) {
        for block in self.graph.block_refs() {
            for &node in &self.graph.block(block).nodes {
                let pos = self.alloc.layout.node(node);
                self.alloc.instructions[pos as usize] =
                    Some(Instruction::new(node, &self.graph.node(node).opcode, pos));
            }

            let start = self.alloc.layout.block_start(block);
            let end = self.alloc.layout.block_end(block);
            let interval = &mut self.alloc.blocks[block.index() as usize];
            interval.fill_range(start, end);
            interval.kill();
        }
    }

    /// Every value produced by an opcode belongs to that opcode's group.
    /// φ groups are inferred later from their inputs.
    fn assign_groups(&mut self) {
        for (i, node) in self.graph.nodes.iter().enumerate() {
            if node.is_phi() {
                continue;
            }
            if let Some(opcode) = self.config.opcode(&node.opcode)
                && opcode.output.is_some()
            {
                self.alloc
                    .intervals
                    .of_mut(NodeRef::new(i as u32))
                    .set_group(opcode.group);
            }
        }
    }

    fn build_intervals(&mut self) -> Result<()> {
        let graph = self.graph;
        for block in graph.block_refs().rev() {
            let mut live = LiveSet::new();

            for &succ in &graph.block(block).successors {
                live.extend(self.alloc.live_in(succ).iter().copied());
                self.add_live_phis(&mut live, block, succ)?;
            }

            let block_start = self.alloc.layout.block_start(block);
            let block_end = self.alloc.layout.block_end(block);
            for &node in &live {
                self.alloc
                    .intervals
                    .of_mut(node)
                    .fill_range(block_start, block_end);
            }

            for &node in graph.block(block).nodes.iter().rev() {
                self.build_node_intervals(block_start, &mut live, node)?;
            }

            let loop_start = graph.is_loop_header(block);
            self.kill_phis(loop_start, &mut live, block)?;
            if loop_start {
                self.build_loop_header(&live, block);
            }

            trace!("live-in {block}: {live:?}");
            self.alloc.live_in[block.index() as usize] = live;
        }

        self.split_fixed();
        Ok(())
    }

    /// φ inputs flowing along the edge `block -> succ` are live at the end
    /// of `block`.
    fn add_live_phis(&self, live: &mut LiveSet, block: BlockRef, succ: BlockRef) -> Result<()> {
        let Some(index) = self.graph.predecessor_index(succ, block) else {
            return Err(Error::MissingEdge {
                from: block,
                to: succ,
            });
        };

        for phi in self.graph.phis(succ) {
            let inputs = &self.graph.node(phi).inputs;
            let input = inputs.get(index).ok_or(Error::PhiArity {
                node: phi,
                found: inputs.len(),
            })?;
            live.insert(*input);
        }
        Ok(())
    }

    fn build_node_intervals(
        &mut self,
        block_start: Position,
        live: &mut LiveSet,
        node: NodeRef,
    ) -> Result<()> {
        let n = self.graph.node(node);
        if n.is_phi() {
            return Ok(());
        }

        let opcode = self
            .config
            .opcode(&n.opcode)
            .ok_or_else(|| Error::UnknownOpcode {
                node,
                opcode: n.opcode.clone(),
            })?;

        let pos = self.alloc.layout.node(node);

        let out = self.alloc.intervals.of_mut(node);
        if out.is_empty() {
            out.fill_range(pos, pos + 1);
        } else {
            out.update_start(pos);
        }
        match opcode.output {
            None => out.kill(),
            Some(output) => out.use_at(pos, output),
        }
        live.remove(&node);

        if n.inputs.len() != opcode.inputs.len() {
            return Err(Error::InputCountMismatch {
                node,
                opcode: opcode.name.clone(),
                expected: opcode.inputs.len(),
                found: n.inputs.len(),
            });
        }
        for (&input, &constraint) in n.inputs.iter().zip(&opcode.inputs) {
            let interval = self.alloc.intervals.of_mut(input);
            interval.fill_range(block_start, pos);
            interval.use_at(pos, constraint);
            live.insert(input);
        }

        for spill in &opcode.spills {
            if let Some(reg) = spill.value() {
                self.alloc.registers[reg as usize].fill_range(pos, pos + 1);
            }
        }
        Ok(())
    }

    /// φ outputs are defined at block entry; their inputs are read on the
    /// incoming edges.
    fn kill_phis(&mut self, loop_start: bool, live: &mut LiveSet, block: BlockRef) -> Result<()> {
        let graph = self.graph;
        let loop_end = self.loop_end(block).filter(|_| loop_start);

        for phi in graph.phis(block) {
            live.remove(&phi);

            let inputs = &graph.node(phi).inputs;
            if inputs.len() != 2 {
                return Err(Error::PhiArity {
                    node: phi,
                    found: inputs.len(),
                });
            }

            let group = self.unify_phi_group(phi, inputs)?;
            let pos = self.alloc.layout.node(phi);
            for &input in inputs {
                let interval = self.alloc.intervals.of_mut(input);
                if let Some(group) = group {
                    interval.set_group(group);
                }
                interval.use_at(pos, Operand::any());
                if let Some(loop_end) = loop_end {
                    interval.use_at(loop_end, Operand::any());
                }
            }

            let out = self.alloc.intervals.of_mut(phi);
            if let Some(group) = group {
                out.set_group(group);
            }
            out.use_at(pos, Operand::any());
        }
        Ok(())
    }

    /// The single group shared by a φ and its inputs.
    fn unify_phi_group(&self, phi: NodeRef, inputs: &[NodeRef]) -> Result<Option<GroupId>> {
        let mut group = self.alloc.intervals.of(phi).group();
        for &input in inputs {
            match (group, self.alloc.intervals.of(input).group()) {
                (None, found) => group = found,
                (Some(expected), Some(found)) if expected != found => {
                    return Err(Error::PhiGroupMismatch {
                        node: phi,
                        expected,
                        found,
                    });
                }
                _ => {}
            }
        }
        Ok(group)
    }

    /// End of the back-edge predecessor of a loop header.
    fn loop_end(&self, header: BlockRef) -> Option<Position> {
        let back_edge = self.graph.loop_back_edge(header)?;
        Some(self.alloc.blocks[back_edge.index() as usize].end())
    }

    /// Keep every value live at a loop header alive until the back edge.
    fn build_loop_header(&mut self, live: &LiveSet, block: BlockRef) {
        let Some(loop_end) = self.loop_end(block) else {
            return;
        };
        let loop_start = self.alloc.layout.block_start(block);
        trace!("loop {block}: [{loop_start}, {loop_end}) keeps {live:?}");

        for &node in live {
            let interval = self.alloc.intervals.of_mut(node);
            interval.fill_range(loop_start, loop_end);
            interval.use_at(loop_end, Operand::any());
        }
    }

    fn split_fixed(&mut self) {
        for i in (0..self.alloc.intervals.heads()).rev() {
            let node = NodeRef::new(i as u32);
            let head = self.alloc.intervals.head(node);

            // One split per position, bound to the last recorded register.
            // Other registers read by the same instruction are reserved here
            // and loaded from the bound one by the resolver.
            let uses = self.alloc.intervals.get(head).fixed_uses().to_vec();
            let mut fixed: Vec<Use> = Vec::new();
            for u in uses {
                match fixed.last_mut() {
                    Some(last) if last.pos == u.pos => {
                        self.reserve_input(*last);
                        *last = u;
                    }
                    _ => fixed.push(u),
                }
            }

            // Splitting from the end is easier: we always split the head.
            for &u in fixed.iter().rev() {
                self.split_fixed_with_use(head, u);
                if !self.alloc.intervals.get(head).is_alive() {
                    break;
                }
            }
        }
    }

    fn split_fixed_with_use(&mut self, head: IntervalId, u: Use) {
        let Some(reg) = u.operand.value() else {
            return;
        };
        let interval = self.alloc.intervals.get(head);
        let (start, end, group) = (interval.start(), interval.end(), interval.group());
        let pos = u.pos;

        // Fixed output.
        if pos == start {
            self.alloc.registers[reg as usize].fill_range(pos, pos + 1);
            if pos + 1 < end {
                let tail = self.alloc.intervals.split(head, pos + 1);
                self.push_to_group(group, tail);
            }
            let interval = self.alloc.intervals.get_mut(head);
            interval.set_value(u.operand);
            interval.kill();
            trace!("fixed output {interval}");
            return;
        }

        // Fixed use in the middle or at the end: head, middle and tail.
        self.reserve_input(u);

        if pos < end {
            let tail = self.alloc.intervals.split(head, pos);
            self.push_to_group(group, tail);
        }
        let fixed = if pos - 1 > start {
            self.alloc.intervals.split(head, pos - 1)
        } else {
            head
        };

        let interval = self.alloc.intervals.get_mut(fixed);
        interval.set_value(u.operand);
        interval.kill();
        trace!("fixed input {interval}");
    }

    /// Reserve a fixed input register over the gap before the instruction.
    fn reserve_input(&mut self, u: Use) {
        if let Some(reg) = u.operand.value() {
            self.alloc.registers[reg as usize].fill_range(u.pos - 1, u.pos);
        }
    }

    fn push_to_group(&mut self, group: Option<GroupId>, id: IntervalId) {
        if let Some(list) = group.and_then(|g| self.alloc.groups.get_mut(g.index())) {
            list.push(id);
        }
    }

    /// Hand every alive head interval to its group.
    fn split_into_groups(&mut self) {
        for i in 0..self.alloc.intervals.heads() {
            let id = self.alloc.intervals.head(NodeRef::new(i as u32));
            let interval = self.alloc.intervals.get(id);
            if !interval.is_alive() {
                continue;
            }
            let group = interval.group();
            self.push_to_group(group, id);
        }
    }
}

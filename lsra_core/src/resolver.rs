//! Operand binding and move synthesis.
//!
//! Runs after the external allocator assigned a location to every interval
//! segment that needs one. Moves are only recorded here; sequentialising a
//! gap's parallel moves is left to the emitter.

use log::{debug, trace};
use lsra_ir::{BlockRef, Graph, NodeRef};

use crate::Operand;
use crate::allocation::Allocation;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::instruction::Slot;
use crate::interval::IntervalId;
use crate::position::Position;

/// Turns allocated intervals into operands, moves and branch links.
pub struct Resolver<'a> {
    graph: &'a Graph,
    config: &'a Config,
    alloc: &'a mut Allocation,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a Graph, config: &'a Config, alloc: &'a mut Allocation) -> Self {
        Self {
            graph,
            config,
            alloc,
        }
    }

    pub fn resolve(&mut self) -> Result<()> {
        self.resolve_uses()?;
        self.resolve_flow()?;
        self.resolve_splits();
        self.resolve_jumps()?;
        debug!("resolved with {} gap(s)", self.alloc.gaps.len());
        Ok(())
    }

    /// Location of `node` at `pos`.
    fn value_at(&self, node: NodeRef, pos: Position) -> Result<Operand> {
        self.alloc
            .intervals
            .value_at(node, pos)
            .ok_or(Error::Unassigned { node, pos })
    }

    fn resolve_uses(&mut self) -> Result<()> {
        let graph = self.graph;
        let config = self.config;
        for pos in 0..self.alloc.layout.len() as Position {
            let Some(node) = self.alloc.layout.instruction_at(pos) else {
                continue;
            };
            let n = graph.node(node);

            // φs never emit code; they become moves on the incoming edges.
            if n.is_phi() {
                self.alloc.instructions[pos as usize] = None;
                self.resolve_phi(node)?;
                continue;
            }

            let opcode = config
                .opcode(&n.opcode)
                .ok_or_else(|| Error::UnknownOpcode {
                    node,
                    opcode: n.opcode.clone(),
                })?;

            let output = self
                .alloc
                .intervals
                .of(node)
                .value()
                .filter(|v| !v.is_none());

            let mut inputs = Vec::with_capacity(n.inputs.len());
            for (&input, &constraint) in n.inputs.iter().zip(&opcode.inputs) {
                if constraint.is_fixed() {
                    // A value read in several fixed registers is bound to one
                    // of them; the others are copied from it after the gap's
                    // parallel moves have loaded it.
                    let bound = self.value_at(input, pos - 1)?;
                    if bound != constraint {
                        trace!("fixed copy {input}: {bound} -> {constraint} at {pos}");
                        self.alloc.gap(pos).add_post_move(bound, constraint);
                    }
                    inputs.push(constraint);
                } else if constraint.is_none() {
                    inputs.push(constraint);
                } else {
                    // The value may have just been moved in by the gap
                    // preceding this instruction.
                    inputs.push(self.value_at(input, pos - 1)?);
                }
            }

            if let Some(instr) = self.alloc.instruction_mut(pos) {
                instr.bind(output, inputs);
            }
        }
        Ok(())
    }

    fn resolve_phi(&mut self, phi: NodeRef) -> Result<()> {
        // No location means the φ had no uses.
        let Some(output) = self.alloc.intervals.of(phi).value() else {
            return Ok(());
        };

        let n = self.graph.node(phi);
        let preds = &self.graph.block(n.block).predecessors;
        if preds.len() != n.inputs.len() {
            return Err(Error::PhiArity {
                node: phi,
                found: n.inputs.len(),
            });
        }

        for (&input, &pred) in n.inputs.iter().zip(preds) {
            let last = self.last_control(pred)?;
            let pred_pos = self.alloc.layout.node(last) - 1;

            let from = self.entry_value(input, pred_pos)?;
            if from == output {
                continue;
            }
            trace!("phi {phi}: {from} -> {output} at {pred_pos}");
            self.alloc.gap(pred_pos).add_move(from, output);
        }
        Ok(())
    }

    /// Location of `node` on entry to the gap at `gap_pos`. The segment
    /// active at the gap itself may only be loaded by that gap's moves.
    fn entry_value(&self, node: NodeRef, gap_pos: Position) -> Result<Operand> {
        self.value_at(node, gap_pos - 1)
    }

    fn last_control(&self, block: BlockRef) -> Result<NodeRef> {
        self.graph
            .last_control(block)
            .ok_or(Error::MissingControl { block })
    }

    fn resolve_flow(&mut self) -> Result<()> {
        let graph = self.graph;
        for block in graph.block_refs() {
            let succs = &graph.block(block).successors;
            if succs.is_empty() {
                continue;
            }

            let last = self.alloc.layout.node(self.last_control(block)?);
            for &succ in succs {
                let succ_start = self.alloc.layout.block_start(succ);

                // With a conditional branch the moves belong to one edge only,
                // so they go to the target. Otherwise they share the gap before
                // the branch with split moves that may load the value there,
                // so the source is read on entry to that gap.
                let (gap_pos, source_pos) = if succs.len() == 2 {
                    (succ_start, last)
                } else {
                    (last - 1, last - 2)
                };

                self.resolve_single_flow(succ, last, succ_start, gap_pos, source_pos)?;
            }
        }
        Ok(())
    }

    fn resolve_single_flow(
        &mut self,
        succ: BlockRef,
        from_pos: Position,
        to_pos: Position,
        gap_pos: Position,
        source_pos: Position,
    ) -> Result<()> {
        let live: Vec<NodeRef> = self.alloc.live_in(succ).iter().copied().collect();
        for node in live {
            let from = self.value_at(node, from_pos)?;
            let to = self.value_at(node, to_pos)?;
            if from == to {
                continue;
            }
            let source = self.value_at(node, source_pos)?;
            if source == to {
                continue;
            }
            trace!("flow {node} into {succ}: {source} -> {to} at {gap_pos}");
            self.alloc.gap(gap_pos).add_move(source, to);
        }
        Ok(())
    }

    fn resolve_splits(&mut self) {
        for i in 0..self.alloc.intervals.heads() {
            let head = self.alloc.intervals.head(NodeRef::new(i as u32));
            let chain: Vec<_> = self.alloc.intervals.chain(head).collect();
            for pair in chain.windows(2) {
                self.resolve_split(pair[0], pair[1]);
            }
        }
    }

    fn resolve_split(&mut self, from: IntervalId, to: IntervalId) {
        let prev = self.alloc.intervals.get(from);
        let next = self.alloc.intervals.get(to);

        // Split in a lifetime hole: handled by `resolve_flow`.
        if prev.end() != next.start() {
            return;
        }
        let (Some(a), Some(b)) = (prev.value(), next.value()) else {
            return;
        };
        if a == b {
            return;
        }

        let pos = prev.end();
        let gap = self.alloc.gap(pos);
        // Fixed uses split intervals at instruction positions; such moves
        // must follow the moves into the fixed register.
        if gap.pos() < pos {
            gap.add_post_move(a, b);
        } else {
            gap.add_move(a, b);
        }
        trace!("split at {pos}: {a} -> {b}");
    }

    fn resolve_jumps(&mut self) -> Result<()> {
        let graph = self.graph;
        for pos in 0..self.alloc.layout.len() as Position {
            let Some(instr) = self.alloc.instruction(pos) else {
                continue;
            };
            let node = instr.node();
            let n = graph.node(node);
            if !self.config.opcode(&n.opcode).is_some_and(|op| op.branch) {
                continue;
            }

            for &target in &n.targets {
                let link = self.resolve_control(node, target)?;
                if let Some(instr) = self.alloc.instruction_mut(pos) {
                    instr.link(link);
                }
            }
        }
        Ok(())
    }

    /// First non-empty slot at or after the target block's start.
    fn resolve_control(&self, node: NodeRef, target: BlockRef) -> Result<Position> {
        let end = self.alloc.layout.len() as Position;
        let mut pos = self.alloc.layout.block_start(target);
        while pos < end && self.alloc.slot(pos).is_empty() {
            pos += 1;
        }
        match self.alloc.slot(pos) {
            Slot::Empty => Err(Error::UnresolvedTarget { node, target }),
            _ => Ok(pos),
        }
    }
}

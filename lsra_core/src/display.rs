//! Text dump of the position-indexed output stream.
//!
//! Output format (empty slots are skipped):
//! ```text
//!    2: r1 = literal
//!    3: gap (r1 -> r0) post (r0 -> r2)
//!    4: jump => 8
//!    9: ret r0
//! ```

use std::fmt;

use crate::allocation::Allocation;
use crate::instruction::{Gap, Instruction, Move, Slot};

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gap ({})", join(self.moves()))?;
        if !self.post_moves().is_empty() {
            write!(f, " post ({})", join(self.post_moves()))?;
        }
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(output) = self.output() {
            write!(f, "{output} = ")?;
        }
        write!(f, "{}", self.opcode())?;
        if !self.inputs().is_empty() {
            write!(f, " {}", join(self.inputs()))?;
        }
        if !self.links().is_empty() {
            write!(f, " => {}", join(self.links()))?;
        }
        Ok(())
    }
}

/// Display adapter returned by [`Allocation::display`].
pub struct DisplayAllocation<'a>(&'a Allocation);

impl fmt::Display for DisplayAllocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pos, slot) in self.0.slots() {
            match slot {
                Slot::Instruction(instr) => writeln!(f, "{pos:>4}: {instr}")?,
                Slot::Gap(gap) => writeln!(f, "{pos:>4}: {gap}")?,
                Slot::Empty => {}
            }
        }
        Ok(())
    }
}

impl Allocation {
    pub fn display(&self) -> DisplayAllocation<'_> {
        DisplayAllocation(self)
    }
}

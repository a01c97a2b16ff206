//! Interval construction and move resolution for linear scan allocation.
//!
//! The pipeline has three phases sharing one [`Allocation`] context:
//!
//! 1. [`Builder`] assigns positions, computes liveness, builds one
//!    [`Interval`] per SSA value and pre-splits intervals at fixed-register
//!    uses.
//! 2. An external allocator walks [`Allocation::groups`] and assigns a value
//!    (register or stack slot) to every alive interval.
//! 3. [`Resolver`] binds operands into instructions and schedules the moves
//!    needed at φ inputs, control-flow edges and split boundaries.

pub mod allocation;
pub mod builder;
pub mod config;
pub mod display;
pub mod error;
pub mod instruction;
pub mod interval;
pub mod position;
pub mod resolver;

use std::fmt;

use serde::Deserialize;

pub use allocation::Allocation;
pub use builder::Builder;
pub use config::{Config, Opcode};
pub use error::{Error, Result};
pub use instruction::{Gap, Instruction, Move, Slot};
pub use interval::{Interval, IntervalId, LiveRange, Use};
pub use position::Position;
pub use resolver::Resolver;

/// Location class an operand asks for or has been given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperandKind {
    /// A register: a specific one when the operand carries a value.
    Register,
    /// A stack slot.
    Stack,
    /// Any location of the interval's group.
    Any,
    /// No location at all (the operand is not materialised).
    None,
}

/// An operand constraint, or an assigned location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operand {
    kind: OperandKind,
    value: Option<u32>,
}

impl Operand {
    pub const fn new(kind: OperandKind, value: Option<u32>) -> Self {
        Self { kind, value }
    }

    /// A specific physical register.
    pub const fn fixed(reg: u32) -> Self {
        Self::new(OperandKind::Register, Some(reg))
    }

    /// Some register of the interval's group.
    pub const fn register() -> Self {
        Self::new(OperandKind::Register, None)
    }

    /// A specific stack slot.
    pub const fn stack(slot: u32) -> Self {
        Self::new(OperandKind::Stack, Some(slot))
    }

    pub const fn any() -> Self {
        Self::new(OperandKind::Any, None)
    }

    pub const fn none() -> Self {
        Self::new(OperandKind::None, None)
    }

    pub fn kind(self) -> OperandKind {
        self.kind
    }

    pub fn value(self) -> Option<u32> {
        self.value
    }

    pub fn is_fixed(self) -> bool {
        self.kind == OperandKind::Register && self.value.is_some()
    }

    pub fn is_none(self) -> bool {
        self.kind == OperandKind::None
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.value) {
            (OperandKind::Register, Some(r)) => write!(f, "r{r}"),
            (OperandKind::Register, None) => write!(f, "reg"),
            (OperandKind::Stack, Some(s)) => write!(f, "[s{s}]"),
            (OperandKind::Stack, None) => write!(f, "stack"),
            (OperandKind::Any, _) => write!(f, "any"),
            (OperandKind::None, _) => write!(f, "none"),
        }
    }
}

/// Allocation class (register file) an interval is assigned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

impl GroupId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

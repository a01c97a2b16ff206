//! Construction-time failures.
//!
//! Every variant is an invariant violation in caller-supplied input (graph,
//! opcode table or allocator output). None of them is recoverable for the
//! given input.

use std::fmt;

use lsra_ir::{BlockRef, NodeRef};

use crate::GroupId;
use crate::position::Position;

#[derive(Debug)]
pub enum Error {
    /// The opcode table could not be parsed.
    Json(serde_json::Error),
    /// An operand names a register missing from the register list.
    UnknownRegister { name: String },
    /// An opcode names an allocation group missing from the group list.
    UnknownGroup { opcode: String, group: String },
    /// An operand value does not fit its kind.
    InvalidOperand { opcode: String, detail: String },
    /// A spill or scratch entry is not a specific register.
    InvalidSpill { opcode: String, detail: &'static str },
    /// A node uses an opcode with no definition.
    UnknownOpcode { node: NodeRef, opcode: String },
    /// A node's input count differs from its opcode definition.
    InputCountMismatch {
        node: NodeRef,
        opcode: String,
        expected: usize,
        found: usize,
    },
    /// A φ node does not have exactly two inputs.
    PhiArity { node: NodeRef, found: usize },
    /// A φ node and its inputs live in different allocation groups.
    PhiGroupMismatch {
        node: NodeRef,
        expected: GroupId,
        found: GroupId,
    },
    /// `from` lists `to` as successor but `to` does not list `from`.
    MissingEdge { from: BlockRef, to: BlockRef },
    /// A block that must end in control flow does not.
    MissingControl { block: BlockRef },
    /// A branch target has no instruction or gap to link to.
    UnresolvedTarget { node: NodeRef, target: BlockRef },
    /// A value is read at a position where its segment has no location.
    Unassigned { node: NodeRef, pos: Position },
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Json(e) => write!(f, "malformed opcode table: {e}"),
            Error::UnknownRegister { name } => write!(f, "unknown register `{name}`"),
            Error::UnknownGroup { opcode, group } => {
                write!(f, "opcode `{opcode}`: unknown group `{group}`")
            }
            Error::InvalidOperand { opcode, detail } => {
                write!(f, "opcode `{opcode}`: invalid operand: {detail}")
            }
            Error::InvalidSpill { opcode, detail } => write!(f, "opcode `{opcode}`: {detail}"),
            Error::UnknownOpcode { node, opcode } => {
                write!(f, "{node}: failed to find definition for `{opcode}`")
            }
            Error::InputCountMismatch {
                node,
                opcode,
                expected,
                found,
            } => write!(
                f,
                "{node}: opcode `{opcode}` declares {expected} input(s), node has {found}"
            ),
            Error::PhiArity { node, found } => {
                write!(f, "{node}: phi must have exactly 2 inputs, found {found}")
            }
            Error::PhiGroupMismatch {
                node,
                expected,
                found,
            } => write!(
                f,
                "{node}: phi group inconsistency (expected {expected}, found {found})"
            ),
            Error::MissingEdge { from, to } => {
                write!(f, "{to} does not list {from} as predecessor")
            }
            Error::MissingControl { block } => {
                write!(f, "{block} does not end with a control instruction")
            }
            Error::UnresolvedTarget { node, target } => {
                write!(f, "{node}: branch target {target} has no instruction")
            }
            Error::Unassigned { node, pos } => {
                write!(f, "{node}: no location assigned at position {pos}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

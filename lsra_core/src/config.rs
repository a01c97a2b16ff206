//! Register list and opcode constraint table.
//!
//! The table is static configuration keyed by opcode name. It is usually
//! loaded from JSON:
//!
//! ```json
//! {
//!   "registers": ["rax", "rbx", "rcx"],
//!   "opcodes": {
//!     "literal": { "output": "any" },
//!     "add":     { "output": "any", "inputs": ["any", "any"] },
//!     "call":    { "output": { "kind": "register", "value": "rax" },
//!                  "spills": [{ "kind": "register", "value": "rcx" }] },
//!     "jump":    { "branch": true }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::{GroupId, Operand, OperandKind};

/// Group used when the configuration names none.
pub const DEFAULT_GROUP: &str = "general";

#[derive(Debug, Deserialize)]
pub struct ConfigSpec {
    pub registers: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub opcodes: BTreeMap<String, OpcodeSpec>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpcodeSpec {
    #[serde(default)]
    pub output: Option<OperandSpec>,
    #[serde(default)]
    pub inputs: Vec<OperandSpec>,
    /// Registers clobbered by the instruction.
    #[serde(default)]
    pub spills: Vec<OperandSpec>,
    /// Registers used as temporaries by the instruction; reserved like spills.
    #[serde(default)]
    pub scratches: Vec<OperandSpec>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub branch: bool,
}

/// Operand constraint as written in the table: either the shorthand
/// `"any"`/`"none"`/`"stack"`/`"register"` or `{ "kind", "value" }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OperandSpec {
    Short(OperandKind),
    Full {
        kind: OperandKind,
        #[serde(default)]
        value: Option<OperandValue>,
    },
}

/// Register name, register index or stack slot.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OperandValue {
    Index(u32),
    Name(String),
}

/// A resolved opcode definition.
#[derive(Debug, Clone)]
pub struct Opcode {
    pub name: String,
    pub output: Option<Operand>,
    pub inputs: Vec<Operand>,
    /// Specific registers reserved across the instruction.
    pub spills: Vec<Operand>,
    pub group: GroupId,
    pub branch: bool,
}

impl Opcode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: None,
            inputs: Vec::new(),
            spills: Vec::new(),
            group: GroupId(0),
            branch: false,
        }
    }
}

/// Registers, allocation groups and opcode definitions.
#[derive(Debug)]
pub struct Config {
    registers: Vec<String>,
    register_map: HashMap<String, u32>,
    groups: Vec<String>,
    opcodes: HashMap<String, Opcode>,
}

impl Config {
    pub fn new(spec: ConfigSpec) -> Result<Self> {
        let register_map = spec
            .registers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i as u32))
            .collect();
        let groups = if spec.groups.is_empty() {
            vec![DEFAULT_GROUP.to_string()]
        } else {
            spec.groups
        };
        let mut config = Config {
            registers: spec.registers,
            register_map,
            groups,
            opcodes: HashMap::new(),
        };
        for (name, opcode) in &spec.opcodes {
            config.define_opcode(name, opcode)?;
        }
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let spec: ConfigSpec = serde_json::from_str(json)?;
        Self::new(spec)
    }

    pub fn from_reader(reader: impl std::io::Read) -> Result<Self> {
        let spec: ConfigSpec = serde_json::from_reader(reader)?;
        Self::new(spec)
    }

    pub fn registers(&self) -> &[String] {
        &self.registers
    }

    pub fn register(&self, name: &str) -> Option<u32> {
        self.register_map.get(name).copied()
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<GroupId> {
        self.groups
            .iter()
            .position(|g| g == name)
            .map(|i| GroupId(i as u32))
    }

    pub fn opcode(&self, name: &str) -> Option<&Opcode> {
        self.opcodes.get(name)
    }

    /// Resolve an operand spec, mapping symbolic register names to indices.
    pub fn create_operand(&self, opcode: &str, spec: &OperandSpec) -> Result<Operand> {
        let (kind, value) = match spec {
            OperandSpec::Short(kind) => (*kind, None),
            OperandSpec::Full { kind, value } => (*kind, value.as_ref()),
        };
        let invalid = |detail: String| Error::InvalidOperand {
            opcode: opcode.to_string(),
            detail,
        };
        let value = match (kind, value) {
            (_, None) => None,
            (OperandKind::Register, Some(OperandValue::Name(name))) => Some(
                self.register(name)
                    .ok_or_else(|| Error::UnknownRegister { name: name.clone() })?,
            ),
            (OperandKind::Register, Some(OperandValue::Index(i))) => {
                if *i as usize >= self.registers.len() {
                    return Err(invalid(format!("register index {i} out of range")));
                }
                Some(*i)
            }
            (OperandKind::Stack, Some(OperandValue::Index(slot))) => Some(*slot),
            (OperandKind::Stack, Some(OperandValue::Name(name))) => {
                return Err(invalid(format!("stack slot must be a number, got `{name}`")));
            }
            (OperandKind::Any | OperandKind::None, Some(_)) => {
                return Err(invalid(format!("`{kind:?}` operand takes no value")));
            }
        };
        Ok(Operand::new(kind, value))
    }

    fn create_spill(&self, opcode: &str, spec: &OperandSpec) -> Result<Operand> {
        let spill = self.create_operand(opcode, spec)?;
        if spill.kind() != OperandKind::Register {
            return Err(Error::InvalidSpill {
                opcode: opcode.to_string(),
                detail: "non-register spill requested",
            });
        }
        if spill.value().is_none() {
            return Err(Error::InvalidSpill {
                opcode: opcode.to_string(),
                detail: "any register spill requested",
            });
        }
        Ok(spill)
    }

    /// Add (or replace) an opcode definition.
    pub fn define_opcode(&mut self, name: &str, spec: &OpcodeSpec) -> Result<&Opcode> {
        let mut opcode = Opcode::new(name);

        if let Some(output) = &spec.output {
            opcode.output = Some(self.create_operand(name, output)?);
        }
        for input in &spec.inputs {
            opcode.inputs.push(self.create_operand(name, input)?);
        }
        for spill in spec.scratches.iter().chain(&spec.spills) {
            opcode.spills.push(self.create_spill(name, spill)?);
        }
        if let Some(group) = &spec.group {
            opcode.group = self.group(group).ok_or_else(|| Error::UnknownGroup {
                opcode: name.to_string(),
                group: group.clone(),
            })?;
        }
        opcode.branch = spec.branch;

        self.opcodes.insert(name.to_string(), opcode);
        Ok(&self.opcodes[name])
    }
}

//! Compiled program artifacts: the IR wire format.
//!
//! [`GeneratedCode`] bundles the four parallel arrays the virtual machine
//! consumes — function directory, memory-scope templates, constant pool,
//! and numeric quadruples. The binary round-trip uses `postcard`, the same
//! compact serde format the rest of the toolchain persists state with; a
//! JSON rendering backs debug listings.

use serde::{Deserialize, Serialize};

use crate::quad::ConstValue;

/// One function directory entry: dense id plus the IR index of the
/// function body's first instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDirectoryEntry {
    pub id: usize,
    pub address: usize,
}

/// Memory reservation for one lexical scope, partitioned by type.
///
/// Slot 0 of the materialized scope records the IR index that opened it;
/// the typed partitions follow in the fixed order ints, bools, floats,
/// strings, temps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryScopeTemplate {
    /// IR index of the `OPEN` that created this scope (scope id).
    pub activation_addr: usize,
    pub int_count: usize,
    pub bool_count: usize,
    pub float_count: usize,
    pub string_count: usize,
    pub temp_count: usize,
}

impl MemoryScopeTemplate {
    /// Total slot count, including the activation slot.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.int_count
            + self.bool_count
            + self.float_count
            + self.string_count
            + self.temp_count
    }
}

/// A constant-pool entry: the type tag and the literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub tag: u8,
    pub value: ConstValue,
}

/// A final quadruple over numeric operands; unused fields stay `None`.
///
/// `op` is the numeric instruction tag (see [`crate::quad::Instruction`]);
/// unknown tags are rejected by the VM at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalQuadruple {
    pub op: u8,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub result: Option<usize>,
}

/// Everything the virtual machine needs to run a compiled program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GeneratedCode {
    pub function_directory: Vec<FunctionDirectoryEntry>,
    pub memory_templates: Vec<MemoryScopeTemplate>,
    pub constants: Vec<Constant>,
    pub quadruples: Vec<FinalQuadruple>,
}

impl GeneratedCode {
    /// Serializes the program to the binary wire format.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores a program previously serialized with [`GeneratedCode::dump`].
    ///
    /// # Errors
    /// Returns an error if the data is not a valid serialized program.
    pub fn load(data: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(data)
    }

    /// Pretty JSON rendering for debug listings.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

//! Error taxonomy of the compiler and virtual machine.
//!
//! Every failure is fatal: errors propagate up the pipeline and abort the
//! compilation or the run. Each carries a human-readable message plus its
//! context — the source line for syntax errors, the offending construct for
//! semantic errors, the program counter for VM runtime errors, and the
//! accessed address for VM memory errors. Memory errors are translated to
//! absolute addresses as they unwind through activation-record layers.

use std::{error::Error, fmt};

use strum::{Display, IntoStaticStr};

/// A lexing or parsing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    /// 1-based source line the error was detected on.
    pub line: usize,
}

impl SyntaxError {
    pub(crate) fn new(message: impl Into<String>, line: usize) -> Self {
        Self { message: message.into(), line }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on line {}", self.message, self.line)
    }
}

impl Error for SyntaxError {}

/// A static-semantics violation found while analyzing the AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub message: String,
    /// Short description of the construct the error was found in.
    pub context: String,
}

impl SemanticError {
    pub(crate) fn new(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self { message: message.into(), context: context.into() }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (in {})", self.message, self.context)
    }
}

impl Error for SemanticError {}

/// A failure assembling the compilation unit: bad dependency graphs,
/// unused or missing modules, or an internal inconsistency between the
/// analyzer's output and the code generator's expectations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for CompileError {}

/// Kinds of virtual-machine runtime failures.
///
/// Codes 10–24 are the original contract; 25 and 26 extend it for
/// arithmetic faults the instruction set can actually hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeErrorKind {
    NoMoreArguments,
    ReturnValueNotFound,
    ReturnValueInVoid,
    UnloadedArguments,
    InstructionDoesntExist,
    FunctionNotFound,
    StackTemplateNotFound,
    MemoryAddressMissing,
    GotoJumpMissing,
    DivisionByZero,
    OperandTypeMismatch,
}

impl RuntimeErrorKind {
    /// Stable numeric error code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::NoMoreArguments => 10,
            Self::ReturnValueNotFound => 11,
            Self::ReturnValueInVoid => 12,
            Self::UnloadedArguments => 13,
            Self::InstructionDoesntExist => 20,
            Self::FunctionNotFound => 21,
            Self::StackTemplateNotFound => 22,
            Self::MemoryAddressMissing => 23,
            Self::GotoJumpMissing => 24,
            Self::DivisionByZero => 25,
            Self::OperandTypeMismatch => 26,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::NoMoreArguments => "Tried to load argument after all arguments have been loaded",
            Self::ReturnValueNotFound => "Tried to return void in a function that returns a value",
            Self::ReturnValueInVoid => "Tried to return a value in a function that returns void",
            Self::UnloadedArguments => "Function returned before loading all arguments",
            Self::InstructionDoesntExist => "Instruction does not exist",
            Self::FunctionNotFound => "Function directory data not found",
            Self::StackTemplateNotFound => "Memory allocation data not found",
            Self::MemoryAddressMissing => "Memory address not found",
            Self::GotoJumpMissing => "GOTO jump line not found",
            Self::DivisionByZero => "Division by zero",
            Self::OperandTypeMismatch => "Operand types are not valid for the instruction",
        }
    }
}

/// A runtime failure, pinned to the instruction it happened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    /// Program counter of the faulting instruction.
    pub index: usize,
}

impl RuntimeError {
    pub(crate) fn new(kind: RuntimeErrorKind, index: usize) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error {}: {} (at instruction {})",
            self.kind.code(),
            self.kind.message(),
            self.index
        )
    }
}

impl Error for RuntimeError {}

/// Kinds of virtual-machine memory faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryErrorKind {
    AddressOutsideRange,
    UnallocatedAccess,
    AllocatedConstant,
}

impl MemoryErrorKind {
    /// Stable numeric error code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::AddressOutsideRange => 0,
            Self::UnallocatedAccess => 1,
            Self::AllocatedConstant => 2,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::AddressOutsideRange => {
                "Attempted to access memory address beyond the range of allocated variables"
            }
            Self::UnallocatedAccess => "Attempted to access unallocated memory",
            Self::AllocatedConstant => "Attempted to modify the value of a constant",
        }
    }
}

/// A memory fault, pinned to the address it was detected at.
///
/// The address starts out relative to the layer that detected the fault;
/// each enclosing layer adds its base offset while the error unwinds, so
/// the address reported to the user is absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryError {
    pub kind: MemoryErrorKind,
    pub address: usize,
}

impl MemoryError {
    pub(crate) fn new(kind: MemoryErrorKind, address: usize) -> Self {
        Self { kind, address }
    }

    /// Shifts the reported address by an enclosing layer's base offset.
    #[must_use]
    pub(crate) fn offset_by(mut self, base: usize) -> Self {
        self.address += base;
        self
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error {}: {} (address {})",
            self.kind.code(),
            self.kind.message(),
            self.address
        )
    }
}

impl Error for MemoryError {}

/// Any failure the virtual machine can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    Runtime(RuntimeError),
    Memory(MemoryError),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime(e) => write!(f, "{e}"),
            Self::Memory(e) => write!(f, "{e}"),
        }
    }
}

impl Error for VmError {}

impl From<RuntimeError> for VmError {
    fn from(error: RuntimeError) -> Self {
        Self::Runtime(error)
    }
}

impl From<MemoryError> for VmError {
    fn from(error: MemoryError) -> Self {
        Self::Memory(error)
    }
}

/// Result alias for VM execution paths.
pub type VmResult<T> = Result<T, VmError>;

/// Top-level error: anything the compile-and-run pipeline can fail with.
#[derive(Debug)]
pub enum LittleDuckError {
    Syntax(SyntaxError),
    Semantic(SemanticError),
    Compile(CompileError),
    Runtime(RuntimeError),
    Memory(MemoryError),
}

impl fmt::Display for LittleDuckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(e) => write!(f, "SyntaxError: {e}"),
            Self::Semantic(e) => write!(f, "SemanticError: {e}"),
            Self::Compile(e) => write!(f, "CompileError: {e}"),
            Self::Runtime(e) => write!(f, "VirtualMachineRuntimeError: {e}"),
            Self::Memory(e) => write!(f, "VirtualMachineMemoryError: {e}"),
        }
    }
}

impl Error for LittleDuckError {}

impl From<SyntaxError> for LittleDuckError {
    fn from(error: SyntaxError) -> Self {
        Self::Syntax(error)
    }
}

impl From<SemanticError> for LittleDuckError {
    fn from(error: SemanticError) -> Self {
        Self::Semantic(error)
    }
}

impl From<CompileError> for LittleDuckError {
    fn from(error: CompileError) -> Self {
        Self::Compile(error)
    }
}

impl From<VmError> for LittleDuckError {
    fn from(error: VmError) -> Self {
        match error {
            VmError::Runtime(e) => Self::Runtime(e),
            VmError::Memory(e) => Self::Memory(e),
        }
    }
}

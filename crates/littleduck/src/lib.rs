//! LittleDuck: a small imperative teaching language, compiled to a linear
//! quadruple IR and executed on a stack-based virtual machine.
//!
//! The pipeline, leaves first:
//!
//! ```text
//! source ─► lexer ─► parser ─► AST ─► analyzer (symbolic quadruples,
//!   scope tree) ─► code generator (function directory, scope templates,
//!   constants, numeric quadruples) ─► VM ─► stdout + exit code
//! ```
//!
//! # Example
//! ```
//! use littleduck::{CollectStringPrint, compile_and_run};
//!
//! let mut print = CollectStringPrint::new();
//! let exit = compile_and_run(
//!     "program P; main { exit_code = 7; } end;",
//!     &[],
//!     &mut print,
//! )
//! .unwrap();
//! assert_eq!(exit, 7);
//! assert_eq!(print.output(), "\nProgram ended with exit code: 7\n");
//! ```

mod analyzer;
mod ast;
mod codegen;
mod cube;
mod deps;
mod errors;
mod io;
mod lexer;
mod parser;
mod program;
mod quad;
mod run;
mod scope;
mod value;
mod vm;

pub use crate::{
    analyzer::{AnalyzedProgram, Analyzer},
    errors::{
        CompileError, LittleDuckError, MemoryError, MemoryErrorKind, RuntimeError,
        RuntimeErrorKind, SemanticError, SyntaxError, VmError,
    },
    io::{CollectStringPrint, PrintWriter, StdPrint},
    program::{Constant, FinalQuadruple, FunctionDirectoryEntry, GeneratedCode, MemoryScopeTemplate},
    quad::{ConstValue, Instruction, Operand, Operation, Quadruple},
    run::{CompileOutput, Compiler, compile_and_run},
    scope::{CompileWarning, FunctionMetadata, GlobalScope, Scope, VariableMetadata},
    value::{Value, ValueType},
    vm::VirtualMachine,
};

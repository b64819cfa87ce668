//! Lexical scopes and symbol metadata.
//!
//! The analyzer builds a tree of scopes rooted at the global scope. Scope
//! ids are the IR index of the `OPEN` quadruple that opened them, which is
//! how the code generator re-locates each scope while replaying the
//! quadruple stream.

use std::fmt;

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::{quad::ConstValue, value::ValueType};

/// Metadata recorded for every declared variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableMetadata {
    pub identifier: String,
    /// Name of the module the variable was declared in.
    pub module: String,
    pub value_type: ValueType,
    /// Set once an assignment (or parameter load) gives the variable a value.
    pub is_initialized: bool,
    /// Set on the first read.
    pub is_used: bool,
    /// IR index at declaration time; orders locals deterministically when
    /// addresses are assigned.
    pub declare_index: usize,
}

/// Metadata recorded for every declared function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionMetadata {
    pub identifier: String,
    /// Name of the module the function was declared in.
    pub module: String,
    /// `None` for `void` functions.
    pub return_type: Option<ValueType>,
    /// Parameters in declaration order.
    pub parameters: Vec<(String, ValueType)>,
    /// True after the first `return` seen in the body.
    pub returns: bool,
    pub is_used: bool,
    /// IR index of the `OPEN` that starts the function body.
    pub start_index: usize,
}

/// One node of the scope tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scope {
    /// IR index of the `OPEN` quadruple (0 for the global scope).
    pub id: usize,
    /// Non-empty on function-body scopes; `return` resolves its enclosing
    /// function by scanning for the innermost scope carrying a name.
    pub function_name: Option<String>,
    pub variables: IndexMap<String, VariableMetadata>,
    /// Child scopes in the order their `OPEN`s were emitted.
    pub children: Vec<Scope>,
    /// Number of compiler temporaries allocated while analyzing this scope.
    pub temp_count: usize,
}

impl Scope {
    #[must_use]
    pub fn new(id: usize, function_name: Option<String>) -> Self {
        Self { id, function_name, ..Self::default() }
    }

    #[must_use]
    pub fn has_variable(&self, identifier: &str) -> bool {
        self.variables.contains_key(identifier)
    }

    #[must_use]
    pub fn get_variable(&self, identifier: &str) -> Option<&VariableMetadata> {
        self.variables.get(identifier)
    }

    pub fn get_variable_mut(&mut self, identifier: &str) -> Option<&mut VariableMetadata> {
        self.variables.get_mut(identifier)
    }

    pub fn add_variable(&mut self, metadata: VariableMetadata) {
        self.variables.insert(metadata.identifier.clone(), metadata);
    }

    /// Allocates the next temp index in this scope; indices stay dense.
    pub fn allocate_temp(&mut self) -> usize {
        let index = self.temp_count;
        self.temp_count += 1;
        index
    }

    /// Counts variables of the given type, for memory-template sizing.
    #[must_use]
    pub fn count_of(&self, value_type: ValueType) -> usize {
        self.variables.values().filter(|v| v.value_type == value_type).count()
    }
}

/// The root scope. Besides variables it owns the function directory source
/// and the interned constant set shared by every module of a compilation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlobalScope {
    pub scope: Scope,
    pub functions: IndexMap<String, FunctionMetadata>,
    /// Deduplicated constant operands; sorted into the pool by codegen.
    pub constants: AHashSet<ConstValue>,
}

impl GlobalScope {
    #[must_use]
    pub fn has_function(&self, identifier: &str) -> bool {
        self.functions.contains_key(identifier)
    }

    #[must_use]
    pub fn get_function(&self, identifier: &str) -> Option<&FunctionMetadata> {
        self.functions.get(identifier)
    }

    /// Unused-variable and unused-function findings left after analysis.
    ///
    /// A finding is produced iff the corresponding metadata flag is still
    /// false; `main` and the reserved `exit_code` variable are exempt.
    #[must_use]
    pub fn unused_warnings(&self) -> Vec<CompileWarning> {
        let mut warnings = Vec::new();
        collect_unused_variables(&self.scope, &mut warnings);
        for function in self.functions.values() {
            if !function.is_used && function.identifier != "main" {
                warnings.push(CompileWarning::UnusedFunction {
                    identifier: function.identifier.clone(),
                    module: function.module.clone(),
                });
            }
        }
        warnings
    }
}

fn collect_unused_variables(scope: &Scope, warnings: &mut Vec<CompileWarning>) {
    for variable in scope.variables.values() {
        if !variable.is_used && variable.identifier != "exit_code" {
            warnings.push(CompileWarning::UnusedVariable {
                identifier: variable.identifier.clone(),
                module: variable.module.clone(),
            });
        }
    }
    for child in &scope.children {
        collect_unused_variables(child, warnings);
    }
}

/// A non-fatal finding reported after analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    UnusedVariable { identifier: String, module: String },
    UnusedFunction { identifier: String, module: String },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnusedVariable { identifier, module } => {
                write!(f, "warning: variable '{identifier}' is never used (module '{module}')")
            }
            Self::UnusedFunction { identifier, module } => {
                write!(f, "warning: function '{identifier}' is never used (module '{module}')")
            }
        }
    }
}

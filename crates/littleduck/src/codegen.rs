//! Code generation: symbolic operands to numeric addresses.
//!
//! The virtual address space is one contiguous, 0-based range laid out as
//! `[constants | global variables | activation records…]`. Within a scope,
//! slots are partitioned by type in the fixed order
//! `[activation_addr | ints | bools | floats | strings | temps]`; variable
//! addresses are assigned after the activation slot by sorting on
//! `(type tag, declare index, identifier)`, and a nested scope's base
//! continues past the enclosing scope's full size. Sibling scopes reuse
//! addresses — stack discipline makes that safe.
//!
//! The generator replays the symbolic quadruple stream, descending into
//! the scope tree on every `OPEN` (scope ids are the IR index of their
//! `OPEN`, which is what makes the re-traversal line up).

use ahash::AHashMap;
use tracing::debug;

use crate::{
    errors::CompileError,
    program::{Constant, FinalQuadruple, FunctionDirectoryEntry, GeneratedCode, MemoryScopeTemplate},
    quad::{ConstValue, Operand, Operation, Quadruple},
    scope::{GlobalScope, Scope},
    value::ValueType,
};

/// Result alias for code generation.
pub type GenerateResult<T> = Result<T, CompileError>;

/// Converts an analyzed program into runnable numeric code.
///
/// # Errors
/// Returns [`CompileError`] if the quadruple stream and the scope tree
/// disagree — that would be a compiler defect, not a user error, but it is
/// reported rather than panicking.
pub fn generate(analyzed: &crate::analyzer::AnalyzedProgram) -> GenerateResult<GeneratedCode> {
    Generator::default().generate(&analyzed.global, &analyzed.quadruples)
}

/// Per-scope addressing state while replaying the quadruple stream.
struct ScopeFrame<'a> {
    scope: &'a Scope,
    /// Index of the next child to descend into on `OPEN`.
    next_child: usize,
    /// `identifier → absolute address` for this scope's variables.
    variable_map: AHashMap<String, usize>,
    /// Base address of the temp partition; `TempVar(n)` resolves to
    /// `temp_base + n`.
    temp_base: usize,
    /// First address past this scope; base for a nested scope.
    end_offset: usize,
}

#[derive(Default)]
struct Generator {
    function_map: AHashMap<String, usize>,
    constant_index: AHashMap<ConstValue, usize>,
    directory: Vec<FunctionDirectoryEntry>,
    templates: Vec<MemoryScopeTemplate>,
    constants: Vec<Constant>,
    quadruples: Vec<FinalQuadruple>,
}

impl Generator {
    fn generate(
        mut self,
        global: &GlobalScope,
        quadruples: &[Quadruple],
    ) -> GenerateResult<GeneratedCode> {
        // Function directory: dense ids in ascending start order.
        let mut functions: Vec<_> = global.functions.values().collect();
        functions.sort_by_key(|f| f.start_index);
        for (id, function) in functions.iter().enumerate() {
            self.directory.push(FunctionDirectoryEntry { id, address: function.start_index });
            self.function_map.insert(function.identifier.clone(), id);
        }

        // Constant pool: deterministic order, type tag first then value.
        let mut pool: Vec<_> = global.constants.iter().cloned().collect();
        pool.sort();
        for (address, constant) in pool.iter().enumerate() {
            self.constant_index.insert(constant.clone(), address);
        }
        self.constants = pool
            .into_iter()
            .map(|value| Constant { tag: value.value_type().tag(), value })
            .collect();

        // Global scope occupies template 0; the VM materializes it before
        // executing, so no OPEN exists for it.
        let mut stack = vec![build_frame_at(&global.scope, self.constants.len())];
        self.templates.push(build_template(&global.scope));

        for (index, quadruple) in quadruples.iter().enumerate() {
            self.map_quadruple(index, quadruple, &mut stack)?;
        }

        debug!(
            functions = self.directory.len(),
            templates = self.templates.len(),
            constants = self.constants.len(),
            quadruples = self.quadruples.len(),
            "code generated"
        );
        Ok(GeneratedCode {
            function_directory: self.directory,
            memory_templates: self.templates,
            constants: self.constants,
            quadruples: self.quadruples,
        })
    }

    fn map_quadruple<'s>(
        &mut self,
        index: usize,
        quadruple: &Quadruple,
        stack: &mut Vec<ScopeFrame<'s>>,
    ) -> GenerateResult<()> {
        let tag = quadruple.op.instruction() as u8;
        let mapped = match quadruple.op {
            Operation::OpenStackFrame => {
                let Some(parent) = stack.last_mut() else {
                    return Err(CompileError::new("Scope stack is empty".to_owned()));
                };
                let base = parent.end_offset;
                let next_child = parent.next_child;
                parent.next_child += 1;
                let parent_scope: &'s Scope = parent.scope;
                let Some(child) = parent_scope.children.get(next_child) else {
                    return Err(CompileError::new(format!(
                        "No scope matches the OPEN at instruction {index}"
                    )));
                };
                if child.id != index {
                    return Err(CompileError::new(format!(
                        "Scope id {} does not match the OPEN at instruction {index}",
                        child.id
                    )));
                }
                self.templates.push(build_template(child));
                stack.push(build_frame_at(child, base));
                FinalQuadruple {
                    op: tag,
                    left: Some(self.templates.len() - 1),
                    right: None,
                    result: None,
                }
            }
            Operation::CloseStackFrame => {
                if stack.len() <= 1 {
                    return Err(CompileError::new(format!(
                        "CLOSE without a matching OPEN at instruction {index}"
                    )));
                }
                stack.pop();
                FinalQuadruple { op: tag, left: None, right: None, result: None }
            }
            Operation::Goto => FinalQuadruple {
                op: tag,
                left: None,
                right: None,
                result: Some(jump_target(index, quadruple)?),
            },
            Operation::GotoTrue | Operation::GotoFalse => FinalQuadruple {
                op: tag,
                left: Some(self.resolve(index, required(index, quadruple.left.as_ref())?, stack)?),
                right: None,
                result: Some(jump_target(index, quadruple)?),
            },
            Operation::FunctionCall => {
                let Some(Operand::Identifier(name)) = &quadruple.left else {
                    return Err(CompileError::new(format!(
                        "CALL without a function name at instruction {index}"
                    )));
                };
                let Some(&id) = self.function_map.get(name) else {
                    return Err(CompileError::new(format!(
                        "Function '{name}' is missing from the directory"
                    )));
                };
                let result = match &quadruple.result {
                    Some(operand) => Some(self.resolve(index, operand, stack)?),
                    None => None,
                };
                FinalQuadruple { op: tag, left: Some(id), right: None, result }
            }
            Operation::Return => {
                let left = match &quadruple.left {
                    Some(operand) => Some(self.resolve(index, operand, stack)?),
                    None => None,
                };
                FinalQuadruple { op: tag, left, right: None, result: None }
            }
            Operation::FunctionParameter => FinalQuadruple {
                op: tag,
                left: Some(self.resolve(index, required(index, quadruple.left.as_ref())?, stack)?),
                right: None,
                result: None,
            },
            Operation::FunctionArgument => FinalQuadruple {
                op: tag,
                left: None,
                right: None,
                result: Some(self.resolve(
                    index,
                    required(index, quadruple.result.as_ref())?,
                    stack,
                )?),
            },
            Operation::Print => FinalQuadruple { op: tag, left: None, right: None, result: None },
            Operation::Assign => FinalQuadruple {
                op: tag,
                left: Some(self.resolve(index, required(index, quadruple.left.as_ref())?, stack)?),
                right: None,
                result: Some(self.resolve(
                    index,
                    required(index, quadruple.result.as_ref())?,
                    stack,
                )?),
            },
            Operation::And
            | Operation::Or
            | Operation::Equals
            | Operation::LessThan
            | Operation::MoreThan
            | Operation::Addition
            | Operation::Subtraction
            | Operation::Multiplication
            | Operation::Division => FinalQuadruple {
                op: tag,
                left: Some(self.resolve(index, required(index, quadruple.left.as_ref())?, stack)?),
                right: Some(self.resolve(
                    index,
                    required(index, quadruple.right.as_ref())?,
                    stack,
                )?),
                result: Some(self.resolve(
                    index,
                    required(index, quadruple.result.as_ref())?,
                    stack,
                )?),
            },
        };
        self.quadruples.push(mapped);
        Ok(())
    }

    /// Resolves one symbolic operand to its numeric address.
    fn resolve(
        &self,
        index: usize,
        operand: &Operand,
        stack: &[ScopeFrame<'_>],
    ) -> GenerateResult<usize> {
        match operand {
            Operand::Const(constant) => self.constant_index.get(constant).copied().ok_or_else(|| {
                CompileError::new(format!("Constant {constant} is missing from the pool"))
            }),
            Operand::Temp(n) => {
                let frame = stack
                    .last()
                    .ok_or_else(|| CompileError::new("Scope stack is empty".to_owned()))?;
                Ok(frame.temp_base + n)
            }
            Operand::Identifier(name) => stack
                .iter()
                .rev()
                .find_map(|frame| frame.variable_map.get(name).copied())
                .ok_or_else(|| {
                    CompileError::new(format!(
                        "Variable '{name}' has no address (instruction {index})"
                    ))
                }),
            Operand::Line(target) => Ok(*target),
        }
    }
}

fn jump_target(index: usize, quadruple: &Quadruple) -> GenerateResult<usize> {
    match &quadruple.result {
        Some(Operand::Line(target)) => Ok(*target),
        _ => Err(CompileError::new(format!(
            "Jump at instruction {index} was never backpatched"
        ))),
    }
}

fn required<'a>(index: usize, operand: Option<&'a Operand>) -> GenerateResult<&'a Operand> {
    operand.ok_or_else(|| {
        CompileError::new(format!("Missing operand in quadruple {index}"))
    })
}

/// Sorts the scope's variables on `(type tag, declare index, identifier)`
/// and assigns addresses after the activation slot. The global scope's
/// base sits right after the constant pool; a nested scope's base is the
/// enclosing frame's end offset.
fn build_frame_at(scope: &Scope, base: usize) -> ScopeFrame<'_> {
    let mut variables: Vec<_> = scope.variables.values().collect();
    variables.sort_by(|a, b| {
        (a.value_type.tag(), a.declare_index, &a.identifier)
            .cmp(&(b.value_type.tag(), b.declare_index, &b.identifier))
    });
    let variable_map: AHashMap<String, usize> = variables
        .iter()
        .enumerate()
        .map(|(i, v)| (v.identifier.clone(), base + 1 + i))
        .collect();
    let temp_base = base + 1 + variables.len();
    let end_offset = temp_base + scope.temp_count;
    ScopeFrame { scope, next_child: 0, variable_map, temp_base, end_offset }
}

fn build_template(scope: &Scope) -> MemoryScopeTemplate {
    MemoryScopeTemplate {
        activation_addr: scope.id,
        int_count: scope.count_of(ValueType::Int),
        bool_count: scope.count_of(ValueType::Bool),
        float_count: scope.count_of(ValueType::Float),
        string_count: scope.count_of(ValueType::String),
        temp_count: scope.temp_count,
    }
}

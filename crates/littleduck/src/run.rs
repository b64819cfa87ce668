//! Public interface: source text in, compiled program (and output) out.
//!
//! The pipeline is lexer → parser → dependency resolution → semantic
//! analysis / IR emission → code generation. Imported modules are parsed
//! alongside the main module, ordered leaves-first, and analyzed into a
//! shared bundle that flows into the main module's analysis.

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    analyzer::{AnalyzedProgram, Analyzer},
    ast::Program,
    codegen,
    errors::{CompileError, LittleDuckError},
    io::PrintWriter,
    parser,
    program::GeneratedCode,
    scope::CompileWarning,
    vm::VirtualMachine,
};

/// Everything a compilation produces.
#[derive(Debug)]
pub struct CompileOutput {
    /// The runnable program.
    pub code: GeneratedCode,
    /// Unused-symbol findings; never fatal.
    pub warnings: Vec<CompileWarning>,
    /// The analyzer's output (symbolic quadruples plus the scope tree),
    /// kept for listings and inspection.
    pub analyzed: AnalyzedProgram,
}

/// Compiles LittleDuck source text.
#[derive(Debug, Default)]
pub struct Compiler;

impl Compiler {
    /// Compiles a single module with no imports.
    ///
    /// # Errors
    /// Returns [`LittleDuckError`] on any lexing, parsing, semantic, or
    /// code-generation failure.
    pub fn compile(source: &str) -> Result<CompileOutput, LittleDuckError> {
        Self::compile_with_dependencies(source, &[])
    }

    /// Compiles a main module together with its dependency sources.
    ///
    /// Module identity comes from each file's `program <ident>;` header;
    /// `import X;` refers to the module named `X`. Every supplied
    /// dependency must be transitively imported from the main module.
    ///
    /// # Errors
    /// Returns [`LittleDuckError`] on any failure in the pipeline,
    /// including unused or missing modules and circular imports.
    pub fn compile_with_dependencies(
        source: &str,
        dependencies: &[&str],
    ) -> Result<CompileOutput, LittleDuckError> {
        let mut main_program = parser::parse(source)?;
        debug!(module = %main_program.identifier, "parsed main module");

        let mut dependency_programs: IndexMap<String, Program> = IndexMap::new();
        for dependency in dependencies {
            let program = parser::parse(dependency)?;
            debug!(module = %program.identifier, "parsed dependency");
            if program.identifier == main_program.identifier
                || dependency_programs.contains_key(&program.identifier)
            {
                return Err(CompileError::new(format!(
                    "Duplicate module '{}'",
                    program.identifier
                ))
                .into());
            }
            dependency_programs.insert(program.identifier.clone(), program);
        }

        let analyzed = if dependency_programs.is_empty() && main_program.imports.is_empty() {
            Analyzer::analyze(&mut main_program, None)?
        } else {
            let mut modules: IndexMap<String, Vec<String>> = IndexMap::new();
            modules.insert(main_program.identifier.clone(), main_program.imports.clone());
            for program in dependency_programs.values() {
                modules.insert(program.identifier.clone(), program.imports.clone());
            }
            let order = crate::deps::resolve_order(&modules, &main_program.identifier)?;

            let mut bundle = AnalyzedProgram::default();
            for module in &order[..order.len() - 1] {
                let Some(program) = dependency_programs.get_mut(module) else {
                    return Err(CompileError::new(format!(
                        "Module '{module}' disappeared during resolution"
                    ))
                    .into());
                };
                bundle = Analyzer::analyze_dependency(program, bundle)?;
            }
            Analyzer::analyze(&mut main_program, Some(bundle))?
        };

        let code = codegen::generate(&analyzed)?;
        let warnings = analyzed.global.unused_warnings();
        debug!(warnings = warnings.len(), "compilation finished");
        Ok(CompileOutput { code, warnings, analyzed })
    }
}

/// Compiles and immediately executes, returning the program's exit code.
///
/// Warnings are discarded; use [`Compiler::compile_with_dependencies`]
/// followed by [`VirtualMachine::run`] to observe them.
///
/// # Errors
/// Returns [`LittleDuckError`] on any compile-time or runtime failure.
pub fn compile_and_run(
    source: &str,
    dependencies: &[&str],
    print: &mut impl PrintWriter,
) -> Result<i64, LittleDuckError> {
    let output = Compiler::compile_with_dependencies(source, dependencies)?;
    let exit_code = VirtualMachine::new(output.code).run(print)?;
    Ok(exit_code)
}

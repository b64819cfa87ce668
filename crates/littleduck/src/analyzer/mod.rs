//! Semantic analysis and quadruple emission.
//!
//! The analyzer walks the AST once, maintaining a stack of lexical scopes.
//! It type-checks every expression through the semantic cubes, linearizes
//! expressions through a prefix-to-quadruple pass (see `expr`), and emits
//! control flow with backpatching: jumps whose targets are not yet known
//! are pushed on a pending-jump stack and patched once the target index
//! becomes known.
//!
//! # Program bootstrap
//!
//! Instruction 0 is a `GOTO` with an unknown target. The reserved global
//! `exit_code: int` is declared before any quadruple exists so it sorts
//! into the first global variable slot. Dependency quadruples are spliced
//! right after the bootstrap jump so imported globals keep their
//! addresses. Once `main` is analyzed the bootstrap jump is patched to the
//! first instruction after it, `exit_code` is defaulted to `0`, and a
//! terminal call of `main` hands over control.

mod expr;

use ahash::AHashSet;
use indexmap::IndexMap;
use tracing::debug;

use crate::{
    ast::{
        Assignment, Call, DoWhile, FunctionDecl, If, Print, Program, Return, ScopeBlock,
        Statement, VarDecl, While,
    },
    errors::SemanticError,
    quad::{ConstValue, Operand, Operation, Quadruple},
    scope::{FunctionMetadata, GlobalScope, Scope, VariableMetadata},
    value::ValueType,
};

/// Result alias for analysis passes.
pub type AnalyzeResult<T> = Result<T, SemanticError>;

/// Output of an analysis pass: the quadruple stream plus the global scope
/// tree. The same shape doubles as the *dependency bundle* threaded from
/// one imported module's analysis into the next.
#[derive(Debug, Clone, Default)]
pub struct AnalyzedProgram {
    pub quadruples: Vec<Quadruple>,
    pub global: GlobalScope,
}

/// Walks one module's AST, accumulating quadruples and scope metadata.
#[derive(Debug)]
pub struct Analyzer {
    /// Name of the module being analyzed, recorded in symbol metadata.
    module: String,
    quadruples: Vec<Quadruple>,
    scope_stack: Vec<Scope>,
    functions: IndexMap<String, FunctionMetadata>,
    constants: AHashSet<ConstValue>,
    /// IR indices of jumps whose targets are not yet known.
    pending_jumps: Vec<usize>,
}

impl Analyzer {
    fn new(module: &str) -> Self {
        Self {
            module: module.to_owned(),
            quadruples: Vec::new(),
            scope_stack: Vec::new(),
            functions: IndexMap::new(),
            constants: AHashSet::new(),
            pending_jumps: Vec::new(),
        }
    }

    /// Analyzes the main module of a compilation, optionally on top of a
    /// pre-analyzed dependency bundle.
    ///
    /// # Errors
    /// Returns [`SemanticError`] on the first static-semantics violation.
    pub fn analyze(
        program: &mut Program,
        dependencies: Option<AnalyzedProgram>,
    ) -> AnalyzeResult<AnalyzedProgram> {
        debug!(module = %program.identifier, "analyzing program");
        let mut analyzer = Self::new(&program.identifier);
        let (dependency_quadruples, global) = match dependencies {
            Some(bundle) => (bundle.quadruples, bundle.global),
            None => (Vec::new(), GlobalScope::default()),
        };
        analyzer.functions = global.functions;
        analyzer.constants = global.constants;
        analyzer.scope_stack.push(global.scope);

        // Reserved exit-code slot. Declared while the quadruple list is
        // still empty: declare_index 0 sorts it into the first global
        // variable address.
        analyzer.declare_exit_code()?;

        // Bootstrap jump; target patched once main is placed.
        let bootstrap = analyzer.emit(Quadruple::new(Operation::Goto, None, None, None));
        analyzer.pending_jumps.push(bootstrap);

        // Imported modules' quadruples keep their indices (and therefore
        // their scope ids and function start addresses).
        analyzer.quadruples.extend(dependency_quadruples);

        for variable in &program.global_vars {
            analyzer.declare_variable(variable, false)?;
        }
        for function in &mut program.functions {
            analyzer.declare_function(function)?;
        }
        analyzer.analyze_main(&mut program.main_body)?;

        // Patch the bootstrap jump to the first instruction after main's
        // body, default the exit code, and hand control to main.
        let bootstrap = analyzer.pop_pending_jump()?;
        let target = analyzer.quadruples.len();
        analyzer.patch_jump(bootstrap, target)?;
        let zero = analyzer.intern_constant(ConstValue::Int(0));
        analyzer.emit(Quadruple::new(
            Operation::Assign,
            Some(zero),
            None,
            Some(Operand::Identifier("exit_code".to_owned())),
        ));
        analyzer.emit(Quadruple::new(
            Operation::FunctionCall,
            Some(Operand::Identifier("main".to_owned())),
            None,
            None,
        ));

        let scope = analyzer.pop_scope()?;
        debug!(
            module = %program.identifier,
            quadruples = analyzer.quadruples.len(),
            "program analyzed"
        );
        Ok(AnalyzedProgram {
            quadruples: analyzer.quadruples,
            global: GlobalScope {
                scope,
                functions: analyzer.functions,
                constants: analyzer.constants,
            },
        })
    }

    /// Analyzes one imported module and threads its output into the shared
    /// bundle. The module's `main` body is skipped; a placeholder jump
    /// keeps IR indices aligned with the final program (where the real
    /// bootstrap jump occupies index 0) and is removed again at the end.
    ///
    /// # Errors
    /// Returns [`SemanticError`] on the first static-semantics violation.
    pub fn analyze_dependency(
        program: &mut Program,
        dependencies: AnalyzedProgram,
    ) -> AnalyzeResult<AnalyzedProgram> {
        debug!(module = %program.identifier, "analyzing dependency");
        let mut analyzer = Self::new(&program.identifier);
        analyzer.functions = dependencies.global.functions;
        analyzer.constants = dependencies.global.constants;
        analyzer.scope_stack.push(dependencies.global.scope);

        analyzer.quadruples.push(Quadruple::new(Operation::Goto, None, None, None));
        analyzer.quadruples.extend(dependencies.quadruples);

        for variable in &program.global_vars {
            analyzer.declare_variable(variable, false)?;
        }
        for function in &mut program.functions {
            analyzer.declare_function(function)?;
        }

        analyzer.quadruples.remove(0);
        let scope = analyzer.pop_scope()?;
        Ok(AnalyzedProgram {
            quadruples: analyzer.quadruples,
            global: GlobalScope {
                scope,
                functions: analyzer.functions,
                constants: analyzer.constants,
            },
        })
    }

    //
    // Quadruple emission & backpatching
    //

    /// Appends a quadruple, returning its IR index.
    fn emit(&mut self, quadruple: Quadruple) -> usize {
        self.quadruples.push(quadruple);
        self.quadruples.len() - 1
    }

    fn pop_pending_jump(&mut self) -> AnalyzeResult<usize> {
        self.pending_jumps
            .pop()
            .ok_or_else(|| self.internal_error("pending-jump stack is empty"))
    }

    /// Finalizes a previously emitted jump to point at `target`.
    fn patch_jump(&mut self, index: usize, target: usize) -> AnalyzeResult<()> {
        match self.quadruples.get_mut(index) {
            Some(quadruple) => {
                quadruple.result = Some(Operand::Line(target));
                Ok(())
            }
            None => Err(self.internal_error("patched jump index out of range")),
        }
    }

    //
    // Scope handling
    //

    /// Opens a scope; its id is the IR index of the `OPEN` it emits.
    fn open_scope(&mut self, function_name: Option<&str>) {
        let id = self.quadruples.len();
        self.scope_stack.push(Scope::new(id, function_name.map(str::to_owned)));
        let operand = function_name.map(|name| Operand::Identifier(name.to_owned()));
        self.emit(Quadruple::new(Operation::OpenStackFrame, operand, None, None));
    }

    /// Emits `CLOSE` and attaches the finished scope to its parent.
    fn close_scope(&mut self) -> AnalyzeResult<()> {
        self.emit(Quadruple::new(Operation::CloseStackFrame, None, None, None));
        let scope = self.pop_scope()?;
        match self.scope_stack.last_mut() {
            Some(parent) => {
                parent.children.push(scope);
                Ok(())
            }
            None => Err(self.internal_error("closed a scope without a parent")),
        }
    }

    fn pop_scope(&mut self) -> AnalyzeResult<Scope> {
        self.scope_stack
            .pop()
            .ok_or_else(|| self.internal_error("scope stack is empty"))
    }

    fn current_scope_mut(&mut self) -> AnalyzeResult<&mut Scope> {
        match self.scope_stack.last_mut() {
            Some(scope) => Ok(scope),
            None => Err(SemanticError::new("scope stack is empty", "internal invariant")),
        }
    }

    /// Looks a variable up through the enclosing scopes, innermost first.
    fn lookup_variable_mut(&mut self, identifier: &str) -> Option<&mut VariableMetadata> {
        self.scope_stack
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_variable_mut(identifier))
    }

    fn internal_error(&self, message: &str) -> SemanticError {
        SemanticError::new(message, format!("internal invariant, module '{}'", self.module))
    }

    //
    // Declarations
    //

    fn declare_exit_code(&mut self) -> AnalyzeResult<()> {
        let module = self.module.clone();
        let scope = self.current_scope_mut()?;
        if scope.has_variable("exit_code") {
            return Err(SemanticError::new(
                "Invalid redeclaration of 'exit_code'",
                "program bootstrap",
            ));
        }
        scope.add_variable(VariableMetadata {
            identifier: "exit_code".to_owned(),
            module,
            value_type: ValueType::Int,
            is_initialized: true,
            is_used: true,
            declare_index: 0,
        });
        Ok(())
    }

    fn declare_variable(&mut self, declaration: &VarDecl, is_initialized: bool) -> AnalyzeResult<()> {
        let context = format!("declaration of variable '{}'", declaration.identifier);
        // Global variables share a namespace with functions.
        if self.scope_stack.len() == 1 && self.functions.contains_key(&declaration.identifier) {
            return Err(SemanticError::new(
                format!("Invalid redeclaration of '{}'", declaration.identifier),
                context,
            ));
        }
        let declare_index = self.quadruples.len();
        let module = self.module.clone();
        let scope = self.current_scope_mut()?;
        if scope.has_variable(&declaration.identifier) {
            return Err(SemanticError::new(
                format!("Invalid redeclaration of '{}'", declaration.identifier),
                context,
            ));
        }
        scope.add_variable(VariableMetadata {
            identifier: declaration.identifier.clone(),
            module,
            value_type: declaration.value_type,
            is_initialized,
            is_used: false,
            declare_index,
        });
        Ok(())
    }

    fn declare_function(&mut self, function: &mut FunctionDecl) -> AnalyzeResult<()> {
        let context = format!("declaration of function '{}'", function.identifier);
        let global_clash = self
            .scope_stack
            .first()
            .is_some_and(|global| global.has_variable(&function.identifier));
        if self.functions.contains_key(&function.identifier) || global_clash {
            return Err(SemanticError::new(
                format!("Invalid redeclaration of '{}'", function.identifier),
                context,
            ));
        }

        let parameters: Vec<(String, ValueType)> = function
            .parameters
            .iter()
            .map(|p| (p.identifier.clone(), p.value_type))
            .collect();
        // Registered before the body is analyzed so recursive calls resolve.
        self.functions.insert(
            function.identifier.clone(),
            FunctionMetadata {
                identifier: function.identifier.clone(),
                module: self.module.clone(),
                return_type: function.return_type,
                parameters,
                returns: false,
                is_used: false,
                start_index: self.quadruples.len(),
            },
        );
        debug!(function = %function.identifier, start = self.quadruples.len(), "registered function");

        let name = function.identifier.clone();
        let parameters = function.parameters.clone();
        self.analyze_function_scope(&name, &parameters, &mut function.body)?;

        if function.return_type.is_some()
            && !self.functions.get(&function.identifier).is_some_and(|f| f.returns)
        {
            return Err(SemanticError::new(
                format!("Function '{}' must return a value", function.identifier),
                context,
            ));
        }
        Ok(())
    }

    fn analyze_main(&mut self, body: &mut ScopeBlock) -> AnalyzeResult<()> {
        if self.functions.contains_key("main") {
            return Err(SemanticError::new(
                "Invalid redeclaration of 'main'",
                "declaration of function 'main'",
            ));
        }
        self.functions.insert(
            "main".to_owned(),
            FunctionMetadata {
                identifier: "main".to_owned(),
                module: self.module.clone(),
                return_type: None,
                parameters: Vec::new(),
                returns: false,
                is_used: true,
                start_index: self.quadruples.len(),
            },
        );
        self.analyze_function_scope("main", &[], body)
    }

    /// Analyzes a function body: a fresh scope carrying the function name,
    /// parameters declared first, then `ARG` loads emitted in reverse so
    /// the runtime pops pushed parameters into declaration order, then the
    /// statements, then an implicit final valueless `RETURN`.
    fn analyze_function_scope(
        &mut self,
        name: &str,
        parameters: &[VarDecl],
        body: &mut ScopeBlock,
    ) -> AnalyzeResult<()> {
        self.open_scope(Some(name));
        for parameter in parameters {
            self.declare_variable(parameter, true)?;
        }
        for parameter in parameters.iter().rev() {
            self.emit(Quadruple::new(
                Operation::FunctionArgument,
                None,
                None,
                Some(Operand::Identifier(parameter.identifier.clone())),
            ));
        }
        for statement in &mut body.statements {
            self.analyze_statement(statement)?;
        }
        // Fall-through return. For value functions that reach it, the VM
        // raises RETURN_VALUE_NOT_FOUND at runtime.
        self.emit(Quadruple::new(Operation::Return, None, None, None));
        self.close_scope()
    }

    /// Analyzes a plain (non-function) block in its own scope.
    fn analyze_block(&mut self, block: &mut ScopeBlock) -> AnalyzeResult<()> {
        self.open_scope(None);
        for statement in &mut block.statements {
            self.analyze_statement(statement)?;
        }
        self.close_scope()
    }

    //
    // Statements
    //

    fn analyze_statement(&mut self, statement: &mut Statement) -> AnalyzeResult<()> {
        match statement {
            Statement::VarDecl(declaration) => self.declare_variable(declaration, false),
            Statement::Assignment(assignment) => self.analyze_assignment(assignment),
            Statement::If(conditional) => self.analyze_if(conditional),
            Statement::While(cycle) => self.analyze_while(cycle),
            Statement::DoWhile(cycle) => self.analyze_do_while(cycle),
            Statement::VoidCall(call) => self.analyze_void_call(call),
            Statement::Print(print) => self.analyze_print(print),
            Statement::Return(ret) => self.analyze_return(ret),
        }
    }

    fn analyze_assignment(&mut self, assignment: &mut Assignment) -> AnalyzeResult<()> {
        let context = format!("assignment to '{}'", assignment.identifier);
        let (operand, value_type) = self.analyze_expression(&mut assignment.value)?;

        let Some(variable) = self.lookup_variable_mut(&assignment.identifier) else {
            return Err(SemanticError::new(
                format!("'{}' does not exist in this scope", assignment.identifier),
                context,
            ));
        };
        if variable.value_type != value_type {
            let expected = variable.value_type;
            return Err(SemanticError::new(
                format!(
                    "Value of type '{value_type}' cannot be assigned to variable of type '{expected}'"
                ),
                context,
            ));
        }
        variable.is_initialized = true;

        self.emit(Quadruple::new(
            Operation::Assign,
            Some(operand),
            None,
            Some(Operand::Identifier(assignment.identifier.clone())),
        ));
        Ok(())
    }

    fn analyze_if(&mut self, conditional: &mut If) -> AnalyzeResult<()> {
        let (condition, condition_type) = self.analyze_expression(&mut conditional.condition)?;
        if condition_type != ValueType::Bool {
            return Err(SemanticError::new(
                "Condition on an If statement must be of type 'bool'",
                "if condition",
            ));
        }
        let skip_body = self.emit(Quadruple::new(
            Operation::GotoFalse,
            Some(condition),
            None,
            None,
        ));
        self.pending_jumps.push(skip_body);

        self.analyze_block(&mut conditional.body)?;

        if let Some(else_body) = &mut conditional.else_body {
            let skip_body = self.pop_pending_jump()?;
            let skip_else = self.emit(Quadruple::new(Operation::Goto, None, None, None));
            self.pending_jumps.push(skip_else);
            let target = self.quadruples.len();
            self.patch_jump(skip_body, target)?;

            self.analyze_block(else_body)?;

            let skip_else = self.pop_pending_jump()?;
            let target = self.quadruples.len();
            self.patch_jump(skip_else, target)?;
        } else {
            let skip_body = self.pop_pending_jump()?;
            let target = self.quadruples.len();
            self.patch_jump(skip_body, target)?;
        }
        Ok(())
    }

    fn analyze_while(&mut self, cycle: &mut While) -> AnalyzeResult<()> {
        let loop_top = self.quadruples.len();
        let (condition, condition_type) = self.analyze_expression(&mut cycle.condition)?;
        if condition_type != ValueType::Bool {
            return Err(SemanticError::new(
                "Condition on a While statement must be of type 'bool'",
                "while condition",
            ));
        }
        let exit_jump = self.emit(Quadruple::new(
            Operation::GotoFalse,
            Some(condition),
            None,
            None,
        ));
        self.pending_jumps.push(exit_jump);

        self.analyze_block(&mut cycle.body)?;
        self.emit(Quadruple::new(
            Operation::Goto,
            None,
            None,
            Some(Operand::Line(loop_top)),
        ));

        let exit_jump = self.pop_pending_jump()?;
        let target = self.quadruples.len();
        self.patch_jump(exit_jump, target)
    }

    fn analyze_do_while(&mut self, cycle: &mut DoWhile) -> AnalyzeResult<()> {
        let body_top = self.quadruples.len();
        self.analyze_block(&mut cycle.body)?;

        let (condition, condition_type) = self.analyze_expression(&mut cycle.condition)?;
        if condition_type != ValueType::Bool {
            return Err(SemanticError::new(
                "Condition on a Do-While statement must be of type 'bool'",
                "do-while condition",
            ));
        }
        self.emit(Quadruple::new(
            Operation::GotoTrue,
            Some(condition),
            None,
            Some(Operand::Line(body_top)),
        ));
        Ok(())
    }

    fn analyze_void_call(&mut self, call: &mut Call) -> AnalyzeResult<()> {
        self.check_call(call)?;
        self.emit(Quadruple::new(
            Operation::FunctionCall,
            Some(Operand::Identifier(call.identifier.clone())),
            None,
            None,
        ));
        Ok(())
    }

    fn analyze_print(&mut self, print: &mut Print) -> AnalyzeResult<()> {
        // All arguments are linearized before the first PARAM: the runtime
        // drains the whole parameter scratchpad per PRINT, so interleaving
        // with nested calls would corrupt it.
        let mut operands = Vec::with_capacity(print.arguments.len());
        for argument in &mut print.arguments {
            let (operand, _) = self.analyze_expression(argument)?;
            operands.push(operand);
        }
        for operand in operands {
            self.emit(Quadruple::new(
                Operation::FunctionParameter,
                Some(operand),
                None,
                None,
            ));
        }
        self.emit(Quadruple::new(Operation::Print, None, None, None));
        Ok(())
    }

    fn analyze_return(&mut self, ret: &mut Return) -> AnalyzeResult<()> {
        // The innermost scope carrying a function name owns this return.
        let Some(function_name) = self
            .scope_stack
            .iter()
            .rev()
            .find_map(|scope| scope.function_name.clone())
        else {
            return Err(SemanticError::new(
                "'return' is only allowed inside a function",
                "return statement",
            ));
        };
        let context = format!("return from '{function_name}'");
        let Some(expected) = self.functions.get(&function_name).map(|f| f.return_type) else {
            return Err(self.internal_error("return from unregistered function"));
        };

        let operand = match (&mut ret.value, expected) {
            (Some(expression), Some(expected_type)) => {
                let (operand, value_type) = self.analyze_expression(expression)?;
                if value_type != expected_type {
                    return Err(SemanticError::new(
                        format!(
                            "Cannot return value of type '{value_type}' from function of type '{expected_type}'"
                        ),
                        context,
                    ));
                }
                Some(operand)
            }
            (Some(_), None) => {
                return Err(SemanticError::new(
                    format!("Cannot return a value from void function '{function_name}'"),
                    context,
                ));
            }
            (None, Some(expected_type)) => {
                return Err(SemanticError::new(
                    format!(
                        "Function '{function_name}' must return a value of type '{expected_type}'"
                    ),
                    context,
                ));
            }
            (None, None) => None,
        };

        if let Some(function) = self.functions.get_mut(&function_name) {
            function.returns = true;
        }
        self.emit(Quadruple::new(Operation::Return, operand, None, None));
        Ok(())
    }

    //
    // Calls
    //

    /// Validates a call and emits its argument quadruples followed by the
    /// `PARAM`s, leaving the `CALL` itself to the caller. Returns the
    /// callee's return type.
    fn check_call(&mut self, call: &mut Call) -> AnalyzeResult<Option<ValueType>> {
        let context = format!("call to '{}'", call.identifier);
        if call.identifier == "main" {
            return Err(SemanticError::new("'main' cannot be called", context));
        }
        let Some(function) = self.functions.get(&call.identifier) else {
            return Err(SemanticError::new(
                format!("'{}' does not exist in this scope", call.identifier),
                context,
            ));
        };
        let parameters = function.parameters.clone();
        let return_type = function.return_type;
        if parameters.len() != call.arguments.len() {
            return Err(SemanticError::new(
                format!(
                    "'{}' takes {} arguments, but {} were provided",
                    call.identifier,
                    parameters.len(),
                    call.arguments.len()
                ),
                context,
            ));
        }

        // Arguments are fully linearized before any PARAM is emitted; see
        // analyze_print for the scratchpad discipline.
        let mut operands = Vec::with_capacity(call.arguments.len());
        for (argument, (parameter_name, parameter_type)) in
            call.arguments.iter_mut().zip(&parameters)
        {
            let (operand, argument_type) = self.analyze_expression(argument)?;
            if argument_type != *parameter_type {
                return Err(SemanticError::new(
                    format!(
                        "Parameter '{parameter_name}' is of type '{parameter_type}', not '{argument_type}'"
                    ),
                    context,
                ));
            }
            operands.push(operand);
        }
        if let Some(function) = self.functions.get_mut(&call.identifier) {
            function.is_used = true;
        }
        for operand in operands {
            self.emit(Quadruple::new(
                Operation::FunctionParameter,
                Some(operand),
                None,
                None,
            ));
        }
        Ok(return_type)
    }

    /// Interns a constant and returns it as an operand.
    fn intern_constant(&mut self, constant: ConstValue) -> Operand {
        self.constants.insert(constant.clone());
        Operand::Const(constant)
    }
}

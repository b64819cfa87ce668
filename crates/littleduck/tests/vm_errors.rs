//! Virtual-machine fault paths, driven both by compiled programs and by
//! hand-built quadruple lists (the VM accepts loaded IR, so it must fault
//! cleanly rather than panic on malformed input).

use littleduck::{
    CollectStringPrint, Compiler, ConstValue, Constant, FinalQuadruple, FunctionDirectoryEntry,
    GeneratedCode, Instruction, MemoryErrorKind, MemoryScopeTemplate, RuntimeErrorKind, VmError,
    VirtualMachine, compile_and_run,
};

fn quad(
    op: Instruction,
    left: Option<usize>,
    right: Option<usize>,
    result: Option<usize>,
) -> FinalQuadruple {
    FinalQuadruple { op: op as u8, left, right, result }
}

fn template(int_count: usize, temp_count: usize) -> MemoryScopeTemplate {
    MemoryScopeTemplate {
        activation_addr: 0,
        int_count,
        bool_count: 0,
        float_count: 0,
        string_count: 0,
        temp_count,
    }
}

fn run_raw(code: GeneratedCode) -> Result<i64, VmError> {
    VirtualMachine::new(code).run(&mut CollectStringPrint::new())
}

fn runtime_kind(result: Result<i64, VmError>) -> RuntimeErrorKind {
    match result {
        Err(VmError::Runtime(error)) => error.kind,
        other => panic!("expected a runtime error, got: {other:?}"),
    }
}

fn memory_kind(result: Result<i64, VmError>) -> MemoryErrorKind {
    match result {
        Err(VmError::Memory(error)) => error.kind,
        other => panic!("expected a memory error, got: {other:?}"),
    }
}

//
// Compiled-program faults
//

fn compiled_runtime_kind(source: &str) -> RuntimeErrorKind {
    let code = Compiler::compile(source).unwrap().code;
    runtime_kind(run_raw(code))
}

#[test]
fn value_function_falling_through_faults_at_runtime() {
    // 'f' has a return on one path, so analysis passes; the untaken path
    // reaches the implicit valueless return.
    let kind = compiled_runtime_kind(
        "program P; \
         int f(a:int): { if (a > 0) { return 1; } } \
         main { exit_code = f(0); } end;",
    );
    assert_eq!(kind, RuntimeErrorKind::ReturnValueNotFound);
}

#[test]
fn value_function_called_as_statement_faults_on_return() {
    let kind = compiled_runtime_kind(
        "program P; int f(): { return 1; } main { f(); } end;",
    );
    assert_eq!(kind, RuntimeErrorKind::ReturnValueInVoid);
}

#[test]
fn integer_division_by_zero() {
    let kind = compiled_runtime_kind("program P; main { exit_code = 1 / 0; } end;");
    assert_eq!(kind, RuntimeErrorKind::DivisionByZero);
}

#[test]
fn float_division_by_zero_follows_ieee() {
    let mut print = CollectStringPrint::new();
    let exit_code =
        compile_and_run("program P; main { print(1.0 / 0.0); } end;", &[], &mut print).unwrap();
    assert_eq!(exit_code, 0);
    assert!(print.output().starts_with("inf\n"));
}

//
// Hand-built faults
//

#[test]
fn unknown_instruction_tag_is_rejected() {
    let code = GeneratedCode {
        function_directory: vec![],
        memory_templates: vec![template(1, 0)],
        constants: vec![],
        quadruples: vec![FinalQuadruple { op: 42, left: None, right: None, result: None }],
    };
    assert_eq!(runtime_kind(run_raw(code)), RuntimeErrorKind::InstructionDoesntExist);
}

#[test]
fn reserved_read_tag_is_rejected() {
    let code = GeneratedCode {
        function_directory: vec![],
        memory_templates: vec![template(1, 0)],
        constants: vec![],
        quadruples: vec![quad(Instruction::Read, None, None, None)],
    };
    assert_eq!(runtime_kind(run_raw(code)), RuntimeErrorKind::InstructionDoesntExist);
}

#[test]
fn missing_global_template_is_rejected() {
    let code = GeneratedCode::default();
    assert_eq!(runtime_kind(run_raw(code)), RuntimeErrorKind::StackTemplateNotFound);
}

#[test]
fn writing_a_constant_faults() {
    let code = GeneratedCode {
        function_directory: vec![],
        memory_templates: vec![template(1, 0)],
        constants: vec![Constant { tag: 0, value: ConstValue::Int(5) }],
        // ASSIGN the constant onto itself: address 0 is read-only.
        quadruples: vec![quad(Instruction::Assign, Some(0), None, Some(0))],
    };
    assert_eq!(memory_kind(run_raw(code)), MemoryErrorKind::AllocatedConstant);
}

#[test]
fn reading_an_unallocated_slot_faults() {
    let code = GeneratedCode {
        function_directory: vec![],
        memory_templates: vec![template(2, 0)],
        constants: vec![],
        // Global slot 2 (second int) was never assigned.
        quadruples: vec![quad(Instruction::Assign, Some(2), None, Some(1))],
    };
    assert_eq!(memory_kind(run_raw(code)), MemoryErrorKind::UnallocatedAccess);
}

#[test]
fn out_of_range_address_faults() {
    let code = GeneratedCode {
        function_directory: vec![],
        memory_templates: vec![template(1, 0)],
        constants: vec![],
        quadruples: vec![quad(Instruction::Assign, Some(99), None, Some(1))],
    };
    assert_eq!(memory_kind(run_raw(code)), MemoryErrorKind::AddressOutsideRange);
}

#[test]
fn goto_without_target_faults() {
    let code = GeneratedCode {
        function_directory: vec![],
        memory_templates: vec![template(1, 0)],
        constants: vec![],
        quadruples: vec![quad(Instruction::Goto, None, None, None)],
    };
    assert_eq!(runtime_kind(run_raw(code)), RuntimeErrorKind::GotoJumpMissing);
}

#[test]
fn call_with_unknown_function_id_faults() {
    let code = GeneratedCode {
        function_directory: vec![FunctionDirectoryEntry { id: 0, address: 0 }],
        memory_templates: vec![template(1, 0)],
        constants: vec![],
        quadruples: vec![quad(Instruction::FunctionCall, Some(7), None, None)],
    };
    assert_eq!(runtime_kind(run_raw(code)), RuntimeErrorKind::FunctionNotFound);
}

#[test]
fn open_with_unknown_template_faults() {
    let code = GeneratedCode {
        function_directory: vec![FunctionDirectoryEntry { id: 0, address: 1 }],
        memory_templates: vec![template(1, 0)],
        constants: vec![],
        quadruples: vec![
            quad(Instruction::FunctionCall, Some(0), None, None),
            quad(Instruction::Open, Some(9), None, None),
        ],
    };
    assert_eq!(runtime_kind(run_raw(code)), RuntimeErrorKind::StackTemplateNotFound);
}

#[test]
fn loading_more_arguments_than_supplied_faults() {
    // CALL with no caller pops no parameters; the ARG then has nothing to
    // load.
    let code = GeneratedCode {
        function_directory: vec![FunctionDirectoryEntry { id: 0, address: 1 }],
        memory_templates: vec![template(1, 0), template(1, 0)],
        constants: vec![],
        quadruples: vec![
            quad(Instruction::FunctionCall, Some(0), None, None),
            quad(Instruction::Open, Some(1), None, None),
            quad(Instruction::FunctionArgument, None, None, Some(3)),
        ],
    };
    assert_eq!(runtime_kind(run_raw(code)), RuntimeErrorKind::NoMoreArguments);
}

#[test]
fn successful_hand_built_program_reports_its_exit_code() {
    let code = GeneratedCode {
        function_directory: vec![],
        memory_templates: vec![template(1, 0)],
        constants: vec![Constant { tag: 0, value: ConstValue::Int(11) }],
        // exit_code := 11 (address 2: constant pool, activation slot, then
        // the first global variable)
        quadruples: vec![quad(Instruction::Assign, Some(0), None, Some(2))],
    };
    let mut print = CollectStringPrint::new();
    let exit_code = VirtualMachine::new(code).run(&mut print).unwrap();
    assert_eq!(exit_code, 11);
    assert_eq!(print.output(), "\nProgram ended with exit code: 11\n");
}

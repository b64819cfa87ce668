//! Properties of the generated IR: determinism, the instruction-tag
//! contract, jump integrity, scope balance, constant interning, and the
//! binary round-trip.

use littleduck::{Compiler, GeneratedCode, Instruction};
use pretty_assertions::assert_eq;

const SAMPLE: &str = "program Sample; \
    var total : int; \
    int square(n:int): { return n * n; } \
    main { \
        total = 0; \
        var i : int; \
        i = 1; \
        while (i < 4) { total = total + square(i); i = i + 1; } \
        print(\"total:\", total); \
        exit_code = total; \
    } end;";

fn compile(source: &str) -> GeneratedCode {
    Compiler::compile(source).unwrap().code
}

#[test]
fn compilation_is_deterministic() {
    let first = Compiler::compile(SAMPLE).unwrap();
    let second = Compiler::compile(SAMPLE).unwrap();
    assert_eq!(first.code, second.code);
    let first_listing: Vec<String> =
        first.analyzed.quadruples.iter().map(ToString::to_string).collect();
    let second_listing: Vec<String> =
        second.analyzed.quadruples.iter().map(ToString::to_string).collect();
    assert_eq!(first_listing, second_listing);
}

#[test]
fn program_shape_bootstrap_and_terminal_call() {
    let code = compile(SAMPLE);
    let first = code.quadruples.first().unwrap();
    assert_eq!(first.op, Instruction::Goto as u8);
    let last = code.quadruples.last().unwrap();
    assert_eq!(last.op, Instruction::FunctionCall as u8);
    // The bootstrap jump lands on the instruction defaulting exit_code,
    // two before the end.
    assert_eq!(first.result, Some(code.quadruples.len() - 2));
    let default_assign = &code.quadruples[code.quadruples.len() - 2];
    assert_eq!(default_assign.op, Instruction::Assign as u8);
    // exit_code occupies the first global variable slot, right after the
    // constant pool and the global activation slot.
    assert_eq!(default_assign.result, Some(code.constants.len() + 1));
}

#[test]
fn jump_targets_are_valid_ir_indices() {
    let code = compile(SAMPLE);
    for quadruple in &code.quadruples {
        let op = quadruple.op;
        if op == Instruction::Goto as u8
            || op == Instruction::Gotot as u8
            || op == Instruction::Gotof as u8
        {
            let target = quadruple.result.expect("jump without target");
            assert!(target <= code.quadruples.len(), "target {target} out of range");
        }
    }
}

#[test]
fn open_and_close_are_balanced() {
    let code = compile(SAMPLE);
    let mut depth = 0i64;
    for quadruple in &code.quadruples {
        if quadruple.op == Instruction::Open as u8 {
            depth += 1;
        } else if quadruple.op == Instruction::Close as u8 {
            depth -= 1;
            assert!(depth >= 0, "CLOSE without matching OPEN");
        }
    }
    assert_eq!(depth, 0);
}

#[test]
fn every_open_names_an_existing_template() {
    let code = compile(SAMPLE);
    for quadruple in &code.quadruples {
        if quadruple.op == Instruction::Open as u8 {
            let index = quadruple.left.expect("OPEN without template index");
            assert!(index < code.memory_templates.len());
        }
    }
}

#[test]
fn function_directory_is_dense_and_ascending() {
    let code = compile(SAMPLE);
    // square + main
    assert_eq!(code.function_directory.len(), 2);
    for (i, entry) in code.function_directory.iter().enumerate() {
        assert_eq!(entry.id, i);
        assert!(entry.address < code.quadruples.len());
        if i > 0 {
            assert!(entry.address > code.function_directory[i - 1].address);
        }
    }
}

#[test]
fn constants_are_interned_and_sorted_by_tag_then_value() {
    let code = compile(
        "program P; main { print(2, 2, 2, 1.5, \"a\", true, 1.5); exit_code = 2; } end;",
    );
    // Pool: bootstrap 0, then 2, true, 1.5, "a" — duplicates interned away.
    let tags: Vec<u8> = code.constants.iter().map(|c| c.tag).collect();
    assert_eq!(tags, vec![0, 0, 1, 2, 3]);
    let mut sorted = code.constants.clone();
    sorted.sort_by(|a, b| a.value.cmp(&b.value));
    assert_eq!(sorted, code.constants);
}

#[test]
fn temp_partitions_stay_dense() {
    // main's template: two temps for the two binary operations, no gaps.
    let code = compile("program P; main { exit_code = 1 + 2 + 3; } end;");
    let main_template = code
        .memory_templates
        .iter()
        .find(|t| t.temp_count > 0)
        .expect("main should need temporaries");
    assert_eq!(main_template.temp_count, 2);
}

#[test]
fn binary_round_trip_preserves_the_program() {
    let code = compile(SAMPLE);
    let bytes = code.dump().unwrap();
    let restored = GeneratedCode::load(&bytes).unwrap();
    assert_eq!(code, restored);
}

#[test]
fn json_listing_mentions_every_section() {
    let code = compile(SAMPLE);
    let listing = code.to_json().unwrap();
    for section in ["function_directory", "memory_templates", "constants", "quadruples"] {
        assert!(listing.contains(section), "missing {section}");
    }
}

#[test]
fn reserved_read_tag_is_never_emitted() {
    let code = compile(SAMPLE);
    assert!(code.quadruples.iter().all(|q| q.op != Instruction::Read as u8));
}

#[test]
fn template_zero_is_the_global_scope() {
    let code = compile(SAMPLE);
    let global = &code.memory_templates[0];
    assert_eq!(global.activation_addr, 0);
    // total and exit_code
    assert_eq!(global.int_count, 2);
    assert_eq!(global.temp_count, 0);
}

#[test]
fn scope_ids_match_their_open_instructions() {
    let code = compile(SAMPLE);
    for (index, quadruple) in code.quadruples.iter().enumerate() {
        if quadruple.op == Instruction::Open as u8 {
            let template = &code.memory_templates[quadruple.left.unwrap()];
            assert_eq!(template.activation_addr, index);
        }
    }
}

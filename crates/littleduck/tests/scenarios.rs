//! End-to-end scenarios: compile source text and run it on the VM,
//! asserting on the collected output and the exit code.

use littleduck::{CollectStringPrint, compile_and_run};

fn run(source: &str) -> (i64, String) {
    let mut print = CollectStringPrint::new();
    let exit_code = compile_and_run(source, &[], &mut print)
        .unwrap_or_else(|error| panic!("program failed: {error}"));
    (exit_code, print.into_output())
}

#[test]
fn hello_exit() {
    let (exit_code, output) = run("program P; main { exit_code = 7; } end;");
    assert_eq!(exit_code, 7);
    assert_eq!(output, "\nProgram ended with exit code: 7\n");
}

#[test]
fn exit_code_defaults_to_zero() {
    let (exit_code, output) = run("program P; main { print(1); } end;");
    assert_eq!(exit_code, 0);
    assert_eq!(output, "1\n\nProgram ended with exit code: 0\n");
}

#[test]
fn if_else_takes_the_true_branch() {
    let (exit_code, output) = run(
        "program P; main { var x:int; x = 3; \
         if (x > 1) { print(10); } else { print(20); } exit_code = 0; } end;",
    );
    assert_eq!(exit_code, 0);
    assert_eq!(output, "10\n\nProgram ended with exit code: 0\n");
}

#[test]
fn if_else_takes_the_false_branch() {
    let (_, output) = run(
        "program P; main { var x:int; x = 0; \
         if (x > 1) { print(10); } else { print(20); } } end;",
    );
    assert!(output.starts_with("20\n"));
}

#[test]
fn if_without_else_skips_the_body() {
    let (_, output) = run(
        "program P; main { var x:int; x = 0; if (x > 1) { print(10); } print(99); } end;",
    );
    assert!(output.starts_with("99\n"));
}

#[test]
fn while_sums_one_to_five() {
    let (_, output) = run(
        "program P; main { var i, s : int; i = 1; s = 0; \
         while (i < 6) { s = s + i; i = i + 1; } print(s); } end;",
    );
    assert!(output.starts_with("15\n"));
}

#[test]
fn do_while_runs_at_least_once() {
    let (_, output) = run(
        "program P; main { var i:int; i = 5; \
         do { i = i + 1; } while (i < 3); print(i); } end;",
    );
    assert!(output.starts_with("6\n"));
}

#[test]
fn do_while_loops_until_condition_fails() {
    let (_, output) = run(
        "program P; main { var i:int; i = 0; \
         do { i = i + 1; } while (i < 4); print(i); } end;",
    );
    assert!(output.starts_with("4\n"));
}

#[test]
fn function_call_with_return() {
    let (_, output) = run(
        "program P; int add(a:int, b:int): { return a + b; } \
         main { print(add(2, 3)); } end;",
    );
    assert!(output.starts_with("5\n"));
}

#[test]
fn nested_value_calls() {
    let (_, output) = run(
        "program P; int add(a:int, b:int): { return a + b; } \
         main { print(add(add(1, 2), add(3, 4))); } end;",
    );
    assert!(output.starts_with("10\n"));
}

#[test]
fn void_function_mutates_a_global() {
    let (exit_code, _) = run(
        "program P; var counter : int; \
         void bump(by:int): { counter = counter + by; return; } \
         main { counter = 0; bump(4); bump(5); exit_code = counter; } end;",
    );
    assert_eq!(exit_code, 9);
}

#[test]
fn recursion_builds_activation_records() {
    let (exit_code, _) = run(
        "program P; \
         int factorial(n:int): { \
             if (n < 2) { return 1; } \
             return n * factorial(n - 1); \
         } \
         main { exit_code = factorial(5); } end;",
    );
    assert_eq!(exit_code, 120);
}

#[test]
fn float_arithmetic_promotes_ints() {
    let (_, output) = run("program P; main { print(2.5 + 1); } end;");
    assert!(output.starts_with("3.5\n"));
}

#[test]
fn float_prints_with_fraction() {
    let (_, output) = run("program P; main { var f:float; f = 15.0; print(f); } end;");
    assert!(output.starts_with("15.0\n"));
}

#[test]
fn string_concatenation_and_equality() {
    let (_, output) = run(
        "program P; main { var s:string; s = \"foo\" + \"bar\"; \
         print(s, s == \"foobar\"); } end;",
    );
    assert!(output.starts_with("foobar true\n"));
}

#[test]
fn logical_operators_and_lowered_not() {
    let (_, output) = run(
        "program P; main { var a, b : bool; a = true; b = false; \
         print(a && b, a || b, !a, !b); } end;",
    );
    assert!(output.starts_with("false true false true\n"));
}

#[test]
fn not_equals_is_lowered_to_chained_equality() {
    let (_, output) = run("program P; main { print(1 != 2, 1 != 1); } end;");
    assert!(output.starts_with("true false\n"));
}

#[test]
fn unary_minus_is_lowered_to_multiplication() {
    let (_, output) = run("program P; main { var x:int; x = 5; print(-x, -(-x)); } end;");
    assert!(output.starts_with("-5 5\n"));
}

#[test]
fn print_with_multiple_arguments_is_space_separated() {
    let (_, output) = run("program P; main { print(1, 2.5, \"three\", true); } end;");
    assert!(output.starts_with("1 2.5 three true\n"));
}

#[test]
fn print_with_no_arguments_emits_a_blank_line() {
    let (_, output) = run("program P; main { print(); print(1); } end;");
    assert!(output.starts_with("\n1\n"));
}

#[test]
fn block_locals_shadow_outer_variables() {
    let (_, output) = run(
        "program P; main { var x:int; x = 1; \
         if (true) { var x:float; x = 2.5; print(x); } print(x); } end;",
    );
    assert!(output.starts_with("2.5\n1\n"));
}

#[test]
fn comparisons_between_int_and_float() {
    let (_, output) = run("program P; main { print(1 < 1.5, 2.0 > 3, 1.0 == 1); } end;");
    assert!(output.starts_with("true false true\n"));
}

#[test]
fn string_ordering() {
    let (_, output) = run("program P; main { print(\"abc\" < \"abd\"); } end;");
    assert!(output.starts_with("true\n"));
}

#[test]
fn integer_division_truncates() {
    let (_, output) = run("program P; main { print(7 / 2, 7.0 / 2); } end;");
    assert!(output.starts_with("3 3.5\n"));
}

#[test]
fn condition_temporaries_are_recycled_across_iterations() {
    // Two condition evaluations per pass (the && operands plus the result)
    // all live in the enclosing scope's temp partition and are deallocated
    // by the conditional jump each time around.
    let (exit_code, _) = run(
        "program P; main { var i, n : int; i = 0; n = 0; \
         while (i < 10 && n < 6) { n = n + 2; i = i + 1; } \
         exit_code = n; } end;",
    );
    assert_eq!(exit_code, 6);
}

#[test]
fn value_parameters_are_copied_not_shared() {
    let (exit_code, _) = run(
        "program P; \
         int touch(n:int): { n = n + 100; return n; } \
         main { var x:int; x = 1; var y:int; y = touch(x); \
         exit_code = y - x; } end;",
    );
    // touch received a copy: x stays 1, y is 101.
    assert_eq!(exit_code, 100);
}

//! Binary instruction evaluation.
//!
//! The analyzer's semantic cubes guarantee well-typed operands for
//! compiler-produced code, but the VM also accepts hand-built or loaded
//! IR, so every combination is handled and mismatches fault instead of
//! panicking. Mixed int/float arithmetic promotes to float; integer
//! arithmetic wraps on overflow.

use crate::{
    errors::RuntimeErrorKind,
    quad::Instruction,
    value::Value,
};

/// Applies a binary instruction to two operand values.
///
/// # Errors
/// Returns [`RuntimeErrorKind::DivisionByZero`] for integer division by
/// zero and [`RuntimeErrorKind::OperandTypeMismatch`] for operand types
/// the instruction is not defined over.
pub fn apply(
    instruction: Instruction,
    left: &Value,
    right: &Value,
) -> Result<Value, RuntimeErrorKind> {
    match instruction {
        Instruction::Add => add(left, right),
        Instruction::Sub => arithmetic(left, right, i64::wrapping_sub, |a, b| a - b),
        Instruction::Mul => arithmetic(left, right, i64::wrapping_mul, |a, b| a * b),
        Instruction::Div => divide(left, right),
        Instruction::Eq => equals(left, right).map(Value::Bool),
        Instruction::Lt => compare(left, right, false),
        Instruction::Gt => compare(left, right, true),
        Instruction::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        Instruction::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        _ => Err(RuntimeErrorKind::InstructionDoesntExist),
    }
}

/// `+` adds numbers and concatenates strings.
fn add(left: &Value, right: &Value) -> Result<Value, RuntimeErrorKind> {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        let mut result = String::with_capacity(a.len() + b.len());
        result.push_str(a);
        result.push_str(b);
        return Ok(Value::Str(result));
    }
    arithmetic(left, right, i64::wrapping_add, |a, b| a + b)
}

/// Shared shape of `+`/`-`/`*`: int op int stays int, any float promotes.
fn arithmetic(
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, RuntimeErrorKind> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(*a, *b))),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
                return Err(RuntimeErrorKind::OperandTypeMismatch);
            };
            Ok(Value::Float(float_op(a, b)))
        }
        _ => Err(RuntimeErrorKind::OperandTypeMismatch),
    }
}

/// `/` truncates for two ints (the cube types that result int) and follows
/// IEEE semantics once a float is involved.
fn divide(left: &Value, right: &Value) -> Result<Value, RuntimeErrorKind> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(RuntimeErrorKind::DivisionByZero);
            }
            Ok(Value::Int(a.wrapping_div(*b)))
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
                return Err(RuntimeErrorKind::OperandTypeMismatch);
            };
            Ok(Value::Float(a / b))
        }
        _ => Err(RuntimeErrorKind::OperandTypeMismatch),
    }
}

/// `==` compares strings with strings and everything else numerically
/// (bools count as 0/1, so `true == 1` holds).
fn equals(left: &Value, right: &Value) -> Result<bool, RuntimeErrorKind> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Str(_), _) | (_, Value::Str(_)) => Err(RuntimeErrorKind::OperandTypeMismatch),
        _ => {
            let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
                return Err(RuntimeErrorKind::OperandTypeMismatch);
            };
            Ok(a == b)
        }
    }
}

/// `<` / `>`: numeric ordering, lexicographic for strings.
fn compare(left: &Value, right: &Value, greater: bool) -> Result<Value, RuntimeErrorKind> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => {
            Ok(Value::Bool(if greater { a > b } else { a < b }))
        }
        (Value::Str(_), _) | (_, Value::Str(_)) => Err(RuntimeErrorKind::OperandTypeMismatch),
        _ => {
            let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
                return Err(RuntimeErrorKind::OperandTypeMismatch);
            };
            Ok(Value::Bool(if greater { a > b } else { a < b }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_arithmetic_stays_int() {
        assert_eq!(apply(Instruction::Add, &Value::Int(2), &Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(apply(Instruction::Div, &Value::Int(7), &Value::Int(2)), Ok(Value::Int(3)));
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        assert_eq!(
            apply(Instruction::Mul, &Value::Int(2), &Value::Float(1.5)),
            Ok(Value::Float(3.0))
        );
        assert_eq!(
            apply(Instruction::Div, &Value::Int(5), &Value::Float(2.0)),
            Ok(Value::Float(2.5))
        );
    }

    #[test]
    fn string_concatenation_and_comparison() {
        assert_eq!(
            apply(
                Instruction::Add,
                &Value::Str("foo".to_owned()),
                &Value::Str("bar".to_owned())
            ),
            Ok(Value::Str("foobar".to_owned()))
        );
        assert_eq!(
            apply(Instruction::Lt, &Value::Str("a".to_owned()), &Value::Str("b".to_owned())),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            apply(Instruction::Eq, &Value::Str("a".to_owned()), &Value::Str("a".to_owned())),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn bool_compares_numerically() {
        assert_eq!(apply(Instruction::Eq, &Value::Bool(true), &Value::Int(1)), Ok(Value::Bool(true)));
        assert_eq!(apply(Instruction::Eq, &Value::Bool(false), &Value::Int(0)), Ok(Value::Bool(true)));
    }

    #[test]
    fn integer_division_by_zero_faults() {
        assert_eq!(
            apply(Instruction::Div, &Value::Int(1), &Value::Int(0)),
            Err(RuntimeErrorKind::DivisionByZero)
        );
    }

    #[test]
    fn float_division_by_zero_is_ieee() {
        assert_eq!(
            apply(Instruction::Div, &Value::Float(1.0), &Value::Float(0.0)),
            Ok(Value::Float(f64::INFINITY))
        );
    }

    #[test]
    fn type_mismatches_fault() {
        assert_eq!(
            apply(Instruction::Sub, &Value::Str("a".to_owned()), &Value::Int(1)),
            Err(RuntimeErrorKind::OperandTypeMismatch)
        );
    }
}

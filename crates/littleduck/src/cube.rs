//! Semantic cubes: type compatibility tables for the operators.
//!
//! Each lookup is `operator × lhs × rhs → Option<result>`; `None` is the
//! cube's ⊥ and becomes a `SemanticError` in the analyzer.

use crate::{ast::BinaryOperator, ast::UnaryOperator, value::ValueType};

/// Result type of a binary operation, or `None` when incompatible.
#[must_use]
pub fn binary_result(
    operator: BinaryOperator,
    lhs: ValueType,
    rhs: ValueType,
) -> Option<ValueType> {
    match operator {
        BinaryOperator::Add => addition(lhs, rhs),
        BinaryOperator::Sub | BinaryOperator::Mul | BinaryOperator::Div => {
            multiplication(lhs, rhs)
        }
        BinaryOperator::Eq | BinaryOperator::Ne | BinaryOperator::Lt | BinaryOperator::Gt => {
            comparison(operator, lhs, rhs)
        }
        BinaryOperator::And | BinaryOperator::Or => logical(lhs, rhs),
    }
}

/// Result type of a unary operation, or `None` when incompatible.
///
/// These feed the analyzer's lowerings: `-x` becomes `x * (-1)` and `!x`
/// becomes `x == false`, both of which stay inside the binary cubes.
#[must_use]
pub fn unary_result(operator: UnaryOperator, operand: ValueType) -> Option<ValueType> {
    match operator {
        UnaryOperator::Neg => match operand {
            ValueType::Int => Some(ValueType::Int),
            ValueType::Float => Some(ValueType::Float),
            ValueType::Bool | ValueType::String => None,
        },
        UnaryOperator::Not => match operand {
            ValueType::Int | ValueType::Bool => Some(ValueType::Bool),
            ValueType::Float | ValueType::String => None,
        },
    }
}

/// Addition matrix: numbers promote, strings concatenate among themselves.
fn addition(lhs: ValueType, rhs: ValueType) -> Option<ValueType> {
    use ValueType::{Float, Int, String};
    match (lhs, rhs) {
        (Int, Int) => Some(Int),
        (Int | Float, Int | Float) => Some(Float),
        (String, String) => Some(String),
        _ => None,
    }
}

/// Multiplication matrix: numbers only, int promotes to float when mixed.
fn multiplication(lhs: ValueType, rhs: ValueType) -> Option<ValueType> {
    use ValueType::{Float, Int};
    match (lhs, rhs) {
        (Int, Int) => Some(Int),
        (Int | Float, Int | Float) => Some(Float),
        _ => None,
    }
}

/// Comparison matrix: always bool. Numerics compare with each other and
/// with bool; strings support only `==` (which `!=` lowers onto) and `<`.
fn comparison(operator: BinaryOperator, lhs: ValueType, rhs: ValueType) -> Option<ValueType> {
    use ValueType::{Bool, Float, Int, String};
    match (lhs, rhs) {
        (Int | Float | Bool, Int | Float | Bool) => Some(Bool),
        (String, String) => match operator {
            BinaryOperator::Eq | BinaryOperator::Ne | BinaryOperator::Lt => Some(Bool),
            _ => None,
        },
        _ => None,
    }
}

/// Logical matrix: bool and int (ints are truthy), result always bool.
fn logical(lhs: ValueType, rhs: ValueType) -> Option<ValueType> {
    use ValueType::{Bool, Int};
    match (lhs, rhs) {
        (Int | Bool, Int | Bool) => Some(Bool),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator as Op;
    use crate::value::ValueType as T;

    #[test]
    fn addition_matrix() {
        assert_eq!(binary_result(Op::Add, T::Int, T::Int), Some(T::Int));
        assert_eq!(binary_result(Op::Add, T::Int, T::Float), Some(T::Float));
        assert_eq!(binary_result(Op::Add, T::Float, T::Int), Some(T::Float));
        assert_eq!(binary_result(Op::Add, T::String, T::String), Some(T::String));
        assert_eq!(binary_result(Op::Add, T::String, T::Int), None);
        assert_eq!(binary_result(Op::Add, T::Bool, T::Bool), None);
    }

    #[test]
    fn multiplication_matrix_rejects_strings_and_bools() {
        for op in [Op::Sub, Op::Mul, Op::Div] {
            assert_eq!(binary_result(op, T::Int, T::Int), Some(T::Int));
            assert_eq!(binary_result(op, T::Float, T::Int), Some(T::Float));
            assert_eq!(binary_result(op, T::String, T::String), None);
            assert_eq!(binary_result(op, T::Bool, T::Int), None);
        }
    }

    #[test]
    fn comparison_matrix() {
        assert_eq!(binary_result(Op::Lt, T::Int, T::Float), Some(T::Bool));
        assert_eq!(binary_result(Op::Eq, T::Bool, T::Int), Some(T::Bool));
        assert_eq!(binary_result(Op::Eq, T::String, T::String), Some(T::Bool));
        assert_eq!(binary_result(Op::Ne, T::String, T::String), Some(T::Bool));
        assert_eq!(binary_result(Op::Lt, T::String, T::String), Some(T::Bool));
        assert_eq!(binary_result(Op::Gt, T::String, T::String), None);
        assert_eq!(binary_result(Op::Eq, T::String, T::Int), None);
    }

    #[test]
    fn logical_matrix_treats_int_as_truthy() {
        assert_eq!(binary_result(Op::And, T::Bool, T::Bool), Some(T::Bool));
        assert_eq!(binary_result(Op::Or, T::Int, T::Bool), Some(T::Bool));
        assert_eq!(binary_result(Op::And, T::Float, T::Bool), None);
        assert_eq!(binary_result(Op::Or, T::String, T::String), None);
    }

    #[test]
    fn unary_results() {
        use crate::ast::UnaryOperator as U;
        assert_eq!(unary_result(U::Neg, T::Int), Some(T::Int));
        assert_eq!(unary_result(U::Neg, T::Float), Some(T::Float));
        assert_eq!(unary_result(U::Neg, T::String), None);
        assert_eq!(unary_result(U::Not, T::Bool), Some(T::Bool));
        assert_eq!(unary_result(U::Not, T::Int), Some(T::Bool));
        assert_eq!(unary_result(U::Not, T::Float), None);
    }
}

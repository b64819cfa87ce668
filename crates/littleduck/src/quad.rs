//! Quadruple intermediate representation.
//!
//! The analyzer emits *symbolic* quadruples whose operands still name
//! identifiers, temporaries, interned constants, and jump targets. The code
//! generator later replaces every symbolic operand with a numeric address
//! and translates the operation into the compact [`Instruction`] tag the
//! virtual machine dispatches on.

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr};

use crate::value::{Value, ValueType};

/// A constant literal, structurally hashable so equal `(type, value)` pairs
/// intern to a single constant-pool entry.
///
/// Variant order follows the type-tag contract, so the derived `Ord` sorts
/// by type tag first and by value within a type — exactly the deterministic
/// key the code generator sorts the pool with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstValue {
    Int(i64),
    Bool(bool),
    Float(OrderedFloat<f64>),
    Str(String),
}

impl ConstValue {
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Bool(_) => ValueType::Bool,
            Self::Float(_) => ValueType::Float,
            Self::Str(_) => ValueType::String,
        }
    }

    /// The runtime value this constant denotes.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::Int(*i),
            Self::Bool(b) => Value::Bool(*b),
            Self::Float(f) => Value::Float(f.into_inner()),
            Self::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Float(v) => write!(f, "{}", v.into_inner()),
            Self::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

/// A symbolic operand of an analyzer-level quadruple.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A named variable or function, resolved through the scope stack.
    Identifier(String),
    /// A compiler-generated intermediate, numbered densely per scope.
    Temp(usize),
    /// An interned constant.
    Const(ConstValue),
    /// The target of a jump, fixed once backpatched.
    Line(usize),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => f.write_str(name),
            Self::Temp(n) => write!(f, "t_{n}"),
            Self::Const(c) => write!(f, "{c}"),
            Self::Line(n) => write!(f, "L_{n}"),
        }
    }
}

/// Operations of the symbolic IR.
///
/// Unary `-` and `!`, and the `!=` comparison, never appear here: the
/// analyzer lowers them into `*`, `==`-against-`false`, and chained `==`
/// respectively, so the set below maps one-to-one onto VM instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Operation {
    #[strum(serialize = "OPEN")]
    OpenStackFrame,
    #[strum(serialize = "CLOSE")]
    CloseStackFrame,
    #[strum(serialize = "GOTO")]
    Goto,
    #[strum(serialize = "GOTOT")]
    GotoTrue,
    #[strum(serialize = "GOTOF")]
    GotoFalse,
    #[strum(serialize = "RETURN")]
    Return,
    #[strum(serialize = "ARG")]
    FunctionArgument,
    #[strum(serialize = "CALL")]
    FunctionCall,
    #[strum(serialize = "PARAM")]
    FunctionParameter,
    #[strum(serialize = "PRINT")]
    Print,
    #[strum(serialize = "ASSIGN")]
    Assign,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "==")]
    Equals,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = ">")]
    MoreThan,
    #[strum(serialize = "+")]
    Addition,
    #[strum(serialize = "-")]
    Subtraction,
    #[strum(serialize = "*")]
    Multiplication,
    #[strum(serialize = "/")]
    Division,
}

impl Operation {
    /// The numeric instruction this operation translates to.
    #[must_use]
    pub fn instruction(self) -> Instruction {
        match self {
            Self::OpenStackFrame => Instruction::Open,
            Self::CloseStackFrame => Instruction::Close,
            Self::Goto => Instruction::Goto,
            Self::GotoTrue => Instruction::Gotot,
            Self::GotoFalse => Instruction::Gotof,
            Self::Return => Instruction::Return,
            Self::FunctionArgument => Instruction::FunctionArgument,
            Self::FunctionCall => Instruction::FunctionCall,
            Self::FunctionParameter => Instruction::FunctionParameter,
            Self::Print => Instruction::Print,
            Self::Assign => Instruction::Assign,
            Self::And => Instruction::And,
            Self::Or => Instruction::Or,
            Self::Equals => Instruction::Eq,
            Self::LessThan => Instruction::Lt,
            Self::MoreThan => Instruction::Gt,
            Self::Addition => Instruction::Add,
            Self::Subtraction => Instruction::Sub,
            Self::Multiplication => Instruction::Mul,
            Self::Division => Instruction::Div,
        }
    }
}

/// A symbolic quadruple `(op, a, b, c)`; unused fields stay `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Quadruple {
    pub op: Operation,
    pub left: Option<Operand>,
    pub right: Option<Operand>,
    pub result: Option<Operand>,
}

impl Quadruple {
    #[must_use]
    pub fn new(
        op: Operation,
        left: Option<Operand>,
        right: Option<Operand>,
        result: Option<Operand>,
    ) -> Self {
        Self { op, left, right, result }
    }
}

impl fmt::Display for Quadruple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field(op: Option<&Operand>) -> String {
            op.map_or_else(|| "_".to_owned(), ToString::to_string)
        }
        write!(
            f,
            "({}, {}, {}, {})",
            self.op,
            field(self.left.as_ref()),
            field(self.right.as_ref()),
            field(self.result.as_ref()),
        )
    }
}

/// The closed instruction enumeration of the virtual machine.
///
/// Tag values are a wire contract for third-party consumers of compiled
/// IR files and must never change. `Read` (5) is reserved: the code
/// generator never emits it and the VM rejects it at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum Instruction {
    Open = 0,
    Close = 1,
    Goto = 2,
    Gotot = 3,
    Gotof = 4,
    Read = 5,
    Assign = 6,
    FunctionParameter = 7,
    FunctionCall = 8,
    FunctionArgument = 9,
    Return = 10,
    And = 11,
    Or = 12,
    Eq = 13,
    Lt = 14,
    Gt = 15,
    Add = 16,
    Sub = 17,
    Mul = 18,
    Div = 19,
    Print = 20,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_tags_are_stable() {
        assert_eq!(Instruction::Open as u8, 0);
        assert_eq!(Instruction::Read as u8, 5);
        assert_eq!(Instruction::Return as u8, 10);
        assert_eq!(Instruction::Div as u8, 19);
        assert_eq!(Instruction::Print as u8, 20);
        assert_eq!(Instruction::from_repr(13), Some(Instruction::Eq));
        assert_eq!(Instruction::from_repr(21), None);
    }

    #[test]
    fn constants_sort_by_type_tag_then_value() {
        let mut pool = vec![
            ConstValue::Str("a".to_owned()),
            ConstValue::Int(5),
            ConstValue::Bool(false),
            ConstValue::Int(-1),
            ConstValue::Float(OrderedFloat(2.5)),
        ];
        pool.sort();
        assert_eq!(
            pool,
            vec![
                ConstValue::Int(-1),
                ConstValue::Int(5),
                ConstValue::Bool(false),
                ConstValue::Float(OrderedFloat(2.5)),
                ConstValue::Str("a".to_owned()),
            ]
        );
    }
}

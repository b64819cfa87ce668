//! Expression linearization: prefix sequence to quadruples.
//!
//! An expression is first flattened into a *prefix* (Polish) token
//! sequence: `BinaryOp(op, L, R)` contributes `[op, …prefix(L),
//! …prefix(R)]` and leaves contribute a single symbolic operand. The
//! sequence is then collapsed by shifting tokens onto a working stack and
//! reducing every `[operator, operand, operand]` triple at the top into a
//! fresh temporary plus an emitted quadruple. Precedence was already
//! resolved by the parser, so the reduction order is exactly left-to-right
//! evaluation order.
//!
//! Unary operators and `!=` are lowered here so the VM needs no unary
//! opcodes: `-x` becomes `x * (-1)`, `!x` becomes `x == false`, and
//! `a != b` becomes `(a == b) == false`.

use std::collections::VecDeque;

use ordered_float::OrderedFloat;
use smallvec::SmallVec;

use super::{AnalyzeResult, Analyzer};
use crate::{
    ast::{BinaryOperator, Call, Expression, ExpressionKind, Literal, UnaryOperator},
    cube,
    errors::SemanticError,
    quad::{ConstValue, Operand, Operation, Quadruple},
    value::ValueType,
};

/// One token of a prefix sequence.
#[derive(Debug, Clone)]
enum PrefixToken {
    Op(Operation),
    Operand(Operand),
}

type PrefixSequence = VecDeque<PrefixToken>;

impl Analyzer {
    /// Type-checks and linearizes one expression.
    ///
    /// Returns the operand holding the expression's value (a variable, a
    /// constant, or the last temporary) together with its inferred type.
    /// The type is also written into the expression's type slot.
    pub(super) fn analyze_expression(
        &mut self,
        expression: &mut Expression,
    ) -> AnalyzeResult<(Operand, ValueType)> {
        let mut prefix = PrefixSequence::new();
        let value_type = self.build_prefix(expression, &mut prefix)?;
        let operand = self.collapse_prefix(prefix)?;
        Ok((operand, value_type))
    }

    /// Recursively flattens `expression` into `prefix`, checking types
    /// through the semantic cubes and filling the node's type slot.
    ///
    /// Value calls are emitted eagerly (parameters plus `CALL` into a fresh
    /// temporary) and contribute that temporary as their operand.
    fn build_prefix(
        &mut self,
        expression: &mut Expression,
        prefix: &mut PrefixSequence,
    ) -> AnalyzeResult<ValueType> {
        let value_type = match &mut expression.kind {
            ExpressionKind::Literal(literal) => {
                let constant = const_value(literal);
                let operand = self.intern_constant(constant);
                prefix.push_back(PrefixToken::Operand(operand));
                literal.value_type()
            }
            ExpressionKind::ReadVar { identifier } => {
                let name = identifier.clone();
                let Some(variable) = self.lookup_variable_mut(&name) else {
                    return Err(SemanticError::new(
                        format!("'{name}' does not exist in this scope"),
                        "expression",
                    ));
                };
                if !variable.is_initialized {
                    return Err(SemanticError::new(
                        format!("Variable '{name}' was read before being initialized"),
                        "expression",
                    ));
                }
                variable.is_used = true;
                let value_type = variable.value_type;
                prefix.push_back(PrefixToken::Operand(Operand::Identifier(name)));
                value_type
            }
            ExpressionKind::ValueCall(call) => {
                let (operand, value_type) = self.analyze_value_call(call)?;
                prefix.push_back(PrefixToken::Operand(operand));
                value_type
            }
            ExpressionKind::Unary { operator, operand } => {
                let operator = *operator;
                match operator {
                    UnaryOperator::Neg => prefix.push_back(PrefixToken::Op(Operation::Multiplication)),
                    UnaryOperator::Not => prefix.push_back(PrefixToken::Op(Operation::Equals)),
                }
                let operand_type = self.build_prefix(operand, prefix)?;
                let Some(value_type) = cube::unary_result(operator, operand_type) else {
                    return Err(SemanticError::new(
                        format!(
                            "Operator '{operator}' cannot be used with value of type '{operand_type}'"
                        ),
                        "expression",
                    ));
                };
                let lowered = match operator {
                    UnaryOperator::Neg => ConstValue::Int(-1),
                    UnaryOperator::Not => ConstValue::Bool(false),
                };
                let constant = self.intern_constant(lowered);
                prefix.push_back(PrefixToken::Operand(constant));
                value_type
            }
            ExpressionKind::Binary { operator, left, right } => {
                let operator = *operator;
                match operator {
                    // a != b lowers to (a == b) == false: two nested
                    // equality operations in prefix order.
                    BinaryOperator::Ne => {
                        prefix.push_back(PrefixToken::Op(Operation::Equals));
                        prefix.push_back(PrefixToken::Op(Operation::Equals));
                    }
                    other => prefix.push_back(PrefixToken::Op(quad_operation(other))),
                }
                let left_type = self.build_prefix(left, prefix)?;
                let right_type = self.build_prefix(right, prefix)?;
                let Some(value_type) = cube::binary_result(operator, left_type, right_type) else {
                    return Err(SemanticError::new(
                        format!(
                            "Operator '{operator}' cannot be used with '{left_type}','{right_type}' operands"
                        ),
                        "expression",
                    ));
                };
                if operator == BinaryOperator::Ne {
                    let constant = self.intern_constant(ConstValue::Bool(false));
                    prefix.push_back(PrefixToken::Operand(constant));
                }
                value_type
            }
        };
        expression.value_type = Some(value_type);
        Ok(value_type)
    }

    /// Shift-reduce pass over a prefix sequence.
    ///
    /// Terminates with exactly one operand on the stack: the value of the
    /// whole expression.
    fn collapse_prefix(&mut self, mut prefix: PrefixSequence) -> AnalyzeResult<Operand> {
        let mut stack: SmallVec<[PrefixToken; 8]> = SmallVec::new();
        while let Some(token) = prefix.pop_front() {
            stack.push(token);
            loop {
                let len = stack.len();
                if len < 3
                    || !matches!(stack[len - 3], PrefixToken::Op(_))
                    || !matches!(stack[len - 2], PrefixToken::Operand(_))
                    || !matches!(stack[len - 1], PrefixToken::Operand(_))
                {
                    break;
                }
                let (Some(PrefixToken::Operand(right)), Some(PrefixToken::Operand(left)), Some(PrefixToken::Op(op))) =
                    (stack.pop(), stack.pop(), stack.pop())
                else {
                    return Err(self.internal_error("prefix reduction lost its shape"));
                };
                let temp = self.current_scope_mut()?.allocate_temp();
                self.emit(Quadruple::new(
                    op,
                    Some(left),
                    Some(right),
                    Some(Operand::Temp(temp)),
                ));
                stack.push(PrefixToken::Operand(Operand::Temp(temp)));
            }
        }
        match (stack.pop(), stack.is_empty()) {
            (Some(PrefixToken::Operand(operand)), true) => Ok(operand),
            _ => Err(self.internal_error("prefix sequence did not collapse to one operand")),
        }
    }

    /// Validates a value call, emits its parameters and `CALL`, and returns
    /// the temporary receiving the result.
    fn analyze_value_call(&mut self, call: &mut Call) -> AnalyzeResult<(Operand, ValueType)> {
        let return_type = self.check_call(call)?;
        let Some(value_type) = return_type else {
            return Err(SemanticError::new(
                format!("Function '{}' of type void cannot be used in an expression", call.identifier),
                format!("call to '{}'", call.identifier),
            ));
        };
        let temp = self.current_scope_mut()?.allocate_temp();
        self.emit(Quadruple::new(
            Operation::FunctionCall,
            Some(Operand::Identifier(call.identifier.clone())),
            None,
            Some(Operand::Temp(temp)),
        ));
        Ok((Operand::Temp(temp), value_type))
    }
}

fn const_value(literal: &Literal) -> ConstValue {
    match literal {
        Literal::Int(value) => ConstValue::Int(*value),
        Literal::Float(value) => ConstValue::Float(OrderedFloat(*value)),
        Literal::Str(value) => ConstValue::Str(value.clone()),
        Literal::Bool(value) => ConstValue::Bool(*value),
    }
}

/// Maps an AST binary operator onto its quadruple operation. `!=` never
/// reaches this table; it is lowered before emission.
fn quad_operation(operator: BinaryOperator) -> Operation {
    match operator {
        BinaryOperator::Add => Operation::Addition,
        BinaryOperator::Sub => Operation::Subtraction,
        BinaryOperator::Mul => Operation::Multiplication,
        BinaryOperator::Div => Operation::Division,
        BinaryOperator::Eq | BinaryOperator::Ne => Operation::Equals,
        BinaryOperator::Lt => Operation::LessThan,
        BinaryOperator::Gt => Operation::MoreThan,
        BinaryOperator::And => Operation::And,
        BinaryOperator::Or => Operation::Or,
    }
}

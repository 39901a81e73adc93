//! Comparison and math operations over [`Value`].

use std::collections::HashMap;

use crate::ast::{CompOp, MathOp};
use crate::error::EvalError;
use crate::Value;

/// Evaluates a comparison between two values.
///
/// Numeric operands compare across int/float; strings, durations, and
/// times order lexicographically or chronologically; bools, bytes, lists,
/// and maps support equality only. Nil equals only nil. Mismatched types
/// are unequal under `==`/`!=` and an error under ordering operators.
pub(crate) fn compare(left: &Value, op: CompOp, right: &Value) -> Result<bool, EvalError> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(cmp_ord(l, r, op)),
        (Value::Float(l), Value::Float(r)) => Ok(cmp_ord(l, r, op)),
        (Value::Int(l), Value::Float(r)) => Ok(cmp_ord(&(*l as f64), r, op)),
        (Value::Float(l), Value::Int(r)) => Ok(cmp_ord(l, &(*r as f64), op)),
        (Value::String(l), Value::String(r)) => Ok(cmp_ord(l, r, op)),
        (Value::Duration(l), Value::Duration(r)) => Ok(cmp_ord(l, r, op)),
        (Value::Time(l), Value::Time(r)) => Ok(cmp_ord(l, r, op)),
        (Value::Bool(l), Value::Bool(r)) => cmp_eq_only(l, r, op, "bool"),
        (Value::Nil, Value::Nil) => cmp_eq_only(&(), &(), op, "nil"),
        (Value::Nil, _) | (_, Value::Nil) => Ok(matches!(op, CompOp::NotEq)),
        (Value::Bytes(l), Value::Bytes(r)) => cmp_eq_only(l, r, op, "bytes"),
        (Value::List(l), Value::List(r)) => cmp_eq_only(l, r, op, "list"),
        (Value::Map(l), Value::Map(r)) => cmp_eq_only::<HashMap<String, Value>>(l, r, op, "map"),
        _ => match op {
            CompOp::Eq => Ok(false),
            CompOp::NotEq => Ok(true),
            _ => Err(EvalError::IncomparableTypes {
                left: left.type_name(),
                right: right.type_name(),
            }),
        },
    }
}

fn cmp_ord<T: PartialOrd>(l: &T, r: &T, op: CompOp) -> bool {
    match op {
        CompOp::Eq => l == r,
        CompOp::NotEq => l != r,
        CompOp::Less => l < r,
        CompOp::Greater => l > r,
        CompOp::LessEq => l <= r,
        CompOp::GreaterEq => l >= r,
    }
}

fn cmp_eq_only<T: PartialEq>(l: &T, r: &T, op: CompOp, type_name: &'static str) -> Result<bool, EvalError> {
    match op {
        CompOp::Eq => Ok(l == r),
        CompOp::NotEq => Ok(l != r),
        _ => Err(EvalError::UnorderedComparison { type_name }),
    }
}

/// Evaluates a math operation between two values. Ints stay ints, floats
/// stay floats, and mixed operands promote to float; `+` also concatenates
/// strings.
pub(crate) fn math_op(left: &Value, op: MathOp, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => int_op(*l, *r, op),
        (Value::Float(l), Value::Float(r)) => float_op(*l, *r, op),
        (Value::Int(l), Value::Float(r)) => float_op(*l as f64, *r, op),
        (Value::Float(l), Value::Int(r)) => float_op(*l, *r as f64, op),
        (Value::String(l), Value::String(r)) if matches!(op, MathOp::Add) => {
            Ok(Value::string(format!("{}{}", l, r)))
        }
        _ => Err(EvalError::InvalidMathOperands {
            left: left.type_name(),
            right: right.type_name(),
        }),
    }
}

fn int_op(l: i64, r: i64, op: MathOp) -> Result<Value, EvalError> {
    Ok(Value::Int(match op {
        MathOp::Add => l.wrapping_add(r),
        MathOp::Sub => l.wrapping_sub(r),
        MathOp::Mul => l.wrapping_mul(r),
        MathOp::Div if r == 0 => return Err(EvalError::DivisionByZero),
        MathOp::Div => l / r,
    }))
}

fn float_op(l: f64, r: f64, op: MathOp) -> Result<Value, EvalError> {
    Ok(Value::Float(match op {
        MathOp::Add => l + r,
        MathOp::Sub => l - r,
        MathOp::Mul => l * r,
        MathOp::Div if r == 0.0 => return Err(EvalError::DivisionByZero),
        MathOp::Div => l / r,
    }))
}

/// Negates a numeric value.
pub(crate) fn negate(value: Value) -> Result<Value, EvalError> {
    match value {
        Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(EvalError::TypeMismatch {
            expected: "numeric value",
            actual: other.type_name(),
        }),
    }
}

//! Expression evaluator
//!
//! Two entry points share one AST: [`evaluate`] computes a boolean over a
//! comparison tree, [`evaluate_formula`] computes a number from an
//! arithmetic comparison node. Both resolve field paths through a
//! [`Resolver`] and report every failure as a typed [`ExprError`].

use super::ast::{CompareOp, Comparison, Expr, LogicalOp, Operand};
use crate::perk::error::ExprError;
use regex::Regex;
use serde_json::Value;

/// Resolves a dot-joined field path to a value, if present.
pub trait Resolver {
    fn resolve(&self, path: &[String]) -> Option<Value>;
}

/// Evaluate a boolean expression against a resolver.
///
/// AND and OR short-circuit: the right side is never resolved when the
/// left side already decides the outcome.
pub fn evaluate(expr: &Expr, resolver: &dyn Resolver) -> Result<bool, ExprError> {
    match expr {
        Expr::Binary { op, left, right } => match op {
            LogicalOp::And => {
                if !evaluate(left, resolver)? {
                    return Ok(false);
                }
                evaluate(right, resolver)
            }
            LogicalOp::Or => {
                if evaluate(left, resolver)? {
                    return Ok(true);
                }
                evaluate(right, resolver)
            }
        },
        Expr::Not(inner) => Ok(!evaluate(inner, resolver)?),
        Expr::Comparison(cmp) => eval_comparison(cmp, resolver),
    }
}

/// Evaluate a numeric formula such as `payload.amount * 0.05`.
///
/// The expression must be a single comparison node whose operator is
/// arithmetic; anything else is an error.
pub fn evaluate_formula(expr: &Expr, resolver: &dyn Resolver) -> Result<f64, ExprError> {
    let cmp = match expr {
        Expr::Comparison(cmp) if cmp.op.is_arithmetic() => cmp,
        _ => return Err(ExprError::NotArithmetic),
    };
    let left = resolve_numeric(&cmp.left, cmp.op, resolver)?;
    let right = resolve_numeric(&cmp.right, cmp.op, resolver)?;
    match cmp.op {
        CompareOp::Mul => Ok(left * right),
        CompareOp::Div => {
            if right == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(left / right)
        }
        CompareOp::Add => Ok(left + right),
        CompareOp::Sub => Ok(left - right),
        _ => Err(ExprError::NotArithmetic),
    }
}

fn eval_comparison(cmp: &Comparison, resolver: &dyn Resolver) -> Result<bool, ExprError> {
    let left = resolve_operand(&cmp.left, resolver)?;
    let right = resolve_operand(&cmp.right, resolver)?;
    match cmp.op {
        CompareOp::Eq => Ok(values_equal(&left, &right)),
        CompareOp::NotEq => Ok(!values_equal(&left, &right)),
        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
            numeric_compare(cmp.op, &left, &right)
        }
        CompareOp::Contains => contains(&left, &right),
        CompareOp::Matches => matches_pattern(cmp, &left, &right),
        op => Err(ExprError::ArithmeticInCondition { op: op.to_string() }),
    }
}

fn resolve_operand(operand: &Operand, resolver: &dyn Resolver) -> Result<Value, ExprError> {
    match operand {
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Field(path) => resolver.resolve(path).ok_or_else(|| ExprError::FieldNotFound {
            path: path.join("."),
        }),
    }
}

fn resolve_numeric(
    operand: &Operand,
    op: CompareOp,
    resolver: &dyn Resolver,
) -> Result<f64, ExprError> {
    let value = resolve_operand(operand, resolver)?;
    value
        .as_f64()
        .ok_or_else(|| ExprError::NonNumericOperands { op: op.to_string() })
}

/// Numeric-aware equality: numerically coercible operands compare within
/// an absolute tolerance, booleans by identity, everything else by string
/// representation.
fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return (l - r).abs() < 1e-9;
    }
    if let Value::Bool(l) = left {
        return match right {
            Value::Bool(r) => l == r,
            _ => false,
        };
    }
    value_to_string(left) == value_to_string(right)
}

fn numeric_compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExprError> {
    let (l, r) = match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => (l, r),
        _ => return Err(ExprError::NonNumericOperands { op: op.to_string() }),
    };
    Ok(match op {
        CompareOp::Gt => l > r,
        CompareOp::Gte => l >= r,
        CompareOp::Lt => l < r,
        CompareOp::Lte => l <= r,
        _ => false,
    })
}

fn contains(left: &Value, right: &Value) -> Result<bool, ExprError> {
    let haystack = match left {
        Value::String(s) => s,
        _ => return Err(ExprError::ContainsNotString),
    };
    let needle = value_to_string(right);
    Ok(haystack.contains(&needle))
}

fn matches_pattern(cmp: &Comparison, left: &Value, right: &Value) -> Result<bool, ExprError> {
    let subject = match left {
        Value::String(s) => s,
        _ => return Err(ExprError::MatchesNotString),
    };
    if let Some(pattern) = &cmp.pattern {
        return Ok(pattern.is_match(subject));
    }
    let pattern = match right {
        Value::String(p) => p,
        _ => return Err(ExprError::MatchesNotString),
    };
    let re = Regex::new(pattern).map_err(|e| ExprError::InvalidPattern {
        pattern: pattern.clone(),
        message: e.to_string(),
    })?;
    Ok(re.is_match(subject))
}

/// String representation used for loose equality and `contains`.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

// SPDX-License-Identifier: MIT

//! Abstract Syntax Tree for condition and formula expressions

use regex::Regex;
use serde_json::Value;

/// A parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND / OR with short-circuit evaluation
    Binary {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Logical NOT
    Not(Box<Expr>),
    /// `left op right` over two operands
    Comparison(Comparison),
}

/// Logical connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Comparison and arithmetic operators
///
/// The arithmetic members are only reachable through the formula evaluator;
/// the boolean evaluator rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// ==
    Eq,
    /// !=
    NotEq,
    /// >
    Gt,
    /// >=
    Gte,
    /// <
    Lt,
    /// <=
    Lte,
    /// contains (substring test)
    Contains,
    /// matches (regex test)
    Matches,
    /// *
    Mul,
    /// /
    Div,
    /// +
    Add,
    /// -
    Sub,
}

impl CompareOp {
    /// Map an operator symbol token to its variant.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::NotEq),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            "*" => Some(CompareOp::Mul),
            "/" => Some(CompareOp::Div),
            "+" => Some(CompareOp::Add),
            "-" => Some(CompareOp::Sub),
            _ => None,
        }
    }

    /// Whether this operator belongs to the formula evaluator.
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            CompareOp::Mul | CompareOp::Div | CompareOp::Add | CompareOp::Sub
        )
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::NotEq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
            CompareOp::Contains => write!(f, "contains"),
            CompareOp::Matches => write!(f, "matches"),
            CompareOp::Mul => write!(f, "*"),
            CompareOp::Div => write!(f, "/"),
            CompareOp::Add => write!(f, "+"),
            CompareOp::Sub => write!(f, "-"),
        }
    }
}

/// Either a pre-parsed constant or a dot-joined field path
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal value (string, number or boolean)
    Literal(Value),
    /// A field path like `["payload", "amount"]`
    Field(Vec<String>),
}

/// A single `left op right` node.
///
/// When `op` is `Matches` and the right operand is a string literal, the
/// pattern is compiled once here; evaluation falls back to compiling per
/// call otherwise, so an invalid literal pattern still errors at
/// evaluation time rather than at parse time.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
    pub(crate) pattern: Option<Regex>,
}

impl Comparison {
    pub fn new(left: Operand, op: CompareOp, right: Operand) -> Self {
        let pattern = match (&op, &right) {
            (CompareOp::Matches, Operand::Literal(Value::String(p))) => Regex::new(p).ok(),
            _ => None,
        };
        Self {
            left,
            op,
            right,
            pattern,
        }
    }
}

// Structural equality only; the cached pattern is derived state.
impl PartialEq for Comparison {
    fn eq(&self, other: &Self) -> bool {
        self.left == other.left && self.op == other.op && self.right == other.right
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_op_display() {
        assert_eq!(format!("{}", CompareOp::Eq), "==");
        assert_eq!(format!("{}", CompareOp::NotEq), "!=");
        assert_eq!(format!("{}", CompareOp::Gte), ">=");
        assert_eq!(format!("{}", CompareOp::Contains), "contains");
        assert_eq!(format!("{}", CompareOp::Matches), "matches");
        assert_eq!(format!("{}", CompareOp::Mul), "*");
    }

    #[test]
    fn test_expression_equality() {
        let a = Expr::Comparison(Comparison::new(
            Operand::Field(vec!["payload".into(), "amount".into()]),
            CompareOp::Gt,
            Operand::Literal(json!(1000.0)),
        ));
        let b = Expr::Comparison(Comparison::new(
            Operand::Field(vec!["payload".into(), "amount".into()]),
            CompareOp::Gt,
            Operand::Literal(json!(1000.0)),
        ));
        assert_eq!(a, b);
    }

    #[test]
    fn test_matches_literal_precompiles() {
        let cmp = Comparison::new(
            Operand::Field(vec!["email".into()]),
            CompareOp::Matches,
            Operand::Literal(json!(".*@example\\.com")),
        );
        assert!(cmp.pattern.is_some());
    }

    #[test]
    fn test_invalid_literal_pattern_leaves_cache_empty() {
        let cmp = Comparison::new(
            Operand::Field(vec!["email".into()]),
            CompareOp::Matches,
            Operand::Literal(json!("[unclosed")),
        );
        assert!(cmp.pattern.is_none());
    }
}

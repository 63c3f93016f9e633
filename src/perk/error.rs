// SPDX-License-Identifier: MIT

//! Typed error handling for perk-rs
//!
//! Every parse, build, evaluation and submission failure is an explicit
//! returned value; the only panic in the crate is the duplicate action
//! registration guard, which is a programmer error at startup.

use thiserror::Error;

/// Top-level error type for perk-rs
#[derive(Debug, Error)]
pub enum PerkError {
    /// Configuration errors (unreadable rule file, bad listen address, ...)
    #[error("configuration error: {0}")]
    Config(String),

    /// Action execution or parameter errors
    #[error("action error: {0}")]
    Action(String),

    /// No executor registered under the requested type key
    #[error("no executor registered for action type {0:?}")]
    UnknownActionType(String),

    /// Expression language errors
    #[error("expression error: {0}")]
    Expr(#[from] ExprError),

    /// Rule document validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Graph construction errors
    #[error(transparent)]
    Build(#[from] BuildError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

impl PerkError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an action error
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action(message.into())
    }

    /// Create from a generic message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<String> for PerkError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for PerkError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// Errors from the expression language: lexing, parsing and evaluation.
#[derive(Debug, Error)]
pub enum ExprError {
    /// A character the tokenizer does not recognize
    #[error("unexpected character {ch:?} at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    /// A quoted literal with no closing quote
    #[error("unterminated string starting at position {pos}")]
    UnterminatedString { pos: usize },

    /// A numeric literal that does not parse
    #[error("invalid number {text:?}")]
    InvalidNumber { text: String },

    /// Parser expected one token and found another
    #[error("expected {expected} but got {found:?}")]
    Expected { expected: String, found: String },

    /// Input continued after a complete expression
    #[error("unexpected token {found:?} after expression")]
    TrailingTokens { found: String },

    /// A field path that resolved to nothing
    #[error("field {path:?} not found")]
    FieldNotFound { path: String },

    /// An ordering or arithmetic operator applied to non-numeric operands
    #[error("operator {op} requires numeric operands")]
    NonNumericOperands { op: String },

    /// `contains` with a non-string left operand
    #[error("contains: left operand must be a string")]
    ContainsNotString,

    /// `matches` with a non-string operand on either side
    #[error("matches: both operands must be strings")]
    MatchesNotString,

    /// `matches` with a pattern the regex engine rejects
    #[error("matches: invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Division by zero in a formula
    #[error("division by zero")]
    DivisionByZero,

    /// An arithmetic operator reached by the boolean evaluator
    #[error("operator {op} is not valid in a boolean condition")]
    ArithmeticInCondition { op: String },

    /// The formula evaluator was handed a non-arithmetic expression
    #[error("formula must be a single arithmetic expression")]
    NotArithmetic,
}

/// Errors raised while compiling a rule document into a graph.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A condition expression failed to parse
    #[error("condition {id}: parse {expression:?}: {source}")]
    ConditionParse {
        id: String,
        expression: String,
        #[source]
        source: ExprError,
    },

    /// An action references a type key with no registered executor
    #[error("action {id}: unknown action type {type_key:?}")]
    UnknownActionType { id: String, type_key: String },

    /// An action executor rejected its params
    #[error("action {id}: invalid params: {message}")]
    InvalidActionParams { id: String, message: String },

    /// Two nodes share an id; the validator should have caught this
    #[error("duplicate node id {0:?}")]
    DuplicateId(String),
}

/// Aggregated structural problems found in a rule document.
///
/// Every problem is collected before reporting so a single validation run
/// surfaces all of them at once.
#[derive(Debug, Error)]
#[error("rule document validation failed:\n  - {}", .errors.join("\n  - "))]
pub struct ValidationError {
    pub errors: Vec<String>,
}

/// Outcome of a synchronous submission that did not produce a result.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The bounded event queue was at capacity
    #[error("event queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The per-event timeout elapsed before the worker finished
    #[error("event processing timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The caller's cancellation token fired before the worker finished
    #[error("submission cancelled before a result was available")]
    Cancelled,
}

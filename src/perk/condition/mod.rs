// SPDX-License-Identifier: MIT

//! Expression language for rule conditions and point formulas
//!
//! This module provides tokenizing, parsing and evaluation of expressions
//! like:
//! - `payload.category == "food"`
//! - `payload.amount > 1000 AND NOT payload.refunded == true`
//! - `payload.amount * 0.05` (formula form, evaluated numerically)
//!
//! Expressions are compiled into an AST once at graph build time; zero
//! parsing happens while events are being evaluated.

mod ast;
mod evaluator;
mod lexer;
mod parser;

pub use ast::{CompareOp, Comparison, Expr, LogicalOp, Operand};
pub use evaluator::{evaluate, evaluate_formula, Resolver};
pub use parser::parse;

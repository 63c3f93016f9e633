//! Recursive-descent parser for the expression language
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or         := and ( "OR" and )*
//! and        := not ( "AND" not )*
//! not        := "NOT" not | "(" or ")" | comparison
//! comparison := operand op operand
//! operand    := field_path | string | number | boolean
//! ```
//!
//! Single token of lookahead, left associative, parentheses override
//! precedence. Keywords are case-insensitive.

use super::ast::{CompareOp, Comparison, Expr, Operand};
use super::lexer::{tokenize, Token, TokenKind};
use crate::perk::error::ExprError;
use serde_json::{Number, Value};

/// Parse an expression string into an AST.
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.peek().kind != TokenKind::Eof {
        return Err(ExprError::TrailingTokens {
            found: parser.peek().text.clone(),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn consume(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Word && token.text.eq_ignore_ascii_case(keyword)
    }

    // or := and ( "OR" and )*
    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.consume();
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: super::ast::LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    // and := not ( "AND" not )*
    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;
        while self.peek_keyword("and") {
            self.consume();
            let right = self.parse_not()?;
            left = Expr::Binary {
                op: super::ast::LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    // not := "NOT" not | "(" or ")" | comparison
    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.peek_keyword("not") {
            self.consume();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        if self.peek().kind == TokenKind::LParen {
            self.consume();
            let inner = self.parse_or()?;
            if self.peek().kind != TokenKind::RParen {
                return Err(ExprError::Expected {
                    expected: "\")\"".to_string(),
                    found: self.peek().text.clone(),
                });
            }
            self.consume();
            return Ok(inner);
        }
        self.parse_comparison()
    }

    // comparison := operand op operand
    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_operand()?;

        let token = self.peek().clone();
        let op = match token.kind {
            TokenKind::Op => match CompareOp::from_symbol(&token.text) {
                Some(op) => {
                    self.consume();
                    op
                }
                None => {
                    return Err(ExprError::Expected {
                        expected: "comparison operator".to_string(),
                        found: token.text,
                    })
                }
            },
            TokenKind::Word if token.text.eq_ignore_ascii_case("contains") => {
                self.consume();
                CompareOp::Contains
            }
            TokenKind::Word if token.text.eq_ignore_ascii_case("matches") => {
                self.consume();
                CompareOp::Matches
            }
            _ => {
                return Err(ExprError::Expected {
                    expected: "comparison operator".to_string(),
                    found: token.text,
                })
            }
        };

        let right = self.parse_operand()?;
        Ok(Expr::Comparison(Comparison::new(left, op, right)))
    }

    // operand := field_path | string | number | boolean
    fn parse_operand(&mut self) -> Result<Operand, ExprError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Str => {
                self.consume();
                Ok(Operand::Literal(Value::String(token.text)))
            }
            TokenKind::Number => {
                self.consume();
                parse_number(&token.text)
            }
            TokenKind::Bool => {
                self.consume();
                Ok(Operand::Literal(Value::Bool(token.text == "true")))
            }
            TokenKind::Word => {
                self.consume();
                let path = token.text.split('.').map(str::to_string).collect();
                Ok(Operand::Field(path))
            }
            _ => Err(ExprError::Expected {
                expected: "operand".to_string(),
                found: token.text,
            }),
        }
    }
}

/// All numeric literals canonicalize to f64; integer-shaped text goes
/// through i64 first so overflow is reported rather than silently rounded.
fn parse_number(text: &str) -> Result<Operand, ExprError> {
    let value = if text.contains('.') {
        text.parse::<f64>().map_err(|_| ExprError::InvalidNumber {
            text: text.to_string(),
        })?
    } else {
        text.parse::<i64>().map_err(|_| ExprError::InvalidNumber {
            text: text.to_string(),
        })? as f64
    };
    let number = Number::from_f64(value).ok_or_else(|| ExprError::InvalidNumber {
        text: text.to_string(),
    })?;
    Ok(Operand::Literal(Value::Number(number)))
}

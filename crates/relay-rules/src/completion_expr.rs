// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boolean expression parser for `parse_completion_series`: a small
//! `and`/`or`/`not`/parens language over bare series-description
//! identifiers, e.g. `"T1 and (T2 or T2_FLAIR)"`.
//!
//! Tokenizer → Pratt-style parser → AST → eval against a received list.
//! Deliberately not the general DICOM-tag rule language — that's out of
//! scope; this is the one expression grammar pinned down precisely.

use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("unexpected character '{0}' in completion expression")]
    UnexpectedChar(char),
    #[error("unexpected end of completion expression")]
    UnexpectedEnd,
    #[error("expected ')' in completion expression")]
    MissingCloseParen,
    #[error("trailing tokens after a complete completion expression")]
    TrailingTokens,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(ident),
                });
            }
            other => return Err(ExprError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

/// Parsed completion expression, reusable across many `parse_completion_series`
/// calls against the same `required_expr` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Ident(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::Not(inner) => write!(f, "not {inner}"),
            Expr::And(lhs, rhs) => write!(f, "({lhs} and {rhs})"),
            Expr::Or(lhs, rhs) => write!(f, "({lhs} or {rhs})"),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    // expr := or_expr
    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        self.parse_or()
    }

    // or_expr := and_expr ("or" and_expr)*
    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // and_expr := unary ("and" unary)*
    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // unary := "not" unary | primary
    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    // primary := ident | "(" expr ")"
    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExprError::MissingCloseParen),
                }
            }
            Some(_) => Err(ExprError::UnexpectedEnd),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

impl Expr {
    pub fn parse(input: &str) -> Result<Expr, ExprError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(ExprError::TrailingTokens);
        }
        Ok(expr)
    }

    fn eval(&self, received: &HashSet<&str>) -> bool {
        match self {
            Expr::Ident(name) => received.contains(name.as_str()),
            Expr::Not(inner) => !inner.eval(received),
            Expr::And(lhs, rhs) => lhs.eval(received) && rhs.eval(received),
            Expr::Or(lhs, rhs) => lhs.eval(received) || rhs.eval(received),
        }
    }
}

/// `parse_completion_series(required_expr, received_list) -> bool`: true
/// iff the received descriptions satisfy the user-supplied boolean
/// expression.
pub fn parse_completion_series(required_expr: &str, received: &[String]) -> Result<bool, ExprError> {
    let expr = Expr::parse(required_expr)?;
    let received: HashSet<&str> = received.iter().map(String::as_str).collect();
    Ok(expr.eval(&received))
}

#[cfg(test)]
#[path = "completion_expr_tests.rs"]
mod tests;

//! Recursive-descent parser for the restricted formula grammar.
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := NUMBER | IDENT | '(' expr ')' | ('+' | '-') factor
//! ```
//!
//! Binary operators are left-associative; `*` and `/` bind tighter than
//! `+` and `-`.

use super::token::Token;
use super::ExprError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> Result<f64, ExprError> {
        match self {
            BinaryOp::Add => Ok(lhs + rhs),
            BinaryOp::Subtract => Ok(lhs - rhs),
            BinaryOp::Multiply => Ok(lhs * rhs),
            BinaryOp::Divide => {
                if rhs == 0.0 {
                    return Err(ExprError::DivisionByZero);
                }
                Ok(lhs / rhs)
            }
        }
    }
}

/// A parsed definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(f64),
    Identifier(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

pub fn parse(tokens: &[Token]) -> Result<Expr, ExprError> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(ExprError::Malformed(format!(
            "unexpected trailing token {extra:?}"
        )));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.term()?;
        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some(BinaryOp::Add),
            Some(Token::Minus) => Some(BinaryOp::Subtract),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.factor()?;
        while let Some(op) = match self.peek() {
            Some(Token::Star) => Some(BinaryOp::Multiply),
            Some(Token::Slash) => Some(BinaryOp::Divide),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Literal(*value)),
            Some(Token::Ident(name)) => Ok(Expr::Identifier(name.clone())),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExprError::Malformed("missing closing parenthesis".into())),
                }
            }
            Some(Token::Plus) => self.factor(),
            Some(Token::Minus) => Ok(Expr::Negate(Box::new(self.factor()?))),
            Some(other) => Err(ExprError::Malformed(format!(
                "unexpected token {other:?}"
            ))),
            None => Err(ExprError::Malformed("unexpected end of expression".into())),
        }
    }
}

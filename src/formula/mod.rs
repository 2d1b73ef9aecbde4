//! The restricted formula grammar behind calculated-node definitions.
//!
//! A definition is an arithmetic expression over node names and unsigned
//! integer literals using `+ - * / ( )` with standard precedence and
//! left-associativity. Nothing else is representable: the pipeline is an
//! explicit tokenizer, a recursive-descent parser and a tree interpreter,
//! never a general-purpose expression evaluator.

mod eval;
mod parser;
mod token;

pub use eval::evaluate;
pub use parser::{parse, BinaryOp, Expr};
pub use token::{tokenize, Token, TokenBuf};

use thiserror::Error;

use crate::error::FunnelError;

/// Failures while parsing or evaluating a single definition. The owning
/// node's name is attached by the caller via [`ExprError::for_node`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("identifier '{0}' has no value")]
    Unresolved(String),
    #[error("{0}")]
    Malformed(String),
}

impl ExprError {
    pub fn for_node(self, node: &str) -> FunnelError {
        match self {
            ExprError::DivisionByZero => FunnelError::DivisionByZero { node: node.into() },
            ExprError::Unresolved(identifier) => FunnelError::UnresolvedIdentifier {
                node: node.into(),
                identifier,
            },
            ExprError::Malformed(message) => FunnelError::MalformedDefinition {
                node: node.into(),
                message,
            },
        }
    }
}

/// Tokenizes and parses a definition in one step.
pub fn parse_definition(definition: &str) -> Result<Expr, ExprError> {
    parse(&tokenize(definition)?)
}

/// Yields every identifier-shaped token in a definition: the maximal runs of
/// alphanumeric/underscore characters. All-digit runs (numeric literals) are
/// included; use [`is_literal`] to filter them out.
pub fn identifiers(definition: &str) -> impl Iterator<Item = &str> {
    definition
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| !token.is_empty())
}

/// True for tokens that are numeric literals rather than node references.
pub fn is_literal(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

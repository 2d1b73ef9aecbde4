//! Interprets a parsed expression against a name → value binding table.

use std::collections::HashMap;

use super::parser::Expr;
use super::ExprError;

/// Evaluates the expression. Every identifier must be present in `bindings`;
/// a missing one means some upstream node had no value when the table was
/// built.
pub fn evaluate(expr: &Expr, bindings: &HashMap<String, f64>) -> Result<f64, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(*value),
        Expr::Identifier(name) => bindings
            .get(name)
            .copied()
            .ok_or_else(|| ExprError::Unresolved(name.clone())),
        Expr::Negate(inner) => Ok(-evaluate(inner, bindings)?),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate(lhs, bindings)?;
            let rhs = evaluate(rhs, bindings)?;
            op.apply(lhs, rhs)
        }
    }
}

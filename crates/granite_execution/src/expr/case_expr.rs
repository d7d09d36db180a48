use super::Expression;
use std::fmt;

/// Three-child CASE: `CASE WHEN when THEN then ELSE else_expr END`.
/// Multi-branch SQL cases are translated into nested expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr {
    pub when: Box<Expression>,
    pub then: Box<Expression>,
    pub else_expr: Box<Expression>,
}

impl fmt::Display for CaseExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CASE WHEN {} THEN {} ELSE {} END",
            self.when, self.then, self.else_expr
        )
    }
}

use super::Expression;
use std::fmt;

/// `expr [NOT] IN (list...)`. IN over a subquery is a
/// [`SubqueryExpr`](super::subquery_expr::SubqueryExpr) instead.
#[derive(Debug, Clone, PartialEq)]
pub struct InExpr {
    pub expr: Box<Expression>,
    pub list: Vec<Expression>,
    pub negated: bool,
}

impl fmt::Display for InExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if self.negated {
            write!(f, " NOT")?;
        }
        write!(f, " IN (")?;
        for (idx, item) in self.list.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, ")")
    }
}

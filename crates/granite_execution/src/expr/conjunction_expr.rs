use super::Expression;
use crate::storage::ScalarValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConjunctionOperator {
    And,
    Or,
}

impl ConjunctionOperator {
    /// Three-valued logic: AND is false if either side is false, NULL if
    /// undecided; OR dually.
    pub fn eval(&self, left: &ScalarValue, right: &ScalarValue) -> ScalarValue {
        let l = truth(left);
        let r = truth(right);
        let out = match self {
            ConjunctionOperator::And => match (l, r) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            ConjunctionOperator::Or => match (l, r) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
        };
        match out {
            Some(b) => ScalarValue::Int32(b as i32),
            None => ScalarValue::Null,
        }
    }
}

fn truth(value: &ScalarValue) -> Option<bool> {
    if value.is_null() {
        None
    } else {
        Some(value.is_truthy())
    }
}

impl fmt::Display for ConjunctionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConjunctionOperator::And => write!(f, "AND"),
            ConjunctionOperator::Or => write!(f, "OR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConjunctionExpr {
    pub op: ConjunctionOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

impl fmt::Display for ConjunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}

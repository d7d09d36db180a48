use super::Expression;
use crate::storage::ScalarValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl ComparisonOperator {
    /// The operator with sides swapped: `a < b` is `b > a`.
    pub fn flipped(&self) -> ComparisonOperator {
        match self {
            ComparisonOperator::Eq => ComparisonOperator::Eq,
            ComparisonOperator::NotEq => ComparisonOperator::NotEq,
            ComparisonOperator::Lt => ComparisonOperator::Gt,
            ComparisonOperator::LtEq => ComparisonOperator::GtEq,
            ComparisonOperator::Gt => ComparisonOperator::Lt,
            ComparisonOperator::GtEq => ComparisonOperator::LtEq,
        }
    }

    pub fn is_commutative(&self) -> bool {
        matches!(self, ComparisonOperator::Eq | ComparisonOperator::NotEq)
    }

    /// Three-valued comparison: NULL on either side yields NULL, otherwise
    /// Int32 0/1.
    pub fn eval(&self, left: &ScalarValue, right: &ScalarValue) -> ScalarValue {
        if left.is_null() || right.is_null() {
            return ScalarValue::Null;
        }
        let ord = left.total_cmp(right);
        let holds = match self {
            ComparisonOperator::Eq => ord.is_eq(),
            ComparisonOperator::NotEq => !ord.is_eq(),
            ComparisonOperator::Lt => ord.is_lt(),
            ComparisonOperator::LtEq => ord.is_le(),
            ComparisonOperator::Gt => ord.is_gt(),
            ComparisonOperator::GtEq => ord.is_ge(),
        };
        ScalarValue::Int32(holds as i32)
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOperator::Eq => write!(f, "="),
            ComparisonOperator::NotEq => write!(f, "!="),
            ComparisonOperator::Lt => write!(f, "<"),
            ComparisonOperator::LtEq => write!(f, "<="),
            ComparisonOperator::Gt => write!(f, ">"),
            ComparisonOperator::GtEq => write!(f, ">="),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonExpr {
    pub op: ComparisonOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

impl fmt::Display for ComparisonExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}

use crate::storage::ScalarValue;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiteralExpr {
    pub literal: ScalarValue,
}

impl fmt::Display for LiteralExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.literal {
            ScalarValue::Utf8(s) => write!(f, "'{s}'"),
            other => write!(f, "{other}"),
        }
    }
}

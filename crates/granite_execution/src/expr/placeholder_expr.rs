use crate::storage::DataType;
use std::fmt;

/// Identifies one correlated parameter binding. Assigned by the translator's
/// identifier-context proxy, monotonically per statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterId(pub u32);

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Stands in for a value bound at execution time, either a correlated outer
/// column or an explicit statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderExpr {
    pub id: ParameterId,
    pub datatype: DataType,
}

impl fmt::Display for PlaceholderExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

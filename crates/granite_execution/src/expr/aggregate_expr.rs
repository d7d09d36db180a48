use super::Expression;
use crate::storage::DataType;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Sum,
    Min,
    Max,
    Count,
    Avg,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Avg => "AVG",
        }
    }

    pub fn from_name(name: &str) -> Option<AggregateFunction> {
        match name {
            "SUM" => Some(AggregateFunction::Sum),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            "COUNT" => Some(AggregateFunction::Count),
            "AVG" => Some(AggregateFunction::Avg),
            _ => None,
        }
    }

    pub fn return_type(&self, input: DataType) -> DataType {
        match self {
            AggregateFunction::Count => DataType::Int64,
            AggregateFunction::Min | AggregateFunction::Max => input,
            AggregateFunction::Avg => DataType::Float64,
            AggregateFunction::Sum => {
                if input.is_integer() {
                    DataType::Int64
                } else {
                    DataType::Float64
                }
            }
        }
    }
}

/// An aggregate over an input expression; `input` is `None` for `COUNT(*)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    pub input: Option<Box<Expression>>,
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.input {
            Some(input) => write!(f, "{}({})", self.function.name(), input),
            None => write!(f, "{}(*)", self.function.name()),
        }
    }
}

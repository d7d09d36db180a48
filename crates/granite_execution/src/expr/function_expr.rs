use super::Expression;
use crate::storage::{DataType, ScalarValue};
use granite_error::{GraniteError, OperatorErrorKind, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarFunction {
    Abs,
    Upper,
    Lower,
}

impl ScalarFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarFunction::Abs => "ABS",
            ScalarFunction::Upper => "UPPER",
            ScalarFunction::Lower => "LOWER",
        }
    }

    pub fn from_name(name: &str) -> Option<ScalarFunction> {
        match name {
            "ABS" => Some(ScalarFunction::Abs),
            "UPPER" => Some(ScalarFunction::Upper),
            "LOWER" => Some(ScalarFunction::Lower),
            _ => None,
        }
    }

    pub fn return_type(&self, input: DataType) -> DataType {
        match self {
            ScalarFunction::Abs => input,
            ScalarFunction::Upper | ScalarFunction::Lower => DataType::Utf8,
        }
    }

    pub fn eval(&self, input: &ScalarValue) -> Result<ScalarValue> {
        if input.is_null() {
            return Ok(ScalarValue::Null);
        }
        match self {
            ScalarFunction::Abs => match input {
                ScalarValue::Int32(v) => Ok(ScalarValue::Int32(v.wrapping_abs())),
                ScalarValue::Int64(v) => Ok(ScalarValue::Int64(v.wrapping_abs())),
                ScalarValue::Float32(v) => Ok(ScalarValue::Float32(v.abs())),
                ScalarValue::Float64(v) => Ok(ScalarValue::Float64(v.abs())),
                other => Err(type_error(self, other)),
            },
            ScalarFunction::Upper => match input {
                ScalarValue::Utf8(s) => Ok(ScalarValue::Utf8(s.to_uppercase())),
                other => Err(type_error(self, other)),
            },
            ScalarFunction::Lower => match input {
                ScalarValue::Utf8(s) => Ok(ScalarValue::Utf8(s.to_lowercase())),
                other => Err(type_error(self, other)),
            },
        }
    }
}

fn type_error(function: &ScalarFunction, value: &ScalarValue) -> GraniteError {
    GraniteError::operator(
        OperatorErrorKind::TypeMismatch,
        format!("{} cannot be applied to {value}", function.name()),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    pub function: ScalarFunction,
    pub input: Box<Expression>,
}

impl fmt::Display for FunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.function.name(), self.input)
    }
}

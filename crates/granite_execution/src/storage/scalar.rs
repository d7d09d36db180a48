use super::datatype::DataType;
use granite_error::{GraniteError, OperatorErrorKind, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single owned value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Utf8(String),
}

// Floats are compared and hashed by bit pattern below, which makes the
// equivalence relation total.
impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ScalarValue::Null => {}
            ScalarValue::Int32(v) => v.hash(state),
            ScalarValue::Int64(v) => v.hash(state),
            ScalarValue::Float32(v) => v.to_bits().hash(state),
            ScalarValue::Float64(v) => v.to_bits().hash(state),
            ScalarValue::Utf8(v) => v.hash(state),
        }
    }
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Int32(_) => DataType::Int32,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float32(_) => DataType::Float32,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Utf8,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Numeric value as f64, if this is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int32(v) => Some(*v as f64),
            ScalarValue::Int64(v) => Some(*v as f64),
            ScalarValue::Float32(v) => Some(*v as f64),
            ScalarValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int32(v) => Some(*v as i64),
            ScalarValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Non-null, non-zero. Predicates evaluate to Int32 0/1, so this is the
    /// truth test applied to them.
    pub fn is_truthy(&self) -> bool {
        match self {
            ScalarValue::Null => false,
            ScalarValue::Int32(v) => *v != 0,
            ScalarValue::Int64(v) => *v != 0,
            ScalarValue::Float32(v) => *v != 0.0,
            ScalarValue::Float64(v) => *v != 0.0,
            ScalarValue::Utf8(v) => !v.is_empty(),
        }
    }

    /// Total order used by sorting, indexes and min/max aggregation: NULL
    /// sorts first, numerics compare by value across widths, strings
    /// lexicographically. Values of unrelated types order by type tag, which
    /// never happens within a well-typed column.
    pub fn total_cmp(&self, other: &ScalarValue) -> Ordering {
        use ScalarValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Utf8(a), Utf8(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => type_rank(a).cmp(&type_rank(b)),
            },
        }
    }

    /// Cast to a column's declared type, used when inserting rows.
    pub fn cast_to(&self, data_type: DataType) -> Result<ScalarValue> {
        use ScalarValue::*;
        if self.data_type() == data_type || self.is_null() {
            return Ok(self.clone());
        }
        let out = match (self, data_type) {
            (v, DataType::Int32) => v
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .map(Int32),
            (v, DataType::Int64) => v.as_i64().map(Int64),
            (v, DataType::Float32) => v.as_f64().map(|f| Float32(f as f32)),
            (v, DataType::Float64) => v.as_f64().map(Float64),
            _ => None,
        };
        out.ok_or_else(|| {
            GraniteError::operator(
                OperatorErrorKind::TypeMismatch,
                format!("Cannot cast {self} to {data_type}"),
            )
        })
    }

    pub fn add(&self, other: &ScalarValue) -> Result<ScalarValue> {
        numeric_binary(self, other, "add", i64::checked_add, i32::checked_add, |a, b| a + b)
    }

    pub fn sub(&self, other: &ScalarValue) -> Result<ScalarValue> {
        numeric_binary(self, other, "subtract", i64::checked_sub, i32::checked_sub, |a, b| a - b)
    }

    pub fn mul(&self, other: &ScalarValue) -> Result<ScalarValue> {
        numeric_binary(self, other, "multiply", i64::checked_mul, i32::checked_mul, |a, b| a * b)
    }

    pub fn div(&self, other: &ScalarValue) -> Result<ScalarValue> {
        if other.is_null() || self.is_null() {
            return Ok(ScalarValue::Null);
        }
        if other.as_f64() == Some(0.0) {
            // SQL semantics: division by zero yields NULL rather than an error.
            return Ok(ScalarValue::Null);
        }
        numeric_binary(self, other, "divide", i64::checked_div, i32::checked_div, |a, b| a / b)
    }

    pub fn rem(&self, other: &ScalarValue) -> Result<ScalarValue> {
        if other.is_null() || self.is_null() || other.as_f64() == Some(0.0) {
            return Ok(ScalarValue::Null);
        }
        numeric_binary(self, other, "mod", i64::checked_rem, i32::checked_rem, |a, b| a % b)
    }

    pub fn negate(&self) -> Result<ScalarValue> {
        match self {
            ScalarValue::Null => Ok(ScalarValue::Null),
            ScalarValue::Int32(v) => v
                .checked_neg()
                .map(ScalarValue::Int32)
                .ok_or_else(overflow_error),
            ScalarValue::Int64(v) => v
                .checked_neg()
                .map(ScalarValue::Int64)
                .ok_or_else(overflow_error),
            ScalarValue::Float32(v) => Ok(ScalarValue::Float32(-v)),
            ScalarValue::Float64(v) => Ok(ScalarValue::Float64(-v)),
            ScalarValue::Utf8(_) => Err(GraniteError::operator(
                OperatorErrorKind::TypeMismatch,
                "Cannot negate a string",
            )),
        }
    }
}

fn type_rank(v: &ScalarValue) -> u8 {
    match v {
        ScalarValue::Null => 0,
        ScalarValue::Int32(_) => 1,
        ScalarValue::Int64(_) => 2,
        ScalarValue::Float32(_) => 3,
        ScalarValue::Float64(_) => 4,
        ScalarValue::Utf8(_) => 5,
    }
}

fn overflow_error() -> GraniteError {
    GraniteError::operator(OperatorErrorKind::Overflow, "Integer overflow")
}

fn numeric_binary(
    left: &ScalarValue,
    right: &ScalarValue,
    what: &str,
    i64_op: fn(i64, i64) -> Option<i64>,
    i32_op: fn(i32, i32) -> Option<i32>,
    f64_op: fn(f64, f64) -> f64,
) -> Result<ScalarValue> {
    use ScalarValue::*;
    if left.is_null() || right.is_null() {
        return Ok(Null);
    }
    let common = DataType::common_type(left.data_type(), right.data_type()).map_err(|_| {
        GraniteError::operator(
            OperatorErrorKind::TypeMismatch,
            format!("Cannot {what} {left} and {right}"),
        )
    })?;
    match common {
        DataType::Int32 => {
            let (a, b) = match (left, right) {
                (Int32(a), Int32(b)) => (*a, *b),
                _ => unreachable!("common type int32 from non-int32 operands"),
            };
            i32_op(a, b).map(Int32).ok_or_else(overflow_error)
        }
        DataType::Int64 => {
            let (a, b) = (left.as_i64().unwrap(), right.as_i64().unwrap());
            i64_op(a, b).map(Int64).ok_or_else(overflow_error)
        }
        DataType::Float32 => {
            let out = f64_op(left.as_f64().unwrap(), right.as_f64().unwrap());
            Ok(Float32(out as f32))
        }
        DataType::Float64 => {
            let out = f64_op(left.as_f64().unwrap(), right.as_f64().unwrap());
            Ok(Float64(out))
        }
        _ => Err(GraniteError::operator(
            OperatorErrorKind::TypeMismatch,
            format!("Cannot {what} {left} and {right}"),
        )),
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Int32(v) => write!(f, "{v}"),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            ScalarValue::Float32(v) => write!(f, "{v}"),
            ScalarValue::Float64(v) => write!(f, "{v}"),
            ScalarValue::Utf8(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int32(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<f32> for ScalarValue {
    fn from(value: f32) -> Self {
        ScalarValue::Float32(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_promotes() {
        let out = ScalarValue::Int32(3).add(&ScalarValue::Int64(4)).unwrap();
        assert_eq!(ScalarValue::Int64(7), out);

        let out = ScalarValue::Int32(3).mul(&ScalarValue::Float64(0.5)).unwrap();
        assert_eq!(ScalarValue::Float64(1.5), out);
    }

    #[test]
    fn overflow_is_an_error() {
        let err = ScalarValue::Int32(i32::MAX).add(&ScalarValue::Int32(1)).unwrap_err();
        assert_eq!(
            granite_error::ErrorKind::Operator(OperatorErrorKind::Overflow),
            err.kind()
        );
    }

    #[test]
    fn division_by_zero_is_null() {
        let out = ScalarValue::Int32(1).div(&ScalarValue::Int32(0)).unwrap();
        assert_eq!(ScalarValue::Null, out);
    }

    #[test]
    fn total_order() {
        let mut values = vec![
            ScalarValue::Int32(5),
            ScalarValue::Null,
            ScalarValue::Int32(-1),
            ScalarValue::Int32(3),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            vec![
                ScalarValue::Null,
                ScalarValue::Int32(-1),
                ScalarValue::Int32(3),
                ScalarValue::Int32(5)
            ],
            values
        );
    }
}

use granite_error::{GraniteError, Result, TranslationErrorKind};
use std::fmt;

/// The closed set of value types the engine computes over.
///
/// There is no boolean type; predicates evaluate to `Int32` 0/1 (or NULL), as
/// is visible in the `data_type` of comparison and conjunction expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int32 | DataType::Int64 | DataType::Float32 | DataType::Float64
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64)
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// The type both operands of a binary expression promote to.
    ///
    /// NULL promotes to anything; numerics widen along
    /// Int32 < Int64 < Float32 < Float64; strings only pair with strings.
    pub fn common_type(left: DataType, right: DataType) -> Result<DataType> {
        use DataType::*;
        Ok(match (left, right) {
            (Null, other) | (other, Null) => other,
            (Utf8, Utf8) => Utf8,
            (a, b) if a == b => a,
            (a, b) if a.is_numeric() && b.is_numeric() => {
                fn rank(t: DataType) -> u8 {
                    match t {
                        Int32 => 0,
                        Int64 => 1,
                        Float32 => 2,
                        Float64 => 3,
                        _ => unreachable!("non-numeric rank"),
                    }
                }
                if rank(a) >= rank(b) {
                    a
                } else {
                    b
                }
            }
            (a, b) => {
                return Err(GraniteError::translation(
                    TranslationErrorKind::TypeMismatch,
                    format!("No common type for {a} and {b}"),
                ))
            }
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "null"),
            DataType::Int32 => write!(f, "int32"),
            DataType::Int64 => write!(f, "int64"),
            DataType::Float32 => write!(f, "float32"),
            DataType::Float64 => write!(f, "float64"),
            DataType::Utf8 => write!(f, "utf8"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_promotion() {
        assert_eq!(
            DataType::Int64,
            DataType::common_type(DataType::Int32, DataType::Int64).unwrap()
        );
        assert_eq!(
            DataType::Float64,
            DataType::common_type(DataType::Float64, DataType::Int32).unwrap()
        );
        assert_eq!(
            DataType::Utf8,
            DataType::common_type(DataType::Null, DataType::Utf8).unwrap()
        );
        assert!(DataType::common_type(DataType::Utf8, DataType::Int32).is_err());
    }
}

use super::scalar::ScalarValue;

/// One column's values within a chunk.
///
/// Chunks start out with value segments; the [chunk encoder] turns full
/// chunks into dictionary or run-length segments. Encoded segments are
/// immutable.
///
/// [chunk encoder]: super::encoder
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Value(ValueSegment),
    Dictionary(DictionarySegment),
    RunLength(RunLengthSegment),
}

impl Segment {
    pub fn len(&self) -> usize {
        match self {
            Segment::Value(s) => s.values.len(),
            Segment::Dictionary(s) => s.codes.len(),
            Segment::RunLength(s) => s.end_offsets.last().copied().unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value(&self, offset: usize) -> ScalarValue {
        match self {
            Segment::Value(s) => s.values[offset].clone(),
            Segment::Dictionary(s) => s.value(offset),
            Segment::RunLength(s) => s.value(offset),
        }
    }

    pub fn is_encoded(&self) -> bool {
        !matches!(self, Segment::Value(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSegment {
    pub values: Vec<ScalarValue>,
}

impl ValueSegment {
    pub fn with_capacity(capacity: usize) -> ValueSegment {
        ValueSegment {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, value: ScalarValue) {
        self.values.push(value);
    }
}

/// Sorted distinct non-null dictionary plus one code per row. The code
/// `dictionary.len()` stands for NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionarySegment {
    pub dictionary: Vec<ScalarValue>,
    pub codes: Vec<u32>,
}

impl DictionarySegment {
    pub fn null_code(&self) -> u32 {
        self.dictionary.len() as u32
    }

    pub fn value(&self, offset: usize) -> ScalarValue {
        let code = self.codes[offset];
        if code == self.null_code() {
            ScalarValue::Null
        } else {
            self.dictionary[code as usize].clone()
        }
    }

    /// Index of the first dictionary entry `>= value`.
    pub fn lower_bound(&self, value: &ScalarValue) -> usize {
        self.dictionary
            .partition_point(|entry| entry.total_cmp(value).is_lt())
    }

    /// Index of the first dictionary entry `> value`.
    pub fn upper_bound(&self, value: &ScalarValue) -> usize {
        self.dictionary
            .partition_point(|entry| entry.total_cmp(value).is_le())
    }
}

/// Runs of identical values: `values[i]` spans rows
/// `end_offsets[i-1]..end_offsets[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLengthSegment {
    pub values: Vec<ScalarValue>,
    pub end_offsets: Vec<usize>,
}

impl RunLengthSegment {
    pub fn value(&self, offset: usize) -> ScalarValue {
        let run = self.end_offsets.partition_point(|end| *end <= offset);
        self.values[run].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_lookup() {
        let segment = DictionarySegment {
            dictionary: vec![ScalarValue::Int32(3), ScalarValue::Int32(7)],
            codes: vec![1, 0, 2, 0],
        };
        assert_eq!(ScalarValue::Int32(7), segment.value(0));
        assert_eq!(ScalarValue::Int32(3), segment.value(1));
        assert_eq!(ScalarValue::Null, segment.value(2));

        assert_eq!(0, segment.lower_bound(&ScalarValue::Int32(2)));
        assert_eq!(1, segment.lower_bound(&ScalarValue::Int32(4)));
        assert_eq!(1, segment.upper_bound(&ScalarValue::Int32(3)));
        assert_eq!(2, segment.upper_bound(&ScalarValue::Int32(9)));
    }

    #[test]
    fn run_length_lookup() {
        let segment = RunLengthSegment {
            values: vec![ScalarValue::Int32(1), ScalarValue::Int32(2)],
            end_offsets: vec![3, 5],
        };
        assert_eq!(5, Segment::RunLength(segment.clone()).len());
        assert_eq!(ScalarValue::Int32(1), segment.value(2));
        assert_eq!(ScalarValue::Int32(2), segment.value(3));
    }
}

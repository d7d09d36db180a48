use super::chunk::Chunk;
use super::scalar::ScalarValue;
use super::segment::{DictionarySegment, RunLengthSegment, Segment};
use super::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingKind {
    Dictionary,
    RunLength,
}

/// Rewrites value segments of full chunks into encoded, immutable forms.
#[derive(Debug)]
pub struct ChunkEncoder;

impl ChunkEncoder {
    /// Encode every full chunk of the table with the given encoding. The
    /// chunk currently accepting inserts is left alone.
    pub fn encode_all_chunks(table: &Table, kind: EncodingKind) {
        for chunk in table.chunks() {
            if chunk.is_full() {
                Self::encode_chunk(&chunk, kind);
            }
        }
    }

    pub fn encode_chunk(chunk: &Chunk, kind: EncodingKind) {
        for column in 0..chunk.num_columns() {
            let mut segment = chunk.segment(column).write();
            if segment.is_encoded() {
                continue;
            }
            let values: Vec<ScalarValue> = (0..segment.len()).map(|i| segment.value(i)).collect();
            *segment = match kind {
                EncodingKind::Dictionary => Segment::Dictionary(encode_dictionary(&values)),
                EncodingKind::RunLength => Segment::RunLength(encode_run_length(&values)),
            };
        }
    }
}

fn encode_dictionary(values: &[ScalarValue]) -> DictionarySegment {
    let mut dictionary: Vec<ScalarValue> = values.iter().filter(|v| !v.is_null()).cloned().collect();
    dictionary.sort_by(|a, b| a.total_cmp(b));
    dictionary.dedup();

    let null_code = dictionary.len() as u32;
    let codes = values
        .iter()
        .map(|v| {
            if v.is_null() {
                null_code
            } else {
                dictionary
                    .binary_search_by(|entry| entry.total_cmp(v))
                    .expect("value in dictionary") as u32
            }
        })
        .collect();

    DictionarySegment { dictionary, codes }
}

fn encode_run_length(values: &[ScalarValue]) -> RunLengthSegment {
    let mut out = RunLengthSegment {
        values: Vec::new(),
        end_offsets: Vec::new(),
    };
    for (offset, value) in values.iter().enumerate() {
        match out.values.last() {
            Some(last) if last == value => {
                *out.end_offsets.last_mut().expect("run exists") = offset + 1;
            }
            _ => {
                out.values.push(value.clone());
                out.end_offsets.push(offset + 1);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(raw: &[i32]) -> Vec<ScalarValue> {
        raw.iter().map(|v| ScalarValue::Int32(*v)).collect()
    }

    #[test]
    fn dictionary_round_trips() {
        let input = vec![
            ScalarValue::Int32(5),
            ScalarValue::Null,
            ScalarValue::Int32(2),
            ScalarValue::Int32(5),
        ];
        let encoded = encode_dictionary(&input);
        assert_eq!(values(&[2, 5]), encoded.dictionary);
        let decoded: Vec<ScalarValue> = (0..4).map(|i| encoded.value(i)).collect();
        assert_eq!(input, decoded);
    }

    #[test]
    fn run_length_round_trips() {
        let input = values(&[1, 1, 1, 2, 2, 1]);
        let encoded = encode_run_length(&input);
        assert_eq!(values(&[1, 2, 1]), encoded.values);
        assert_eq!(vec![3, 5, 6], encoded.end_offsets);
        let decoded: Vec<ScalarValue> = (0..6).map(|i| encoded.value(i)).collect();
        assert_eq!(input, decoded);
    }
}

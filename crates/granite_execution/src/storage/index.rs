use super::chunk::Chunk;
use super::scalar::ScalarValue;
use std::ops::Bound;

/// The index structures a table can carry. Only single-column `GroupKey`
/// indexes are eligible for index scans; `CompositeGroupKey` exists for
/// multi-column lookups and is never picked by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    GroupKey,
    CompositeGroupKey,
}

/// A table-level index: one structure per chunk that existed when the index
/// was created. Chunks appended later are not covered; scans fall back to
/// comparing values there.
#[derive(Debug)]
pub struct TableIndex {
    pub kind: IndexKind,
    pub column_ids: Vec<usize>,
    pub chunk_indexes: Vec<ChunkIndex>,
}

#[derive(Debug)]
pub enum ChunkIndex {
    GroupKey(GroupKeyIndex),
    CompositeGroupKey(CompositeGroupKeyIndex),
}

/// Dense group-key index over a single column: sorted distinct values, each
/// owning a slice of row offsets in CSR layout.
#[derive(Debug)]
pub struct GroupKeyIndex {
    values: Vec<ScalarValue>,
    offsets: Vec<u32>,
    positions: Vec<u32>,
}

impl GroupKeyIndex {
    pub fn build(chunk: &Chunk, column: usize) -> GroupKeyIndex {
        let size = chunk.size();
        let mut pairs: Vec<(ScalarValue, u32)> = (0..size)
            .map(|offset| (chunk.value(column, offset), offset as u32))
            .filter(|(value, _)| !value.is_null())
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut values = Vec::new();
        let mut offsets = vec![0u32];
        let mut positions = Vec::with_capacity(pairs.len());
        for (value, position) in pairs {
            if values.last() != Some(&value) {
                values.push(value);
                offsets.push(positions.len() as u32);
            }
            positions.push(position);
            *offsets.last_mut().expect("offset exists") = positions.len() as u32;
        }

        GroupKeyIndex {
            values,
            offsets,
            positions,
        }
    }

    fn group(&self, idx: usize) -> &[u32] {
        let start = self.offsets[idx] as usize;
        let end = self.offsets[idx + 1] as usize;
        &self.positions[start..end]
    }

    pub fn positions_equal(&self, value: &ScalarValue) -> &[u32] {
        match self.values.binary_search_by(|entry| entry.total_cmp(value)) {
            Ok(idx) => self.group(idx),
            Err(_) => &[],
        }
    }

    /// Row offsets of every value within the bounds, in value order.
    pub fn positions_between(
        &self,
        lower: Bound<&ScalarValue>,
        upper: Bound<&ScalarValue>,
    ) -> Vec<u32> {
        let start = match lower {
            Bound::Unbounded => 0,
            Bound::Included(v) => self.values.partition_point(|e| e.total_cmp(v).is_lt()),
            Bound::Excluded(v) => self.values.partition_point(|e| e.total_cmp(v).is_le()),
        };
        let end = match upper {
            Bound::Unbounded => self.values.len(),
            Bound::Included(v) => self.values.partition_point(|e| e.total_cmp(v).is_le()),
            Bound::Excluded(v) => self.values.partition_point(|e| e.total_cmp(v).is_lt()),
        };

        let mut out = Vec::new();
        for idx in start..end {
            out.extend_from_slice(self.group(idx));
        }
        out
    }
}

/// Group-key index over the concatenation of several columns; supports only
/// full-key equality lookups.
#[derive(Debug)]
pub struct CompositeGroupKeyIndex {
    keys: Vec<Vec<ScalarValue>>,
    offsets: Vec<u32>,
    positions: Vec<u32>,
}

impl CompositeGroupKeyIndex {
    pub fn build(chunk: &Chunk, columns: &[usize]) -> CompositeGroupKeyIndex {
        let size = chunk.size();
        let mut pairs: Vec<(Vec<ScalarValue>, u32)> = (0..size)
            .map(|offset| {
                let key: Vec<ScalarValue> =
                    columns.iter().map(|c| chunk.value(*c, offset)).collect();
                (key, offset as u32)
            })
            .collect();
        pairs.sort_by(|a, b| compare_keys(&a.0, &b.0).then(a.1.cmp(&b.1)));

        let mut keys: Vec<Vec<ScalarValue>> = Vec::new();
        let mut offsets = vec![0u32];
        let mut positions = Vec::with_capacity(pairs.len());
        for (key, position) in pairs {
            if keys.last() != Some(&key) {
                keys.push(key);
                offsets.push(positions.len() as u32);
            }
            positions.push(position);
            *offsets.last_mut().expect("offset exists") = positions.len() as u32;
        }

        CompositeGroupKeyIndex {
            keys,
            offsets,
            positions,
        }
    }

    pub fn positions_equal(&self, key: &[ScalarValue]) -> &[u32] {
        match self.keys.binary_search_by(|entry| compare_keys(entry, key)) {
            Ok(idx) => {
                let start = self.offsets[idx] as usize;
                let end = self.offsets[idx + 1] as usize;
                &self.positions[start..end]
            }
            Err(_) => &[],
        }
    }
}

fn compare_keys(a: &[ScalarValue], b: &[ScalarValue]) -> std::cmp::Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.total_cmp(y);
        if !ord.is_eq() {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with(values: &[i32]) -> Chunk {
        let chunk = Chunk::new(1, values.len().max(1));
        for v in values {
            chunk.append_row(vec![ScalarValue::Int32(*v)], 0);
        }
        chunk
    }

    #[test]
    fn group_key_equality() {
        let chunk = chunk_with(&[5, 3, 5, 1]);
        let index = GroupKeyIndex::build(&chunk, 0);
        assert_eq!(&[0, 2], index.positions_equal(&ScalarValue::Int32(5)));
        assert_eq!(&[3], index.positions_equal(&ScalarValue::Int32(1)));
        assert!(index.positions_equal(&ScalarValue::Int32(9)).is_empty());
    }

    #[test]
    fn group_key_range() {
        let chunk = chunk_with(&[10, 40, 20, 30]);
        let index = GroupKeyIndex::build(&chunk, 0);

        let hits = index.positions_between(
            Bound::Excluded(&ScalarValue::Int32(10)),
            Bound::Unbounded,
        );
        assert_eq!(vec![2, 3, 1], hits);

        let hits = index.positions_between(
            Bound::Included(&ScalarValue::Int32(20)),
            Bound::Included(&ScalarValue::Int32(30)),
        );
        assert_eq!(vec![2, 3], hits);
    }

    #[test]
    fn composite_key_equality() {
        let chunk = Chunk::new(2, 4);
        for (a, b) in [(1, 10), (1, 20), (2, 10), (1, 10)] {
            chunk.append_row(vec![ScalarValue::Int32(a), ScalarValue::Int32(b)], 0);
        }
        let index = CompositeGroupKeyIndex::build(&chunk, &[0, 1]);
        assert_eq!(
            &[0, 3],
            index.positions_equal(&[ScalarValue::Int32(1), ScalarValue::Int32(10)])
        );
        assert!(index
            .positions_equal(&[ScalarValue::Int32(2), ScalarValue::Int32(20)])
            .is_empty());
    }
}

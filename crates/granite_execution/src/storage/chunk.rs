use super::mvcc::MvccColumns;
use super::segment::{Segment, ValueSegment};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A horizontal partition of a table with fixed capacity.
///
/// Rows are appended under the owning table's insert lock; `size` is bumped
/// with release ordering only after the segment values are written, so
/// readers loading it with acquire never observe half-written rows. The MVCC
/// columns are preallocated to the capacity.
#[derive(Debug)]
pub struct Chunk {
    columns: Vec<RwLock<Segment>>,
    mvcc: MvccColumns,
    size: AtomicUsize,
    capacity: usize,
}

impl Chunk {
    pub fn new(num_columns: usize, capacity: usize) -> Chunk {
        Chunk {
            columns: (0..num_columns)
                .map(|_| RwLock::new(Segment::Value(ValueSegment::with_capacity(capacity))))
                .collect(),
            mvcc: MvccColumns::with_capacity(capacity),
            size: AtomicUsize::new(0),
            capacity,
        }
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.size() == self.capacity
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn segment(&self, column: usize) -> &RwLock<Segment> {
        &self.columns[column]
    }

    pub fn value(&self, column: usize, offset: usize) -> super::scalar::ScalarValue {
        self.columns[column].read().value(offset)
    }

    pub fn mvcc(&self) -> &MvccColumns {
        &self.mvcc
    }

    /// Append one row. Caller must hold the table's insert lock and must have
    /// checked capacity; returns the row's offset.
    pub(super) fn append_row(
        &self,
        values: Vec<super::scalar::ScalarValue>,
        tid: super::mvcc::TransactionId,
    ) -> usize {
        let offset = self.size();
        debug_assert!(offset < self.capacity, "chunk overfull");
        debug_assert_eq!(values.len(), self.columns.len());

        for (column, value) in self.columns.iter().zip(values) {
            let mut segment = column.write();
            match &mut *segment {
                Segment::Value(s) => s.append(value),
                _ => panic!("append to encoded segment"),
            }
        }

        self.mvcc.set_tid(offset, tid);
        self.size.store(offset + 1, Ordering::Release);
        offset
    }
}

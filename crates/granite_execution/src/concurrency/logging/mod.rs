//! Write-ahead logging seam. The engine ships with a sink that discards
//! everything; durability is explicitly out of scope, but the call sites in
//! the write path and the commit path are real.

use crate::storage::mvcc::TransactionId;
use crate::storage::{RowId, ScalarValue};

pub trait Logger: std::fmt::Debug + Send + Sync {
    /// A transaction committed.
    fn commit(&self, tid: TransactionId);

    /// A row was inserted.
    fn value(&self, tid: TransactionId, table_name: &str, row: RowId, values: &[ScalarValue]);

    /// A row was invalidated (deleted, or replaced by an update).
    fn invalidate(&self, tid: TransactionId, table_name: &str, row: RowId);
}

/// Discards every record.
#[derive(Debug, Default)]
pub struct SinkLogger;

impl Logger for SinkLogger {
    fn commit(&self, _tid: TransactionId) {}

    fn value(&self, _tid: TransactionId, _table_name: &str, _row: RowId, _values: &[ScalarValue]) {}

    fn invalidate(&self, _tid: TransactionId, _table_name: &str, _row: RowId) {}
}

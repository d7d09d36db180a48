use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::{Expression, TableRef};
use crate::storage::DataType;

/// Literal rows, the plan below `INSERT ... VALUES` and `SELECT` without a
/// FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalValues {
    pub table_ref: TableRef,
    pub rows: Vec<Vec<Expression>>,
}

impl LogicalValues {
    pub fn make(table_ref: TableRef, rows: Vec<Vec<Expression>>) -> NodeRef {
        LogicalNode::make(LogicalNodeKind::Values(LogicalValues { table_ref, rows }))
    }

    pub fn num_columns(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    pub fn column_type(&self, column: usize) -> DataType {
        let mut out = DataType::Null;
        for row in &self.rows {
            out = DataType::common_type(out, row[column].data_type()).unwrap_or(DataType::Null);
        }
        out
    }
}

impl Explainable for LogicalValues {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Values")
            .with_value("rows", self.rows.len())
            .with_value("columns", self.num_columns())
    }
}

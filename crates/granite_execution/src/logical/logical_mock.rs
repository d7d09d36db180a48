use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::TableRef;
use crate::statistics::TableStatistics;
use crate::storage::ColumnDefinition;
use std::sync::Arc;

/// Leaf with fabricated statistics, no backing data. Only used to exercise
/// optimizer rules.
#[derive(Debug, Clone)]
pub struct LogicalMock {
    pub table_ref: TableRef,
    pub columns: Vec<ColumnDefinition>,
    pub statistics: Arc<TableStatistics>,
}

impl LogicalMock {
    pub fn make(
        table_ref: TableRef,
        columns: Vec<ColumnDefinition>,
        statistics: Arc<TableStatistics>,
    ) -> NodeRef {
        LogicalNode::make(LogicalNodeKind::Mock(LogicalMock {
            table_ref,
            columns,
            statistics,
        }))
    }
}

impl PartialEq for LogicalMock {
    fn eq(&self, other: &Self) -> bool {
        self.table_ref == other.table_ref
            && self.columns == other.columns
            && self.statistics == other.statistics
    }
}

impl Explainable for LogicalMock {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Mock")
            .with_value("ref", self.table_ref)
            .with_value("rows", self.statistics.row_count)
    }
}

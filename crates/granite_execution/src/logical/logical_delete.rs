use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::storage::Table;
use std::sync::Arc;

/// Invalidate the rows selected by the child plan. The child must preserve
/// row identity (reference tables), which scans and validation do.
#[derive(Debug, Clone)]
pub struct LogicalDelete {
    pub table_name: String,
    pub table: Arc<Table>,
}

impl LogicalDelete {
    pub fn make(table_name: impl Into<String>, table: Arc<Table>, input: NodeRef) -> NodeRef {
        LogicalNode::make_with_inputs(
            LogicalNodeKind::Delete(LogicalDelete {
                table_name: table_name.into(),
                table,
            }),
            Some(input),
            None,
        )
    }
}

impl PartialEq for LogicalDelete {
    fn eq(&self, other: &Self) -> bool {
        self.table_name == other.table_name
    }
}

impl Explainable for LogicalDelete {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Delete").with_value("table", &self.table_name)
    }
}

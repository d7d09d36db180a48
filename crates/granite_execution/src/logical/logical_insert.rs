use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::storage::Table;
use std::sync::Arc;

/// Insert the child's rows into a stored table. `columns` maps each child
/// column to a target column index; unmentioned columns are filled with NULL.
#[derive(Debug, Clone)]
pub struct LogicalInsert {
    pub table_name: String,
    pub table: Arc<Table>,
    pub columns: Vec<usize>,
}

impl LogicalInsert {
    pub fn make(
        table_name: impl Into<String>,
        table: Arc<Table>,
        columns: Vec<usize>,
        input: NodeRef,
    ) -> NodeRef {
        LogicalNode::make_with_inputs(
            LogicalNodeKind::Insert(LogicalInsert {
                table_name: table_name.into(),
                table,
                columns,
            }),
            Some(input),
            None,
        )
    }
}

impl PartialEq for LogicalInsert {
    fn eq(&self, other: &Self) -> bool {
        self.table_name == other.table_name && self.columns == other.columns
    }
}

impl Explainable for LogicalInsert {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Insert").with_value("table", &self.table_name)
    }
}

use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;
use crate::storage::Table;
use std::sync::Arc;

/// Update rows selected by the child plan. Executed as delete plus re-insert
/// of the modified row versions.
#[derive(Debug, Clone)]
pub struct LogicalUpdate {
    pub table_name: String,
    pub table: Arc<Table>,
    /// (target column index, new value expression)
    pub assignments: Vec<(usize, Expression)>,
}

impl LogicalUpdate {
    pub fn make(
        table_name: impl Into<String>,
        table: Arc<Table>,
        assignments: Vec<(usize, Expression)>,
        input: NodeRef,
    ) -> NodeRef {
        LogicalNode::make_with_inputs(
            LogicalNodeKind::Update(LogicalUpdate {
                table_name: table_name.into(),
                table,
                assignments,
            }),
            Some(input),
            None,
        )
    }
}

impl PartialEq for LogicalUpdate {
    fn eq(&self, other: &Self) -> bool {
        self.table_name == other.table_name && self.assignments == other.assignments
    }
}

impl Explainable for LogicalUpdate {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Update")
            .with_value("table", &self.table_name)
            .with_value("assignments", self.assignments.len())
    }
}

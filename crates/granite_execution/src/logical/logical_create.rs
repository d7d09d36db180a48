use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::storage::ColumnDefinition;

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalCreateTable {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
    pub if_not_exists: bool,
}

impl LogicalCreateTable {
    pub fn make(
        table_name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
        if_not_exists: bool,
    ) -> NodeRef {
        LogicalNode::make(LogicalNodeKind::CreateTable(LogicalCreateTable {
            table_name: table_name.into(),
            columns,
            if_not_exists,
        }))
    }
}

impl Explainable for LogicalCreateTable {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("CreateTable")
            .with_value("table", &self.table_name)
            .with_value("columns", self.columns.len())
    }
}

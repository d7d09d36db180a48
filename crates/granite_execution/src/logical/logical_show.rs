use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::TableRef;
use crate::storage::Table;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalShowTables {
    pub table_ref: TableRef,
}

impl LogicalShowTables {
    pub fn make(table_ref: TableRef) -> NodeRef {
        LogicalNode::make(LogicalNodeKind::ShowTables(LogicalShowTables { table_ref }))
    }
}

impl Explainable for LogicalShowTables {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("ShowTables")
    }
}

/// `SHOW COLUMNS FROM t`: one output row per column of the table.
#[derive(Debug, Clone)]
pub struct LogicalShowColumns {
    pub table_ref: TableRef,
    pub table_name: String,
    pub table: Arc<Table>,
}

impl LogicalShowColumns {
    pub fn make(table_ref: TableRef, table_name: impl Into<String>, table: Arc<Table>) -> NodeRef {
        LogicalNode::make(LogicalNodeKind::ShowColumns(LogicalShowColumns {
            table_ref,
            table_name: table_name.into(),
            table,
        }))
    }
}

impl PartialEq for LogicalShowColumns {
    fn eq(&self, other: &Self) -> bool {
        self.table_ref == other.table_ref && self.table_name == other.table_name
    }
}

impl Explainable for LogicalShowColumns {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("ShowColumns").with_value("table", &self.table_name)
    }
}

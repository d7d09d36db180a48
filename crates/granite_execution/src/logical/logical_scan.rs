use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::TableRef;
use crate::storage::Table;
use std::sync::Arc;

/// Leaf over a stored table.
#[derive(Debug, Clone)]
pub struct LogicalScan {
    pub table_ref: TableRef,
    pub table_name: String,
    pub table: Arc<Table>,
}

impl LogicalScan {
    pub fn make(table_ref: TableRef, table_name: impl Into<String>, table: Arc<Table>) -> NodeRef {
        LogicalNode::make(LogicalNodeKind::Scan(LogicalScan {
            table_ref,
            table_name: table_name.into(),
            table,
        }))
    }
}

impl PartialEq for LogicalScan {
    fn eq(&self, other: &Self) -> bool {
        self.table_ref == other.table_ref && self.table_name == other.table_name
    }
}

impl Explainable for LogicalScan {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Scan")
            .with_value("table", &self.table_name)
            .with_value("ref", self.table_ref)
    }
}

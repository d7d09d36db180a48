use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalDropTable {
    pub table_name: String,
    pub if_exists: bool,
}

impl LogicalDropTable {
    pub fn make(table_name: impl Into<String>, if_exists: bool) -> NodeRef {
        LogicalNode::make(LogicalNodeKind::DropTable(LogicalDropTable {
            table_name: table_name.into(),
            if_exists,
        }))
    }
}

impl Explainable for LogicalDropTable {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("DropTable").with_value("table", &self.table_name)
    }
}

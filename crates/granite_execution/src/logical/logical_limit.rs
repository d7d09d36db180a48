use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLimit {
    pub limit: usize,
    pub offset: usize,
}

impl LogicalLimit {
    pub fn make(limit: usize, offset: usize, input: NodeRef) -> NodeRef {
        LogicalNode::make_with_inputs(
            LogicalNodeKind::Limit(LogicalLimit { limit, offset }),
            Some(input),
            None,
        )
    }
}

impl Explainable for LogicalLimit {
    fn explain_entry(&self) -> ExplainEntry {
        let mut entry = ExplainEntry::new("Limit").with_value("limit", self.limit);
        if self.offset > 0 {
            entry = entry.with_value("offset", self.offset);
        }
        entry
    }
}

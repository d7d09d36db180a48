use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionMode {
    All,
    /// Set semantics: duplicates across both inputs collapse.
    Distinct,
}

impl fmt::Display for UnionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnionMode::All => write!(f, "All"),
            UnionMode::Distinct => write!(f, "Distinct"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalUnion {
    pub mode: UnionMode,
}

impl LogicalUnion {
    pub fn make(mode: UnionMode, left: NodeRef, right: NodeRef) -> NodeRef {
        LogicalNode::make_with_inputs(
            LogicalNodeKind::Union(LogicalUnion { mode }),
            Some(left),
            Some(right),
        )
    }
}

impl Explainable for LogicalUnion {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Union").with_value("mode", self.mode)
    }
}

use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};

/// Sentinel above the real plan root while the optimizer runs, so rules can
/// replace the topmost node through the ordinary rewiring machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalRoot;

impl LogicalRoot {
    pub fn make(input: NodeRef) -> NodeRef {
        LogicalNode::make_with_inputs(LogicalNodeKind::Root(LogicalRoot), Some(input), None)
    }
}

impl Explainable for LogicalRoot {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Root")
    }
}

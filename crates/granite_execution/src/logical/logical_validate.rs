use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};

/// MVCC visibility marker. Inserted directly above every table access when
/// the translator runs with validation enabled; the physical counterpart
/// filters rows by the transaction's snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalValidate;

impl LogicalValidate {
    pub fn make(input: NodeRef) -> NodeRef {
        LogicalNode::make_with_inputs(
            LogicalNodeKind::Validate(LogicalValidate),
            Some(input),
            None,
        )
    }
}

impl Explainable for LogicalValidate {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Validate")
    }
}

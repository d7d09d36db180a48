use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;

/// Grouping plus aggregation; output columns are the group-by expressions
/// followed by the aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalAggregate {
    pub group_by: Vec<Expression>,
    pub aggregates: Vec<Expression>,
}

impl LogicalAggregate {
    pub fn make(group_by: Vec<Expression>, aggregates: Vec<Expression>, input: NodeRef) -> NodeRef {
        LogicalNode::make_with_inputs(
            LogicalNodeKind::Aggregate(LogicalAggregate {
                group_by,
                aggregates,
            }),
            Some(input),
            None,
        )
    }
}

impl Explainable for LogicalAggregate {
    fn explain_entry(&self) -> ExplainEntry {
        let groups = self
            .group_by
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let aggregates = self
            .aggregates
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        ExplainEntry::new("Aggregate")
            .with_value("group_by", groups)
            .with_value("aggregates", aggregates)
    }
}

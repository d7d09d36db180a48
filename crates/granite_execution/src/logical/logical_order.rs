use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;

#[derive(Debug, Clone, PartialEq)]
pub struct SortDefinition {
    pub expression: Expression,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalOrder {
    pub order_by: Vec<SortDefinition>,
}

impl LogicalOrder {
    pub fn make(order_by: Vec<SortDefinition>, input: NodeRef) -> NodeRef {
        LogicalNode::make_with_inputs(
            LogicalNodeKind::Order(LogicalOrder { order_by }),
            Some(input),
            None,
        )
    }
}

impl Explainable for LogicalOrder {
    fn explain_entry(&self) -> ExplainEntry {
        let list = self
            .order_by
            .iter()
            .map(|d| {
                format!(
                    "{} {}",
                    d.expression,
                    if d.descending { "DESC" } else { "ASC" }
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        ExplainEntry::new("Order").with_value("order_by", list)
    }
}

use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Semi,
    Anti,
}

impl JoinType {
    /// Semi and anti joins only emit left-side columns.
    pub fn emits_right_columns(&self) -> bool {
        !matches!(self, JoinType::Semi | JoinType::Anti)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "Inner"),
            JoinType::Left => write!(f, "Left"),
            JoinType::Right => write!(f, "Right"),
            JoinType::Full => write!(f, "Full"),
            JoinType::Cross => write!(f, "Cross"),
            JoinType::Semi => write!(f, "Semi"),
            JoinType::Anti => write!(f, "Anti"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalJoin {
    pub join_type: JoinType,
    /// Absent for cross joins.
    pub predicate: Option<Expression>,
}

impl LogicalJoin {
    pub fn make(
        join_type: JoinType,
        predicate: Option<Expression>,
        left: NodeRef,
        right: NodeRef,
    ) -> NodeRef {
        debug_assert!(
            join_type != JoinType::Cross || predicate.is_none(),
            "cross join with predicate"
        );
        LogicalNode::make_with_inputs(
            LogicalNodeKind::Join(LogicalJoin {
                join_type,
                predicate,
            }),
            Some(left),
            Some(right),
        )
    }
}

impl Explainable for LogicalJoin {
    fn explain_entry(&self) -> ExplainEntry {
        let mut entry = ExplainEntry::new("Join").with_value("type", self.join_type);
        if let Some(predicate) = &self.predicate {
            entry = entry.with_value("predicate", predicate);
        }
        entry
    }
}

use super::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalProject {
    pub expressions: Vec<Expression>,
    /// Output names; `None` falls back to the expression's column name.
    pub aliases: Vec<Option<String>>,
}

impl LogicalProject {
    pub fn make(expressions: Vec<Expression>, input: NodeRef) -> NodeRef {
        let aliases = vec![None; expressions.len()];
        Self::make_with_aliases(expressions, aliases, input)
    }

    pub fn make_with_aliases(
        expressions: Vec<Expression>,
        aliases: Vec<Option<String>>,
        input: NodeRef,
    ) -> NodeRef {
        debug_assert_eq!(expressions.len(), aliases.len());
        LogicalNode::make_with_inputs(
            LogicalNodeKind::Project(LogicalProject {
                expressions,
                aliases,
            }),
            Some(input),
            None,
        )
    }

    pub fn output_name(&self, idx: usize) -> String {
        self.aliases[idx]
            .clone()
            .unwrap_or_else(|| self.expressions[idx].as_column_name())
    }
}

impl Explainable for LogicalProject {
    fn explain_entry(&self) -> ExplainEntry {
        let list = self
            .expressions
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        ExplainEntry::new("Project").with_value("expressions", list)
    }
}

use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::execution::evaluator::ExpressionEvaluator;
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;
use crate::storage::{ColumnDefinition, Table};
use granite_error::Result;
use std::sync::Arc;

/// Evaluates one expression per output column for every input row,
/// materializing the result.
#[derive(Debug)]
pub struct ProjectionOperator {
    pub expressions: Vec<Expression>,
    pub aliases: Vec<Option<String>>,
    pub input_columns: Vec<Expression>,
}

impl ProjectionOperator {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let input = op.left_input_table()?;
        let evaluator = ExpressionEvaluator::new(&input, &self.input_columns, op.parameters());

        let definitions = self
            .expressions
            .iter()
            .zip(&self.aliases)
            .map(|(expr, alias)| {
                ColumnDefinition::new(
                    alias.clone().unwrap_or_else(|| expr.as_column_name()),
                    expr.data_type(),
                    expr.is_nullable(),
                )
            })
            .collect();

        let mut rows = Vec::with_capacity(input.row_count());
        for row in 0..input.row_count() {
            let values = self
                .expressions
                .iter()
                .map(|expr| evaluator.evaluate(expr, &[row]))
                .collect::<Result<Vec<_>>>()?;
            rows.push(values);
        }

        let out = Table::new(definitions, input.target_chunk_size());
        out.append_rows(rows, 0)?;
        Ok(Arc::new(out))
    }

    pub(super) fn recreate(&self) -> ProjectionOperator {
        ProjectionOperator {
            expressions: self.expressions.iter().map(|e| e.deep_copy()).collect(),
            aliases: self.aliases.clone(),
            input_columns: self.input_columns.clone(),
        }
    }
}

impl Explainable for ProjectionOperator {
    fn explain_entry(&self) -> ExplainEntry {
        let list = self
            .expressions
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        ExplainEntry::new("Projection").with_value("expressions", list)
    }
}

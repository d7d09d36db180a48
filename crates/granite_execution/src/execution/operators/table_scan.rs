use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::execution::evaluator::{evaluate_all, ExpressionEvaluator};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;
use crate::storage::Table;
use granite_error::Result;
use std::sync::Arc;

/// Evaluates a predicate over every input row, emitting a reference table of
/// the rows that qualify.
#[derive(Debug)]
pub struct TableScan {
    pub predicate: Expression,
    pub input_columns: Vec<Expression>,
}

impl TableScan {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let input = op.left_input_table()?;
        let evaluator = ExpressionEvaluator::new(&input, &self.input_columns, op.parameters());

        let values = evaluate_all(&evaluator, &self.predicate, input.row_count())?;
        let positions = values
            .into_iter()
            .enumerate()
            .filter(|(_, value)| value.is_truthy())
            .map(|(row, _)| input.row_id_at(row))
            .collect();

        Ok(Arc::new(Table::new_references(input, positions)))
    }

    pub(super) fn recreate(&self) -> TableScan {
        TableScan {
            predicate: self.predicate.deep_copy(),
            input_columns: self.input_columns.clone(),
        }
    }
}

impl Explainable for TableScan {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("TableScan").with_value("predicate", &self.predicate)
    }
}

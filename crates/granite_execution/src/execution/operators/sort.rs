use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::execution::evaluator::ExpressionEvaluator;
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;
use crate::logical::SortDefinition;
use crate::storage::{ScalarValue, Table};
use granite_error::Result;
use std::cmp::Ordering;
use std::sync::Arc;

/// Full materializing sort. NULLs order first ascending, last descending.
#[derive(Debug)]
pub struct SortOperator {
    pub order_by: Vec<SortDefinition>,
    pub input_columns: Vec<Expression>,
}

impl SortOperator {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let input = op.left_input_table()?;
        let evaluator = ExpressionEvaluator::new(&input, &self.input_columns, op.parameters());

        let mut keyed: Vec<(Vec<ScalarValue>, usize)> = Vec::with_capacity(input.row_count());
        for row in 0..input.row_count() {
            let keys = self
                .order_by
                .iter()
                .map(|definition| evaluator.evaluate(&definition.expression, &[row]))
                .collect::<Result<Vec<_>>>()?;
            keyed.push((keys, row));
        }

        keyed.sort_by(|(a, _), (b, _)| {
            for (idx, definition) in self.order_by.iter().enumerate() {
                let mut ord = a[idx].total_cmp(&b[idx]);
                if definition.descending {
                    ord = ord.reverse();
                }
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let rows = keyed
            .into_iter()
            .map(|(_, row)| input.row_values(row))
            .collect();

        let out = Table::new(
            input.column_definitions().to_vec(),
            input.target_chunk_size(),
        );
        out.append_rows(rows, 0)?;
        Ok(Arc::new(out))
    }

    pub(super) fn recreate(&self) -> SortOperator {
        SortOperator {
            order_by: self
                .order_by
                .iter()
                .map(|d| SortDefinition {
                    expression: d.expression.deep_copy(),
                    descending: d.descending,
                })
                .collect(),
            input_columns: self.input_columns.clone(),
        }
    }
}

impl Explainable for SortOperator {
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
        ExplainEntry::new("Sort").with_value("order_by", list)
    }
}

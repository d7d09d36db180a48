use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::execution::evaluator::ExpressionEvaluator;
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;
use crate::storage::{ColumnDefinition, DataType, Table};
use granite_error::Result;
use std::sync::Arc;

/// Leaf materializing literal rows.
#[derive(Debug)]
pub struct ValuesOperator {
    pub rows: Vec<Vec<Expression>>,
}

impl ValuesOperator {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        // No input relations; expressions are literals, parameters and
        // uncorrelated subqueries.
        let empty = Table::new(Vec::new(), crate::storage::table::DEFAULT_TARGET_CHUNK_SIZE);
        let evaluator = ExpressionEvaluator::new(&empty, &[], op.parameters());

        let num_columns = self.rows.first().map(|r| r.len()).unwrap_or(0);
        let mut column_types = vec![DataType::Null; num_columns];
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let values = row
                .iter()
                .map(|expr| evaluator.evaluate(expr, &[0]))
                .collect::<Result<Vec<_>>>()?;
            for (idx, value) in values.iter().enumerate() {
                column_types[idx] =
                    DataType::common_type(column_types[idx], value.data_type())
                        .unwrap_or(DataType::Null);
            }
            rows.push(values);
        }

        let definitions = column_types
            .into_iter()
            .enumerate()
            .map(|(idx, data_type)| ColumnDefinition::new(format!("column{idx}"), data_type, true))
            .collect();

        let out = Table::new(definitions, crate::storage::table::DEFAULT_TARGET_CHUNK_SIZE);
        out.append_rows(rows, 0)?;
        Ok(Arc::new(out))
    }

    pub(super) fn recreate(&self) -> ValuesOperator {
        ValuesOperator {
            rows: self
                .rows
                .iter()
                .map(|row| row.iter().map(|e| e.deep_copy()).collect())
                .collect(),
        }
    }
}

impl Explainable for ValuesOperator {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Values").with_value("rows", self.rows.len())
    }
}

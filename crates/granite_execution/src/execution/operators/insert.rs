use super::{rows_affected_table, PhysicalOperator};
use crate::concurrency::TransactionContext;
use crate::explain::{Explainable, ExplainEntry};
use crate::storage::{ScalarValue, Table};
use granite_error::{GraniteError, OperatorErrorKind, Result};
use std::sync::Arc;

/// Appends the child's rows to a stored table under the executing
/// transaction; the rows stay invisible to other snapshots until commit.
#[derive(Debug, Clone)]
pub struct InsertOperator {
    pub table_name: String,
    pub table: Arc<Table>,
    /// Target column index for each child column.
    pub columns: Vec<usize>,
}

impl InsertOperator {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let ctx = ctx.ok_or_else(|| GraniteError::new("Insert requires a transaction context"))?;
        let input = op.left_input_table()?;

        let definitions = self.table.column_definitions();
        let mut rows = Vec::with_capacity(input.row_count());
        for row in 0..input.row_count() {
            let mut values = vec![ScalarValue::Null; self.table.column_count()];
            for (source, target) in self.columns.iter().enumerate() {
                values[*target] = input.value(source, row).cast_to(definitions[*target].data_type)?;
            }
            for (value, definition) in values.iter().zip(definitions) {
                if value.is_null() && !definition.nullable {
                    return Err(GraniteError::operator(
                        OperatorErrorKind::TypeMismatch,
                        format!("NULL in non-nullable column {}", definition.name),
                    ));
                }
            }
            rows.push(values);
        }

        let count = rows.len();
        let row_ids = self.table.append_rows(rows.clone(), ctx.tid())?;
        for (row_id, values) in row_ids.into_iter().zip(rows) {
            ctx.record_insert(self.table.clone(), row_id);
            ctx.logger().value(ctx.tid(), &self.table_name, row_id, &values);
        }

        rows_affected_table(count)
    }
}

impl Explainable for InsertOperator {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Insert").with_value("table", &self.table_name)
    }
}

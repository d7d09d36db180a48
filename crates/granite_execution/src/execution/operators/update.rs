use super::{rows_affected_table, PhysicalOperator};
use crate::concurrency::TransactionContext;
use crate::execution::evaluator::ExpressionEvaluator;
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;
use crate::storage::{RowId, Table};
use granite_error::{GraniteError, Result};
use std::sync::Arc;

/// Lock one row of the base table for invalidation by this transaction.
/// Failing the lock means a concurrent writer holds the row.
fn lock_row(
    base: &Arc<Table>,
    table_name: &str,
    id: RowId,
    ctx: &Arc<TransactionContext>,
) -> Result<()> {
    let chunk = base.chunk(id.chunk);
    if !chunk.mvcc().try_lock_row(id.offset as usize, ctx.tid()) {
        return Err(GraniteError::transaction_conflict(format!(
            "row in table {table_name} is locked by another transaction"
        )));
    }
    ctx.record_invalidate(base.clone(), id);
    ctx.logger().invalidate(ctx.tid(), table_name, id);
    Ok(())
}

/// Invalidates the rows referenced by the child plan.
#[derive(Debug, Clone)]
pub struct DeleteOperator {
    pub table_name: String,
}

impl DeleteOperator {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let ctx = ctx.ok_or_else(|| GraniteError::new("Delete requires a transaction context"))?;
        let input = op.left_input_table()?;
        let base = input.referenced_table().ok_or_else(|| {
            GraniteError::new("Delete input must reference a stored table")
        })?;

        for row in 0..input.row_count() {
            lock_row(&base, &self.table_name, input.row_id_at(row), ctx)?;
        }

        rows_affected_table(input.row_count())
    }
}

impl Explainable for DeleteOperator {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Delete").with_value("table", &self.table_name)
    }
}

/// Delete plus re-insert: the referenced rows are invalidated and fresh
/// versions with the assignments applied are appended.
#[derive(Debug)]
pub struct UpdateOperator {
    pub table_name: String,
    pub table: Arc<Table>,
    pub assignments: Vec<(usize, Expression)>,
    pub input_columns: Vec<Expression>,
}

impl UpdateOperator {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let ctx = ctx.ok_or_else(|| GraniteError::new("Update requires a transaction context"))?;
        let input = op.left_input_table()?;
        let base = input.referenced_table().ok_or_else(|| {
            GraniteError::new("Update input must reference a stored table")
        })?;
        let evaluator = ExpressionEvaluator::new(&input, &self.input_columns, op.parameters());
        let definitions = self.table.column_definitions();

        let mut new_rows = Vec::with_capacity(input.row_count());
        for row in 0..input.row_count() {
            lock_row(&base, &self.table_name, input.row_id_at(row), ctx)?;

            let mut values = input.row_values(row);
            for (column, expression) in &self.assignments {
                values[*column] = evaluator
                    .evaluate(expression, &[row])?
                    .cast_to(definitions[*column].data_type)?;
            }
            new_rows.push(values);
        }

        let count = new_rows.len();
        let row_ids = self.table.append_rows(new_rows.clone(), ctx.tid())?;
        for (row_id, values) in row_ids.into_iter().zip(new_rows) {
            ctx.record_insert(self.table.clone(), row_id);
            ctx.logger().value(ctx.tid(), &self.table_name, row_id, &values);
        }

        rows_affected_table(count)
    }

    pub(super) fn recreate(&self) -> UpdateOperator {
        UpdateOperator {
            table_name: self.table_name.clone(),
            table: self.table.clone(),
            assignments: self
                .assignments
                .iter()
                .map(|(column, expr)| (*column, expr.deep_copy()))
                .collect(),
            input_columns: self.input_columns.clone(),
        }
    }
}

impl Explainable for UpdateOperator {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Update")
            .with_value("table", &self.table_name)
            .with_value("assignments", self.assignments.len())
    }
}

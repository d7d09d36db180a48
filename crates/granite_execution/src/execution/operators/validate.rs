use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::explain::{Explainable, ExplainEntry};
use crate::storage::mvcc::is_row_visible;
use crate::storage::Table;
use granite_error::{GraniteError, Result};
use std::sync::Arc;

/// Filters the input down to the rows visible to the executing transaction's
/// snapshot. Emits a reference table, preserving row identity.
#[derive(Debug, Clone)]
pub struct ValidateOperator;

impl ValidateOperator {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let ctx = ctx.ok_or_else(|| {
            GraniteError::new("Validate requires a transaction context")
        })?;
        let input = op.left_input_table()?;
        let base = input.referenced_table().unwrap_or_else(|| input.clone());

        let our_tid = ctx.tid();
        let snapshot = ctx.snapshot_commit_id();

        let mut positions = Vec::new();
        for row in 0..input.row_count() {
            let id = input.row_id_at(row);
            let chunk = base.chunk(id.chunk);
            let mvcc = chunk.mvcc();
            let offset = id.offset as usize;
            if is_row_visible(
                our_tid,
                snapshot,
                mvcc.tid(offset),
                mvcc.begin_cid(offset),
                mvcc.end_cid(offset),
            ) {
                positions.push(id);
            }
        }

        Ok(Arc::new(Table::new_references(input, positions)))
    }
}

impl Explainable for ValidateOperator {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Validate")
    }
}

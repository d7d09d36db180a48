use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::explain::{Explainable, ExplainEntry};
use crate::storage::Table;
use granite_error::Result;
use std::sync::Arc;

/// Keeps `limit` rows after skipping `offset`, as a reference table.
#[derive(Debug, Clone)]
pub struct LimitOperator {
    pub limit: usize,
    pub offset: usize,
}

impl LimitOperator {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let input = op.left_input_table()?;
        let end = self.offset.saturating_add(self.limit).min(input.row_count());
        let start = self.offset.min(end);
        let positions = (start..end).map(|row| input.row_id_at(row)).collect();
        Ok(Arc::new(Table::new_references(input, positions)))
    }
}

impl Explainable for LimitOperator {
    fn explain_entry(&self) -> ExplainEntry {
        let mut entry = ExplainEntry::new("Limit").with_value("limit", self.limit);
        if self.offset > 0 {
            entry = entry.with_value("offset", self.offset);
        }
        entry
    }
}

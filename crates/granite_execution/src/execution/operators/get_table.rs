use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::explain::{Explainable, ExplainEntry};
use crate::storage::Table;
use granite_error::Result;
use std::sync::Arc;

/// Leaf producing a stored table. The output is the shared table itself, so
/// repeated executions and replans reuse the same data.
#[derive(Debug, Clone)]
pub struct GetTable {
    pub table_name: String,
    pub table: Arc<Table>,
}

impl GetTable {
    pub(super) fn execute(
        &self,
        _op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        Ok(self.table.clone())
    }
}

impl Explainable for GetTable {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("GetTable").with_value("table", &self.table_name)
    }
}

use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::explain::{Explainable, ExplainEntry};
use crate::logical::UnionMode;
use crate::storage::{ScalarValue, Table};
use granite_error::{GraniteError, OperatorErrorKind, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Concatenates both inputs; `Distinct` additionally drops duplicate rows,
/// keeping first occurrences.
#[derive(Debug, Clone)]
pub struct UnionOperator {
    pub mode: UnionMode,
}

impl UnionOperator {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let left = op.left_input_table()?;
        let right = op.right_input_table()?;

        if left.column_count() != right.column_count() {
            return Err(GraniteError::operator(
                OperatorErrorKind::TypeMismatch,
                format!(
                    "union inputs have {} and {} columns",
                    left.column_count(),
                    right.column_count()
                ),
            ));
        }

        let mut rows: Vec<Vec<ScalarValue>> = Vec::with_capacity(left.row_count() + right.row_count());
        for table in [&left, &right] {
            for row in 0..table.row_count() {
                rows.push(table.row_values(row));
            }
        }

        if self.mode == UnionMode::Distinct {
            let mut seen: HashSet<Vec<ScalarValue>> = HashSet::with_capacity(rows.len());
            rows.retain(|row| seen.insert(row.clone()));
        }

        let out = Table::new(
            left.column_definitions().to_vec(),
            left.target_chunk_size(),
        );
        out.append_rows(rows, 0)?;
        Ok(Arc::new(out))
    }
}

impl Explainable for UnionOperator {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("Union").with_value("mode", self.mode)
    }
}

use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::ComparisonOperator;
use crate::storage::index::{ChunkIndex, IndexKind};
use crate::storage::{RowId, ScalarValue, Table};
use granite_error::Result;
use std::ops::Bound;
use std::sync::Arc;

/// Scans `column OP value` through a single-column group-key index. Chunks
/// appended after the index was built are not covered and fall back to
/// comparing values.
#[derive(Debug, Clone)]
pub struct IndexScan {
    pub column: usize,
    pub op: ComparisonOperator,
    pub value: ScalarValue,
}

impl IndexScan {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let input = op.left_input_table()?;

        let index = input.indexes().into_iter().find(|index| {
            index.kind == IndexKind::GroupKey && index.column_ids == [self.column]
        });

        let mut positions: Vec<RowId> = Vec::new();
        for (chunk_id, chunk) in input.chunks().iter().enumerate() {
            let group_key = index.as_ref().and_then(|index| {
                match index.chunk_indexes.get(chunk_id) {
                    Some(ChunkIndex::GroupKey(group_key)) => Some(group_key),
                    _ => None,
                }
            });

            match group_key {
                Some(group_key) if self.op != ComparisonOperator::NotEq => {
                    let mut offsets: Vec<u32> = match self.op {
                        ComparisonOperator::Eq => {
                            group_key.positions_equal(&self.value).to_vec()
                        }
                        ComparisonOperator::Gt => group_key
                            .positions_between(Bound::Excluded(&self.value), Bound::Unbounded),
                        ComparisonOperator::GtEq => group_key
                            .positions_between(Bound::Included(&self.value), Bound::Unbounded),
                        ComparisonOperator::Lt => group_key
                            .positions_between(Bound::Unbounded, Bound::Excluded(&self.value)),
                        ComparisonOperator::LtEq => group_key
                            .positions_between(Bound::Unbounded, Bound::Included(&self.value)),
                        ComparisonOperator::NotEq => unreachable!("guarded above"),
                    };
                    // Value order back to row order for deterministic output.
                    offsets.sort_unstable();
                    positions.extend(offsets.into_iter().map(|offset| RowId {
                        chunk: chunk_id as u32,
                        offset,
                    }));
                }
                _ => {
                    for offset in 0..chunk.size() {
                        let value = chunk.value(self.column, offset);
                        if self.op.eval(&value, &self.value).is_truthy() {
                            positions.push(RowId {
                                chunk: chunk_id as u32,
                                offset: offset as u32,
                            });
                        }
                    }
                }
            }
        }

        Ok(Arc::new(Table::new_references(input, positions)))
    }
}

impl Explainable for IndexScan {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("IndexScan")
            .with_value("column", self.column)
            .with_value("op", self.op)
            .with_value("value", &self.value)
    }
}

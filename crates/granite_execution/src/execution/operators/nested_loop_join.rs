use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::execution::evaluator::{EvaluatorSource, ExpressionEvaluator};
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;
use crate::logical::JoinType;
use crate::storage::{ColumnDefinition, ScalarValue, Table};
use granite_error::Result;
use std::sync::Arc;

/// Joins by testing the predicate for every row pair. Handles every join
/// mode including cross joins (no predicate).
#[derive(Debug)]
pub struct NestedLoopJoin {
    pub join_type: JoinType,
    pub predicate: Option<Expression>,
    pub left_columns: Vec<Expression>,
    pub right_columns: Vec<Expression>,
}

pub(super) fn join_output_definitions(
    join_type: JoinType,
    left: &Table,
    right: &Table,
) -> Vec<ColumnDefinition> {
    let outer_left = matches!(join_type, JoinType::Right | JoinType::Full);
    let outer_right = matches!(join_type, JoinType::Left | JoinType::Full);

    let mut definitions: Vec<ColumnDefinition> = left
        .column_definitions()
        .iter()
        .map(|def| ColumnDefinition {
            nullable: def.nullable || outer_left,
            ..def.clone()
        })
        .collect();
    if join_type.emits_right_columns() {
        definitions.extend(right.column_definitions().iter().map(|def| {
            ColumnDefinition {
                nullable: def.nullable || outer_right,
                ..def.clone()
            }
        }));
    }
    definitions
}

pub(super) fn emit_pair(left: &Table, l: usize, right: &Table, r: usize) -> Vec<ScalarValue> {
    let mut row = left.row_values(l);
    row.extend(right.row_values(r));
    row
}

pub(super) fn emit_left_with_nulls(left: &Table, l: usize, right_width: usize) -> Vec<ScalarValue> {
    let mut row = left.row_values(l);
    row.extend(std::iter::repeat(ScalarValue::Null).take(right_width));
    row
}

pub(super) fn emit_right_with_nulls(left_width: usize, right: &Table, r: usize) -> Vec<ScalarValue> {
    let mut row: Vec<ScalarValue> = std::iter::repeat(ScalarValue::Null).take(left_width).collect();
    row.extend(right.row_values(r));
    row
}

impl NestedLoopJoin {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let left = op.left_input_table()?;
        let right = op.right_input_table()?;

        let evaluator = ExpressionEvaluator::with_sources(
            vec![
                EvaluatorSource {
                    table: &left,
                    columns: &self.left_columns,
                },
                EvaluatorSource {
                    table: &right,
                    columns: &self.right_columns,
                },
            ],
            op.parameters(),
        );

        let mut rows: Vec<Vec<ScalarValue>> = Vec::new();
        let mut right_matched = vec![false; right.row_count()];

        for l in 0..left.row_count() {
            let mut matched = false;
            for r in 0..right.row_count() {
                let qualifies = match &self.predicate {
                    Some(predicate) => evaluator.evaluate(predicate, &[l, r])?.is_truthy(),
                    None => true,
                };
                if !qualifies {
                    continue;
                }
                matched = true;
                right_matched[r] = true;
                match self.join_type {
                    JoinType::Semi => {
                        rows.push(left.row_values(l));
                        break;
                    }
                    JoinType::Anti => break,
                    _ => rows.push(emit_pair(&left, l, &right, r)),
                }
            }

            if !matched {
                match self.join_type {
                    JoinType::Left | JoinType::Full => {
                        rows.push(emit_left_with_nulls(&left, l, right.column_count()))
                    }
                    JoinType::Anti => rows.push(left.row_values(l)),
                    _ => {}
                }
            }
        }

        if matches!(self.join_type, JoinType::Right | JoinType::Full) {
            for (r, matched) in right_matched.iter().enumerate() {
                if !matched {
                    rows.push(emit_right_with_nulls(left.column_count(), &right, r));
                }
            }
        }

        let out = Table::new(
            join_output_definitions(self.join_type, &left, &right),
            left.target_chunk_size(),
        );
        out.append_rows(rows, 0)?;
        Ok(Arc::new(out))
    }

    pub(super) fn recreate(&self) -> NestedLoopJoin {
        NestedLoopJoin {
            join_type: self.join_type,
            predicate: self.predicate.as_ref().map(|p| p.deep_copy()),
            left_columns: self.left_columns.clone(),
            right_columns: self.right_columns.clone(),
        }
    }
}

impl Explainable for NestedLoopJoin {
    fn explain_entry(&self) -> ExplainEntry {
        let mut entry = ExplainEntry::new("NestedLoopJoin").with_value("type", self.join_type);
        if let Some(predicate) = &self.predicate {
            entry = entry.with_value("predicate", predicate);
        }
        entry
    }
}

use super::nested_loop_join::{
    emit_left_with_nulls, emit_pair, emit_right_with_nulls, join_output_definitions,
};
use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::execution::evaluator::ExpressionEvaluator;
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::Expression;
use crate::logical::JoinType;
use crate::storage::{ScalarValue, Table};
use granite_error::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Equi-join: builds a hash table over the right input's key, probes with the
/// left. NULL keys never match.
#[derive(Debug)]
pub struct HashJoin {
    pub join_type: JoinType,
    pub left_key: Expression,
    pub right_key: Expression,
    pub left_columns: Vec<Expression>,
    pub right_columns: Vec<Expression>,
}

impl HashJoin {
    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let left = op.left_input_table()?;
        let right = op.right_input_table()?;

        let left_evaluator =
            ExpressionEvaluator::new(&left, &self.left_columns, op.parameters());
        let right_evaluator =
            ExpressionEvaluator::new(&right, &self.right_columns, op.parameters());

        let mut build: HashMap<ScalarValue, Vec<usize>> = HashMap::new();
        for r in 0..right.row_count() {
            let key = right_evaluator.evaluate(&self.right_key, &[r])?;
            if !key.is_null() {
                build.entry(key).or_default().push(r);
            }
        }

        let mut rows: Vec<Vec<ScalarValue>> = Vec::new();
        let mut right_matched = vec![false; right.row_count()];

        for l in 0..left.row_count() {
            let key = left_evaluator.evaluate(&self.left_key, &[l])?;
            let matches = if key.is_null() {
                None
            } else {
                build.get(&key)
            };

            match matches {
                Some(matches) => match self.join_type {
                    JoinType::Semi => rows.push(left.row_values(l)),
                    JoinType::Anti => {}
                    _ => {
                        for &r in matches {
                            right_matched[r] = true;
                            rows.push(emit_pair(&left, l, &right, r));
                        }
                    }
                },
                None => match self.join_type {
                    JoinType::Left | JoinType::Full => {
                        rows.push(emit_left_with_nulls(&left, l, right.column_count()))
                    }
                    JoinType::Anti => rows.push(left.row_values(l)),
                    _ => {}
                },
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

    pub(super) fn recreate(&self) -> HashJoin {
        HashJoin {
            join_type: self.join_type,
            left_key: self.left_key.deep_copy(),
            right_key: self.right_key.deep_copy(),
            left_columns: self.left_columns.clone(),
            right_columns: self.right_columns.clone(),
        }
    }
}

impl Explainable for HashJoin {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("HashJoin")
            .with_value("type", self.join_type)
            .with_value("predicate", format!("{} = {}", self.left_key, self.right_key))
    }
}

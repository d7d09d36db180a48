use super::PhysicalOperator;
use crate::concurrency::TransactionContext;
use crate::execution::evaluator::ExpressionEvaluator;
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::{AggregateFunction, Expression};
use crate::storage::{ColumnDefinition, DataType, ScalarValue, Table};
use granite_error::{GraniteError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Hash aggregation: group keys are the evaluated group-by expressions,
/// groups appear in first-seen order.
#[derive(Debug)]
pub struct AggregateOperator {
    pub group_by: Vec<Expression>,
    /// Each entry must be an [`Expression::Aggregate`].
    pub aggregates: Vec<Expression>,
    pub input_columns: Vec<Expression>,
}

#[derive(Debug)]
enum Accumulator {
    Count(i64),
    Sum(Option<ScalarValue>, DataType),
    Min(Option<ScalarValue>),
    Max(Option<ScalarValue>),
    Avg { sum: f64, count: i64 },
}

impl Accumulator {
    fn new(function: AggregateFunction, sum_type: DataType) -> Accumulator {
        match function {
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::Sum => Accumulator::Sum(None, sum_type),
            AggregateFunction::Min => Accumulator::Min(None),
            AggregateFunction::Max => Accumulator::Max(None),
            AggregateFunction::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
        }
    }

    fn accumulate(&mut self, value: &ScalarValue) -> Result<()> {
        match self {
            Accumulator::Count(count) => {
                if !value.is_null() {
                    *count += 1;
                }
            }
            Accumulator::Sum(state, sum_type) => {
                if !value.is_null() {
                    let widened = value.cast_to(*sum_type)?;
                    *state = Some(match state.take() {
                        Some(current) => current.add(&widened)?,
                        None => widened,
                    });
                }
            }
            Accumulator::Min(state) => {
                if !value.is_null()
                    && state
                        .as_ref()
                        .map(|m| value.total_cmp(m).is_lt())
                        .unwrap_or(true)
                {
                    *state = Some(value.clone());
                }
            }
            Accumulator::Max(state) => {
                if !value.is_null()
                    && state
                        .as_ref()
                        .map(|m| value.total_cmp(m).is_gt())
                        .unwrap_or(true)
                {
                    *state = Some(value.clone());
                }
            }
            Accumulator::Avg { sum, count } => {
                if let Some(v) = value.as_f64() {
                    *sum += v;
                    *count += 1;
                }
            }
        }
        Ok(())
    }

    fn count_row(&mut self) {
        if let Accumulator::Count(count) = self {
            *count += 1;
        }
    }

    fn finish(self) -> ScalarValue {
        match self {
            Accumulator::Count(count) => ScalarValue::Int64(count),
            Accumulator::Sum(state, _) => state.unwrap_or(ScalarValue::Null),
            Accumulator::Min(state) | Accumulator::Max(state) => {
                state.unwrap_or(ScalarValue::Null)
            }
            Accumulator::Avg { sum, count } => {
                if count == 0 {
                    ScalarValue::Null
                } else {
                    ScalarValue::Float64(sum / count as f64)
                }
            }
        }
    }
}

impl AggregateOperator {
    fn make_accumulators(&self) -> Result<Vec<(AggregateFunction, Option<Expression>, Accumulator)>> {
        self.aggregates
            .iter()
            .map(|expr| match expr {
                Expression::Aggregate(aggregate) => {
                    let input = aggregate.input.as_deref().cloned();
                    let sum_type = aggregate.function.return_type(
                        input.as_ref().map(|i| i.data_type()).unwrap_or(DataType::Int64),
                    );
                    Ok((
                        aggregate.function,
                        input,
                        Accumulator::new(aggregate.function, sum_type),
                    ))
                }
                other => Err(GraniteError::optimizer(format!(
                    "aggregate operator got non-aggregate expression {other}"
                ))),
            })
            .collect()
    }

    pub(super) fn execute(
        &self,
        op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let input = op.left_input_table()?;
        let evaluator = ExpressionEvaluator::new(&input, &self.input_columns, op.parameters());

        let mut group_order: Vec<Vec<ScalarValue>> = Vec::new();
        let mut groups: HashMap<
            Vec<ScalarValue>,
            Vec<(AggregateFunction, Option<Expression>, Accumulator)>,
        > = HashMap::new();

        for row in 0..input.row_count() {
            let key = self
                .group_by
                .iter()
                .map(|expr| evaluator.evaluate(expr, &[row]))
                .collect::<Result<Vec<_>>>()?;

            if !groups.contains_key(&key) {
                group_order.push(key.clone());
                groups.insert(key.clone(), self.make_accumulators()?);
            }
            let accumulators = groups.get_mut(&key).expect("group exists");

            for (_, input_expr, accumulator) in accumulators.iter_mut() {
                match input_expr {
                    Some(expr) => {
                        let value = evaluator.evaluate(expr, &[row])?;
                        accumulator.accumulate(&value)?;
                    }
                    // COUNT(*) counts rows regardless of values.
                    None => accumulator.count_row(),
                }
            }
        }

        // No groups and no group-by: a single overall group (so that e.g.
        // SUM over an empty table still yields one NULL row).
        if group_order.is_empty() && self.group_by.is_empty() {
            group_order.push(Vec::new());
            groups.insert(Vec::new(), self.make_accumulators()?);
        }

        let definitions = self
            .group_by
            .iter()
            .chain(self.aggregates.iter())
            .map(|expr| {
                ColumnDefinition::new(expr.as_column_name(), expr.data_type(), expr.is_nullable())
            })
            .collect();

        let mut rows = Vec::with_capacity(group_order.len());
        for key in group_order {
            let accumulators = groups.remove(&key).expect("group exists");
            let mut row = key;
            row.extend(accumulators.into_iter().map(|(_, _, acc)| acc.finish()));
            rows.push(row);
        }

        let out = Table::new(definitions, input.target_chunk_size());
        out.append_rows(rows, 0)?;
        Ok(Arc::new(out))
    }

    pub(super) fn recreate(&self) -> AggregateOperator {
        AggregateOperator {
            group_by: self.group_by.iter().map(|e| e.deep_copy()).collect(),
            aggregates: self.aggregates.iter().map(|e| e.deep_copy()).collect(),
            input_columns: self.input_columns.clone(),
        }
    }
}

impl Explainable for AggregateOperator {
    fn explain_entry(&self) -> ExplainEntry {
        let aggregates = self
            .aggregates
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        ExplainEntry::new("Aggregate")
            .with_value("groups", self.group_by.len())
            .with_value("aggregates", aggregates)
    }
}

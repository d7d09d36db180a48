//! Row-count and per-column statistics driving the optimizer's estimates.
//!
//! The model is uniform distribution over `[min, max]` with a known distinct
//! count: equality keeps `1/distinct` of the rows, range predicates keep the
//! fraction of the range they retain (counting whole integers for integer
//! columns), and anything the model cannot see gets the default open-ended
//! selectivity.

use crate::expr::comparison_expr::ComparisonOperator;
use crate::storage::{DataType, ScalarValue, Table};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_OPEN_ENDED_SELECTIVITY: f32 = 1.0 / 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStatistics {
    pub null_fraction: f32,
    pub distinct_count: f32,
    pub min: Option<ScalarValue>,
    pub max: Option<ScalarValue>,
}

impl ColumnStatistics {
    pub fn new(
        null_fraction: f32,
        distinct_count: f32,
        min: impl Into<ScalarValue>,
        max: impl Into<ScalarValue>,
    ) -> ColumnStatistics {
        ColumnStatistics {
            null_fraction,
            distinct_count,
            min: Some(min.into()),
            max: Some(max.into()),
        }
    }

    pub fn without_range(null_fraction: f32, distinct_count: f32) -> ColumnStatistics {
        ColumnStatistics {
            null_fraction,
            distinct_count,
            min: None,
            max: None,
        }
    }

    fn is_integer_range(&self) -> bool {
        matches!(&self.min, Some(v) if v.data_type().is_integer())
    }

    /// Fraction of `[min, max]` covered by `[lo, hi]`, counting whole
    /// integers for integer columns.
    fn range_selectivity(&self, lo: f64, hi: f64) -> f32 {
        let (min, max) = match (&self.min, &self.max) {
            (Some(min), Some(max)) => match (min.as_f64(), max.as_f64()) {
                (Some(min), Some(max)) => (min, max),
                _ => return DEFAULT_OPEN_ENDED_SELECTIVITY,
            },
            _ => return DEFAULT_OPEN_ENDED_SELECTIVITY,
        };

        let lo = lo.max(min);
        let hi = hi.min(max);
        if lo > hi {
            return 0.0;
        }

        let (kept, total) = if self.is_integer_range() {
            ((hi - lo + 1.0), (max - min + 1.0))
        } else {
            ((hi - lo), (max - min))
        };
        if total <= 0.0 {
            return 1.0;
        }
        (kept / total).clamp(0.0, 1.0) as f32
    }

    /// Selectivity of `column OP value` and the statistics of the column
    /// among the surviving rows.
    fn estimate_comparison(
        &self,
        op: ComparisonOperator,
        value: &ScalarValue,
    ) -> (f32, ColumnStatistics) {
        if value.is_null() {
            // Comparisons against NULL never hold.
            return (0.0, self.clone());
        }

        let non_null = 1.0 - self.null_fraction;
        let equals_selectivity = if self.distinct_count > 0.0 {
            1.0 / self.distinct_count
        } else {
            0.0
        };

        let v = match value.as_f64() {
            Some(v) => v,
            None => {
                // Strings: only equality has a usable model.
                let selectivity = match op {
                    ComparisonOperator::Eq => equals_selectivity,
                    ComparisonOperator::NotEq => 1.0 - equals_selectivity,
                    _ => DEFAULT_OPEN_ENDED_SELECTIVITY,
                };
                return (selectivity * non_null, self.clone());
            }
        };

        let integer = self.is_integer_range();
        let step = if integer { 1.0 } else { 0.0 };
        let (selectivity, new_min, new_max) = match op {
            ComparisonOperator::Eq => {
                let inside = match (
                    self.min.as_ref().and_then(|m| m.as_f64()),
                    self.max.as_ref().and_then(|m| m.as_f64()),
                ) {
                    (Some(min), Some(max)) => v >= min && v <= max,
                    _ => true,
                };
                let selectivity = if inside { equals_selectivity } else { 0.0 };
                (selectivity, Some(value.clone()), Some(value.clone()))
            }
            ComparisonOperator::NotEq => {
                (1.0 - equals_selectivity, self.min.clone(), self.max.clone())
            }
            ComparisonOperator::GtEq => (
                self.range_selectivity(v, f64::INFINITY),
                clamp_value(value, &self.min, true),
                self.max.clone(),
            ),
            ComparisonOperator::Gt => (
                self.range_selectivity(v + step, f64::INFINITY),
                clamp_value(value, &self.min, true),
                self.max.clone(),
            ),
            ComparisonOperator::LtEq => (
                self.range_selectivity(f64::NEG_INFINITY, v),
                self.min.clone(),
                clamp_value(value, &self.max, false),
            ),
            ComparisonOperator::Lt => (
                self.range_selectivity(f64::NEG_INFINITY, v - step),
                self.min.clone(),
                clamp_value(value, &self.max, false),
            ),
        };

        let column = ColumnStatistics {
            null_fraction: 0.0,
            distinct_count: (self.distinct_count * selectivity).max(if selectivity > 0.0 {
                1.0
            } else {
                0.0
            }),
            min: new_min,
            max: new_max,
        };
        (selectivity * non_null, column)
    }
}

/// Tighten a bound with the compared value: for a lower bound take the larger
/// of value and current min, for an upper bound the smaller of value and max.
fn clamp_value(
    value: &ScalarValue,
    current: &Option<ScalarValue>,
    lower: bool,
) -> Option<ScalarValue> {
    match current {
        Some(current) => {
            let take_value = if lower {
                value.total_cmp(current).is_gt()
            } else {
                value.total_cmp(current).is_lt()
            };
            Some(if take_value {
                value.clone()
            } else {
                current.clone()
            })
        }
        None => Some(value.clone()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableStatistics {
    pub row_count: f32,
    pub columns: Vec<ColumnStatistics>,
}

impl TableStatistics {
    pub fn new(row_count: f32, columns: Vec<ColumnStatistics>) -> TableStatistics {
        TableStatistics { row_count, columns }
    }

    /// Scan the table once and measure row count, null fractions, distinct
    /// counts and value ranges.
    pub fn from_table(table: &Arc<Table>) -> TableStatistics {
        let row_count = table.row_count();
        let columns = (0..table.column_count())
            .map(|column| {
                let mut distinct: HashSet<ScalarValue> = HashSet::new();
                let mut nulls = 0usize;
                let mut min: Option<ScalarValue> = None;
                let mut max: Option<ScalarValue> = None;
                for row in 0..row_count {
                    let value = table.value(column, row);
                    if value.is_null() {
                        nulls += 1;
                        continue;
                    }
                    if min.as_ref().map(|m| value.total_cmp(m).is_lt()).unwrap_or(true) {
                        min = Some(value.clone());
                    }
                    if max.as_ref().map(|m| value.total_cmp(m).is_gt()).unwrap_or(true) {
                        max = Some(value.clone());
                    }
                    distinct.insert(value);
                }
                let range = table.column_definitions()[column].data_type != DataType::Utf8;
                ColumnStatistics {
                    null_fraction: if row_count == 0 {
                        0.0
                    } else {
                        nulls as f32 / row_count as f32
                    },
                    distinct_count: distinct.len() as f32,
                    min: if range { min } else { None },
                    max: if range { max } else { None },
                }
            })
            .collect();

        TableStatistics {
            row_count: row_count as f32,
            columns,
        }
    }

    /// Statistics after `column OP value`.
    pub fn estimate_comparison(
        &self,
        column: usize,
        op: ComparisonOperator,
        value: &ScalarValue,
    ) -> TableStatistics {
        let Some(stats) = self.columns.get(column) else {
            return self.scaled(DEFAULT_OPEN_ENDED_SELECTIVITY);
        };
        let (selectivity, new_column) = stats.estimate_comparison(op, value);
        let mut out = self.scaled(selectivity);
        out.columns[column] = new_column;
        out
    }

    /// Statistics after `left OP right` on two columns of this table.
    pub fn estimate_column_comparison(
        &self,
        left: usize,
        op: ComparisonOperator,
        right: usize,
    ) -> TableStatistics {
        let selectivity = match op {
            ComparisonOperator::Eq => {
                let dl = self.columns.get(left).map(|c| c.distinct_count).unwrap_or(0.0);
                let dr = self.columns.get(right).map(|c| c.distinct_count).unwrap_or(0.0);
                let d = dl.max(dr);
                if d > 0.0 {
                    1.0 / d
                } else {
                    DEFAULT_OPEN_ENDED_SELECTIVITY
                }
            }
            _ => DEFAULT_OPEN_ENDED_SELECTIVITY,
        };
        self.scaled(selectivity)
    }

    /// Statistics after `column IS [NOT] NULL`.
    pub fn estimate_is_null(&self, column: usize, negated: bool) -> TableStatistics {
        let null_fraction = self
            .columns
            .get(column)
            .map(|c| c.null_fraction)
            .unwrap_or(0.0);
        let selectivity = if negated {
            1.0 - null_fraction
        } else {
            null_fraction
        };
        self.scaled(selectivity)
    }

    /// Scale the row count, capping distinct counts at the new row count.
    pub fn scaled(&self, selectivity: f32) -> TableStatistics {
        let row_count = self.row_count * selectivity.clamp(0.0, 1.0);
        TableStatistics {
            row_count,
            columns: self
                .columns
                .iter()
                .map(|c| ColumnStatistics {
                    distinct_count: c.distinct_count.min(row_count),
                    ..c.clone()
                })
                .collect(),
        }
    }
}

/// Estimate the statistics of a relation after filtering with `predicate`.
///
/// `columns` is the relation's output schema, used to resolve column
/// references to statistics indexes. Anything the model cannot interpret
/// falls back to the default open-ended selectivity.
pub fn estimate_predicate(
    stats: &TableStatistics,
    columns: &[crate::expr::Expression],
    predicate: &crate::expr::Expression,
) -> TableStatistics {
    use crate::expr::{ConjunctionOperator, Expression, IsOperator, NegateOperator};

    let resolve = |e: &Expression| columns.iter().position(|c| c == e);

    match predicate {
        Expression::Comparison(cmp) => match (&*cmp.left, &*cmp.right) {
            (left, Expression::Literal(value)) if resolve(left).is_some() => {
                stats.estimate_comparison(resolve(left).unwrap(), cmp.op, &value.literal)
            }
            (Expression::Literal(value), right) if resolve(right).is_some() => {
                stats.estimate_comparison(resolve(right).unwrap(), cmp.op.flipped(), &value.literal)
            }
            (left, right) => match (resolve(left), resolve(right)) {
                (Some(l), Some(r)) => stats.estimate_column_comparison(l, cmp.op, r),
                _ => stats.scaled(DEFAULT_OPEN_ENDED_SELECTIVITY),
            },
        },
        Expression::Conjunction(conjunction) => {
            let left = estimate_predicate(stats, columns, &conjunction.left);
            match conjunction.op {
                // AND composes: feed the left estimate into the right side.
                ConjunctionOperator::And => estimate_predicate(&left, columns, &conjunction.right),
                ConjunctionOperator::Or => {
                    if stats.row_count <= 0.0 {
                        return stats.clone();
                    }
                    let right = estimate_predicate(stats, columns, &conjunction.right);
                    let l = left.row_count / stats.row_count;
                    let r = right.row_count / stats.row_count;
                    stats.scaled(l + r - l * r)
                }
            }
        }
        Expression::Is(is) => match resolve(&is.expr) {
            Some(column) => stats.estimate_is_null(column, is.op == IsOperator::IsNotNull),
            None => stats.scaled(DEFAULT_OPEN_ENDED_SELECTIVITY),
        },
        Expression::Negate(negate) if negate.op == NegateOperator::Not => {
            if stats.row_count <= 0.0 {
                return stats.clone();
            }
            let inner = estimate_predicate(stats, columns, &negate.expr);
            stats.scaled(1.0 - inner.row_count / stats.row_count)
        }
        Expression::Literal(literal) => {
            if literal.literal.is_truthy() {
                stats.clone()
            } else {
                stats.scaled(0.0)
            }
        }
        _ => stats.scaled(DEFAULT_OPEN_ENDED_SELECTIVITY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_stats() -> TableStatistics {
        // The fixture behind the reordering scenarios: 100 rows, three int32
        // columns a: 20 distinct in 10..100, b: 5 in 50..60, c: 2 in 110..1100.
        TableStatistics::new(
            100.0,
            vec![
                ColumnStatistics::new(0.0, 20.0, 10, 100),
                ColumnStatistics::new(0.0, 5.0, 50, 60),
                ColumnStatistics::new(0.0, 2.0, 110, 1100),
            ],
        )
    }

    fn rows_after(stats: &TableStatistics, column: usize, op: ComparisonOperator, value: i32) -> f32 {
        stats
            .estimate_comparison(column, op, &ScalarValue::Int32(value))
            .row_count
    }

    #[test]
    fn integer_range_estimates() {
        let stats = mock_stats();

        // a > 50 keeps the integers 51..=100 out of 10..=100.
        let rows = rows_after(&stats, 0, ComparisonOperator::Gt, 50);
        assert!((rows - 100.0 * 50.0 / 91.0).abs() < 0.01);

        // a > 99 keeps a single integer.
        let rows = rows_after(&stats, 0, ComparisonOperator::Gt, 99);
        assert!((rows - 100.0 / 91.0).abs() < 0.01);

        // c > 100 keeps everything: the whole range is above the value.
        let rows = rows_after(&stats, 2, ComparisonOperator::Gt, 100);
        assert!((rows - 100.0).abs() < 0.01);
    }

    #[test]
    fn equality_uses_distinct_count() {
        let stats = mock_stats();
        let rows = rows_after(&stats, 0, ComparisonOperator::Eq, 42);
        assert!((rows - 5.0).abs() < 0.01);

        // Out of range: no rows.
        let rows = rows_after(&stats, 0, ComparisonOperator::Eq, 500);
        assert_eq!(0.0, rows);
    }

    #[test]
    fn low_selectivity_tail() {
        // The index-scan fixture: 1M rows, c in 0..20000 with 10 distinct
        // values; c > 19900 keeps about half a percent.
        let stats = TableStatistics::new(
            1_000_000.0,
            vec![ColumnStatistics::new(0.0, 10.0, 0, 20_000)],
        );
        let selectivity = rows_after(&stats, 0, ComparisonOperator::Gt, 19_900) / 1_000_000.0;
        assert!(selectivity <= 0.01, "selectivity {selectivity}");

        let selectivity = rows_after(&stats, 0, ComparisonOperator::Gt, 10) / 1_000_000.0;
        assert!(selectivity > 0.99, "selectivity {selectivity}");
    }

    #[test]
    fn chained_estimates_compose() {
        let stats = mock_stats();
        let after = stats.estimate_comparison(0, ComparisonOperator::Gt, &ScalarValue::Int32(50));
        // The surviving range is 51..=100, so a further a > 75 halves again.
        let after = after.estimate_comparison(0, ComparisonOperator::Gt, &ScalarValue::Int32(75));
        assert!(after.row_count < 30.0);
        assert!(after.row_count > 20.0);
    }
}

//! Row-wise expression evaluation against materialized (or referenced)
//! tables.

use crate::execution::operators::{execute_inline, PhysicalOperator};
use crate::expr::{
    Expression, IsOperator, NegateOperator, ParameterId, SubqueryExpr, SubqueryPlan, SubqueryType,
};
use crate::storage::{ScalarValue, Table};
use granite_error::{GraniteError, OperatorErrorKind, Result};
use std::cell::RefCell;
use std::collections::HashMap;

/// One input relation: the table plus the expressions describing its columns,
/// which is how column references (and aggregate outputs) are resolved to
/// positions.
pub struct EvaluatorSource<'a> {
    pub table: &'a Table,
    pub columns: &'a [Expression],
}

/// Evaluates expressions one row at a time. Joins pass two sources; `rows`
/// then carries one row number per source.
pub struct ExpressionEvaluator<'a> {
    sources: Vec<EvaluatorSource<'a>>,
    parameters: HashMap<ParameterId, ScalarValue>,
    /// Uncorrelated subqueries run once and are memoized by plan identity.
    subquery_cache: RefCell<HashMap<*const PhysicalOperator, std::sync::Arc<Table>>>,
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(
        table: &'a Table,
        columns: &'a [Expression],
        parameters: HashMap<ParameterId, ScalarValue>,
    ) -> ExpressionEvaluator<'a> {
        Self::with_sources(vec![EvaluatorSource { table, columns }], parameters)
    }

    pub fn with_sources(
        sources: Vec<EvaluatorSource<'a>>,
        parameters: HashMap<ParameterId, ScalarValue>,
    ) -> ExpressionEvaluator<'a> {
        ExpressionEvaluator {
            sources,
            parameters,
            subquery_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Evaluate `expression` for the given row of each source.
    pub fn evaluate(&self, expression: &Expression, rows: &[usize]) -> Result<ScalarValue> {
        debug_assert_eq!(self.sources.len(), rows.len());

        // Whole-expression resolution first: above an aggregate, SUM(a) is a
        // column of the input, not something to recompute.
        for (source, row) in self.sources.iter().zip(rows.iter()) {
            if let Some(position) = source.columns.iter().position(|c| c == expression) {
                return Ok(source.table.value(position, *row));
            }
        }

        match expression {
            Expression::Column(column) => Err(GraniteError::operator(
                OperatorErrorKind::ColumnNotFound,
                format!("column {column} not found in operator input"),
            )),
            Expression::Literal(literal) => Ok(literal.literal.clone()),
            Expression::Arith(arith) => {
                let left = self.evaluate(&arith.left, rows)?;
                let right = self.evaluate(&arith.right, rows)?;
                arith.op.eval(&left, &right)
            }
            Expression::Comparison(comparison) => {
                let left = self.evaluate(&comparison.left, rows)?;
                let right = self.evaluate(&comparison.right, rows)?;
                Ok(comparison.op.eval(&left, &right))
            }
            Expression::Conjunction(conjunction) => {
                let left = self.evaluate(&conjunction.left, rows)?;
                let right = self.evaluate(&conjunction.right, rows)?;
                Ok(conjunction.op.eval(&left, &right))
            }
            Expression::Negate(negate) => {
                let value = self.evaluate(&negate.expr, rows)?;
                match negate.op {
                    NegateOperator::Negative => value.negate(),
                    NegateOperator::Not => Ok(if value.is_null() {
                        ScalarValue::Null
                    } else {
                        ScalarValue::Int32(!value.is_truthy() as i32)
                    }),
                }
            }
            Expression::Is(is) => {
                let value = self.evaluate(&is.expr, rows)?;
                let holds = match is.op {
                    IsOperator::IsNull => value.is_null(),
                    IsOperator::IsNotNull => !value.is_null(),
                };
                Ok(ScalarValue::Int32(holds as i32))
            }
            Expression::Function(function) => {
                let input = self.evaluate(&function.input, rows)?;
                function.function.eval(&input)
            }
            Expression::Case(case) => {
                let when = self.evaluate(&case.when, rows)?;
                if when.is_truthy() {
                    self.evaluate(&case.then, rows)
                } else {
                    self.evaluate(&case.else_expr, rows)
                }
            }
            Expression::In(in_expr) => {
                let needle = self.evaluate(&in_expr.expr, rows)?;
                let mut saw_null = needle.is_null();
                let mut found = false;
                for item in &in_expr.list {
                    let item = self.evaluate(item, rows)?;
                    if item.is_null() || needle.is_null() {
                        saw_null = true;
                    } else if needle.total_cmp(&item).is_eq() {
                        found = true;
                        break;
                    }
                }
                Ok(if found {
                    ScalarValue::Int32(!in_expr.negated as i32)
                } else if saw_null {
                    ScalarValue::Null
                } else {
                    ScalarValue::Int32(in_expr.negated as i32)
                })
            }
            Expression::Aggregate(aggregate) => Err(GraniteError::operator(
                OperatorErrorKind::ColumnNotFound,
                format!("aggregate {aggregate} outside of an aggregation"),
            )),
            Expression::Subquery(subquery) => self.evaluate_subquery(subquery, rows),
            Expression::Placeholder(placeholder) => {
                self.parameters.get(&placeholder.id).cloned().ok_or_else(|| {
                    GraniteError::new(format!("unbound parameter {}", placeholder.id))
                })
            }
        }
    }

    fn evaluate_subquery(&self, subquery: &SubqueryExpr, rows: &[usize]) -> Result<ScalarValue> {
        let plan = match &subquery.plan {
            SubqueryPlan::Physical(plan) => plan,
            SubqueryPlan::Logical(_) => {
                return Err(GraniteError::new("subquery was not physically planned"))
            }
        };

        let result = if subquery.is_correlated() {
            // Bind the outer columns for this row, then run a fresh copy of
            // the subplan with those parameters.
            let mut parameters = self.parameters.clone();
            for (id, argument) in subquery.parameter_ids.iter().zip(&subquery.arguments) {
                parameters.insert(*id, self.evaluate(argument, rows)?);
            }
            let fresh = plan.recreate();
            fresh.set_parameters(&parameters);
            execute_inline(&fresh)?
        } else {
            let key = std::sync::Arc::as_ptr(plan);
            let cached = self.subquery_cache.borrow().get(&key).cloned();
            match cached {
                Some(table) => table,
                None => {
                    let table = execute_inline(plan)?;
                    self.subquery_cache.borrow_mut().insert(key, table.clone());
                    table
                }
            }
        };

        match &subquery.subquery_type {
            SubqueryType::Scalar => match result.row_count() {
                0 => Ok(ScalarValue::Null),
                1 => Ok(result.value(0, 0)),
                n => Err(GraniteError::new(format!(
                    "scalar subquery returned {n} rows"
                ))),
            },
            SubqueryType::Exists { negated } => {
                Ok(ScalarValue::Int32(((result.row_count() > 0) != *negated) as i32))
            }
            SubqueryType::Any { op, negated } => {
                let compare = subquery
                    .compare_expr
                    .as_ref()
                    .ok_or_else(|| GraniteError::new("ANY subquery without left-hand side"))?;
                let left = self.evaluate(compare, rows)?;
                let mut saw_null = left.is_null();
                let mut found = false;
                for row in 0..result.row_count() {
                    let right = result.value(0, row);
                    match op.eval(&left, &right) {
                        ScalarValue::Null => saw_null = true,
                        v if v.is_truthy() => {
                            found = true;
                            break;
                        }
                        _ => {}
                    }
                }
                Ok(if found {
                    ScalarValue::Int32(!*negated as i32)
                } else if saw_null {
                    ScalarValue::Null
                } else {
                    ScalarValue::Int32(*negated as i32)
                })
            }
        }
    }
}

/// Convenience for the evaluator over a single table: evaluate an expression
/// for every row.
pub fn evaluate_all(
    evaluator: &ExpressionEvaluator<'_>,
    expression: &Expression,
    row_count: usize,
) -> Result<Vec<ScalarValue>> {
    (0..row_count)
        .map(|row| evaluator.evaluate(expression, &[row]))
        .collect()
}

//! Typed expression trees shared by the logical plan and the physical
//! operators.

pub mod aggregate_expr;
pub mod arith_expr;
pub mod case_expr;
pub mod column_expr;
pub mod comparison_expr;
pub mod conjunction_expr;
pub mod function_expr;
pub mod in_expr;
pub mod is_expr;
pub mod literal_expr;
pub mod negate_expr;
pub mod placeholder_expr;
pub mod subquery_expr;

pub use aggregate_expr::{AggregateExpr, AggregateFunction};
pub use arith_expr::{ArithExpr, ArithOperator};
pub use case_expr::CaseExpr;
pub use column_expr::{ColumnExpr, TableRef};
pub use comparison_expr::{ComparisonExpr, ComparisonOperator};
pub use conjunction_expr::{ConjunctionExpr, ConjunctionOperator};
pub use function_expr::{FunctionExpr, ScalarFunction};
pub use in_expr::InExpr;
pub use is_expr::{IsExpr, IsOperator};
pub use literal_expr::LiteralExpr;
pub use negate_expr::{NegateExpr, NegateOperator};
pub use placeholder_expr::{ParameterId, PlaceholderExpr};
pub use subquery_expr::{SubqueryExpr, SubqueryPlan, SubqueryType};

use crate::storage::{DataType, ScalarValue};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Column(ColumnExpr),
    Literal(LiteralExpr),
    Arith(ArithExpr),
    Comparison(ComparisonExpr),
    Conjunction(ConjunctionExpr),
    Negate(NegateExpr),
    Is(IsExpr),
    Function(FunctionExpr),
    Aggregate(AggregateExpr),
    Case(CaseExpr),
    In(InExpr),
    Subquery(SubqueryExpr),
    Placeholder(PlaceholderExpr),
}

impl Expression {
    /// The type this expression evaluates to. Predicates are Int32 0/1; there
    /// is no boolean type.
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Column(e) => e.datatype,
            Expression::Literal(e) => e.literal.data_type(),
            Expression::Arith(e) => {
                DataType::common_type(e.left.data_type(), e.right.data_type())
                    .unwrap_or(DataType::Null)
            }
            Expression::Comparison(_)
            | Expression::Conjunction(_)
            | Expression::Is(_)
            | Expression::In(_) => DataType::Int32,
            Expression::Negate(e) => match e.op {
                NegateOperator::Not => DataType::Int32,
                NegateOperator::Negative => e.expr.data_type(),
            },
            Expression::Function(e) => e.function.return_type(e.input.data_type()),
            Expression::Aggregate(e) => {
                let input = e
                    .input
                    .as_ref()
                    .map(|i| i.data_type())
                    .unwrap_or(DataType::Int64);
                e.function.return_type(input)
            }
            Expression::Case(e) => {
                DataType::common_type(e.then.data_type(), e.else_expr.data_type())
                    .unwrap_or(DataType::Null)
            }
            Expression::Subquery(e) => e.data_type(),
            Expression::Placeholder(e) => e.datatype,
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Expression::Column(e) => e.nullable,
            Expression::Literal(e) => e.literal.is_null(),
            Expression::Arith(e) => e.left.is_nullable() || e.right.is_nullable(),
            Expression::Comparison(e) => e.left.is_nullable() || e.right.is_nullable(),
            Expression::Conjunction(e) => e.left.is_nullable() || e.right.is_nullable(),
            Expression::Negate(e) => e.expr.is_nullable(),
            Expression::Is(_) => false,
            Expression::Function(e) => e.input.is_nullable(),
            // Aggregates over empty groups yield NULL, except COUNT.
            Expression::Aggregate(e) => e.function != AggregateFunction::Count,
            Expression::Case(e) => e.then.is_nullable() || e.else_expr.is_nullable(),
            Expression::In(e) => {
                e.expr.is_nullable() || e.list.iter().any(|item| item.is_nullable())
            }
            Expression::Subquery(e) => matches!(e.subquery_type, SubqueryType::Scalar),
            Expression::Placeholder(_) => true,
        }
    }

    /// The canonical column-name rendering of this expression.
    pub fn as_column_name(&self) -> String {
        self.to_string()
    }

    /// Immediate child expressions, in order.
    pub fn arguments(&self) -> Vec<&Expression> {
        match self {
            Expression::Column(_) | Expression::Literal(_) | Expression::Placeholder(_) => vec![],
            Expression::Arith(e) => vec![&*e.left, &*e.right],
            Expression::Comparison(e) => vec![&*e.left, &*e.right],
            Expression::Conjunction(e) => vec![&*e.left, &*e.right],
            Expression::Negate(e) => vec![&*e.expr],
            Expression::Is(e) => vec![&*e.expr],
            Expression::Function(e) => vec![&*e.input],
            Expression::Aggregate(e) => e.input.as_deref().into_iter().collect(),
            Expression::Case(e) => vec![&*e.when, &*e.then, &*e.else_expr],
            Expression::In(e) => {
                let mut out = vec![e.expr.as_ref()];
                out.extend(e.list.iter());
                out
            }
            Expression::Subquery(e) => {
                let mut out: Vec<&Expression> = e.compare_expr.as_deref().into_iter().collect();
                out.extend(e.arguments.iter());
                out
            }
        }
    }

    pub fn arguments_mut(&mut self) -> Vec<&mut Expression> {
        match self {
            Expression::Column(_) | Expression::Literal(_) | Expression::Placeholder(_) => vec![],
            Expression::Arith(e) => vec![&mut *e.left, &mut *e.right],
            Expression::Comparison(e) => vec![&mut *e.left, &mut *e.right],
            Expression::Conjunction(e) => vec![&mut *e.left, &mut *e.right],
            Expression::Negate(e) => vec![&mut *e.expr],
            Expression::Is(e) => vec![&mut *e.expr],
            Expression::Function(e) => vec![&mut *e.input],
            Expression::Aggregate(e) => e.input.as_deref_mut().into_iter().collect(),
            Expression::Case(e) => vec![&mut *e.when, &mut *e.then, &mut *e.else_expr],
            Expression::In(e) => {
                let mut out = vec![e.expr.as_mut()];
                out.extend(e.list.iter_mut());
                out
            }
            Expression::Subquery(e) => {
                let mut out: Vec<&mut Expression> =
                    e.compare_expr.as_deref_mut().into_iter().collect();
                out.extend(e.arguments.iter_mut());
                out
            }
        }
    }

    /// Structural copy sharing no mutable state; embedded subquery plans are
    /// deep-copied as well (a plain `clone` would share them).
    pub fn deep_copy(&self) -> Expression {
        let mut out = self.clone();
        if let Expression::Subquery(subquery) = &mut out {
            subquery.plan = match &subquery.plan {
                SubqueryPlan::Logical(plan) => SubqueryPlan::Logical(plan.deep_copy()),
                SubqueryPlan::Physical(plan) => SubqueryPlan::Physical(plan.recreate()),
            };
        }
        for child in out.arguments_mut() {
            *child = child.deep_copy();
        }
        out
    }

    /// Compares only this node's own payload and child count; children are
    /// compared by [`deep_equals`].
    pub fn shallow_equals(&self, other: &Expression) -> bool {
        use Expression::*;
        match (self, other) {
            (Column(a), Column(b)) => a == b,
            (Literal(a), Literal(b)) => a == b,
            (Arith(a), Arith(b)) => a.op == b.op,
            (Comparison(a), Comparison(b)) => a.op == b.op,
            (Conjunction(a), Conjunction(b)) => a.op == b.op,
            (Negate(a), Negate(b)) => a.op == b.op,
            (Is(a), Is(b)) => a.op == b.op,
            (Function(a), Function(b)) => a.function == b.function,
            (Aggregate(a), Aggregate(b)) => {
                a.function == b.function && a.input.is_some() == b.input.is_some()
            }
            (Case(_), Case(_)) => true,
            (In(a), In(b)) => a.negated == b.negated && a.list.len() == b.list.len(),
            (Subquery(a), Subquery(b)) => {
                a.subquery_type == b.subquery_type
                    && a.parameter_ids == b.parameter_ids
                    && match (&a.plan, &b.plan) {
                        (SubqueryPlan::Logical(x), SubqueryPlan::Logical(y)) => {
                            crate::logical::deep_equals(x, y)
                        }
                        (SubqueryPlan::Physical(x), SubqueryPlan::Physical(y)) => {
                            std::sync::Arc::ptr_eq(x, y)
                        }
                        _ => false,
                    }
            }
            (Placeholder(a), Placeholder(b)) => a.id == b.id,
            _ => false,
        }
    }

    /// True if the expression contains no columns, placeholders, aggregates
    /// or subqueries, i.e. it can be evaluated to a constant right now.
    pub fn is_const_foldable(&self) -> bool {
        match self {
            Expression::Column(_)
            | Expression::Placeholder(_)
            | Expression::Aggregate(_)
            | Expression::Subquery(_) => false,
            _ => self.arguments().iter().all(|child| child.is_const_foldable()),
        }
    }

    /// Evaluate a constant expression. Returns `None` when not foldable or
    /// when evaluation fails (e.g. overflow); folding is best-effort.
    pub fn try_fold(&self) -> Option<ScalarValue> {
        match self {
            Expression::Literal(e) => Some(e.literal.clone()),
            Expression::Arith(e) => {
                let (l, r) = (e.left.try_fold()?, e.right.try_fold()?);
                e.op.eval(&l, &r).ok()
            }
            Expression::Comparison(e) => {
                let (l, r) = (e.left.try_fold()?, e.right.try_fold()?);
                Some(e.op.eval(&l, &r))
            }
            Expression::Conjunction(e) => {
                let (l, r) = (e.left.try_fold()?, e.right.try_fold()?);
                Some(e.op.eval(&l, &r))
            }
            Expression::Negate(e) => {
                let v = e.expr.try_fold()?;
                match e.op {
                    NegateOperator::Negative => v.negate().ok(),
                    NegateOperator::Not => Some(if v.is_null() {
                        ScalarValue::Null
                    } else {
                        ScalarValue::Int32(!v.is_truthy() as i32)
                    }),
                }
            }
            Expression::Is(e) => {
                let v = e.expr.try_fold()?;
                let holds = match e.op {
                    IsOperator::IsNull => v.is_null(),
                    IsOperator::IsNotNull => !v.is_null(),
                };
                Some(ScalarValue::Int32(holds as i32))
            }
            Expression::Function(e) => e.function.eval(&e.input.try_fold()?).ok(),
            Expression::Case(e) => {
                let when = e.when.try_fold()?;
                if when.is_truthy() {
                    e.then.try_fold()
                } else {
                    e.else_expr.try_fold()
                }
            }
            Expression::In(e) => {
                let needle = e.expr.try_fold()?;
                let mut saw_null = needle.is_null();
                let mut found = false;
                for item in &e.list {
                    let item = item.try_fold()?;
                    if item.is_null() || needle.is_null() {
                        saw_null = true;
                    } else if needle.total_cmp(&item).is_eq() {
                        found = true;
                    }
                }
                Some(match (found != e.negated, saw_null && !found) {
                    (_, true) => ScalarValue::Null,
                    (holds, false) => ScalarValue::Int32(holds as i32),
                })
            }
            _ => None,
        }
    }

    /// All column references in this expression, including the correlated
    /// arguments of subqueries (but not columns internal to a subquery plan).
    pub fn collect_column_refs(&self, out: &mut Vec<ColumnExpr>) {
        if let Expression::Column(column) = self {
            out.push(column.clone());
        }
        for child in self.arguments() {
            child.collect_column_refs(out);
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        if matches!(self, Expression::Aggregate(_)) {
            return true;
        }
        self.arguments().iter().any(|child| child.contains_aggregate())
    }
}

/// `column OP literal` (either side), canonicalized to the column on the
/// left. The shape the index-scan machinery works on.
pub fn split_column_comparison(
    predicate: &Expression,
) -> Option<(ColumnExpr, ComparisonOperator, ScalarValue)> {
    let comparison = match predicate {
        Expression::Comparison(comparison) => comparison,
        _ => return None,
    };
    match (&*comparison.left, &*comparison.right) {
        (Expression::Column(column), Expression::Literal(literal)) => {
            Some((column.clone(), comparison.op, literal.literal.clone()))
        }
        (Expression::Literal(literal), Expression::Column(column)) => Some((
            column.clone(),
            comparison.op.flipped(),
            literal.literal.clone(),
        )),
        _ => None,
    }
}

/// Structural tree equality up to argument order of commutative operators
/// (AND, OR, addition, multiplication, equality).
pub fn deep_equals(left: &Expression, right: &Expression) -> bool {
    if !left.shallow_equals(right) {
        return false;
    }
    let commutative = match left {
        Expression::Arith(e) => e.op.is_commutative(),
        Expression::Comparison(e) => e.op.is_commutative(),
        Expression::Conjunction(_) => true,
        _ => false,
    };
    let l_args = left.arguments();
    let r_args = right.arguments();
    if l_args.len() != r_args.len() {
        return false;
    }
    let in_order = l_args
        .iter()
        .zip(r_args.iter())
        .all(|(a, b)| deep_equals(a, b));
    if in_order {
        return true;
    }
    if commutative && l_args.len() == 2 {
        return deep_equals(l_args[0], r_args[1]) && deep_equals(l_args[1], r_args[0]);
    }
    false
}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Expression::Column(e) => e.hash(state),
            Expression::Literal(e) => e.hash(state),
            Expression::Arith(e) => e.op.hash(state),
            Expression::Comparison(e) => e.op.hash(state),
            Expression::Conjunction(e) => e.op.hash(state),
            Expression::Negate(e) => e.op.hash(state),
            Expression::Is(e) => e.op.hash(state),
            Expression::Function(e) => e.function.hash(state),
            Expression::Aggregate(e) => e.function.hash(state),
            Expression::Case(_) => {}
            Expression::In(e) => e.negated.hash(state),
            Expression::Subquery(e) => {
                // Hash a structural fingerprint of the subplan so that equal
                // (isomorphic) subqueries land in the same bucket.
                e.subquery_type.hash(state);
                e.parameter_ids.hash(state);
                match &e.plan {
                    SubqueryPlan::Logical(plan) => plan.structural_hash().hash(state),
                    SubqueryPlan::Physical(plan) => plan.name().hash(state),
                }
            }
            Expression::Placeholder(e) => e.id.hash(state),
        }
        for child in self.arguments() {
            child.hash(state);
        }
    }
}

impl Eq for Expression {}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Column(e) => write!(f, "{e}"),
            Expression::Literal(e) => write!(f, "{e}"),
            Expression::Arith(e) => write!(f, "{e}"),
            Expression::Comparison(e) => write!(f, "{e}"),
            Expression::Conjunction(e) => write!(f, "{e}"),
            Expression::Negate(e) => write!(f, "{e}"),
            Expression::Is(e) => write!(f, "{e}"),
            Expression::Function(e) => write!(f, "{e}"),
            Expression::Aggregate(e) => write!(f, "{e}"),
            Expression::Case(e) => write!(f, "{e}"),
            Expression::In(e) => write!(f, "{e}"),
            Expression::Subquery(e) => write!(f, "{e}"),
            Expression::Placeholder(e) => write!(f, "{e}"),
        }
    }
}

// Builder helpers, used heavily by the translator and by tests.

pub fn lit(value: impl Into<ScalarValue>) -> Expression {
    Expression::Literal(LiteralExpr {
        literal: value.into(),
    })
}

pub fn null_lit() -> Expression {
    Expression::Literal(LiteralExpr {
        literal: ScalarValue::Null,
    })
}

pub fn col_ref(
    table_ref: TableRef,
    column: usize,
    name: impl Into<String>,
    datatype: DataType,
) -> Expression {
    Expression::Column(ColumnExpr::new(table_ref, column, name, datatype, false))
}

pub fn comparison(op: ComparisonOperator, left: Expression, right: Expression) -> Expression {
    Expression::Comparison(ComparisonExpr {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn eq(left: Expression, right: Expression) -> Expression {
    comparison(ComparisonOperator::Eq, left, right)
}

pub fn gt(left: Expression, right: Expression) -> Expression {
    comparison(ComparisonOperator::Gt, left, right)
}

pub fn gt_eq(left: Expression, right: Expression) -> Expression {
    comparison(ComparisonOperator::GtEq, left, right)
}

pub fn lt(left: Expression, right: Expression) -> Expression {
    comparison(ComparisonOperator::Lt, left, right)
}

pub fn lt_eq(left: Expression, right: Expression) -> Expression {
    comparison(ComparisonOperator::LtEq, left, right)
}

pub fn and(left: Expression, right: Expression) -> Expression {
    Expression::Conjunction(ConjunctionExpr {
        op: ConjunctionOperator::And,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn or(left: Expression, right: Expression) -> Expression {
    Expression::Conjunction(ConjunctionExpr {
        op: ConjunctionOperator::Or,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn not(expr: Expression) -> Expression {
    Expression::Negate(NegateExpr {
        op: NegateOperator::Not,
        expr: Box::new(expr),
    })
}

pub fn arith(op: ArithOperator, left: Expression, right: Expression) -> Expression {
    Expression::Arith(ArithExpr {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn add(left: Expression, right: Expression) -> Expression {
    arith(ArithOperator::Add, left, right)
}

pub fn aggregate(function: AggregateFunction, input: Expression) -> Expression {
    Expression::Aggregate(AggregateExpr {
        function,
        input: Some(Box::new(input)),
    })
}

pub fn count_star() -> Expression {
    Expression::Aggregate(AggregateExpr {
        function: AggregateFunction::Count,
        input: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col_a() -> Expression {
        col_ref(TableRef(0), 0, "a", DataType::Int32)
    }

    #[test]
    fn structural_equality_ignores_identity() {
        let left = and(gt(col_a(), lit(10)), lit(1));
        let right = and(gt(col_a(), lit(10)), lit(1));
        assert_eq!(left, right);
        assert_ne!(left, and(gt(col_a(), lit(11)), lit(1)));
    }

    #[test]
    fn deep_equals_is_commutative_for_and() {
        let a = gt(col_a(), lit(10));
        let b = lt(col_a(), lit(50));
        assert!(deep_equals(&and(a.clone(), b.clone()), &and(b.clone(), a.clone())));
        // But not for comparisons that aren't symmetric.
        assert!(!deep_equals(&gt(col_a(), lit(1)), &gt(lit(1), col_a())));
    }

    #[test]
    fn equal_expressions_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let hash = |e: &Expression| {
            let mut h = DefaultHasher::new();
            e.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&gt(col_a(), lit(10))), hash(&gt(col_a(), lit(10))));
    }

    #[test]
    fn deep_copy_shares_nothing_observable() {
        let original = and(gt(col_a(), lit(10)), not(lit(0)));
        let copy = original.deep_copy();
        assert_eq!(original, copy);
    }

    #[test]
    fn data_types() {
        assert_eq!(DataType::Int32, gt(col_a(), lit(10)).data_type());
        assert_eq!(
            DataType::Int64,
            aggregate(AggregateFunction::Sum, col_a()).data_type()
        );
        assert_eq!(
            DataType::Float64,
            aggregate(AggregateFunction::Avg, col_a()).data_type()
        );
        assert_eq!(DataType::Int64, count_star().data_type());
        assert_eq!(
            DataType::Float64,
            add(col_a(), lit(1.5f64)).data_type()
        );
    }

    #[test]
    fn case_promotes_then_and_else() {
        let case = Expression::Case(CaseExpr {
            when: Box::new(gt(col_a(), lit(0))),
            then: Box::new(lit(1)),
            else_expr: Box::new(lit(2.0f64)),
        });
        assert_eq!(DataType::Float64, case.data_type());
    }

    #[test]
    fn const_folding() {
        assert_eq!(Some(ScalarValue::Int32(9)), add(lit(4), lit(5)).try_fold());
        assert_eq!(
            Some(ScalarValue::Int32(1)),
            and(lit(1), gt(lit(5), lit(3))).try_fold()
        );
        assert_eq!(None, add(col_a(), lit(5)).try_fold());
        // NULL propagates through logic.
        assert_eq!(Some(ScalarValue::Null), and(lit(1), null_lit()).try_fold());
    }

    #[test]
    fn column_names() {
        assert_eq!("a > 10", gt(col_a(), lit(10)).as_column_name());
        assert_eq!(
            "SUM(a)",
            aggregate(AggregateFunction::Sum, col_a()).as_column_name()
        );
        assert_eq!("COUNT(*)", count_star().as_column_name());
    }
}

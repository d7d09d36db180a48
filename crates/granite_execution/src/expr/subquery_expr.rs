use super::comparison_expr::ComparisonOperator;
use super::placeholder_expr::ParameterId;
use super::Expression;
use crate::execution::operators::OperatorRef;
use crate::logical::NodeRef;
use crate::storage::DataType;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubqueryType {
    /// Produces a single value; empty result is NULL.
    Scalar,
    Exists {
        negated: bool,
    },
    /// `expr OP ANY (subquery)`; IN translates to `= ANY`.
    Any {
        op: ComparisonOperator,
        negated: bool,
    },
}

/// The embedded plan. Built as a logical plan by the translator; the
/// physical planner swaps in an operator DAG.
#[derive(Debug, Clone)]
pub enum SubqueryPlan {
    Logical(NodeRef),
    Physical(OperatorRef),
}

/// A sub-select with its correlated parameter bindings.
///
/// `arguments[i]` is the outer-query expression feeding `parameter_ids[i]`;
/// the inner plan refers to it through a placeholder with that id. The two
/// lists always have the same length.
#[derive(Debug, Clone)]
pub struct SubqueryExpr {
    pub subquery_type: SubqueryType,
    pub plan: SubqueryPlan,
    pub return_type: DataType,
    /// Left-hand side of an ANY comparison.
    pub compare_expr: Option<Box<Expression>>,
    pub parameter_ids: Vec<ParameterId>,
    pub arguments: Vec<Expression>,
}

impl SubqueryExpr {
    pub fn parameter_count(&self) -> usize {
        debug_assert_eq!(self.parameter_ids.len(), self.arguments.len());
        self.parameter_ids.len()
    }

    pub fn is_correlated(&self) -> bool {
        !self.parameter_ids.is_empty()
    }

    pub fn data_type(&self) -> DataType {
        match self.subquery_type {
            SubqueryType::Scalar => self.return_type,
            SubqueryType::Exists { .. } | SubqueryType::Any { .. } => DataType::Int32,
        }
    }
}

impl PartialEq for SubqueryExpr {
    fn eq(&self, other: &Self) -> bool {
        if self.subquery_type != other.subquery_type
            || self.parameter_ids != other.parameter_ids
            || self.compare_expr != other.compare_expr
            || self.arguments != other.arguments
        {
            return false;
        }
        match (&self.plan, &other.plan) {
            (SubqueryPlan::Logical(a), SubqueryPlan::Logical(b)) => crate::logical::deep_equals(a, b),
            (SubqueryPlan::Physical(a), SubqueryPlan::Physical(b)) => std::sync::Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for SubqueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subquery_type {
            SubqueryType::Scalar => write!(f, "(subquery)"),
            SubqueryType::Exists { negated: false } => write!(f, "EXISTS (subquery)"),
            SubqueryType::Exists { negated: true } => write!(f, "NOT EXISTS (subquery)"),
            SubqueryType::Any { op, negated } => {
                let compare = self
                    .compare_expr
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                if *negated {
                    write!(f, "NOT {compare} {op} ANY (subquery)")
                } else {
                    write!(f, "{compare} {op} ANY (subquery)")
                }
            }
        }
    }
}

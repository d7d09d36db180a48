use super::OptimizerRule;
use crate::expr::{self, ConjunctionOperator, Expression, NegateOperator};
use crate::logical::{
    collect_nodes, replace_node, LogicalFilter, LogicalNode, LogicalNodeKind, NodeRef,
};
use granite_error::Result;

/// Simplifies the expressions inside plan nodes: folds constant
/// sub-expressions (which also collapses tautologies like `1 = 1`), cancels
/// double negation, applies AND/OR identities, and pushes literals to the
/// right-hand side of commutative operators.
#[derive(Debug)]
pub struct ExpressionRewriteRule;

impl OptimizerRule for ExpressionRewriteRule {
    fn name(&self) -> &'static str {
        "ExpressionRewrite"
    }

    fn apply(&self, root: &NodeRef) -> Result<bool> {
        let mut changed = false;

        for node in collect_nodes(root) {
            let rewritten = match node.kind() {
                LogicalNodeKind::Filter(filter) => {
                    let mut predicate = filter.predicate.clone();
                    if !rewrite_expression(&mut predicate) {
                        continue;
                    }
                    let new_filter = LogicalFilter::with_scan_type(predicate, filter.scan_type());
                    LogicalNode::make(LogicalNodeKind::Filter(new_filter))
                }
                LogicalNodeKind::Project(project) => {
                    let mut expressions = project.expressions.clone();
                    let mut any = false;
                    for expression in &mut expressions {
                        any |= rewrite_expression(expression);
                    }
                    if !any {
                        continue;
                    }
                    let mut new_project = project.clone();
                    new_project.expressions = expressions;
                    LogicalNode::make(LogicalNodeKind::Project(new_project))
                }
                LogicalNodeKind::Join(join) => {
                    let mut predicate = match &join.predicate {
                        Some(predicate) => predicate.clone(),
                        None => continue,
                    };
                    if !rewrite_expression(&mut predicate) {
                        continue;
                    }
                    let mut new_join = join.clone();
                    new_join.predicate = Some(predicate);
                    LogicalNode::make(LogicalNodeKind::Join(new_join))
                }
                _ => continue,
            };

            replace_node(&node, &rewritten);
            changed = true;
        }

        Ok(changed)
    }
}

/// Bottom-up single pass; the driver's fixpoint loop finishes the job.
fn rewrite_expression(expression: &mut Expression) -> bool {
    let mut changed = false;
    for child in expression.arguments_mut() {
        changed |= rewrite_expression(child);
    }

    // Constant folding, which subsumes tautologies.
    if !matches!(expression, Expression::Literal(_)) && expression.is_const_foldable() {
        if let Some(value) = expression.try_fold() {
            *expression = expr::lit(value);
            return true;
        }
    }

    match expression {
        // Literals go right of commutative operators.
        Expression::Comparison(comparison)
            if comparison.op.is_commutative()
                && matches!(*comparison.left, Expression::Literal(_))
                && !matches!(*comparison.right, Expression::Literal(_)) =>
        {
            std::mem::swap(&mut comparison.left, &mut comparison.right);
            changed = true;
        }
        Expression::Comparison(comparison)
            if matches!(*comparison.left, Expression::Literal(_))
                && !matches!(*comparison.right, Expression::Literal(_)) =>
        {
            std::mem::swap(&mut comparison.left, &mut comparison.right);
            comparison.op = comparison.op.flipped();
            changed = true;
        }
        Expression::Arith(arith)
            if arith.op.is_commutative()
                && matches!(*arith.left, Expression::Literal(_))
                && !matches!(*arith.right, Expression::Literal(_)) =>
        {
            std::mem::swap(&mut arith.left, &mut arith.right);
            changed = true;
        }
        Expression::Conjunction(conjunction) => {
            let literal_side = |side: &Expression| match side {
                Expression::Literal(literal) if !literal.literal.is_null() => {
                    Some(literal.literal.is_truthy())
                }
                _ => None,
            };
            let (lhs, rhs) = (
                literal_side(&conjunction.left),
                literal_side(&conjunction.right),
            );
            let replacement = match (conjunction.op, lhs, rhs) {
                (ConjunctionOperator::And, Some(true), _) => Some((*conjunction.right).clone()),
                (ConjunctionOperator::And, _, Some(true)) => Some((*conjunction.left).clone()),
                (ConjunctionOperator::And, Some(false), _)
                | (ConjunctionOperator::And, _, Some(false)) => Some(expr::lit(0)),
                (ConjunctionOperator::Or, Some(false), _) => Some((*conjunction.right).clone()),
                (ConjunctionOperator::Or, _, Some(false)) => Some((*conjunction.left).clone()),
                (ConjunctionOperator::Or, Some(true), _)
                | (ConjunctionOperator::Or, _, Some(true)) => Some(expr::lit(1)),
                _ => None,
            };
            if let Some(replacement) = replacement {
                *expression = replacement;
                changed = true;
            }
        }
        Expression::Negate(negate) if negate.op == NegateOperator::Not => {
            if let Expression::Negate(inner) = &*negate.expr {
                if inner.op == NegateOperator::Not {
                    *expression = (*inner.expr).clone();
                    changed = true;
                }
            }
        }
        _ => {}
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{add, and, col_ref, eq, gt, lit, not, TableRef};
    use crate::storage::DataType;

    fn col_a() -> Expression {
        col_ref(TableRef(0), 0, "a", DataType::Int32)
    }

    #[test]
    fn folds_constants() {
        let mut e = add(lit(4), lit(5));
        assert!(rewrite_expression(&mut e));
        assert_eq!(lit(9), e);
    }

    #[test]
    fn folds_tautologies_inside_conjunctions() {
        // 1 = 1 AND a > 10  →  a > 10
        let mut e = and(eq(lit(1), lit(1)), gt(col_a(), lit(10)));
        assert!(rewrite_expression(&mut e));
        assert_eq!(gt(col_a(), lit(10)), e);
    }

    #[test]
    fn literal_moves_to_the_right() {
        // 10 < a  →  a > 10
        let mut e = crate::expr::lt(lit(10), col_a());
        assert!(rewrite_expression(&mut e));
        assert_eq!(gt(col_a(), lit(10)), e);
    }

    #[test]
    fn cancels_double_negation() {
        let mut e = not(not(gt(col_a(), lit(10))));
        assert!(rewrite_expression(&mut e));
        assert_eq!(gt(col_a(), lit(10)), e);
    }

    #[test]
    fn leaves_columns_alone() {
        let mut e = gt(col_a(), lit(10));
        assert!(!rewrite_expression(&mut e));
    }
}

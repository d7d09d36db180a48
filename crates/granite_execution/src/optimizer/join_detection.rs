use super::OptimizerRule;
use crate::expr::{ComparisonOperator, Expression, TableRef};
use crate::logical::{
    collect_nodes, replace_node, JoinType, LogicalJoin, LogicalNode, LogicalNodeKind, NodeRef,
};
use granite_error::Result;
use std::collections::HashSet;

/// Turns a cross join directly under an equality filter into an inner
/// equi-join, absorbing the filter.
#[derive(Debug)]
pub struct JoinDetectionRule;

impl OptimizerRule for JoinDetectionRule {
    fn name(&self) -> &'static str {
        "JoinDetection"
    }

    fn apply(&self, root: &NodeRef) -> Result<bool> {
        let mut changed = false;

        for node in collect_nodes(root) {
            let cross = match node.kind() {
                LogicalNodeKind::Join(join) if join.join_type == JoinType::Cross => node.clone(),
                _ => continue,
            };
            if cross.output_count() != 1 {
                continue;
            }

            let outputs = cross.outputs_with_sides();
            let (filter_node, _) = match outputs.as_slice() {
                [only] => only.clone(),
                _ => continue,
            };
            let filter = match filter_node.kind() {
                LogicalNodeKind::Filter(filter) => filter,
                _ => continue,
            };

            let left = match cross.left_input() {
                Some(left) => left,
                None => continue,
            };
            let right = match cross.right_input() {
                Some(right) => right,
                None => continue,
            };
            if !is_equi_predicate(
                &filter.predicate,
                &left.column_expressions(),
                &right.column_expressions(),
            ) {
                continue;
            }

            let predicate = filter.predicate.clone();
            filter_node.remove_from_tree();
            let join = LogicalNode::make(LogicalNodeKind::Join(LogicalJoin {
                join_type: JoinType::Inner,
                predicate: Some(predicate),
            }));
            replace_node(&cross, &join);
            changed = true;
        }

        Ok(changed)
    }
}

/// An equality comparison with one side entirely from each input.
fn is_equi_predicate(
    predicate: &Expression,
    left_columns: &[Expression],
    right_columns: &[Expression],
) -> bool {
    let comparison = match predicate {
        Expression::Comparison(comparison) if comparison.op == ComparisonOperator::Eq => comparison,
        _ => return false,
    };

    let refs_of = |columns: &[Expression]| -> HashSet<TableRef> {
        columns
            .iter()
            .flat_map(|expr| {
                let mut out = Vec::new();
                expr.collect_column_refs(&mut out);
                out.into_iter().map(|c| c.table_ref)
            })
            .collect()
    };
    let left_refs = refs_of(left_columns);
    let right_refs = refs_of(right_columns);

    let side_of = |expr: &Expression| -> Option<bool> {
        let mut columns = Vec::new();
        expr.collect_column_refs(&mut columns);
        if columns.is_empty() {
            return None;
        }
        if columns.iter().all(|c| left_refs.contains(&c.table_ref)) {
            Some(true)
        } else if columns.iter().all(|c| right_refs.contains(&c.table_ref)) {
            Some(false)
        } else {
            None
        }
    };

    matches!(
        (side_of(&comparison.left), side_of(&comparison.right)),
        (Some(true), Some(false)) | (Some(false), Some(true))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col_ref, eq, gt, lit};
    use crate::logical::{deep_equals, LogicalFilter, LogicalMock};
    use crate::optimizer::Optimizer;
    use crate::statistics::{ColumnStatistics, TableStatistics};
    use crate::storage::{ColumnDefinition, DataType};
    use std::sync::Arc;

    fn mock(table_ref: TableRef) -> NodeRef {
        LogicalMock::make(
            table_ref,
            vec![ColumnDefinition::new("a", DataType::Int32, false)],
            Arc::new(TableStatistics::new(
                100.0,
                vec![ColumnStatistics::new(0.0, 10.0, 0, 100)],
            )),
        )
    }

    #[test]
    fn cross_plus_equality_becomes_inner_join() {
        let left = mock(TableRef(0));
        let right = mock(TableRef(1));
        let predicate = eq(
            col_ref(TableRef(0), 0, "a", DataType::Int32),
            col_ref(TableRef(1), 0, "a", DataType::Int32),
        );
        let cross = LogicalJoin::make(JoinType::Cross, None, left.clone(), right.clone());
        let filter = LogicalFilter::make(predicate.clone(), cross);

        let out = Optimizer::apply_rule(&JoinDetectionRule, filter).unwrap();

        let expected =
            LogicalJoin::make(JoinType::Inner, Some(predicate), left, right);
        assert!(deep_equals(&out, &expected));
    }

    #[test]
    fn non_equality_filters_stay() {
        let left = mock(TableRef(0));
        let right = mock(TableRef(1));
        let cross = LogicalJoin::make(JoinType::Cross, None, left, right);
        let filter = LogicalFilter::make(
            gt(col_ref(TableRef(0), 0, "a", DataType::Int32), lit(10)),
            cross.clone(),
        );

        let out = Optimizer::apply_rule(&JoinDetectionRule, filter.clone()).unwrap();
        assert!(Arc::ptr_eq(&out, &filter));
        assert!(Arc::ptr_eq(&filter.left_input().unwrap(), &cross));
    }
}

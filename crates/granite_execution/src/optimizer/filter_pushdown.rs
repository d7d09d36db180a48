use super::OptimizerRule;
use crate::expr::{ColumnExpr, Expression};
use crate::logical::{collect_nodes, InputSide, JoinType, LogicalNodeKind, NodeRef};
use granite_error::Result;
use std::collections::HashSet;

/// Moves filters below projections and into the matching side of inner and
/// cross joins, so they run where fewer rows are in flight.
///
/// A filter only moves when it has a single output and the node it moves past
/// has a single output; the columns it references must all be available below
/// the new position. Outer, semi and anti joins are left alone: pushing a
/// filter past them changes their semantics.
#[derive(Debug)]
pub struct FilterPushdownRule;

impl OptimizerRule for FilterPushdownRule {
    fn name(&self) -> &'static str {
        "FilterPushdown"
    }

    fn apply(&self, root: &NodeRef) -> Result<bool> {
        let mut changed = false;
        // Each pass moves a filter at most one level; loop until settled,
        // bounded by the plan size.
        for _ in 0..collect_nodes(root).len().max(1) {
            if !push_one_level(root)? {
                break;
            }
            changed = true;
        }
        Ok(changed)
    }
}

fn push_one_level(root: &NodeRef) -> Result<bool> {
    let mut changed = false;

    for node in collect_nodes(root) {
        if !matches!(node.kind(), LogicalNodeKind::Filter(_)) || node.output_count() != 1 {
            continue;
        }
        let input = match node.left_input() {
            Some(input) => input,
            None => continue,
        };
        if input.output_count() != 1 {
            continue;
        }

        let predicate_columns = {
            let filter = match node.kind() {
                LogicalNodeKind::Filter(filter) => filter,
                _ => unreachable!(),
            };
            let mut columns = Vec::new();
            filter.predicate.collect_column_refs(&mut columns);
            columns
        };
        if predicate_columns.is_empty() {
            continue;
        }

        match input.kind() {
            LogicalNodeKind::Project(_) => {
                let below = match input.left_input() {
                    Some(below) => below,
                    None => continue,
                };
                if !columns_available(&predicate_columns, &below.column_expressions()) {
                    continue;
                }
                node.remove_from_tree();
                input.set_left_input(Some(node.clone()));
                node.set_left_input(Some(below));
                changed = true;
            }
            LogicalNodeKind::Join(join)
                if matches!(join.join_type, JoinType::Inner | JoinType::Cross) =>
            {
                let sides = [InputSide::Left, InputSide::Right];
                for side in sides {
                    let child = match input.input(side) {
                        Some(child) => child,
                        None => continue,
                    };
                    if !columns_available(&predicate_columns, &child.column_expressions()) {
                        continue;
                    }
                    node.remove_from_tree();
                    input.set_input(side, Some(node.clone()));
                    node.set_left_input(Some(child));
                    changed = true;
                    break;
                }
            }
            _ => {}
        }
    }

    Ok(changed)
}

fn columns_available(needed: &[ColumnExpr], below: &[Expression]) -> bool {
    let available: HashSet<(crate::expr::TableRef, usize)> = below
        .iter()
        .filter_map(|expr| match expr {
            Expression::Column(column) => Some((column.table_ref, column.column)),
            _ => None,
        })
        .collect();
    needed
        .iter()
        .all(|column| available.contains(&(column.table_ref, column.column)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col_ref, gt, lit, TableRef};
    use crate::logical::{
        LogicalFilter, LogicalJoin, LogicalMock, LogicalProject,
    };
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
    fn filter_moves_below_projection() {
        let table = mock(TableRef(0));
        let col = col_ref(TableRef(0), 0, "a", DataType::Int32);
        let project = LogicalProject::make(vec![col.clone()], table.clone());
        let filter = LogicalFilter::make(gt(col, lit(10)), project.clone());

        let out = Optimizer::apply_rule(&FilterPushdownRule, filter.clone()).unwrap();

        assert!(Arc::ptr_eq(&out, &project));
        assert!(Arc::ptr_eq(&project.left_input().unwrap(), &filter));
        assert!(Arc::ptr_eq(&filter.left_input().unwrap(), &table));
    }

    #[test]
    fn filter_moves_into_join_side() {
        let left = mock(TableRef(0));
        let right = mock(TableRef(1));
        let join = LogicalJoin::make(JoinType::Cross, None, left.clone(), right.clone());
        let right_col = col_ref(TableRef(1), 0, "a", DataType::Int32);
        let filter = LogicalFilter::make(gt(right_col, lit(10)), join.clone());

        let out = Optimizer::apply_rule(&FilterPushdownRule, filter.clone()).unwrap();

        assert!(Arc::ptr_eq(&out, &join));
        assert!(Arc::ptr_eq(&join.left_input().unwrap(), &left));
        assert!(Arc::ptr_eq(&join.right_input().unwrap(), &filter));
        assert!(Arc::ptr_eq(&filter.left_input().unwrap(), &right));
    }

    #[test]
    fn filter_stays_above_outer_joins() {
        let left = mock(TableRef(0));
        let right = mock(TableRef(1));
        let join = LogicalJoin::make(
            JoinType::Left,
            Some(gt(
                col_ref(TableRef(0), 0, "a", DataType::Int32),
                col_ref(TableRef(1), 0, "a", DataType::Int32),
            )),
            left,
            right,
        );
        let filter = LogicalFilter::make(
            gt(col_ref(TableRef(1), 0, "a", DataType::Int32), lit(10)),
            join.clone(),
        );

        let out = Optimizer::apply_rule(&FilterPushdownRule, filter.clone()).unwrap();
        assert!(Arc::ptr_eq(&out, &filter));
        assert!(Arc::ptr_eq(&filter.left_input().unwrap(), &join));
    }
}

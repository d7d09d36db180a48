use super::OptimizerRule;
use crate::logical::{LogicalNode, LogicalNodeKind, NodeRef};
use crate::statistics;
use granite_error::{GraniteError, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Sorts chains of consecutive filters so the most selective predicate sits
/// lowest, shrinking intermediate results as early as possible.
///
/// A chain is a run of filters in which every member has exactly one output;
/// a filter consumed by more than one node is pinned where it is and
/// terminates chain collection. Each filter's output is estimated against the
/// chain's bottom input; the sort is stable, so equal estimates keep their
/// original order and the rule is deterministic.
#[derive(Debug)]
pub struct PredicateReorderingRule;

impl OptimizerRule for PredicateReorderingRule {
    fn name(&self) -> &'static str {
        "PredicateReordering"
    }

    fn apply(&self, root: &NodeRef) -> Result<bool> {
        let mut changed = false;
        let mut visited = HashSet::new();
        visit(root, &mut visited, &mut changed)?;
        Ok(changed)
    }
}

fn visit(
    node: &NodeRef,
    visited: &mut HashSet<*const LogicalNode>,
    changed: &mut bool,
) -> Result<()> {
    if !visited.insert(Arc::as_ptr(node)) {
        return Ok(());
    }

    if matches!(node.kind(), LogicalNodeKind::Filter(_)) {
        let chain = collect_chain(node);
        if chain.is_empty() {
            // Pinned by multiple outputs; leave it and look below.
            if let Some(below) = node.left_input() {
                visit(&below, visited, changed)?;
            }
            return Ok(());
        }

        // The chain's input, captured before any relinking.
        let below = chain.last().expect("nonempty chain").left_input();
        if chain.len() > 1 {
            *changed |= reorder_chain(&chain)?;
        }
        for member in &chain {
            visited.insert(Arc::as_ptr(member));
        }
        if let Some(below) = below {
            visit(&below, visited, changed)?;
        }
        return Ok(());
    }

    for input in [node.left_input(), node.right_input()].into_iter().flatten() {
        visit(&input, visited, changed)?;
    }
    Ok(())
}

/// The maximal filter run starting at `top`, top-down. Stops at the first
/// non-filter or the first node with more than one output.
fn collect_chain(top: &NodeRef) -> Vec<NodeRef> {
    let mut chain = Vec::new();
    let mut current = Some(top.clone());
    while let Some(node) = current {
        if !matches!(node.kind(), LogicalNodeKind::Filter(_)) || node.output_count() > 1 {
            break;
        }
        current = node.left_input();
        chain.push(node);
    }
    chain
}

fn reorder_chain(chain: &[NodeRef]) -> Result<bool> {
    let input = chain
        .last()
        .expect("nonempty chain")
        .left_input()
        .ok_or_else(|| GraniteError::optimizer("filter chain has no input"))?;
    let input_stats = input.statistics();
    let input_columns = input.column_expressions();

    // Estimate every filter against the common chain input.
    let mut keyed: Vec<(f32, NodeRef)> = chain
        .iter()
        .map(|node| {
            let filter = match node.kind() {
                LogicalNodeKind::Filter(filter) => filter,
                _ => unreachable!("chain holds filters"),
            };
            let estimate =
                statistics::estimate_predicate(&input_stats, &input_columns, &filter.predicate);
            (estimate.row_count, node.clone())
        })
        .collect();

    // Most rows on top, most selective at the bottom. Stable: ties keep
    // their original position.
    keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let unchanged = keyed
        .iter()
        .zip(chain.iter())
        .all(|((_, sorted), original)| Arc::ptr_eq(sorted, original));
    if unchanged {
        return Ok(false);
    }

    // Detach the chain, then relink in sorted order and reattach the former
    // outputs to the new top.
    let outputs = chain[0].outputs_with_sides();
    for node in chain {
        node.set_left_input(None);
    }
    for pair in keyed.windows(2) {
        pair[0].1.set_left_input(Some(pair[1].1.clone()));
    }
    keyed
        .last()
        .expect("nonempty chain")
        .1
        .set_left_input(Some(input));
    for (parent, side) in outputs {
        parent.set_input(side, Some(keyed[0].1.clone()));
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col_ref, eq, gt, gt_eq, lt, lit, Expression, TableRef};
    use crate::logical::{
        deep_equals, JoinType, LogicalFilter, LogicalJoin, LogicalMock, LogicalProject,
        LogicalUnion, UnionMode,
    };
    use crate::optimizer::Optimizer;
    use crate::statistics::{ColumnStatistics, TableStatistics};
    use crate::storage::{ColumnDefinition, DataType};
    use std::sync::Arc;

    // 100 rows; a: 20 distinct in 10..100, b: 5 in 50..60, c: 2 in 110..1100.
    fn mock_node() -> NodeRef {
        LogicalMock::make(
            TableRef(0),
            vec![
                ColumnDefinition::new("a", DataType::Int32, false),
                ColumnDefinition::new("b", DataType::Int32, false),
                ColumnDefinition::new("c", DataType::Int32, false),
            ],
            Arc::new(TableStatistics::new(
                100.0,
                vec![
                    ColumnStatistics::new(0.0, 20.0, 10, 100),
                    ColumnStatistics::new(0.0, 5.0, 50, 60),
                    ColumnStatistics::new(0.0, 2.0, 110, 1100),
                ],
            )),
        )
    }

    fn col(idx: usize, name: &str) -> Expression {
        col_ref(TableRef(0), idx, name, DataType::Int32)
    }

    fn col_a() -> Expression {
        col(0, "a")
    }

    fn col_b() -> Expression {
        col(1, "b")
    }

    fn col_c() -> Expression {
        col(2, "c")
    }

    #[test]
    fn simple_reordering() {
        let mock = mock_node();
        let input = LogicalFilter::make(
            gt(col_a(), lit(50)),
            LogicalFilter::make(gt(col_a(), lit(10)), mock.clone()),
        );
        let expected = LogicalFilter::make(
            gt(col_a(), lit(10)),
            LogicalFilter::make(gt(col_a(), lit(50)), mock.clone()),
        );

        let reordered = Optimizer::apply_rule(&PredicateReorderingRule, input).unwrap();
        assert!(deep_equals(&reordered, &expected));
    }

    #[test]
    fn three_predicate_reordering() {
        let mock = mock_node();
        let input = LogicalFilter::make(
            gt(col_a(), lit(99)),
            LogicalFilter::make(
                gt(col_b(), lit(55)),
                LogicalFilter::make(gt(col_c(), lit(100)), mock.clone()),
            ),
        );
        // c > 100 keeps everything (the whole range is above 100), b > 55
        // keeps about half, a > 99 keeps one value in ninety-one.
        let expected = LogicalFilter::make(
            gt(col_c(), lit(100)),
            LogicalFilter::make(
                gt(col_b(), lit(55)),
                LogicalFilter::make(gt(col_a(), lit(99)), mock.clone()),
            ),
        );

        let reordered = Optimizer::apply_rule(&PredicateReorderingRule, input).unwrap();
        assert!(deep_equals(&reordered, &expected));
    }

    #[test]
    fn reordering_stops_at_non_filter_nodes() {
        // Two chains separated by a projection reorder independently.
        let mock = mock_node();
        let lower = LogicalFilter::make(
            gt_eq(col_a(), lit(90)),
            LogicalFilter::make(lt(col_c(), lit(500)), mock.clone()),
        );
        let project = LogicalProject::make(vec![col_a(), col_b(), col_c()], lower);
        let input = LogicalFilter::make(
            eq(col_a(), lit(42)),
            LogicalFilter::make(
                gt(col_b(), lit(50)),
                LogicalFilter::make(gt(col_b(), lit(40)), project),
            ),
        );

        let expected_lower = LogicalFilter::make(
            lt(col_c(), lit(500)),
            LogicalFilter::make(gt_eq(col_a(), lit(90)), mock.clone()),
        );
        let expected_project =
            LogicalProject::make(vec![col_a(), col_b(), col_c()], expected_lower);
        let expected = LogicalFilter::make(
            gt(col_b(), lit(40)),
            LogicalFilter::make(
                gt(col_b(), lit(50)),
                LogicalFilter::make(eq(col_a(), lit(42)), expected_project),
            ),
        );

        let reordered = Optimizer::apply_rule(&PredicateReorderingRule, input).unwrap();
        assert!(deep_equals(&reordered, &expected));
    }

    #[test]
    fn chains_on_both_join_sides() {
        let stats = Arc::new(TableStatistics::new(
            100.0,
            vec![ColumnStatistics::new(0.0, 100.0, 0, 100)],
        ));
        let columns = vec![ColumnDefinition::new("a", DataType::Int32, false)];
        let table_0 = LogicalMock::make(TableRef(0), columns.clone(), stats.clone());
        let table_1 = LogicalMock::make(TableRef(1), columns, stats);
        let col_l = col_ref(TableRef(0), 0, "a", DataType::Int32);
        let col_r = col_ref(TableRef(1), 0, "a", DataType::Int32);

        let predicate_1 = LogicalFilter::make(gt(col_l.clone(), lit(60)), table_0.clone());
        let predicate_0 = LogicalFilter::make(gt(col_l.clone(), lit(80)), predicate_1.clone());
        let predicate_4 = LogicalFilter::make(gt(col_r.clone(), lit(30)), table_1.clone());
        let predicate_3 = LogicalFilter::make(gt(col_r.clone(), lit(50)), predicate_4.clone());
        let predicate_2 = LogicalFilter::make(gt(col_r.clone(), lit(90)), predicate_3.clone());
        let cross = LogicalJoin::make(JoinType::Cross, None, predicate_0.clone(), predicate_2.clone());

        let reordered = Optimizer::apply_rule(&PredicateReorderingRule, cross.clone()).unwrap();

        assert!(Arc::ptr_eq(&reordered, &cross));
        // Left side: the weaker predicate moved on top.
        assert!(Arc::ptr_eq(&cross.left_input().unwrap(), &predicate_1));
        assert!(Arc::ptr_eq(&predicate_1.left_input().unwrap(), &predicate_0));
        assert!(Arc::ptr_eq(&predicate_0.left_input().unwrap(), &table_0));
        // Right side: fully reversed.
        assert!(Arc::ptr_eq(&cross.right_input().unwrap(), &predicate_4));
        assert!(Arc::ptr_eq(&predicate_4.left_input().unwrap(), &predicate_3));
        assert!(Arc::ptr_eq(&predicate_3.left_input().unwrap(), &predicate_2));
        assert!(Arc::ptr_eq(&predicate_2.left_input().unwrap(), &table_1));
    }

    #[test]
    fn predicates_with_multiple_outputs_stay_in_place() {
        // predicate_a would belong below predicate_b, but predicate_b feeds
        // two consumers and is pinned.
        let stats = Arc::new(TableStatistics::new(
            100.0,
            vec![ColumnStatistics::new(0.0, 100.0, 0, 100)],
        ));
        let table = LogicalMock::make(
            TableRef(0),
            vec![ColumnDefinition::new("a", DataType::Int32, false)],
            stats,
        );
        let col = col_ref(TableRef(0), 0, "a", DataType::Int32);

        let predicate_b = LogicalFilter::make(gt(col.clone(), lit(10)), table.clone());
        let predicate_a = LogicalFilter::make(gt(col.clone(), lit(90)), predicate_b.clone());
        let union = LogicalUnion::make(UnionMode::All, predicate_a.clone(), predicate_b.clone());

        let reordered = Optimizer::apply_rule(&PredicateReorderingRule, union.clone()).unwrap();

        assert!(Arc::ptr_eq(&reordered, &union));
        assert!(Arc::ptr_eq(&union.left_input().unwrap(), &predicate_a));
        assert!(Arc::ptr_eq(&union.right_input().unwrap(), &predicate_b));
        assert!(Arc::ptr_eq(&predicate_a.left_input().unwrap(), &predicate_b));
        assert!(Arc::ptr_eq(&predicate_b.left_input().unwrap(), &table));
    }

    #[test]
    fn applying_twice_changes_nothing() {
        let mock = mock_node();
        let input = LogicalFilter::make(
            gt(col_a(), lit(50)),
            LogicalFilter::make(gt(col_a(), lit(10)), mock),
        );

        let once = Optimizer::apply_rule(&PredicateReorderingRule, input).unwrap();
        let root = crate::logical::LogicalRoot::make(once.clone());
        assert!(!PredicateReorderingRule.apply(&root).unwrap());
        root.set_left_input(None);
    }
}

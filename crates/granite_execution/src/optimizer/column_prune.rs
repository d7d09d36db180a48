use super::OptimizerRule;
use crate::expr::{Expression, TableRef};
use crate::logical::{
    collect_nodes, LogicalNodeKind, LogicalProject, NodeRef,
};
use granite_error::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// Narrows table accesses to the columns the rest of the plan consumes, by
/// inserting a pass-through projection directly above the access (above its
/// Validate, if present, so row identity is preserved for MVCC checks).
///
/// An access whose filter chain already runs into a covering projection is
/// left alone; scans emit reference tables, so a second narrowing below an
/// existing one saves nothing. Sub-trees feeding mutations or set operations
/// are also untouched: mutations need whole rows, and union sides must keep
/// matching schemas.
#[derive(Debug)]
pub struct ColumnPruningRule;

impl OptimizerRule for ColumnPruningRule {
    fn name(&self) -> &'static str {
        "ColumnPruning"
    }

    fn apply(&self, root: &NodeRef) -> Result<bool> {
        let nodes = collect_nodes(root);

        // Everything any expression in the plan refers to.
        let mut used: HashSet<(TableRef, usize)> = HashSet::new();
        for node in &nodes {
            for expression in payload_expressions(node) {
                let mut columns = Vec::new();
                expression.collect_column_refs(&mut columns);
                for column in columns {
                    used.insert((column.table_ref, column.column));
                }
            }
        }

        // Scans below mutations or unions are protected.
        let mut protected: HashSet<*const crate::logical::LogicalNode> = HashSet::new();
        for node in &nodes {
            if matches!(
                node.kind(),
                LogicalNodeKind::Insert(_)
                    | LogicalNodeKind::Update(_)
                    | LogicalNodeKind::Delete(_)
                    | LogicalNodeKind::Union(_)
            ) {
                for below in collect_nodes(node) {
                    protected.insert(Arc::as_ptr(&below));
                }
            }
        }

        let mut changed = false;
        for node in &nodes {
            let scan = match node.kind() {
                LogicalNodeKind::Scan(_) => node.clone(),
                _ => continue,
            };
            if protected.contains(&Arc::as_ptr(&scan)) {
                continue;
            }

            // The access whose output we narrow: the scan, or the Validate
            // directly above it.
            let access = match scan.outputs().as_slice() {
                [only] if matches!(only.kind(), LogicalNodeKind::Validate(_)) => only.clone(),
                _ => scan.clone(),
            };
            if access.output_count() != 1 {
                continue;
            }

            let columns = access.column_expressions();
            let mut kept: Vec<Expression> = columns
                .iter()
                .filter(|expr| match expr {
                    Expression::Column(column) => used.contains(&(column.table_ref, column.column)),
                    _ => true,
                })
                .cloned()
                .collect();
            if kept.is_empty() {
                // Operators need at least one column; keep the first.
                kept.push(columns.first().cloned().expect("table has columns"));
            }
            if kept.len() == columns.len() {
                continue;
            }

            // Already narrowed by a pass-through projection above (ours or
            // the query's own)? Filters may sit in between once pushdown has
            // run, so walk up through single-output filter chains.
            let mut cursor = access.clone();
            let mut narrowed = false;
            loop {
                let above = cursor.outputs_with_sides();
                let [(parent, _)] = above.as_slice() else { break };
                match parent.kind() {
                    LogicalNodeKind::Project(project)
                        if project.expressions.iter().all(|e| columns.contains(e)) =>
                    {
                        narrowed = true;
                        break;
                    }
                    LogicalNodeKind::Filter(_) => cursor = parent.clone(),
                    _ => break,
                }
            }
            if narrowed {
                continue;
            }

            let outputs = access.outputs_with_sides();
            let pruned = LogicalProject::make(kept, access.clone());
            for (parent, side) in outputs {
                parent.set_input(side, Some(pruned.clone()));
            }
            changed = true;
        }

        Ok(changed)
    }
}

fn payload_expressions(node: &NodeRef) -> Vec<Expression> {
    match node.kind() {
        LogicalNodeKind::Filter(filter) => vec![filter.predicate.clone()],
        LogicalNodeKind::Project(project) => project.expressions.clone(),
        LogicalNodeKind::Join(join) => join.predicate.iter().cloned().collect(),
        LogicalNodeKind::Aggregate(aggregate) => aggregate
            .group_by
            .iter()
            .chain(aggregate.aggregates.iter())
            .cloned()
            .collect(),
        LogicalNodeKind::Order(order) => order
            .order_by
            .iter()
            .map(|d| d.expression.clone())
            .collect(),
        LogicalNodeKind::Update(update) => update
            .assignments
            .iter()
            .map(|(_, e)| e.clone())
            .collect(),
        LogicalNodeKind::Values(values) => values.rows.iter().flatten().cloned().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col_ref, gt, lit};
    use crate::logical::{LogicalFilter, LogicalScan};
    use crate::optimizer::Optimizer;
    use crate::storage::table::DEFAULT_TARGET_CHUNK_SIZE;
    use crate::storage::{ColumnDefinition, DataType, Table};
    use std::sync::Arc;

    fn three_column_table() -> Arc<Table> {
        Arc::new(Table::new(
            vec![
                ColumnDefinition::new("a", DataType::Int32, false),
                ColumnDefinition::new("b", DataType::Int32, false),
                ColumnDefinition::new("c", DataType::Int32, false),
            ],
            DEFAULT_TARGET_CHUNK_SIZE,
        ))
    }

    #[test]
    fn unused_columns_are_projected_away() {
        // An aggregate straight over a wide scan: only column a is consumed.
        let table = three_column_table();
        let scan = LogicalScan::make(TableRef(0), "t", table);
        let col_a = col_ref(TableRef(0), 0, "a", DataType::Int32);
        let aggregate = crate::logical::LogicalAggregate::make(
            vec![],
            vec![crate::expr::aggregate(
                crate::expr::AggregateFunction::Sum,
                col_a,
            )],
            scan.clone(),
        );

        let out = Optimizer::apply_rule(&ColumnPruningRule, aggregate).unwrap();

        // A one-column pass-through projection appeared above the scan.
        let inserted = scan.outputs();
        assert_eq!(1, inserted.len());
        match inserted[0].kind() {
            LogicalNodeKind::Project(project) => {
                assert_eq!(1, project.expressions.len());
            }
            other => panic!("expected projection above scan, got {other:?}"),
        }

        // And the rule settles: a second application changes nothing.
        let root = crate::logical::LogicalRoot::make(out);
        assert!(!ColumnPruningRule.apply(&root).unwrap());
        root.set_left_input(None);
    }

    #[test]
    fn covered_scans_are_left_alone() {
        // A narrowing projection already sits above the filter chain; adding
        // another one below it would gain nothing.
        let table = three_column_table();
        let scan = LogicalScan::make(TableRef(0), "t", table);
        let col_a = col_ref(TableRef(0), 0, "a", DataType::Int32);
        let filter = LogicalFilter::make(gt(col_a.clone(), lit(10)), scan.clone());
        let project = LogicalProject::make(vec![col_a], filter);

        let root = crate::logical::LogicalRoot::make(project);
        assert!(!ColumnPruningRule.apply(&root).unwrap());
        root.set_left_input(None);
        assert_eq!(1, scan.outputs().len());
        assert!(matches!(
            scan.outputs()[0].kind(),
            LogicalNodeKind::Filter(_)
        ));
    }
}

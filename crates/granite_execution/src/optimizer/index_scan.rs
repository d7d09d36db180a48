use super::OptimizerRule;
use crate::expr::split_column_comparison;
use crate::logical::{collect_nodes, LogicalNodeKind, NodeRef, ScanType};
use crate::statistics;
use crate::storage::index::IndexKind;
use granite_error::Result;

/// Upper bound on the fraction of rows a predicate may keep and still be
/// worth an index scan.
pub const MAX_INDEX_SCAN_SELECTIVITY: f32 = 0.01;

/// Flips a filter directly over a stored table from `TableScan` to
/// `IndexScan` when a single-column group-key index covers the predicate's
/// column and the predicate is estimated to keep almost nothing.
///
/// Everything else (multi-column indexes, composite predicates, validated
/// table accesses, high selectivities) keeps the table scan; not choosing the
/// index is never an error.
#[derive(Debug)]
pub struct IndexScanRule;

impl OptimizerRule for IndexScanRule {
    fn name(&self) -> &'static str {
        "IndexScan"
    }

    fn apply(&self, root: &NodeRef) -> Result<bool> {
        let mut changed = false;

        for node in collect_nodes(root) {
            let filter = match node.kind() {
                LogicalNodeKind::Filter(filter) => filter,
                _ => continue,
            };
            if filter.scan_type() == ScanType::IndexScan {
                continue;
            }

            // (a) the filter's input must directly be a stored table.
            let input = match node.left_input() {
                Some(input) => input,
                None => continue,
            };
            let scan = match input.kind() {
                LogicalNodeKind::Scan(scan) => scan,
                _ => continue,
            };

            // (b) a single column of that table against a constant.
            let (column, _, value) = match split_column_comparison(&filter.predicate) {
                Some(split) => split,
                None => continue,
            };
            if column.table_ref != scan.table_ref || value.is_null() {
                continue;
            }

            // (c) a single-column group-key index on exactly that column.
            let indexed = scan.table.indexes().iter().any(|index| {
                index.kind == IndexKind::GroupKey && index.column_ids == [column.column]
            });
            if !indexed {
                continue;
            }

            // (d) the predicate keeps at most a sliver of the table.
            let stats = input.statistics();
            if stats.row_count <= 0.0 {
                continue;
            }
            let estimate = statistics::estimate_predicate(
                &stats,
                &input.column_expressions(),
                &filter.predicate,
            );
            if estimate.row_count / stats.row_count > MAX_INDEX_SCAN_SELECTIVITY {
                continue;
            }

            filter.set_scan_type(ScanType::IndexScan);
            changed = true;
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col_ref, comparison, gt, lit, ComparisonOperator, Expression, TableRef};
    use crate::logical::{LogicalFilter, LogicalScan};
    use crate::optimizer::Optimizer;
    use crate::statistics::{ColumnStatistics, TableStatistics};
    use crate::storage::table::DEFAULT_TARGET_CHUNK_SIZE;
    use crate::storage::{ColumnDefinition, DataType, ScalarValue, Table};
    use std::sync::Arc;

    fn test_table() -> Arc<Table> {
        let table = Arc::new(Table::new(
            vec![
                ColumnDefinition::new("a", DataType::Int32, false),
                ColumnDefinition::new("b", DataType::Int32, false),
                ColumnDefinition::new("c", DataType::Int32, false),
            ],
            DEFAULT_TARGET_CHUNK_SIZE,
        ));
        table
            .append_rows(
                (0..8)
                    .map(|i| {
                        vec![
                            ScalarValue::Int32(i),
                            ScalarValue::Int32(i * 2),
                            ScalarValue::Int32(i * 1000),
                        ]
                    })
                    .collect(),
                0,
            )
            .unwrap();
        table
    }

    fn mock_statistics(row_count: f32) -> Arc<TableStatistics> {
        Arc::new(TableStatistics::new(
            row_count,
            vec![
                ColumnStatistics::new(0.0, 10.0, 0, 20),
                ColumnStatistics::new(0.0, 10.0, 0, 20),
                ColumnStatistics::new(0.0, 10.0, 0, 20_000),
            ],
        ))
    }

    fn scan_and_filter(table: Arc<Table>, predicate: Expression) -> NodeRef {
        let scan = LogicalScan::make(TableRef(0), "a", table);
        LogicalFilter::make(predicate, scan)
    }

    fn filter_scan_type(node: &NodeRef) -> crate::logical::ScanType {
        match node.kind() {
            crate::logical::LogicalNodeKind::Filter(filter) => filter.scan_type(),
            _ => panic!("expected filter"),
        }
    }

    fn col_a() -> Expression {
        col_ref(TableRef(0), 0, "a", DataType::Int32)
    }

    fn col_b() -> Expression {
        col_ref(TableRef(0), 1, "b", DataType::Int32)
    }

    fn col_c() -> Expression {
        col_ref(TableRef(0), 2, "c", DataType::Int32)
    }

    #[test]
    fn no_index_scan_without_index() {
        let table = test_table();
        table.set_statistics(mock_statistics(1_000_000.0));

        let node = scan_and_filter(table, gt(col_a(), lit(10)));
        let node = Optimizer::apply_rule(&IndexScanRule, node).unwrap();
        assert_eq!(ScanType::TableScan, filter_scan_type(&node));
    }

    #[test]
    fn no_index_scan_with_index_on_other_column() {
        let table = test_table();
        table.create_index(IndexKind::GroupKey, vec![2]).unwrap();
        table.set_statistics(mock_statistics(1_000_000.0));

        let node = scan_and_filter(table, gt(col_a(), lit(10)));
        let node = Optimizer::apply_rule(&IndexScanRule, node).unwrap();
        assert_eq!(ScanType::TableScan, filter_scan_type(&node));
    }

    #[test]
    fn no_index_scan_with_multi_column_index() {
        let table = test_table();
        table
            .create_index(IndexKind::CompositeGroupKey, vec![2, 1])
            .unwrap();
        table.set_statistics(mock_statistics(1_000_000.0));

        let node = scan_and_filter(table, gt(col_c(), lit(19_900)));
        let node = Optimizer::apply_rule(&IndexScanRule, node).unwrap();
        assert_eq!(ScanType::TableScan, filter_scan_type(&node));
    }

    #[test]
    fn no_index_scan_if_kind_not_allow_listed() {
        let table = test_table();
        // A composite index over a single column is still not a group-key
        // index.
        table
            .create_index(IndexKind::CompositeGroupKey, vec![2])
            .unwrap();
        table.set_statistics(mock_statistics(1_000_000.0));

        let node = scan_and_filter(table, gt(col_c(), lit(19_900)));
        let node = Optimizer::apply_rule(&IndexScanRule, node).unwrap();
        assert_eq!(ScanType::TableScan, filter_scan_type(&node));
    }

    #[test]
    fn no_index_scan_for_column_comparison() {
        let table = test_table();
        table.create_index(IndexKind::GroupKey, vec![2]).unwrap();
        table.set_statistics(mock_statistics(1_000_000.0));

        let node = scan_and_filter(
            table,
            comparison(ComparisonOperator::Gt, col_c(), col_b()),
        );
        let node = Optimizer::apply_rule(&IndexScanRule, node).unwrap();
        assert_eq!(ScanType::TableScan, filter_scan_type(&node));
    }

    #[test]
    fn no_index_scan_with_high_selectivity() {
        let table = test_table();
        table.create_index(IndexKind::GroupKey, vec![2]).unwrap();
        table.set_statistics(mock_statistics(80_000.0));

        // c > 10 keeps nearly everything.
        let node = scan_and_filter(table, gt(col_c(), lit(10)));
        let node = Optimizer::apply_rule(&IndexScanRule, node).unwrap();
        assert_eq!(ScanType::TableScan, filter_scan_type(&node));
    }

    #[test]
    fn index_scan_selected_on_low_selectivity() {
        let table = test_table();
        table.create_index(IndexKind::GroupKey, vec![2]).unwrap();
        table.set_statistics(mock_statistics(1_000_000.0));

        // c > 19900 keeps about half a percent of 0..20000.
        let node = scan_and_filter(table, gt(col_c(), lit(19_900)));
        let node = Optimizer::apply_rule(&IndexScanRule, node).unwrap();
        assert_eq!(ScanType::IndexScan, filter_scan_type(&node));
    }

    #[test]
    fn index_scan_only_directly_over_the_table() {
        let table = test_table();
        table.create_index(IndexKind::GroupKey, vec![2]).unwrap();
        table.set_statistics(mock_statistics(1_000_000.0));

        let scan = LogicalScan::make(TableRef(0), "a", table);
        let lower = LogicalFilter::make(gt(col_c(), lit(19_900)), scan);
        let upper = LogicalFilter::make(crate::expr::lt(col_b(), lit(15)), lower.clone());

        let _ = Optimizer::apply_rule(&IndexScanRule, upper.clone()).unwrap();
        assert_eq!(ScanType::IndexScan, filter_scan_type(&lower));
        assert_eq!(ScanType::TableScan, filter_scan_type(&upper));
    }
}

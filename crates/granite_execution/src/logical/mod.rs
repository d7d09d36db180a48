//! The logical query plan: a DAG of relational-algebra nodes.
//!
//! Nodes are `Arc`-shared. A node owns (up to) two inputs and keeps weak
//! back-references to every node that names it as an input; the two sides are
//! kept symmetric by [`LogicalNode::set_input`]. A node with more than one
//! output is pinned in place for rewrites that would otherwise move it.

pub mod logical_aggregate;
pub mod logical_create;
pub mod logical_delete;
pub mod logical_drop;
pub mod logical_filter;
pub mod logical_insert;
pub mod logical_join;
pub mod logical_limit;
pub mod logical_mock;
pub mod logical_order;
pub mod logical_project;
pub mod logical_scan;
pub mod logical_show;
pub mod logical_union;
pub mod logical_update;
pub mod logical_validate;
pub mod logical_values;
pub mod root;

pub use logical_aggregate::LogicalAggregate;
pub use logical_create::LogicalCreateTable;
pub use logical_delete::LogicalDelete;
pub use logical_drop::LogicalDropTable;
pub use logical_filter::{LogicalFilter, ScanType};
pub use logical_insert::LogicalInsert;
pub use logical_join::{JoinType, LogicalJoin};
pub use logical_limit::LogicalLimit;
pub use logical_mock::LogicalMock;
pub use logical_order::{LogicalOrder, SortDefinition};
pub use logical_project::LogicalProject;
pub use logical_scan::LogicalScan;
pub use logical_show::{LogicalShowColumns, LogicalShowTables};
pub use logical_union::{LogicalUnion, UnionMode};
pub use logical_update::LogicalUpdate;
pub use logical_validate::LogicalValidate;
pub use logical_values::LogicalValues;
pub use root::LogicalRoot;

use crate::explain::{Explainable, ExplainEntry};
use crate::expr::{ColumnExpr, Expression};
use crate::statistics::{self, ColumnStatistics, TableStatistics, DEFAULT_OPEN_ENDED_SELECTIVITY};
use crate::storage::DataType;
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

pub type NodeRef = Arc<LogicalNode>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSide {
    Left,
    Right,
}

impl InputSide {
    fn index(&self) -> usize {
        match self {
            InputSide::Left => 0,
            InputSide::Right => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalNodeKind {
    Scan(LogicalScan),
    Mock(LogicalMock),
    Filter(LogicalFilter),
    Project(LogicalProject),
    Join(LogicalJoin),
    Aggregate(LogicalAggregate),
    Order(LogicalOrder),
    Limit(LogicalLimit),
    Union(LogicalUnion),
    Values(LogicalValues),
    Insert(LogicalInsert),
    Update(LogicalUpdate),
    Delete(LogicalDelete),
    CreateTable(LogicalCreateTable),
    DropTable(LogicalDropTable),
    ShowTables(LogicalShowTables),
    ShowColumns(LogicalShowColumns),
    Validate(LogicalValidate),
    Root(LogicalRoot),
}

#[derive(Debug)]
pub struct LogicalNode {
    kind: LogicalNodeKind,
    inputs: RwLock<[Option<NodeRef>; 2]>,
    outputs: RwLock<Vec<Weak<LogicalNode>>>,
}

impl LogicalNode {
    pub fn make(kind: LogicalNodeKind) -> NodeRef {
        Arc::new(LogicalNode {
            kind,
            inputs: RwLock::new([None, None]),
            outputs: RwLock::new(Vec::new()),
        })
    }

    pub fn make_with_inputs(
        kind: LogicalNodeKind,
        left: Option<NodeRef>,
        right: Option<NodeRef>,
    ) -> NodeRef {
        let node = Self::make(kind);
        node.set_left_input(left);
        node.set_right_input(right);
        node
    }

    pub fn kind(&self) -> &LogicalNodeKind {
        &self.kind
    }

    pub fn name(&self) -> &'static str {
        self.explain_entry().name
    }

    pub fn input(&self, side: InputSide) -> Option<NodeRef> {
        self.inputs.read()[side.index()].clone()
    }

    pub fn left_input(&self) -> Option<NodeRef> {
        self.input(InputSide::Left)
    }

    pub fn right_input(&self) -> Option<NodeRef> {
        self.input(InputSide::Right)
    }

    /// Set one input slot, keeping the old and new child's output lists in
    /// sync.
    pub fn set_input(self: &Arc<Self>, side: InputSide, new: Option<NodeRef>) {
        let old = {
            let mut inputs = self.inputs.write();
            std::mem::replace(&mut inputs[side.index()], new.clone())
        };

        match (&old, &new) {
            (Some(old), Some(new)) if Arc::ptr_eq(old, new) => return,
            _ => {}
        }
        if let Some(old) = old {
            old.remove_output(self);
        }
        if let Some(new) = new {
            new.add_output(self);
        }
    }

    pub fn set_left_input(self: &Arc<Self>, input: Option<NodeRef>) {
        self.set_input(InputSide::Left, input);
    }

    pub fn set_right_input(self: &Arc<Self>, input: Option<NodeRef>) {
        self.set_input(InputSide::Right, input);
    }

    fn add_output(&self, output: &NodeRef) {
        self.outputs.write().push(Arc::downgrade(output));
    }

    /// Remove one occurrence; a parent referencing this node on both sides is
    /// listed (and removed) once per side.
    fn remove_output(&self, output: &NodeRef) {
        let mut outputs = self.outputs.write();
        if let Some(pos) = outputs
            .iter()
            .position(|weak| weak.as_ptr() == Arc::as_ptr(output))
        {
            outputs.swap_remove(pos);
        }
    }

    /// The nodes currently naming this node as an input.
    pub fn outputs(&self) -> Vec<NodeRef> {
        let mut outputs = self.outputs.write();
        outputs.retain(|weak| weak.strong_count() > 0);
        outputs.iter().filter_map(|weak| weak.upgrade()).collect()
    }

    pub fn output_count(&self) -> usize {
        self.outputs().len()
    }

    pub fn outputs_with_sides(self: &Arc<Self>) -> Vec<(NodeRef, InputSide)> {
        let mut seen: Vec<*const LogicalNode> = Vec::new();
        let mut out = Vec::new();
        for parent in self.outputs() {
            let ptr = Arc::as_ptr(&parent);
            if seen.contains(&ptr) {
                continue;
            }
            seen.push(ptr);
            for side in [InputSide::Left, InputSide::Right] {
                if let Some(child) = parent.input(side) {
                    if Arc::ptr_eq(&child, self) {
                        out.push((parent.clone(), side));
                    }
                }
            }
        }
        out
    }

    /// Splice a single-input node out of the plan: every output that pointed
    /// at it is rewired to its left input.
    pub fn remove_from_tree(self: &Arc<Self>) {
        debug_assert!(
            self.right_input().is_none(),
            "remove_from_tree on a two-input node"
        );
        let child = self.left_input();
        for (parent, side) in self.outputs_with_sides() {
            parent.set_input(side, child.clone());
        }
        self.set_left_input(None);
    }

    /// Structural copy of the plan below (and including) this node. Shared
    /// nodes stay shared: the copy of a DAG is a DAG.
    pub fn deep_copy(self: &Arc<Self>) -> NodeRef {
        let mut memo: HashMap<*const LogicalNode, NodeRef> = HashMap::new();
        deep_copy_with(&mut memo, self)
    }

    /// Compares only this node's own payload, not its inputs.
    pub fn shallow_equals(&self, other: &LogicalNode) -> bool {
        self.kind == other.kind
    }

    /// Ordered output schema of this node, one expression per column.
    pub fn column_expressions(&self) -> Vec<Expression> {
        match &self.kind {
            LogicalNodeKind::Scan(scan) => scan
                .table
                .column_definitions()
                .iter()
                .enumerate()
                .map(|(idx, def)| {
                    Expression::Column(ColumnExpr::new(
                        scan.table_ref,
                        idx,
                        def.name.clone(),
                        def.data_type,
                        def.nullable,
                    ))
                })
                .collect(),
            LogicalNodeKind::Mock(mock) => mock
                .columns
                .iter()
                .enumerate()
                .map(|(idx, def)| {
                    Expression::Column(ColumnExpr::new(
                        mock.table_ref,
                        idx,
                        def.name.clone(),
                        def.data_type,
                        def.nullable,
                    ))
                })
                .collect(),
            LogicalNodeKind::Project(project) => project.expressions.clone(),
            LogicalNodeKind::Aggregate(aggregate) => aggregate
                .group_by
                .iter()
                .chain(aggregate.aggregates.iter())
                .cloned()
                .collect(),
            LogicalNodeKind::Join(join) => {
                let mut out = self
                    .left_input()
                    .map(|i| i.column_expressions())
                    .unwrap_or_default();
                if join.join_type.emits_right_columns() {
                    out.extend(
                        self.right_input()
                            .map(|i| i.column_expressions())
                            .unwrap_or_default(),
                    );
                }
                out
            }
            LogicalNodeKind::Values(values) => (0..values.num_columns())
                .map(|idx| {
                    Expression::Column(ColumnExpr::new(
                        values.table_ref,
                        idx,
                        format!("column{idx}"),
                        values.column_type(idx),
                        true,
                    ))
                })
                .collect(),
            LogicalNodeKind::ShowTables(show) => vec![Expression::Column(ColumnExpr::new(
                show.table_ref,
                0,
                "table_name",
                DataType::Utf8,
                false,
            ))],
            LogicalNodeKind::ShowColumns(show) => ["column_name", "data_type", "nullable"]
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    Expression::Column(ColumnExpr::new(
                        show.table_ref,
                        idx,
                        *name,
                        DataType::Utf8,
                        false,
                    ))
                })
                .collect(),
            LogicalNodeKind::Insert(_)
            | LogicalNodeKind::Update(_)
            | LogicalNodeKind::Delete(_)
            | LogicalNodeKind::CreateTable(_)
            | LogicalNodeKind::DropTable(_) => Vec::new(),
            // Pass-through nodes.
            LogicalNodeKind::Filter(_)
            | LogicalNodeKind::Order(_)
            | LogicalNodeKind::Limit(_)
            | LogicalNodeKind::Union(_)
            | LogicalNodeKind::Validate(_)
            | LogicalNodeKind::Root(_) => self
                .left_input()
                .map(|i| i.column_expressions())
                .unwrap_or_default(),
        }
    }

    /// Position of `expression` in this node's output schema.
    pub fn find_column_id(&self, expression: &Expression) -> Option<usize> {
        self.column_expressions()
            .iter()
            .position(|column| column == expression)
    }

    /// Row-count and column statistics of this node's output, derived
    /// recursively from the leaves.
    pub fn statistics(&self) -> TableStatistics {
        match &self.kind {
            LogicalNodeKind::Scan(scan) => (*scan.table.statistics()).clone(),
            LogicalNodeKind::Mock(mock) => (*mock.statistics).clone(),
            LogicalNodeKind::Filter(filter) => {
                let input = self.left_input().expect("filter has input");
                statistics::estimate_predicate(
                    &input.statistics(),
                    &input.column_expressions(),
                    &filter.predicate,
                )
            }
            LogicalNodeKind::Join(join) => {
                let left = self.left_input().expect("join has left input");
                let right = self.right_input().expect("join has right input");
                let left_stats = left.statistics();
                let right_stats = right.statistics();
                match join.join_type {
                    JoinType::Semi => left_stats.scaled(DEFAULT_OPEN_ENDED_SELECTIVITY),
                    JoinType::Anti => left_stats.scaled(1.0 - DEFAULT_OPEN_ENDED_SELECTIVITY),
                    _ => {
                        let mut columns = left_stats.columns.clone();
                        columns.extend(right_stats.columns.clone());
                        let cross =
                            TableStatistics::new(left_stats.row_count * right_stats.row_count, columns);
                        match &join.predicate {
                            Some(predicate) => statistics::estimate_predicate(
                                &cross,
                                &self.column_expressions(),
                                predicate,
                            ),
                            None => cross,
                        }
                    }
                }
            }
            LogicalNodeKind::Aggregate(aggregate) => {
                let input = self.left_input().expect("aggregate has input");
                let input_stats = input.statistics();
                let input_columns = input.column_expressions();
                let groups = if aggregate.group_by.is_empty() {
                    1.0
                } else {
                    let mut product = 1.0f32;
                    for group in &aggregate.group_by {
                        let distinct = input_columns
                            .iter()
                            .position(|c| c == group)
                            .and_then(|idx| input_stats.columns.get(idx))
                            .map(|c| c.distinct_count)
                            .unwrap_or(input_stats.row_count);
                        product *= distinct.max(1.0);
                    }
                    product.min(input_stats.row_count)
                };
                let columns = (0..aggregate.group_by.len() + aggregate.aggregates.len())
                    .map(|idx| {
                        aggregate
                            .group_by
                            .get(idx)
                            .and_then(|g| input_columns.iter().position(|c| c == g))
                            .and_then(|pos| input_stats.columns.get(pos).cloned())
                            .unwrap_or_else(|| ColumnStatistics::without_range(0.0, groups))
                    })
                    .collect();
                TableStatistics::new(groups, columns)
            }
            LogicalNodeKind::Limit(limit) => {
                let input = self.left_input().expect("limit has input");
                let stats = input.statistics();
                let row_count = stats.row_count.min(limit.limit as f32);
                TableStatistics {
                    row_count,
                    columns: stats
                        .columns
                        .iter()
                        .map(|c| ColumnStatistics {
                            distinct_count: c.distinct_count.min(row_count),
                            ..c.clone()
                        })
                        .collect(),
                }
            }
            LogicalNodeKind::Union(_) => {
                let left = self.left_input().expect("union has left input");
                let right = self.right_input().expect("union has right input");
                let l = left.statistics();
                let r = right.statistics();
                let row_count = l.row_count + r.row_count;
                let columns = l
                    .columns
                    .iter()
                    .zip(r.columns.iter())
                    .map(|(a, b)| merge_column_statistics(a, b, l.row_count, r.row_count))
                    .collect();
                TableStatistics::new(row_count, columns)
            }
            LogicalNodeKind::Project(project) => {
                let input = self.left_input().expect("project has input");
                let input_stats = input.statistics();
                let input_columns = input.column_expressions();
                let columns = project
                    .expressions
                    .iter()
                    .map(|expr| {
                        input_columns
                            .iter()
                            .position(|c| c == expr)
                            .and_then(|idx| input_stats.columns.get(idx).cloned())
                            .unwrap_or_else(|| {
                                ColumnStatistics::without_range(0.0, input_stats.row_count)
                            })
                    })
                    .collect();
                TableStatistics::new(input_stats.row_count, columns)
            }
            LogicalNodeKind::Values(values) => TableStatistics::new(
                values.rows.len() as f32,
                (0..values.num_columns())
                    .map(|_| ColumnStatistics::without_range(0.0, values.rows.len() as f32))
                    .collect(),
            ),
            LogicalNodeKind::ShowTables(_) | LogicalNodeKind::ShowColumns(_) => {
                TableStatistics::new(0.0, Vec::new())
            }
            LogicalNodeKind::Insert(_)
            | LogicalNodeKind::Update(_)
            | LogicalNodeKind::Delete(_)
            | LogicalNodeKind::CreateTable(_)
            | LogicalNodeKind::DropTable(_) => TableStatistics::new(0.0, Vec::new()),
            LogicalNodeKind::Order(_) | LogicalNodeKind::Validate(_) | LogicalNodeKind::Root(_) => {
                self.left_input()
                    .map(|i| i.statistics())
                    .unwrap_or_else(|| TableStatistics::new(0.0, Vec::new()))
            }
        }
    }

    pub fn output_row_count(&self) -> f32 {
        self.statistics().row_count
    }

    /// A fingerprint of the plan's structure, stable across deep copies.
    /// Two plans that compare equal with [`deep_equals`] hash equal.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into(&self, hasher: &mut DefaultHasher) {
        self.name().hash(hasher);
        match &self.kind {
            LogicalNodeKind::Scan(scan) => {
                scan.table_ref.hash(hasher);
                scan.table_name.hash(hasher);
            }
            LogicalNodeKind::Mock(mock) => mock.table_ref.hash(hasher),
            LogicalNodeKind::Filter(filter) => {
                filter.predicate.hash(hasher);
                (filter.scan_type() == ScanType::IndexScan).hash(hasher);
            }
            LogicalNodeKind::Project(project) => {
                project.expressions.hash(hasher);
            }
            LogicalNodeKind::Join(join) => {
                std::mem::discriminant(&join.join_type).hash(hasher);
                join.predicate.hash(hasher);
            }
            LogicalNodeKind::Aggregate(aggregate) => {
                aggregate.group_by.hash(hasher);
                aggregate.aggregates.hash(hasher);
            }
            LogicalNodeKind::Order(order) => {
                for definition in &order.order_by {
                    definition.expression.hash(hasher);
                    definition.descending.hash(hasher);
                }
            }
            LogicalNodeKind::Limit(limit) => {
                limit.limit.hash(hasher);
                limit.offset.hash(hasher);
            }
            LogicalNodeKind::Union(union) => std::mem::discriminant(&union.mode).hash(hasher),
            LogicalNodeKind::Values(values) => values.rows.hash(hasher),
            LogicalNodeKind::Insert(insert) => {
                insert.table_name.hash(hasher);
                insert.columns.hash(hasher);
            }
            LogicalNodeKind::Update(update) => {
                update.table_name.hash(hasher);
                for (column, expr) in &update.assignments {
                    column.hash(hasher);
                    expr.hash(hasher);
                }
            }
            LogicalNodeKind::Delete(delete) => delete.table_name.hash(hasher),
            LogicalNodeKind::CreateTable(create) => create.table_name.hash(hasher),
            LogicalNodeKind::DropTable(drop) => drop.table_name.hash(hasher),
            LogicalNodeKind::ShowTables(_) => {}
            LogicalNodeKind::ShowColumns(show) => show.table_name.hash(hasher),
            LogicalNodeKind::Validate(_) | LogicalNodeKind::Root(_) => {}
        }
        for input in [self.left_input(), self.right_input()].into_iter().flatten() {
            input.hash_into(hasher);
        }
    }
}

fn merge_column_statistics(
    a: &ColumnStatistics,
    b: &ColumnStatistics,
    a_rows: f32,
    b_rows: f32,
) -> ColumnStatistics {
    let rows = (a_rows + b_rows).max(1.0);
    let min = match (&a.min, &b.min) {
        (Some(x), Some(y)) => Some(if x.total_cmp(y).is_le() { x.clone() } else { y.clone() }),
        (x, y) => x.clone().or_else(|| y.clone()),
    };
    let max = match (&a.max, &b.max) {
        (Some(x), Some(y)) => Some(if x.total_cmp(y).is_ge() { x.clone() } else { y.clone() }),
        (x, y) => x.clone().or_else(|| y.clone()),
    };
    ColumnStatistics {
        null_fraction: (a.null_fraction * a_rows + b.null_fraction * b_rows) / rows,
        distinct_count: a.distinct_count + b.distinct_count,
        min,
        max,
    }
}

fn deep_copy_with(memo: &mut HashMap<*const LogicalNode, NodeRef>, node: &NodeRef) -> NodeRef {
    if let Some(copy) = memo.get(&Arc::as_ptr(node)) {
        return copy.clone();
    }
    let left = node.left_input().map(|input| deep_copy_with(memo, &input));
    let right = node.right_input().map(|input| deep_copy_with(memo, &input));
    let copy = LogicalNode::make_with_inputs(deep_copy_kind(&node.kind), left, right);
    memo.insert(Arc::as_ptr(node), copy.clone());
    copy
}

/// Clone a node payload, deep-copying its expressions so embedded subquery
/// plans are not shared with the original.
fn deep_copy_kind(kind: &LogicalNodeKind) -> LogicalNodeKind {
    let mut kind = kind.clone();
    match &mut kind {
        LogicalNodeKind::Filter(filter) => filter.predicate = filter.predicate.deep_copy(),
        LogicalNodeKind::Project(project) => {
            for expr in &mut project.expressions {
                *expr = expr.deep_copy();
            }
        }
        LogicalNodeKind::Join(join) => {
            if let Some(predicate) = &mut join.predicate {
                *predicate = predicate.deep_copy();
            }
        }
        LogicalNodeKind::Aggregate(aggregate) => {
            for expr in aggregate.group_by.iter_mut().chain(aggregate.aggregates.iter_mut()) {
                *expr = expr.deep_copy();
            }
        }
        LogicalNodeKind::Order(order) => {
            for definition in &mut order.order_by {
                definition.expression = definition.expression.deep_copy();
            }
        }
        LogicalNodeKind::Values(values) => {
            for row in &mut values.rows {
                for expr in row {
                    *expr = expr.deep_copy();
                }
            }
        }
        LogicalNodeKind::Update(update) => {
            for (_, expr) in &mut update.assignments {
                *expr = expr.deep_copy();
            }
        }
        _ => {}
    }
    kind
}

/// Structural equality of two plans, ignoring node identity. Shared nodes are
/// handled through a visited set so DAG comparison terminates.
pub fn deep_equals(a: &NodeRef, b: &NodeRef) -> bool {
    fn walk(
        a: &NodeRef,
        b: &NodeRef,
        visited: &mut HashSet<(*const LogicalNode, *const LogicalNode)>,
    ) -> bool {
        if Arc::ptr_eq(a, b) {
            return true;
        }
        if !visited.insert((Arc::as_ptr(a), Arc::as_ptr(b))) {
            return true;
        }
        if !a.shallow_equals(b) {
            return false;
        }
        for side in [InputSide::Left, InputSide::Right] {
            match (a.input(side), b.input(side)) {
                (None, None) => {}
                (Some(x), Some(y)) => {
                    if !walk(&x, &y, visited) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }
    walk(a, b, &mut HashSet::new())
}

/// Swap `new` into `old`'s place: it adopts the inputs and every output edge.
pub fn replace_node(old: &NodeRef, new: &NodeRef) {
    new.set_left_input(old.left_input());
    new.set_right_input(old.right_input());
    for (parent, side) in old.outputs_with_sides() {
        parent.set_input(side, Some(new.clone()));
    }
    old.set_left_input(None);
    old.set_right_input(None);
}

/// Every node reachable from `root`, each exactly once, parents before
/// children.
pub fn collect_nodes(root: &NodeRef) -> Vec<NodeRef> {
    let mut seen: HashSet<*const LogicalNode> = HashSet::new();
    let mut queue = vec![root.clone()];
    let mut out = Vec::new();
    while let Some(node) = queue.pop() {
        if !seen.insert(Arc::as_ptr(&node)) {
            continue;
        }
        queue.extend([node.left_input(), node.right_input()].into_iter().flatten());
        out.push(node);
    }
    out
}

impl Explainable for LogicalNode {
    fn explain_entry(&self) -> ExplainEntry {
        match &self.kind {
            LogicalNodeKind::Scan(n) => n.explain_entry(),
            LogicalNodeKind::Mock(n) => n.explain_entry(),
            LogicalNodeKind::Filter(n) => n.explain_entry(),
            LogicalNodeKind::Project(n) => n.explain_entry(),
            LogicalNodeKind::Join(n) => n.explain_entry(),
            LogicalNodeKind::Aggregate(n) => n.explain_entry(),
            LogicalNodeKind::Order(n) => n.explain_entry(),
            LogicalNodeKind::Limit(n) => n.explain_entry(),
            LogicalNodeKind::Union(n) => n.explain_entry(),
            LogicalNodeKind::Values(n) => n.explain_entry(),
            LogicalNodeKind::Insert(n) => n.explain_entry(),
            LogicalNodeKind::Update(n) => n.explain_entry(),
            LogicalNodeKind::Delete(n) => n.explain_entry(),
            LogicalNodeKind::CreateTable(n) => n.explain_entry(),
            LogicalNodeKind::DropTable(n) => n.explain_entry(),
            LogicalNodeKind::ShowTables(n) => n.explain_entry(),
            LogicalNodeKind::ShowColumns(n) => n.explain_entry(),
            LogicalNodeKind::Validate(n) => n.explain_entry(),
            LogicalNodeKind::Root(n) => n.explain_entry(),
        }
    }
}

/// Indented rendering of the plan for EXPLAIN and logs.
pub fn explain_plan(root: &NodeRef) -> String {
    fn walk(node: &NodeRef, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&node.explain_entry().to_string());
        out.push('\n');
        for input in [node.left_input(), node.right_input()].into_iter().flatten() {
            walk(&input, depth + 1, out);
        }
    }
    let mut out = String::new();
    walk(root, 0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col_ref, gt, lit, TableRef};
    use crate::storage::ColumnDefinition;

    fn mock_node() -> NodeRef {
        LogicalMock::make(
            TableRef(0),
            vec![ColumnDefinition::new("a", DataType::Int32, false)],
            Arc::new(TableStatistics::new(
                100.0,
                vec![ColumnStatistics::new(0.0, 20.0, 10, 100)],
            )),
        )
    }

    fn col_a() -> Expression {
        col_ref(TableRef(0), 0, "a", DataType::Int32)
    }

    #[test]
    fn set_input_tracks_outputs() {
        let mock = mock_node();
        let filter_a = LogicalFilter::make(gt(col_a(), lit(10)), mock.clone());
        let filter_b = LogicalFilter::make(gt(col_a(), lit(50)), mock.clone());

        assert_eq!(2, mock.output_count());
        filter_b.set_left_input(None);
        assert_eq!(1, mock.output_count());
        assert!(Arc::ptr_eq(&mock.outputs()[0], &filter_a));
    }

    #[test]
    fn remove_from_tree_splices() {
        let mock = mock_node();
        let inner = LogicalFilter::make(gt(col_a(), lit(10)), mock.clone());
        let outer = LogicalFilter::make(gt(col_a(), lit(50)), inner.clone());

        inner.remove_from_tree();

        assert!(Arc::ptr_eq(&outer.left_input().unwrap(), &mock));
        assert_eq!(1, mock.output_count());
        assert!(inner.left_input().is_none());
        assert_eq!(0, inner.output_count());
    }

    #[test]
    fn deep_copy_preserves_dag_shape() {
        // Union over two filters sharing one scan: the copy must share too.
        let mock = mock_node();
        let filter_a = LogicalFilter::make(gt(col_a(), lit(90)), mock.clone());
        let filter_b = LogicalFilter::make(gt(col_a(), lit(10)), mock.clone());
        let union = LogicalUnion::make(UnionMode::All, filter_a, filter_b);

        let copy = union.deep_copy();
        assert!(deep_equals(&union, &copy));

        let copied_left_leaf = copy.left_input().unwrap().left_input().unwrap();
        let copied_right_leaf = copy.right_input().unwrap().left_input().unwrap();
        assert!(Arc::ptr_eq(&copied_left_leaf, &copied_right_leaf));
        // And nothing is shared with the original.
        assert!(!Arc::ptr_eq(&copied_left_leaf, &mock));
    }

    #[test]
    fn deep_copy_nodes_shallow_equal() {
        let mock = mock_node();
        let filter = LogicalFilter::make(gt(col_a(), lit(10)), mock);
        let copy = filter.deep_copy();
        assert!(filter.shallow_equals(&copy));
        assert!(copy
            .left_input()
            .unwrap()
            .shallow_equals(&filter.left_input().unwrap()));
    }

    #[test]
    fn filter_statistics_shrink() {
        let mock = mock_node();
        let filter = LogicalFilter::make(gt(col_a(), lit(50)), mock.clone());
        assert!((mock.output_row_count() - 100.0).abs() < 0.01);
        let rows = filter.output_row_count();
        assert!(rows < 60.0 && rows > 50.0, "rows {rows}");
    }

    #[test]
    fn find_column_id_matches_structurally() {
        let mock = mock_node();
        assert_eq!(Some(0), mock.find_column_id(&col_a()));
        assert_eq!(None, mock.find_column_id(&lit(1)));
    }

    #[test]
    fn structural_hash_stable_across_copies() {
        let mock = mock_node();
        let filter = LogicalFilter::make(gt(col_a(), lit(10)), mock);
        assert_eq!(filter.structural_hash(), filter.deep_copy().structural_hash());
    }
}

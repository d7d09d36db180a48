//! Physical operators: a DAG mirroring the optimized logical plan, each node
//! producing one materialized (or reference) table.

pub mod aggregate;
pub mod get_table;
pub mod hash_join;
pub mod index_scan;
pub mod insert;
pub mod limit;
pub mod maintenance;
pub mod nested_loop_join;
pub mod projection;
pub mod sort;
pub mod table_scan;
pub mod union;
pub mod update;
pub mod validate;
pub mod values;

pub use aggregate::AggregateOperator;
pub use get_table::GetTable;
pub use hash_join::HashJoin;
pub use index_scan::IndexScan;
pub use insert::InsertOperator;
pub use limit::LimitOperator;
pub use maintenance::{CreateTableOperator, DropTableOperator, ShowColumnsOperator, ShowTablesOperator};
pub use nested_loop_join::NestedLoopJoin;
pub use projection::ProjectionOperator;
pub use sort::SortOperator;
pub use table_scan::TableScan;
pub use union::UnionOperator;
pub use update::{DeleteOperator, UpdateOperator};
pub use validate::ValidateOperator;
pub use values::ValuesOperator;

use crate::concurrency::TransactionContext;
use crate::explain::{Explainable, ExplainEntry};
use crate::expr::{Expression, ParameterId, SubqueryPlan};
use crate::storage::{ColumnDefinition, DataType, ScalarValue, Table};
use granite_error::{GraniteError, OptionExt, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::trace;

pub type OperatorRef = Arc<PhysicalOperator>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    Unexecuted,
    Executing,
    Executed,
    /// Terminal: the operator observed an aborted transaction (or failed)
    /// and produced no output.
    Aborted,
}

impl OperatorState {
    fn from_u8(v: u8) -> OperatorState {
        match v {
            0 => OperatorState::Unexecuted,
            1 => OperatorState::Executing,
            2 => OperatorState::Executed,
            _ => OperatorState::Aborted,
        }
    }
}

#[derive(Debug)]
pub enum OperatorKind {
    GetTable(GetTable),
    Validate(ValidateOperator),
    TableScan(TableScan),
    IndexScan(IndexScan),
    Projection(ProjectionOperator),
    Aggregate(AggregateOperator),
    Sort(SortOperator),
    Limit(LimitOperator),
    Union(UnionOperator),
    NestedLoopJoin(NestedLoopJoin),
    HashJoin(HashJoin),
    Values(ValuesOperator),
    Insert(InsertOperator),
    Update(UpdateOperator),
    Delete(DeleteOperator),
    CreateTable(CreateTableOperator),
    DropTable(DropTableOperator),
    ShowTables(ShowTablesOperator),
    ShowColumns(ShowColumnsOperator),
}

impl OperatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::GetTable(_) => "GetTable",
            OperatorKind::Validate(_) => "Validate",
            OperatorKind::TableScan(_) => "TableScan",
            OperatorKind::IndexScan(_) => "IndexScan",
            OperatorKind::Projection(_) => "Projection",
            OperatorKind::Aggregate(_) => "Aggregate",
            OperatorKind::Sort(_) => "Sort",
            OperatorKind::Limit(_) => "Limit",
            OperatorKind::Union(_) => "Union",
            OperatorKind::NestedLoopJoin(_) => "NestedLoopJoin",
            OperatorKind::HashJoin(_) => "HashJoin",
            OperatorKind::Values(_) => "Values",
            OperatorKind::Insert(_) => "Insert",
            OperatorKind::Update(_) => "Update",
            OperatorKind::Delete(_) => "Delete",
            OperatorKind::CreateTable(_) => "CreateTable",
            OperatorKind::DropTable(_) => "DropTable",
            OperatorKind::ShowTables(_) => "ShowTables",
            OperatorKind::ShowColumns(_) => "ShowColumns",
        }
    }

    fn on_execute(
        &self,
        op: &PhysicalOperator,
        ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        match self {
            OperatorKind::GetTable(k) => k.execute(op, ctx),
            OperatorKind::Validate(k) => k.execute(op, ctx),
            OperatorKind::TableScan(k) => k.execute(op, ctx),
            OperatorKind::IndexScan(k) => k.execute(op, ctx),
            OperatorKind::Projection(k) => k.execute(op, ctx),
            OperatorKind::Aggregate(k) => k.execute(op, ctx),
            OperatorKind::Sort(k) => k.execute(op, ctx),
            OperatorKind::Limit(k) => k.execute(op, ctx),
            OperatorKind::Union(k) => k.execute(op, ctx),
            OperatorKind::NestedLoopJoin(k) => k.execute(op, ctx),
            OperatorKind::HashJoin(k) => k.execute(op, ctx),
            OperatorKind::Values(k) => k.execute(op, ctx),
            OperatorKind::Insert(k) => k.execute(op, ctx),
            OperatorKind::Update(k) => k.execute(op, ctx),
            OperatorKind::Delete(k) => k.execute(op, ctx),
            OperatorKind::CreateTable(k) => k.execute(op, ctx),
            OperatorKind::DropTable(k) => k.execute(op, ctx),
            OperatorKind::ShowTables(k) => k.execute(op, ctx),
            OperatorKind::ShowColumns(k) => k.execute(op, ctx),
        }
    }

    /// Expressions carried by this operator, for parameter and transaction
    /// context propagation into subquery plans.
    fn expressions(&self) -> Vec<&Expression> {
        match self {
            OperatorKind::TableScan(k) => vec![&k.predicate],
            OperatorKind::Projection(k) => k.expressions.iter().collect(),
            OperatorKind::Aggregate(k) => {
                k.group_by.iter().chain(k.aggregates.iter()).collect()
            }
            OperatorKind::Sort(k) => k.order_by.iter().map(|d| &d.expression).collect(),
            OperatorKind::NestedLoopJoin(k) => k.predicate.iter().collect(),
            OperatorKind::HashJoin(k) => vec![&k.left_key, &k.right_key],
            OperatorKind::Values(k) => k.rows.iter().flatten().collect(),
            OperatorKind::Update(k) => k.assignments.iter().map(|(_, e)| e).collect(),
            _ => Vec::new(),
        }
    }

    /// Physical subquery plans embedded in this operator's expressions.
    fn subquery_plans(&self) -> Vec<OperatorRef> {
        fn collect(expr: &Expression, out: &mut Vec<OperatorRef>) {
            if let Expression::Subquery(subquery) = expr {
                if let SubqueryPlan::Physical(plan) = &subquery.plan {
                    out.push(plan.clone());
                }
            }
            for child in expr.arguments() {
                collect(child, out);
            }
        }
        let mut out = Vec::new();
        for expr in self.expressions() {
            collect(expr, &mut out);
        }
        out
    }

    /// A fresh kind for `recreate`: expressions are deep-copied so embedded
    /// subquery plans are rebuilt rather than shared.
    fn recreate(&self) -> OperatorKind {
        match self {
            OperatorKind::GetTable(k) => OperatorKind::GetTable(k.clone()),
            OperatorKind::Validate(k) => OperatorKind::Validate(k.clone()),
            OperatorKind::TableScan(k) => OperatorKind::TableScan(k.recreate()),
            OperatorKind::IndexScan(k) => OperatorKind::IndexScan(k.clone()),
            OperatorKind::Projection(k) => OperatorKind::Projection(k.recreate()),
            OperatorKind::Aggregate(k) => OperatorKind::Aggregate(k.recreate()),
            OperatorKind::Sort(k) => OperatorKind::Sort(k.recreate()),
            OperatorKind::Limit(k) => OperatorKind::Limit(k.clone()),
            OperatorKind::Union(k) => OperatorKind::Union(k.clone()),
            OperatorKind::NestedLoopJoin(k) => OperatorKind::NestedLoopJoin(k.recreate()),
            OperatorKind::HashJoin(k) => OperatorKind::HashJoin(k.recreate()),
            OperatorKind::Values(k) => OperatorKind::Values(k.recreate()),
            OperatorKind::Insert(k) => OperatorKind::Insert(k.clone()),
            OperatorKind::Update(k) => OperatorKind::Update(k.recreate()),
            OperatorKind::Delete(k) => OperatorKind::Delete(k.clone()),
            OperatorKind::CreateTable(k) => OperatorKind::CreateTable(k.clone()),
            OperatorKind::DropTable(k) => OperatorKind::DropTable(k.clone()),
            OperatorKind::ShowTables(k) => OperatorKind::ShowTables(k.clone()),
            OperatorKind::ShowColumns(k) => OperatorKind::ShowColumns(k.clone()),
        }
    }

    /// Lifecycle hook after execution for dropping scratch buffers. The
    /// built-in kinds keep no scratch; the execute wrapper still drives it.
    fn on_cleanup(&self) {}

    /// Mutation operators must not be re-executed; everything else may have
    /// its output cleared and run again.
    fn is_read_only(&self) -> bool {
        !matches!(
            self,
            OperatorKind::Insert(_)
                | OperatorKind::Update(_)
                | OperatorKind::Delete(_)
                | OperatorKind::CreateTable(_)
                | OperatorKind::DropTable(_)
        )
    }
}

impl Explainable for OperatorKind {
    fn explain_entry(&self) -> ExplainEntry {
        match self {
            OperatorKind::GetTable(k) => k.explain_entry(),
            OperatorKind::Validate(k) => k.explain_entry(),
            OperatorKind::TableScan(k) => k.explain_entry(),
            OperatorKind::IndexScan(k) => k.explain_entry(),
            OperatorKind::Projection(k) => k.explain_entry(),
            OperatorKind::Aggregate(k) => k.explain_entry(),
            OperatorKind::Sort(k) => k.explain_entry(),
            OperatorKind::Limit(k) => k.explain_entry(),
            OperatorKind::Union(k) => k.explain_entry(),
            OperatorKind::NestedLoopJoin(k) => k.explain_entry(),
            OperatorKind::HashJoin(k) => k.explain_entry(),
            OperatorKind::Values(k) => k.explain_entry(),
            OperatorKind::Insert(k) => k.explain_entry(),
            OperatorKind::Update(k) => k.explain_entry(),
            OperatorKind::Delete(k) => k.explain_entry(),
            OperatorKind::CreateTable(k) => k.explain_entry(),
            OperatorKind::DropTable(k) => k.explain_entry(),
            OperatorKind::ShowTables(k) => k.explain_entry(),
            OperatorKind::ShowColumns(k) => k.explain_entry(),
        }
    }
}

#[derive(Debug)]
pub struct PhysicalOperator {
    kind: OperatorKind,
    left: Option<OperatorRef>,
    right: Option<OperatorRef>,
    state: AtomicU8,
    output: RwLock<Option<Arc<Table>>>,
    walltime: RwLock<Duration>,
    transaction_context: RwLock<Weak<TransactionContext>>,
    parameters: RwLock<HashMap<ParameterId, ScalarValue>>,
}

impl PhysicalOperator {
    pub fn make(
        kind: OperatorKind,
        left: Option<OperatorRef>,
        right: Option<OperatorRef>,
    ) -> OperatorRef {
        Arc::new(PhysicalOperator {
            kind,
            left,
            right,
            state: AtomicU8::new(OperatorState::Unexecuted as u8),
            output: RwLock::new(None),
            walltime: RwLock::new(Duration::ZERO),
            transaction_context: RwLock::new(Weak::new()),
            parameters: RwLock::new(HashMap::new()),
        })
    }

    pub fn kind(&self) -> &OperatorKind {
        &self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn description(&self) -> String {
        self.kind.explain_entry().to_string()
    }

    pub fn state(&self) -> OperatorState {
        OperatorState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn left_input(&self) -> Option<OperatorRef> {
        self.left.clone()
    }

    pub fn right_input(&self) -> Option<OperatorRef> {
        self.right.clone()
    }

    pub fn output(&self) -> Option<Arc<Table>> {
        self.output.read().clone()
    }

    pub fn walltime(&self) -> Duration {
        *self.walltime.read()
    }

    pub fn left_input_table(&self) -> Result<Arc<Table>> {
        self.left
            .as_ref()
            .required("operator has no left input")?
            .output()
            .required("left input has not been executed")
    }

    pub fn right_input_table(&self) -> Result<Arc<Table>> {
        self.right
            .as_ref()
            .required("operator has no right input")?
            .output()
            .required("right input has not been executed")
    }

    pub fn transaction_context(&self) -> Option<Arc<TransactionContext>> {
        self.transaction_context.read().upgrade()
    }

    pub fn set_transaction_context(&self, ctx: Weak<TransactionContext>) {
        *self.transaction_context.write() = ctx;
    }

    /// Set the context on this operator, its inputs, and every embedded
    /// subquery plan.
    pub fn set_transaction_context_recursively(&self, ctx: Weak<TransactionContext>) {
        self.set_transaction_context(ctx.clone());
        for input in [&self.left, &self.right].into_iter().flatten() {
            input.set_transaction_context_recursively(ctx.clone());
        }
        for plan in self.kind.subquery_plans() {
            plan.set_transaction_context_recursively(ctx.clone());
        }
    }

    pub fn parameters(&self) -> HashMap<ParameterId, ScalarValue> {
        self.parameters.read().clone()
    }

    /// Merge a parameter binding into this operator and everything below it,
    /// including subquery plans, which is how correlated placeholders get
    /// their per-row values.
    pub fn set_parameters(&self, parameters: &HashMap<ParameterId, ScalarValue>) {
        self.parameters.write().extend(
            parameters
                .iter()
                .map(|(id, value)| (*id, value.clone())),
        );
        for input in [&self.left, &self.right].into_iter().flatten() {
            input.set_parameters(parameters);
        }
        for plan in self.kind.subquery_plans() {
            plan.set_parameters(parameters);
        }
    }

    /// Run the operator. Produces the output exactly once; if the transaction
    /// is already aborted the operator ends in `Aborted` with no output and
    /// that is not an error.
    pub fn execute(&self) -> Result<()> {
        self.state
            .compare_exchange(
                OperatorState::Unexecuted as u8,
                OperatorState::Executing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| GraniteError::new(format!("{} was already executed", self.name())))?;

        let timer = Instant::now();
        let ctx = self.transaction_context();

        if let Some(ctx) = &ctx {
            if ctx.is_aborted() {
                self.state
                    .store(OperatorState::Aborted as u8, Ordering::Release);
                return Ok(());
            }
            ctx.on_operator_started();
        }

        debug_assert!(
            self.left.is_none() || self.left.as_ref().unwrap().output().is_some(),
            "left input of {} has not been executed",
            self.name()
        );
        debug_assert!(
            self.right.is_none() || self.right.as_ref().unwrap().output().is_some(),
            "right input of {} has not been executed",
            self.name()
        );

        let result = self.kind.on_execute(self, ctx.as_ref());

        if let Some(ctx) = &ctx {
            ctx.on_operator_finished();
        }

        match result {
            Ok(table) => {
                *self.output.write() = Some(table);
                self.state
                    .store(OperatorState::Executed as u8, Ordering::Release);
                self.kind.on_cleanup();
                *self.walltime.write() = timer.elapsed();
                trace!(operator = self.name(), walltime = ?self.walltime(), "operator executed");
                Ok(())
            }
            Err(error) => {
                self.state
                    .store(OperatorState::Aborted as u8, Ordering::Release);
                Err(error)
            }
        }
    }

    /// Drop the output and return to `Unexecuted`. Only read-only operators
    /// opt in; mutation operators stay terminal.
    pub fn clear_output(&self) -> bool {
        if !self.kind.is_read_only() || self.state() == OperatorState::Executing {
            return false;
        }
        *self.output.write() = None;
        self.state
            .store(OperatorState::Unexecuted as u8, Ordering::Release);
        true
    }

    /// Rebuild a fresh, unexecuted operator DAG with the same shape. Shared
    /// operators stay shared through the memo map; the transaction context
    /// and parameters carry over.
    pub fn recreate(&self) -> OperatorRef {
        let mut memo: HashMap<*const PhysicalOperator, OperatorRef> = HashMap::new();
        self.recreate_with(&mut memo)
    }

    fn recreate_with(
        &self,
        memo: &mut HashMap<*const PhysicalOperator, OperatorRef>,
    ) -> OperatorRef {
        let key = self as *const PhysicalOperator;
        if let Some(existing) = memo.get(&key) {
            return existing.clone();
        }
        let left = self.left.as_ref().map(|input| input.recreate_with(memo));
        let right = self.right.as_ref().map(|input| input.recreate_with(memo));
        let op = PhysicalOperator::make(self.kind.recreate(), left, right);
        *op.transaction_context.write() = self.transaction_context.read().clone();
        *op.parameters.write() = self.parameters.read().clone();
        memo.insert(key, op.clone());
        op
    }
}

impl Explainable for PhysicalOperator {
    fn explain_entry(&self) -> ExplainEntry {
        self.kind.explain_entry()
    }
}

/// Execute an operator DAG on the calling thread, inputs first. Used for
/// subquery plans; the scheduler path goes through
/// [`operator_task`](crate::execution::operator_task) instead.
pub fn execute_inline(op: &OperatorRef) -> Result<Arc<Table>> {
    if let Some(output) = op.output() {
        return Ok(output);
    }
    if op.state() == OperatorState::Aborted {
        return Err(GraniteError::transaction_aborted());
    }
    for input in [op.left_input(), op.right_input()].into_iter().flatten() {
        execute_inline(&input)?;
    }
    op.execute()?;
    op.output().ok_or_else(GraniteError::transaction_aborted)
}

/// One-row result reporting how many rows a mutation touched.
pub(crate) fn rows_affected_table(rows: usize) -> Result<Arc<Table>> {
    let table = Table::new(
        vec![ColumnDefinition::new(
            "rows_affected",
            DataType::Int64,
            false,
        )],
        crate::storage::table::DEFAULT_TARGET_CHUNK_SIZE,
    );
    table.append_rows(vec![vec![ScalarValue::Int64(rows as i64)]], 0)?;
    Ok(Arc::new(table))
}

//! Bridges operator DAGs into scheduler tasks.

use super::operators::{OperatorRef, PhysicalOperator};
use granite_error::GraniteError;
use granite_scheduler::Task;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

/// Wrap every operator reachable from `root` in a task, linking input
/// operators as predecessors. Returns the tasks in topological order
/// (inputs first, root last); shared operators get exactly one task.
///
/// A failing operator records its error against the query's transaction
/// context, which flips the aborted flag that every later operator checks on
/// entry. The failure never propagates into the worker thread.
pub fn build_operator_tasks(root: &OperatorRef) -> Vec<Arc<Task>> {
    let mut memo: HashMap<*const PhysicalOperator, Arc<Task>> = HashMap::new();
    let mut tasks = Vec::new();
    build(root, &mut memo, &mut tasks);
    tasks
}

fn build(
    op: &OperatorRef,
    memo: &mut HashMap<*const PhysicalOperator, Arc<Task>>,
    tasks: &mut Vec<Arc<Task>>,
) -> Arc<Task> {
    if let Some(task) = memo.get(&Arc::as_ptr(op)) {
        return task.clone();
    }

    let input_tasks: Vec<Arc<Task>> = [op.left_input(), op.right_input()]
        .into_iter()
        .flatten()
        .map(|input| build(&input, memo, tasks))
        .collect();

    let task = {
        let op = op.clone();
        Task::new(op.description(), move || {
            // A panicking operator fails the query, not the worker thread.
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| op.execute()));
            let err = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(err)) => err,
                Err(_) => GraniteError::new(format!("{} panicked", op.name())),
            };
            match op.transaction_context() {
                Some(ctx) => ctx.fail(err),
                None => error!(operator = op.name(), %err, "operator failed"),
            }
        })
    };

    for input in &input_tasks {
        input.set_as_predecessor_of(&task);
    }

    memo.insert(Arc::as_ptr(op), task.clone());
    tasks.push(task.clone());
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::operators::{GetTable, OperatorKind, PhysicalOperator, UnionOperator};
    use crate::logical::UnionMode;
    use crate::storage::table::DEFAULT_TARGET_CHUNK_SIZE;
    use crate::storage::{ColumnDefinition, DataType, Table};

    fn get_table_op() -> OperatorRef {
        let table = Arc::new(Table::new(
            vec![ColumnDefinition::new("a", DataType::Int32, false)],
            DEFAULT_TARGET_CHUNK_SIZE,
        ));
        PhysicalOperator::make(
            OperatorKind::GetTable(GetTable {
                table_name: "t".to_string(),
                table,
            }),
            None,
            None,
        )
    }

    #[test]
    fn shared_operator_gets_one_task() {
        let shared = get_table_op();
        let union = PhysicalOperator::make(
            OperatorKind::Union(UnionOperator {
                mode: UnionMode::All,
            }),
            Some(shared.clone()),
            Some(shared),
        );

        let tasks = build_operator_tasks(&union);
        assert_eq!(2, tasks.len());
        // The union waits for its (single) shared input.
        assert!(!tasks[1].is_ready() || tasks[0].is_done());
    }
}

//! MVCC behavior across concurrent transaction contexts, abort
//! short-circuiting, and plan/result reuse through recreate.

use granite_error::ErrorKind;
use granite_execution::engine::{Engine, EngineConfig};
use granite_execution::execution::operators::{execute_inline, OperatorRef, OperatorState};
use granite_execution::execution::LqpTranslator;
use granite_execution::optimizer::Optimizer;
use granite_execution::sql::SqlTranslator;
use granite_execution::storage::ScalarValue;
use granite_scheduler::Topology;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::sync::Arc;

fn test_engine() -> Engine {
    Engine::try_new(EngineConfig {
        topology: Some(Topology::fake(1, 2)),
        ..EngineConfig::default()
    })
    .unwrap()
}

fn engine_with_rows() -> Engine {
    let engine = test_engine();
    let session = engine.session();
    session
        .execute_sql("CREATE TABLE t (a INT NOT NULL)")
        .unwrap();
    session
        .execute_sql("INSERT INTO t VALUES (1), (2), (3)")
        .unwrap();
    engine
}

/// Translate one statement into an executable operator DAG, without running
/// it.
fn plan(engine: &Engine, sql: &str, optimize: bool) -> OperatorRef {
    let statements = Parser::parse_sql(&GenericDialect {}, sql).unwrap();
    let translator = SqlTranslator::new(engine.storage().clone(), true);
    let mut logical = translator.translate_statement(&statements[0]).unwrap();
    if optimize {
        logical = Optimizer::new().optimize(logical).unwrap();
    }
    LqpTranslator::new(engine.storage().clone(), engine.config().target_chunk_size)
        .translate(&logical)
        .unwrap()
}

#[test]
fn uncommitted_writes_are_invisible_to_other_snapshots() {
    let engine = engine_with_rows();
    let manager = engine.transaction_manager();

    // Writer inserts but does not commit yet.
    let writer = manager.new_transaction_context();
    let insert = plan(&engine, "INSERT INTO t VALUES (4)", true);
    insert.set_transaction_context_recursively(Arc::downgrade(&writer));
    execute_inline(&insert).unwrap();

    // A reader started now must not see the row.
    let reader = manager.new_transaction_context();
    let select = plan(&engine, "SELECT COUNT(*) FROM t", true);
    select.set_transaction_context_recursively(Arc::downgrade(&reader));
    let out = execute_inline(&select).unwrap();
    assert_eq!(ScalarValue::Int64(3), out.value(0, 0));
    reader.commit().unwrap();

    writer.commit().unwrap();

    // After the commit, new snapshots see it.
    let reader = manager.new_transaction_context();
    let select = plan(&engine, "SELECT COUNT(*) FROM t", true);
    select.set_transaction_context_recursively(Arc::downgrade(&reader));
    let out = execute_inline(&select).unwrap();
    assert_eq!(ScalarValue::Int64(4), out.value(0, 0));
}

#[test]
fn rolled_back_insert_stays_invisible() {
    let engine = engine_with_rows();
    let manager = engine.transaction_manager();

    let writer = manager.new_transaction_context();
    let insert = plan(&engine, "INSERT INTO t VALUES (99)", true);
    insert.set_transaction_context_recursively(Arc::downgrade(&writer));
    execute_inline(&insert).unwrap();
    writer.rollback();

    let count = engine
        .session()
        .execute_sql("SELECT COUNT(*) FROM t")
        .unwrap();
    assert_eq!(ScalarValue::Int64(3), count[0].table.value(0, 0));
}

#[test]
fn delete_conflict_aborts_the_second_writer() {
    let engine = engine_with_rows();
    let manager = engine.transaction_manager();

    let first = manager.new_transaction_context();
    let delete = plan(&engine, "DELETE FROM t WHERE a = 2", true);
    delete.set_transaction_context_recursively(Arc::downgrade(&first));
    execute_inline(&delete).unwrap();

    // Second transaction tries to delete the same (still locked) row.
    let second = manager.new_transaction_context();
    let delete = plan(&engine, "DELETE FROM t WHERE a = 2", true);
    delete.set_transaction_context_recursively(Arc::downgrade(&second));
    let err = execute_inline(&delete).unwrap_err();
    assert_eq!(ErrorKind::TransactionConflict, err.kind());
    second.rollback();

    // The first writer walks away; the row becomes deletable again.
    first.rollback();
    engine
        .session()
        .execute_sql("DELETE FROM t WHERE a = 2")
        .unwrap();
    let count = engine
        .session()
        .execute_sql("SELECT COUNT(*) FROM t")
        .unwrap();
    assert_eq!(ScalarValue::Int64(2), count[0].table.value(0, 0));
}

#[test]
fn abort_short_circuits_operators() {
    let engine = engine_with_rows();
    let manager = engine.transaction_manager();

    let ctx = manager.new_transaction_context();
    let select = plan(&engine, "SELECT a FROM t", true);
    select.set_transaction_context_recursively(Arc::downgrade(&ctx));

    ctx.abort();

    let err = execute_inline(&select).unwrap_err();
    assert_eq!(ErrorKind::TransactionAborted, err.kind());
    assert_eq!(OperatorState::Aborted, select.state());
    assert!(select.output().is_none());
}

#[test]
fn commit_requires_idle_operators() {
    let engine = engine_with_rows();
    let ctx = engine.transaction_manager().new_transaction_context();
    ctx.on_operator_started();
    assert!(ctx.commit().is_err());
    ctx.on_operator_finished();
    ctx.commit().unwrap();
}

#[test]
fn recreate_produces_a_fresh_executable_dag() {
    let engine = engine_with_rows();
    let manager = engine.transaction_manager();

    let ctx = manager.new_transaction_context();
    let select = plan(&engine, "SELECT a FROM t WHERE a > 1", true);
    select.set_transaction_context_recursively(Arc::downgrade(&ctx));
    let first = execute_inline(&select).unwrap();
    assert_eq!(2, first.row_count());
    ctx.commit().unwrap();

    // Read-only operators may opt into re-execution by clearing their
    // output; mutation operators refuse.
    assert!(select.clear_output());
    assert_eq!(OperatorState::Unexecuted, select.state());
    assert!(select.output().is_none());

    // The recreated DAG is unexecuted and runs again under a new context.
    let recreated = select.recreate();
    assert_eq!(OperatorState::Unexecuted, recreated.state());
    assert!(recreated.output().is_none());

    let ctx = manager.new_transaction_context();
    recreated.set_transaction_context_recursively(Arc::downgrade(&ctx));
    let second = execute_inline(&recreated).unwrap();
    assert_eq!(2, second.row_count());
}

#[test]
fn optimizer_preserves_results() {
    let engine = test_engine();
    let session = engine.session();
    session
        .execute_sql("CREATE TABLE r (a INT NOT NULL, b INT NOT NULL)")
        .unwrap();
    session
        .execute_sql(
            "INSERT INTO r VALUES (1, 9), (2, 8), (3, 7), (4, 6), (5, 5), (6, 4), (7, 3)",
        )
        .unwrap();

    let queries = [
        "SELECT a, b FROM r WHERE a > 2 AND b > 4",
        "SELECT a + b FROM r WHERE 1 = 1 AND a < 5",
        "SELECT x.a FROM r AS x, r AS y WHERE x.a = y.b",
    ];

    for sql in queries {
        let manager = engine.transaction_manager();

        let ctx = manager.new_transaction_context();
        let raw = plan(&engine, sql, false);
        raw.set_transaction_context_recursively(Arc::downgrade(&ctx));
        let expected = execute_inline(&raw).unwrap();
        ctx.commit().unwrap();

        let ctx = manager.new_transaction_context();
        let optimized = plan(&engine, sql, true);
        optimized.set_transaction_context_recursively(Arc::downgrade(&ctx));
        let got = execute_inline(&optimized).unwrap();
        ctx.commit().unwrap();

        let rows = |table: &granite_execution::storage::Table| -> Vec<Vec<String>> {
            let mut out: Vec<Vec<String>> = (0..table.row_count())
                .map(|row| {
                    (0..table.column_count())
                        .map(|column| table.value(column, row).to_string())
                        .collect()
                })
                .collect();
            out.sort();
            out
        };
        assert_eq!(rows(&expected), rows(&got), "results diverged for {sql}");
    }
}

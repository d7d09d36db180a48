//! End-to-end statements through a full engine: parse → translate →
//! optimize → physical plan → scheduler → result table.

use granite_execution::engine::{Engine, EngineConfig};
use granite_execution::storage::ScalarValue;
use granite_scheduler::Topology;

fn test_engine() -> Engine {
    Engine::try_new(EngineConfig {
        topology: Some(Topology::fake(2, 2)),
        ..EngineConfig::default()
    })
    .unwrap()
}

fn engine_with_data() -> Engine {
    let engine = test_engine();
    let session = engine.session();
    session
        .execute_sql("CREATE TABLE t (a INT NOT NULL, b INT, name TEXT)")
        .unwrap();
    session
        .execute_sql(
            "INSERT INTO t VALUES \
             (1, 10, 'alpha'), (2, 20, 'beta'), (3, 30, 'gamma'), \
             (4, 40, 'delta'), (5, NULL, 'epsilon')",
        )
        .unwrap();
    engine
}

fn column_as_i64(result: &granite_execution::engine::StatementResult, column: usize) -> Vec<Option<i64>> {
    (0..result.table.row_count())
        .map(|row| match result.table.value(column, row) {
            ScalarValue::Null => None,
            other => other.as_i64().or_else(|| other.as_f64().map(|f| f as i64)),
        })
        .collect()
}

fn column_as_text(result: &granite_execution::engine::StatementResult, column: usize) -> Vec<String> {
    (0..result.table.row_count())
        .map(|row| result.table.value(column, row).to_string())
        .collect()
}

#[test]
fn filter_and_order() {
    let engine = engine_with_data();
    let results = engine
        .session()
        .execute_sql("SELECT a, b FROM t WHERE a > 1 AND a < 5 ORDER BY a DESC")
        .unwrap();

    assert_eq!(vec![Some(4), Some(3), Some(2)], column_as_i64(&results[0], 0));
    assert_eq!(vec![Some(40), Some(30), Some(20)], column_as_i64(&results[0], 1));
}

#[test]
fn order_by_unprojected_column() {
    let engine = engine_with_data();
    let results = engine
        .session()
        .execute_sql("SELECT name FROM t WHERE a < 4 ORDER BY b DESC")
        .unwrap();

    assert_eq!(1, results[0].table.column_count());
    assert_eq!(vec!["gamma", "beta", "alpha"], column_as_text(&results[0], 0));
}

#[test]
fn expressions_and_aliases() {
    let engine = engine_with_data();
    let results = engine
        .session()
        .execute_sql("SELECT a + 1 AS next, CASE WHEN a > 3 THEN 'big' ELSE 'small' END AS size FROM t WHERE a IN (1, 4)")
        .unwrap();

    let table = &results[0].table;
    assert_eq!("next", table.column_definitions()[0].name);
    assert_eq!("size", table.column_definitions()[1].name);
    assert_eq!(vec![Some(2), Some(5)], column_as_i64(&results[0], 0));
    assert_eq!(vec!["small", "big"], column_as_text(&results[0], 1));
}

#[test]
fn aggregation_with_group_by_and_having() {
    let engine = test_engine();
    let session = engine.session();
    session
        .execute_sql("CREATE TABLE sales (region TEXT NOT NULL, amount INT NOT NULL)")
        .unwrap();
    session
        .execute_sql(
            "INSERT INTO sales VALUES \
             ('north', 10), ('north', 20), ('south', 5), ('south', 7), ('west', 100)",
        )
        .unwrap();

    let results = session
        .execute_sql(
            "SELECT region, SUM(amount), COUNT(*) FROM sales \
             GROUP BY region HAVING SUM(amount) > 10 ORDER BY region",
        )
        .unwrap();

    assert_eq!(vec!["north", "south", "west"], {
        // south sums to 12, which passes HAVING.
        column_as_text(&results[0], 0)
    });
    assert_eq!(vec![Some(30), Some(12), Some(100)], column_as_i64(&results[0], 1));
    assert_eq!(vec![Some(2), Some(2), Some(1)], column_as_i64(&results[0], 2));
}

#[test]
fn aggregate_over_all_rows_ignores_nulls() {
    let engine = engine_with_data();
    let results = engine
        .session()
        .execute_sql("SELECT COUNT(*), COUNT(b), MIN(b), MAX(b), AVG(b) FROM t")
        .unwrap();

    assert_eq!(vec![Some(5)], column_as_i64(&results[0], 0));
    assert_eq!(vec![Some(4)], column_as_i64(&results[0], 1));
    assert_eq!(vec![Some(10)], column_as_i64(&results[0], 2));
    assert_eq!(vec![Some(40)], column_as_i64(&results[0], 3));
    assert_eq!(vec![Some(25)], column_as_i64(&results[0], 4));
}

#[test]
fn joins_inner_and_left() {
    let engine = test_engine();
    let session = engine.session();
    session
        .execute_sql("CREATE TABLE users (id INT NOT NULL, name TEXT NOT NULL)")
        .unwrap();
    session
        .execute_sql("CREATE TABLE orders (user_id INT NOT NULL, total INT NOT NULL)")
        .unwrap();
    session
        .execute_sql("INSERT INTO users VALUES (1, 'ada'), (2, 'bob'), (3, 'cyd')")
        .unwrap();
    session
        .execute_sql("INSERT INTO orders VALUES (1, 50), (1, 25), (3, 10)")
        .unwrap();

    let results = session
        .execute_sql(
            "SELECT name, SUM(total) FROM users JOIN orders ON users.id = orders.user_id \
             GROUP BY name ORDER BY name",
        )
        .unwrap();
    assert_eq!(vec!["ada", "cyd"], column_as_text(&results[0], 0));
    assert_eq!(vec![Some(75), Some(10)], column_as_i64(&results[0], 1));

    let results = session
        .execute_sql(
            "SELECT name, total FROM users LEFT JOIN orders ON users.id = orders.user_id \
             ORDER BY name, total",
        )
        .unwrap();
    // bob keeps a row with a NULL total.
    assert_eq!(4, results[0].table.row_count());
    assert_eq!(
        vec![Some(25), Some(50), None, Some(10)],
        column_as_i64(&results[0], 1)
    );
}

#[test]
fn implicit_join_via_where_equality() {
    let engine = test_engine();
    let session = engine.session();
    session
        .execute_sql("CREATE TABLE a (x INT NOT NULL)")
        .unwrap();
    session
        .execute_sql("CREATE TABLE b (y INT NOT NULL)")
        .unwrap();
    session.execute_sql("INSERT INTO a VALUES (1), (2), (3)").unwrap();
    session.execute_sql("INSERT INTO b VALUES (2), (3), (4)").unwrap();

    let results = session
        .execute_sql("SELECT x FROM a, b WHERE a.x = b.y ORDER BY x")
        .unwrap();
    assert_eq!(vec![Some(2), Some(3)], column_as_i64(&results[0], 0));
}

#[test]
fn union_and_distinct() {
    let engine = engine_with_data();
    let session = engine.session();

    let results = session
        .execute_sql("SELECT a FROM t WHERE a < 3 UNION ALL SELECT a FROM t WHERE a < 2 ORDER BY a")
        .unwrap();
    assert_eq!(vec![Some(1), Some(1), Some(2)], column_as_i64(&results[0], 0));

    let results = session
        .execute_sql("SELECT a FROM t WHERE a < 3 UNION SELECT a FROM t WHERE a < 2 ORDER BY a")
        .unwrap();
    assert_eq!(vec![Some(1), Some(2)], column_as_i64(&results[0], 0));

    let results = session
        .execute_sql("SELECT DISTINCT name FROM (SELECT name FROM t UNION ALL SELECT name FROM t) AS both_copies ORDER BY name")
        .unwrap();
    assert_eq!(5, results[0].table.row_count());
}

#[test]
fn limit_and_offset() {
    let engine = engine_with_data();
    let results = engine
        .session()
        .execute_sql("SELECT a FROM t ORDER BY a LIMIT 2 OFFSET 1")
        .unwrap();
    assert_eq!(vec![Some(2), Some(3)], column_as_i64(&results[0], 0));
}

#[test]
fn scalar_subquery() {
    let engine = engine_with_data();
    let results = engine
        .session()
        .execute_sql("SELECT a FROM t WHERE b = (SELECT MAX(b) FROM t)")
        .unwrap();
    assert_eq!(vec![Some(4)], column_as_i64(&results[0], 0));
}

#[test]
fn correlated_exists_subquery() {
    let engine = test_engine();
    let session = engine.session();
    session
        .execute_sql("CREATE TABLE t (a INT NOT NULL)")
        .unwrap();
    session
        .execute_sql("CREATE TABLE u (b INT NOT NULL)")
        .unwrap();
    session.execute_sql("INSERT INTO t VALUES (1), (2), (3)").unwrap();
    session.execute_sql("INSERT INTO u VALUES (2), (3), (4)").unwrap();

    let results = session
        .execute_sql("SELECT a FROM t WHERE EXISTS (SELECT b FROM u WHERE u.b = t.a) ORDER BY a")
        .unwrap();
    assert_eq!(vec![Some(2), Some(3)], column_as_i64(&results[0], 0));

    let results = session
        .execute_sql("SELECT a FROM t WHERE a IN (SELECT b FROM u) ORDER BY a")
        .unwrap();
    assert_eq!(vec![Some(2), Some(3)], column_as_i64(&results[0], 0));
}

#[test]
fn select_without_from() {
    let engine = test_engine();
    let results = engine.session().execute_sql("SELECT 1 + 2, 'x'").unwrap();
    assert_eq!(vec![Some(3)], column_as_i64(&results[0], 0));
    assert_eq!(vec!["x"], column_as_text(&results[0], 1));
}

#[test]
fn show_statements_and_explain() {
    let engine = engine_with_data();
    let session = engine.session();

    let results = session.execute_sql("SHOW TABLES").unwrap();
    assert_eq!(vec!["t"], column_as_text(&results[0], 0));

    let results = session.execute_sql("SHOW COLUMNS FROM t").unwrap();
    assert_eq!(vec!["a", "b", "name"], column_as_text(&results[0], 0));

    let results = session
        .execute_sql("EXPLAIN SELECT a FROM t WHERE a > 3")
        .unwrap();
    let plan = column_as_text(&results[0], 0).join("\n");
    assert!(plan.contains("Filter"), "plan was:\n{plan}");
    assert!(plan.contains("Scan"), "plan was:\n{plan}");
}

#[test]
fn drop_table_removes_it() {
    let engine = engine_with_data();
    let session = engine.session();
    session.execute_sql("DROP TABLE t").unwrap();
    assert!(session.execute_sql("SELECT a FROM t").is_err());
    assert_eq!(
        0,
        session.execute_sql("SHOW TABLES").unwrap()[0].table.row_count()
    );
}

#[test]
fn translation_errors() {
    use granite_error::{ErrorKind, TranslationErrorKind};

    let engine = engine_with_data();
    let session = engine.session();

    let kind = |sql: &str| session.execute_sql(sql).unwrap_err().kind();

    assert_eq!(
        ErrorKind::Translation(TranslationErrorKind::UnknownIdentifier),
        kind("SELECT missing FROM t")
    );
    assert_eq!(
        ErrorKind::Translation(TranslationErrorKind::TypeMismatch),
        kind("SELECT a FROM t WHERE name > 3")
    );
    assert_eq!(
        ErrorKind::Translation(TranslationErrorKind::AggregateMisuse),
        kind("SELECT a, SUM(b) FROM t")
    );
    assert_eq!(
        ErrorKind::Translation(TranslationErrorKind::ColumnCountMismatch),
        kind("INSERT INTO t (a, b) VALUES (1, 2, 3)")
    );
    assert_eq!(ErrorKind::Parse, kind("SELEKT 1"));

    // Ambiguity needs two tables exposing the same column name.
    session.execute_sql("CREATE TABLE t2 (a INT)").unwrap();
    assert_eq!(
        ErrorKind::Translation(TranslationErrorKind::AmbiguousIdentifier),
        kind("SELECT a FROM t, t2")
    );
}

#[test]
fn index_scan_end_to_end() {
    use granite_execution::storage::index::IndexKind;

    // Index scans only apply to plans without MVCC validation, where the
    // filter sits directly on the stored table.
    let engine = Engine::try_new(EngineConfig {
        topology: Some(Topology::fake(1, 2)),
        validate_queries: false,
        ..EngineConfig::default()
    })
    .unwrap();
    let session = engine.session();
    session
        .execute_sql("CREATE TABLE big (c INT NOT NULL)")
        .unwrap();

    let table = engine.storage().get_table("big").unwrap();
    table
        .append_rows((0..2000).map(|i| vec![ScalarValue::Int32(i)]).collect(), 0)
        .unwrap();
    table.create_index(IndexKind::GroupKey, vec![0]).unwrap();

    // 4 of 2000 values qualify, well under the 1% threshold.
    let explain = session
        .execute_sql("EXPLAIN SELECT c FROM big WHERE c > 1995")
        .unwrap();
    let plan = column_as_text(&explain[0], 0).join("\n");
    assert!(plan.contains("IndexScan"), "plan was:\n{plan}");

    let results = session
        .execute_sql("SELECT c FROM big WHERE c > 1995 ORDER BY c")
        .unwrap();
    assert_eq!(
        vec![Some(1996), Some(1997), Some(1998), Some(1999)],
        column_as_i64(&results[0], 0)
    );
}

#[test]
fn update_and_delete() {
    let engine = engine_with_data();
    let session = engine.session();

    let results = session
        .execute_sql("UPDATE t SET b = 99 WHERE a = 2")
        .unwrap();
    assert_eq!(vec![Some(1)], column_as_i64(&results[0], 0));

    let results = session
        .execute_sql("SELECT b FROM t WHERE a = 2")
        .unwrap();
    assert_eq!(vec![Some(99)], column_as_i64(&results[0], 0));

    session.execute_sql("DELETE FROM t WHERE a > 3").unwrap();
    let results = session.execute_sql("SELECT COUNT(*) FROM t").unwrap();
    assert_eq!(vec![Some(3)], column_as_i64(&results[0], 0));
}

//! Tests for SQL script splitting and execution

use super::*;
use crate::{ColumnMeta, Row, Value};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case("SELECT 1", vec!["SELECT 1"])]
#[case("SELECT 1; SELECT 2;", vec!["SELECT 1", "SELECT 2"])]
#[case("SELECT 'a;b'; SELECT 2", vec!["SELECT 'a;b'", "SELECT 2"])]
#[case("SELECT 'it''s; ok'", vec!["SELECT 'it''s; ok'"])]
#[case("SELECT `we;ird` FROM t", vec!["SELECT `we;ird` FROM t"])]
#[case("SELECT 1 -- trailing; comment\n; SELECT 2", vec!["SELECT 1 -- trailing; comment", "SELECT 2"])]
#[case("/* a; b */ SELECT 1", vec!["/* a; b */ SELECT 1"])]
#[case("-- only a comment;\n", vec![])]
#[case(";;  ;", vec![])]
#[case(r"SELECT 'a\'; SELECT 2", vec![r"SELECT 'a\'", "SELECT 2"])]
fn test_split_sql_statements(#[case] input: &str, #[case] expected: Vec<&str>) {
    assert_eq!(split_sql_statements(input, SqlDialect::Standard), expected);
}

#[rstest]
#[case(
    "CREATE FUNCTION f() RETURNS int AS $$ BEGIN RETURN 1; END; $$ LANGUAGE plpgsql; SELECT f()",
    vec!["CREATE FUNCTION f() RETURNS int AS $$ BEGIN RETURN 1; END; $$ LANGUAGE plpgsql", "SELECT f()"]
)]
#[case(
    "DO $body$ BEGIN PERFORM 1; RAISE NOTICE '$$;'; END $body$; SELECT 2",
    vec!["DO $body$ BEGIN PERFORM 1; RAISE NOTICE '$$;'; END $body$", "SELECT 2"]
)]
#[case("SELECT $1::int; SELECT 2", vec!["SELECT $1::int", "SELECT 2"])]
#[case("SELECT a$b$c FROM t; SELECT 2", vec!["SELECT a$b$c FROM t", "SELECT 2"])]
fn test_split_postgres_dollar_quotes(#[case] input: &str, #[case] expected: Vec<&str>) {
    assert_eq!(split_sql_statements(input, SqlDialect::Postgres), expected);
}

#[rstest]
#[case(r"SELECT 'it\'s; fine'; SELECT 2", vec![r"SELECT 'it\'s; fine'", "SELECT 2"])]
#[case(r#"SELECT "a\";b"; SELECT 2"#, vec![r#"SELECT "a\";b""#, "SELECT 2"])]
#[case(r"SELECT 'back\\'; SELECT 2", vec![r"SELECT 'back\\'", "SELECT 2"])]
fn test_split_mysql_backslash_escapes(#[case] input: &str, #[case] expected: Vec<&str>) {
    assert_eq!(split_sql_statements(input, SqlDialect::MySql), expected);
}

#[test]
fn test_dollar_quotes_are_plain_text_outside_postgres() {
    assert_eq!(
        split_sql_statements("SELECT '$$'; SELECT $$; x", SqlDialect::Standard),
        vec!["SELECT '$$'", "SELECT $$", "x"]
    );
}

#[rstest]
#[case("USE `shop`", Some("shop"))]
#[case("use shop", Some("shop"))]
#[case("USE [warehouse]", Some("warehouse"))]
#[case("-- pick db\nUSE shop", Some("shop"))]
#[case("/* setup */ use `my db`", Some("my db"))]
#[case("USE shop -- trailing", Some("shop"))]
#[case("USER_TABLES", None)]
#[case("SELECT 1", None)]
fn test_use_database_name(#[case] input: &str, #[case] expected: Option<&str>) {
    assert_eq!(use_database_name(input).as_deref(), expected);
}

/// Records every statement and answers with its text as a one-cell result
#[derive(Default)]
struct RecordingExecutor {
    executed: Vec<String>,
    fail_on: Option<&'static str>,
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn execute_statement(&mut self, sql: &str) -> Result<QueryResult> {
        self.executed.push(sql.to_string());
        if self.fail_on.is_some_and(|f| sql.contains(f)) {
            return Err(ConduitError::Exec("syntax error".into()));
        }
        Ok(QueryResult {
            columns: vec![ColumnMeta::new("sql", "TEXT", 0)],
            rows: vec![Row::new(vec![Value::String(sql.to_string())])],
            affected_rows: 0,
            execution_time_ms: 0,
        })
    }
}

#[tokio::test]
async fn test_use_prefix_runs_first_and_last_result_wins() {
    let mut executor = RecordingExecutor::default();
    let result = run_sql_script(&mut executor, "USE `shop`;\nSELECT 1; SELECT 2;")
        .await
        .unwrap();

    assert_eq!(executor.executed, vec!["USE `shop`", "SELECT 1", "SELECT 2"]);
    assert_eq!(result.cell(0, "sql"), Some(&Value::String("SELECT 2".into())));
}

#[tokio::test]
async fn test_failed_use_is_tolerated() {
    let mut executor = RecordingExecutor {
        fail_on: Some("USE"),
        ..Default::default()
    };
    let result = run_sql_script(&mut executor, "USE shop; SELECT 7").await.unwrap();
    assert_eq!(result.cell(0, "sql"), Some(&Value::String("SELECT 7".into())));
}

#[tokio::test]
async fn test_failed_use_after_comment_is_tolerated() {
    let mut executor = RecordingExecutor {
        fail_on: Some("USE"),
        ..Default::default()
    };
    let result = run_sql_script(&mut executor, "-- pick db\nUSE shop; SELECT 7")
        .await
        .unwrap();
    assert_eq!(executor.executed, vec!["-- pick db\nUSE shop", "SELECT 7"]);
    assert_eq!(result.cell(0, "sql"), Some(&Value::String("SELECT 7".into())));
}

/// Splits with the Postgres dialect
#[derive(Default)]
struct PostgresRecorder(RecordingExecutor);

#[async_trait]
impl StatementExecutor for PostgresRecorder {
    async fn execute_statement(&mut self, sql: &str) -> Result<QueryResult> {
        self.0.execute_statement(sql).await
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }
}

#[tokio::test]
async fn test_executor_dialect_drives_splitting() {
    let mut executor = PostgresRecorder::default();
    run_sql_script(&mut executor, "DO $$ BEGIN PERFORM 1; END $$; SELECT 2")
        .await
        .unwrap();
    assert_eq!(executor.0.executed, vec!["DO $$ BEGIN PERFORM 1; END $$", "SELECT 2"]);
}

#[tokio::test]
async fn test_failure_aborts_remaining_statements() {
    let mut executor = RecordingExecutor {
        fail_on: Some("broken"),
        ..Default::default()
    };
    let err = run_sql_script(&mut executor, "SELECT 1; SELECT broken; SELECT 3")
        .await
        .unwrap_err();

    assert_eq!(executor.executed, vec!["SELECT 1", "SELECT broken"]);
    let message = err.to_string();
    assert!(message.contains("statement 2 of 3 failed"), "{}", message);
    assert!(message.contains("SELECT broken"), "{}", message);
}

#[tokio::test]
async fn test_empty_script_returns_empty_result() {
    let mut executor = RecordingExecutor::default();
    let result = run_sql_script(&mut executor, "  -- nothing\n").await.unwrap();
    assert!(result.rows.is_empty());
    assert!(executor.executed.is_empty());
}

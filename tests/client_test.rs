//! Integration tests for standalone statement execution.

mod common;

use common::{buffered_dispatch, count, setup, sqlite_client, sqlite_config};
use serde_json::json;
use sqldb::{
    Client, ConnectionConfig, DbError, Dialect, ExecuteOptions, Params, PoolOptions, params,
};
use tracing::Level;

#[tokio::test]
async fn test_select_literal_returns_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = sqlite_client(&dir);

    let rows = client
        .execute("SELECT 1 AS x", &Params::new(), ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(serde_json::Value::Object(rows[0].clone()), json!({"x": 1}));
}

#[tokio::test]
async fn test_empty_result_is_an_error_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = sqlite_client(&dir);
    setup(&mut client, &["CREATE TABLE empty_table (id INTEGER)"]).await;

    let err = client
        .execute(
            "SELECT * FROM empty_table",
            &Params::new(),
            ExecuteOptions::default(),
        )
        .await
        .unwrap_err();

    match err {
        DbError::QueryEmptyResult { query } => assert_eq!(query, "SELECT * FROM empty_table"),
        other => panic!("expected QueryEmptyResult, got {other:?}"),
    }
    assert!(client.results().is_empty());
}

#[tokio::test]
async fn test_empty_result_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = sqlite_client(&dir);
    setup(&mut client, &["CREATE TABLE empty_table (id INTEGER)"]).await;

    let rows = client
        .execute(
            "SELECT * FROM empty_table",
            &Params::new(),
            ExecuteOptions::allow_empty(),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_unbound_placeholder_fails_before_connecting() {
    // Nothing listens on port 1: reaching the engine would be a Connection error
    let config = ConnectionConfig::mysql_default().with_port(1);
    let mut client = Client::new(config).unwrap();

    let err = client
        .execute(
            "SELECT * FROM t WHERE id = :id",
            &Params::new(),
            ExecuteOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, DbError::QueryPreparation { .. }),
        "expected QueryPreparation, got {err:?}"
    );

    let err = client
        .execute(
            "SELECT * FROM t WHERE id = :id",
            &params! { "id" => 1, "other" => 2 },
            ExecuteOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryPreparation { .. }), "{err:?}");
}

#[tokio::test]
async fn test_unreachable_server_times_out_after_configured_acquire_timeout() {
    // The pool keeps retrying refused connections until the acquire timeout
    let config = ConnectionConfig::mysql_default()
        .with_port(1)
        .with_pool_options(PoolOptions {
            acquire_timeout_secs: Some(1),
            ..Default::default()
        });
    let mut client = Client::new(config).unwrap();

    let err = client
        .execute("SELECT 1", &Params::new(), ExecuteOptions::default())
        .await
        .unwrap_err();
    match err {
        DbError::Timeout { elapsed_secs, .. } => assert_eq!(elapsed_secs, 1),
        other => panic!("expected Timeout, got {other:?}"),
    }

    let err = client.open_session().await.unwrap_err();
    assert!(
        matches!(err, DbError::Timeout { elapsed_secs: 1, .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_engine_error_is_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = sqlite_client(&dir);

    let err = client
        .execute(
            "SELECT * FROM no_such_table",
            &Params::new(),
            ExecuteOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryExecution { .. }), "{err:?}");
}

#[tokio::test]
async fn test_write_without_results_reports_rows_affected() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = sqlite_client(&dir);
    setup(&mut client, &["CREATE TABLE t (id INTEGER, name TEXT)"]).await;

    let rows = client
        .execute(
            "INSERT INTO t (id, name) VALUES (:id, :name), (:id + 1, :name)",
            &params! { "id" => 1, "name" => "a" },
            ExecuteOptions::no_results(),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(client.rows_affected(), Some(2));
    assert_eq!(count(&mut client, "t").await, 2);
    // A statement with results clears the previous count
    assert_eq!(client.rows_affected(), None);
}

#[tokio::test]
async fn test_named_parameters_bind_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = sqlite_client(&dir);
    setup(
        &mut client,
        &[
            "CREATE TABLE users (id INTEGER, name TEXT, active BOOLEAN)",
            "INSERT INTO users VALUES (1, 'alice', 1), (2, 'bob', 0), (3, 'carol', 1)",
        ],
    )
    .await;

    let rows = client
        .execute(
            "SELECT name FROM users WHERE active = :active AND id >= :min ORDER BY id",
            &params! { "min" => 2, "active" => true },
            ExecuteOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("carol"));

    let rows = client
        .execute(
            "SELECT :v + :v AS twice, ':v' AS quoted",
            &params! { "v" => 21 },
            ExecuteOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(rows[0]["twice"], json!(42));
    assert_eq!(rows[0]["quoted"], json!(":v"));
}

#[tokio::test]
async fn test_row_values_and_column_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = sqlite_client(&dir);

    let rows = client
        .execute(
            "SELECT 3 AS c, NULL AS n, 1.5 AS f, 'hi' AS s, X'0102' AS b",
            &Params::new(),
            ExecuteOptions::default(),
        )
        .await
        .unwrap();

    let row = &rows[0];
    let keys: Vec<&str> = row.keys().map(String::as_str).collect();
    assert_eq!(keys, ["c", "n", "f", "s", "b"]);
    assert_eq!(row["c"], json!(3));
    assert_eq!(row["n"], json!(null));
    assert_eq!(row["f"], json!(1.5));
    assert_eq!(row["s"], json!("hi"));
    assert_eq!(row["b"], json!("AQI="));
}

#[tokio::test]
async fn test_null_parameter_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = sqlite_client(&dir);
    setup(&mut client, &["CREATE TABLE notes (id INTEGER, body TEXT)"]).await;

    client
        .execute(
            "INSERT INTO notes VALUES (:id, :body)",
            &params! { "id" => 1, "body" => None::<String> },
            ExecuteOptions::no_results(),
        )
        .await
        .unwrap();

    let rows = client
        .execute(
            "SELECT body FROM notes WHERE id = :id",
            &params! { "id" => 1 },
            ExecuteOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(rows[0]["body"], json!(null));
}

#[tokio::test]
async fn test_debug_logging_captures_rendered_query() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatch, logs) = buffered_dispatch(Level::DEBUG);
    let mut client = Client::with_dispatch(sqlite_config(&dir), dispatch).unwrap();

    client
        .execute(
            "SELECT :name AS who",
            &params! { "name" => "O'Brien" },
            ExecuteOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        client.last_rendered_query(),
        Some("SELECT 'O''Brien' AS who")
    );
    assert!(logs.contents().contains("Rendered query"));
}

#[tokio::test]
async fn test_preparation_failure_clears_previous_capture() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatch, _logs) = buffered_dispatch(Level::DEBUG);
    let mut client = Client::with_dispatch(sqlite_config(&dir), dispatch).unwrap();

    client
        .execute(
            "SELECT :v AS x",
            &params! { "v" => 1 },
            ExecuteOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(client.last_rendered_query(), Some("SELECT 1 AS x"));

    let err = client
        .execute("SELECT :missing", &Params::new(), ExecuteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryPreparation { .. }));
    assert!(client.last_rendered_query().is_none());
}

#[tokio::test]
async fn test_no_results_never_reports_empty_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = sqlite_client(&dir);
    setup(&mut client, &["CREATE TABLE empty_table (id INTEGER)"]).await;
    let options = ExecuteOptions {
        get_results: false,
        check_empty: true,
    };

    let rows = client
        .execute("SELECT * FROM empty_table", &Params::new(), options)
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert!(client.results().is_empty());
}

#[tokio::test]
async fn test_no_capture_without_debug_logging() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatch, logs) = buffered_dispatch(Level::INFO);
    let mut client = Client::with_dispatch(sqlite_config(&dir), dispatch).unwrap();

    client
        .execute(
            "SELECT :v AS x",
            &params! { "v" => 1 },
            ExecuteOptions::default(),
        )
        .await
        .unwrap();

    assert!(client.last_rendered_query().is_none());
    assert!(!logs.contents().contains("Rendered query"));
}

#[tokio::test]
async fn test_empty_result_logs_rendered_query() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatch, logs) = buffered_dispatch(Level::DEBUG);
    let mut client = Client::with_dispatch(sqlite_config(&dir), dispatch).unwrap();
    setup(&mut client, &["CREATE TABLE empty_table (id INTEGER)"]).await;

    let err = client
        .execute(
            "SELECT * FROM empty_table WHERE id = :id",
            &params! { "id" => 7 },
            ExecuteOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryEmptyResult { .. }));

    let contents = logs.contents();
    assert!(contents.contains("Query returned an empty result"));
    assert!(contents.contains("SELECT * FROM empty_table WHERE id = 7"));
}

#[tokio::test]
async fn test_preparation_failure_is_logged_with_params() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatch, logs) = buffered_dispatch(Level::ERROR);
    let mut client = Client::with_dispatch(sqlite_config(&dir), dispatch).unwrap();

    let err = client
        .execute(
            "SELECT :missing",
            &params! { "present" => "value-xyz" },
            ExecuteOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryPreparation { .. }));

    let contents = logs.contents();
    assert!(contents.contains("Query preparation failed"));
    assert!(contents.contains("SELECT :missing"));
    assert!(contents.contains("value-xyz"));
}

#[tokio::test]
async fn test_sqlserver_configuration_has_no_driver() {
    let err = Client::new(ConnectionConfig::sqlserver_default()).unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }), "{err:?}");
}

#[tokio::test]
async fn test_accessors_and_close() {
    let dir = tempfile::tempdir().unwrap();
    let mut client = sqlite_client(&dir);
    assert_eq!(client.dialect(), Dialect::SQLite);
    assert_eq!(client.config().driver(), "sqlite");

    client
        .execute("SELECT 1 AS x", &Params::new(), ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(client.results().len(), 1);

    client.close().await;
    let err = client
        .execute("SELECT 1 AS x", &Params::new(), ExecuteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }), "{err:?}");
    assert!(client.results().is_empty());
}

//! Statement execution.
//!
//! Runs a [`PreparedQuery`] on one live connection and returns either the
//! materialized rows or the engine's affected-row count.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific execution
//! - `postgres`: PostgreSQL-specific execution
//! - `sqlite`: SQLite-specific execution
//!
//! Each `run` takes a bare connection, so the same code serves pooled
//! connections and savepoint scopes inside a session.

use crate::db::params::PreparedQuery;
use crate::db::pool::{DbPool, acquire_error};
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::Row;
use futures_util::TryStreamExt;
use std::time::Instant;
use tracing::debug;

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Rows in engine order; empty for statements that return none
    Rows(Vec<Row>),
    /// Rows were not requested
    Done { rows_affected: u64 },
}

/// Execute on a connection checked out for this call only.
///
/// The connection returns to the pool when this function returns, on every
/// path. No explicit transaction is opened.
pub async fn run_pooled(
    pool: &DbPool,
    prepared: &PreparedQuery,
    get_results: bool,
) -> DbResult<Outcome> {
    let dialect = pool.dialect();
    let start = Instant::now();

    let outcome = crate::impl_db_dispatch!(pool, {
        MySql(p) => {
            let mut conn = p.acquire().await.map_err(|e| acquire_error(pool, e))?;
            mysql::run(&mut conn, prepared, get_results).await
        },
        Postgres(p) => {
            let mut conn = p.acquire().await.map_err(|e| acquire_error(pool, e))?;
            postgres::run(&mut conn, prepared, get_results).await
        },
        SQLite(p) => {
            let mut conn = p.acquire().await.map_err(|e| acquire_error(pool, e))?;
            sqlite::run(&mut conn, prepared, get_results).await
        },
    })?;

    debug!(
        dialect = %dialect,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Statement executed"
    );
    Ok(outcome)
}

// Each module below provides the same interface adapted to its database type.
// When there are no arguments the raw text goes through `sqlx::Executor`
// directly, which also accepts statements the engine refuses to prepare.

pub(crate) mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use sqlx::MySqlConnection;

    pub async fn run(
        conn: &mut MySqlConnection,
        prepared: &PreparedQuery,
        get_results: bool,
    ) -> DbResult<Outcome> {
        let sql = prepared.sql();
        let args = prepared.args();

        if get_results {
            let rows = if args.is_empty() {
                sqlx::Executor::fetch(&mut *conn, sql)
                    .map_ok(|r| r.to_json_map())
                    .try_collect::<Vec<Row>>()
                    .await
            } else {
                let mut query = sqlx::query(sql);
                for arg in args {
                    query = bind_mysql_param(query, arg);
                }
                query
                    .fetch(&mut *conn)
                    .map_ok(|r| r.to_json_map())
                    .try_collect::<Vec<Row>>()
                    .await
            };
            rows.map(Outcome::Rows).map_err(DbError::execution)
        } else {
            let result = if args.is_empty() {
                sqlx::Executor::execute(&mut *conn, sql).await
            } else {
                let mut query = sqlx::query(sql);
                for arg in args {
                    query = bind_mysql_param(query, arg);
                }
                query.execute(&mut *conn).await
            };
            result
                .map(|r| Outcome::Done {
                    rows_affected: r.rows_affected(),
                })
                .map_err(DbError::execution)
        }
    }
}

pub(crate) mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use sqlx::PgConnection;

    pub async fn run(
        conn: &mut PgConnection,
        prepared: &PreparedQuery,
        get_results: bool,
    ) -> DbResult<Outcome> {
        let sql = prepared.sql();
        let args = prepared.args();

        if get_results {
            let rows = if args.is_empty() {
                sqlx::Executor::fetch(&mut *conn, sql)
                    .map_ok(|r| r.to_json_map())
                    .try_collect::<Vec<Row>>()
                    .await
            } else {
                let mut query = sqlx::query(sql);
                for arg in args {
                    query = bind_postgres_param(query, arg);
                }
                query
                    .fetch(&mut *conn)
                    .map_ok(|r| r.to_json_map())
                    .try_collect::<Vec<Row>>()
                    .await
            };
            rows.map(Outcome::Rows).map_err(DbError::execution)
        } else {
            let result = if args.is_empty() {
                sqlx::Executor::execute(&mut *conn, sql).await
            } else {
                let mut query = sqlx::query(sql);
                for arg in args {
                    query = bind_postgres_param(query, arg);
                }
                query.execute(&mut *conn).await
            };
            result
                .map(|r| Outcome::Done {
                    rows_affected: r.rows_affected(),
                })
                .map_err(DbError::execution)
        }
    }
}

pub(crate) mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::SqliteConnection;

    pub async fn run(
        conn: &mut SqliteConnection,
        prepared: &PreparedQuery,
        get_results: bool,
    ) -> DbResult<Outcome> {
        let sql = prepared.sql();
        let args = prepared.args();

        if get_results {
            let rows = if args.is_empty() {
                sqlx::Executor::fetch(&mut *conn, sql)
                    .map_ok(|r| r.to_json_map())
                    .try_collect::<Vec<Row>>()
                    .await
            } else {
                let mut query = sqlx::query(sql);
                for arg in args {
                    query = bind_sqlite_param(query, arg);
                }
                query
                    .fetch(&mut *conn)
                    .map_ok(|r| r.to_json_map())
                    .try_collect::<Vec<Row>>()
                    .await
            };
            rows.map(Outcome::Rows).map_err(DbError::execution)
        } else {
            let result = if args.is_empty() {
                sqlx::Executor::execute(&mut *conn, sql).await
            } else {
                let mut query = sqlx::query(sql);
                for arg in args {
                    query = bind_sqlite_param(query, arg);
                }
                query.execute(&mut *conn).await
            };
            result
                .map(|r| Outcome::Done {
                    rows_affected: r.rows_affected(),
                })
                .map_err(DbError::execution)
        }
    }
}

//! Database client.
//!
//! [`Client`] owns one lazy connection pool and runs parameterized SQL
//! against it, either as standalone statements or inside a caller-held
//! [`Session`]. The rows of the last statement are kept on the client until
//! the next call.
//!
//! ```no_run
//! use sqldb::{Client, ConnectionConfig, ExecuteOptions, params};
//!
//! # async fn demo() -> sqldb::DbResult<()> {
//! let mut client = Client::new(ConnectionConfig::mysql_default())?;
//! let rows = client
//!     .execute("SELECT :v AS x", &params! { "v" => 1 }, ExecuteOptions::default())
//!     .await?;
//! assert_eq!(rows[0]["x"], 1);
//!
//! let mut session = client.open_session().await?;
//! client
//!     .session_execute(
//!         "INSERT INTO t (v) VALUES (:v)",
//!         &params! { "v" => 2 },
//!         &mut session,
//!         ExecuteOptions::no_results(),
//!     )
//!     .await?;
//! session.commit().await?;
//! # Ok(())
//! # }
//! ```

use crate::db::capture::QueryCapture;
use crate::db::executor::{self, Outcome};
use crate::db::params::{self, PreparedQuery};
use crate::db::pool::DbPool;
use crate::db::session::Session;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, Dialect, ExecuteOptions, Params, Row};
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Level, debug, dispatcher, error};

/// Thin client over one database.
///
/// Mutating operations take `&mut self`; share a client between tasks only
/// behind a lock. The underlying pool is safe to use concurrently.
pub struct Client {
    config: ConnectionConfig,
    pool: DbPool,
    dispatch: Dispatch,
    capture: Option<QueryCapture>,
    result: Vec<Row>,
    rows_affected: Option<u64>,
}

impl Client {
    /// Build a client that logs through the caller's current default
    /// dispatcher.
    ///
    /// No connection is opened here. Must be called inside a Tokio runtime.
    pub fn new(config: ConnectionConfig) -> DbResult<Self> {
        let dispatch = dispatcher::get_default(|current| current.clone());
        Self::with_dispatch(config, dispatch)
    }

    /// Build a client that logs through `dispatch`.
    ///
    /// If `dispatch` has DEBUG enabled at this point, the client renders
    /// every statement it runs; see [`last_rendered_query`](Self::last_rendered_query).
    pub fn with_dispatch(config: ConnectionConfig, dispatch: Dispatch) -> DbResult<Self> {
        dispatcher::with_default(&dispatch, || {
            let pool = DbPool::connect_lazy(&config)?;
            let capture = tracing::enabled!(Level::DEBUG).then(QueryCapture::new);
            debug!(
                url = %config.masked_url(),
                capture = capture.is_some(),
                "Client created"
            );
            Ok(Self {
                config,
                pool,
                dispatch: dispatch.clone(),
                capture,
                result: Vec::new(),
                rows_affected: None,
            })
        })
    }

    /// Run one statement on a pooled connection in autocommit mode.
    ///
    /// Returns the materialized rows, or an empty slice when
    /// `options.get_results` is false (see [`rows_affected`](Self::rows_affected)).
    ///
    /// # Errors
    ///
    /// - [`DbError::QueryPreparation`] before any connection is acquired
    /// - [`DbError::Connection`] or [`DbError::Timeout`] when no connection
    ///   can be checked out
    /// - [`DbError::QueryExecution`] when the engine rejects the statement
    /// - [`DbError::QueryEmptyResult`] when `options.check_empty` is set and
    ///   no rows came back
    pub async fn execute(
        &mut self,
        query: &str,
        params: &Params,
        options: ExecuteOptions,
    ) -> DbResult<&[Row]> {
        let dispatch = self.dispatch.clone();
        self.execute_inner(query, params, options)
            .with_subscriber(dispatch)
            .await?;
        Ok(&self.result)
    }

    async fn execute_inner(
        &mut self,
        query: &str,
        params: &Params,
        options: ExecuteOptions,
    ) -> DbResult<()> {
        self.reset_result();
        let prepared = self.prepare_query(query, params)?;
        self.capture_query(&prepared);

        let outcome = executor::run_pooled(&self.pool, &prepared, options.get_results)
            .await
            .inspect_err(|e| {
                error!(query = %query, error = %e, "Query execution failed");
            })?;
        self.materialize(outcome, query, options.check_empty)
    }

    /// Check out a connection and begin a transaction on it.
    ///
    /// The connection stays with the returned [`Session`] until it is
    /// committed, rolled back or dropped.
    pub async fn open_session(&self) -> DbResult<Session> {
        let dispatch = self.dispatch.clone();
        Session::begin(&self.pool, dispatch.clone())
            .with_subscriber(dispatch)
            .await
    }

    /// Run one statement inside `session`.
    ///
    /// The statement runs in a nested scope (SAVEPOINT) that is released on
    /// success and rolled back on failure; in both cases the session stays
    /// open. Returns the session so calls can be chained.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute), plus [`DbError::Transaction`] when the
    /// session is no longer active or the nested scope cannot be managed.
    pub async fn session_execute<'s>(
        &mut self,
        query: &str,
        params: &Params,
        session: &'s mut Session,
        options: ExecuteOptions,
    ) -> DbResult<&'s mut Session> {
        let dispatch = self.dispatch.clone();
        self.session_execute_inner(query, params, session, options)
            .with_subscriber(dispatch)
            .await?;
        Ok(session)
    }

    async fn session_execute_inner(
        &mut self,
        query: &str,
        params: &Params,
        session: &mut Session,
        options: ExecuteOptions,
    ) -> DbResult<()> {
        self.reset_result();
        let prepared = self.prepare_query(query, params)?;
        if session.dialect() != prepared.dialect() {
            return Err(DbError::invalid_input(format!(
                "Session {} is a {} session, client is {}",
                session.id(),
                session.dialect(),
                prepared.dialect()
            )));
        }
        self.capture_query(&prepared);

        let outcome = session
            .execute_nested(&prepared, options.get_results)
            .await
            .inspect_err(|e| {
                error!(
                    session_id = %session.id(),
                    query = %query,
                    error = %e,
                    "Session statement failed"
                );
            })?;
        self.materialize(outcome, query, options.check_empty)
    }

    /// Compile `:name` placeholders for this client's dialect.
    fn prepare_query(&self, query: &str, params: &Params) -> DbResult<PreparedQuery> {
        params::prepare(query, params, self.dialect()).inspect_err(|e| {
            error!(query = %query, params = ?params, error = %e, "Query preparation failed");
        })
    }

    fn capture_query(&mut self, prepared: &PreparedQuery) {
        if let Some(capture) = self.capture.as_mut() {
            capture.record(prepared);
        }
    }

    fn reset_result(&mut self) {
        self.result.clear();
        self.rows_affected = None;
        if let Some(capture) = self.capture.as_mut() {
            capture.clear();
        }
    }

    /// Store the statement's outcome and apply the empty-result policy.
    fn materialize(&mut self, outcome: Outcome, query: &str, check_empty: bool) -> DbResult<()> {
        match outcome {
            Outcome::Rows(rows) => {
                self.result = rows;
                if check_empty && self.result.is_empty() {
                    let logged = self.last_rendered_query().unwrap_or(query);
                    error!(query = %logged, "Query returned an empty result");
                    return Err(DbError::empty_result(query));
                }
            }
            Outcome::Done { rows_affected } => {
                self.rows_affected = Some(rows_affected);
            }
        }
        Ok(())
    }

    /// Close the pool. Open sessions keep their connection until they end.
    pub async fn close(&self) {
        self.pool.close().with_subscriber(self.dispatch.clone()).await
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    /// Rows of the last statement; empty after a failure or when rows were
    /// not requested.
    pub fn results(&self) -> &[Row] {
        &self.result
    }

    /// Affected-row count of the last statement run without results.
    pub fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    /// Last statement rendered with its arguments inlined.
    ///
    /// Always `None` unless DEBUG logging was enabled when the client was
    /// built.
    pub fn last_rendered_query(&self) -> Option<&str> {
        self.capture.as_ref().and_then(QueryCapture::last)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("dialect", &self.dialect())
            .field("capture", &self.capture.is_some())
            .field("rows", &self.result.len())
            .finish()
    }
}

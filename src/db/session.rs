//! Caller-held transactional sessions.
//!
//! A [`Session`] owns one pooled connection with an open outer transaction.
//! Each statement issued through it runs inside its own SAVEPOINT, so a
//! failing statement is undone without ending the session. Work becomes
//! durable only when the caller commits the session.

use crate::db::executor::{self, Outcome};
use crate::db::params::PreparedQuery;
use crate::db::pool::{DbPool, acquire_error};
use crate::error::{DbError, DbResult};
use crate::models::Dialect;
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::time::{Duration, Instant};
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, dispatcher, error, info, warn};

/// Database-specific transaction wrapper.
pub enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    SQLite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    /// Begin the outer transaction on a freshly acquired connection.
    pub async fn begin(pool: &DbPool) -> DbResult<Self> {
        crate::impl_db_dispatch!(pool, {
            MySql(p) => p.begin().await.map(DbTransaction::MySql),
            Postgres(p) => p.begin().await.map(DbTransaction::Postgres),
            SQLite(p) => p.begin().await.map(DbTransaction::SQLite),
        })
        .map_err(|e| acquire_error(pool, e))
    }

    /// Commit the transaction.
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        crate::impl_db_dispatch!(DbTransaction: self, {
            MySql(tx) => tx.commit().await,
            Postgres(tx) => tx.commit().await,
            SQLite(tx) => tx.commit().await,
        })
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        crate::impl_db_dispatch!(DbTransaction: self, {
            MySql(tx) => tx.rollback().await,
            Postgres(tx) => tx.rollback().await,
            SQLite(tx) => tx.rollback().await,
        })
    }
}

/// Run one statement in a nested scope on the connection behind `$tx`.
///
/// Commits the scope on success. On failure the scope is rolled back and
/// the statement's error is returned even if the rollback fails too.
macro_rules! run_nested {
    ($tx:expr, $run:path, $prepared:expr, $get_results:expr, $session_id:expr) => {{
        let session_id: &str = $session_id;
        let mut nested = sqlx::Connection::begin(&mut **$tx).await.map_err(|e| {
            DbError::transaction(format!("Failed to open nested scope: {}", e), session_id)
        })?;
        match $run(&mut *nested, $prepared, $get_results).await {
            Ok(outcome) => {
                nested.commit().await.map_err(|e| {
                    DbError::transaction(
                        format!("Failed to release nested scope: {}", e),
                        session_id,
                    )
                })?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = nested.rollback().await {
                    error!(
                        session_id = %session_id,
                        error = %rollback_err,
                        "Failed to roll back nested scope"
                    );
                }
                Err(err)
            }
        }
    }};
}

/// An open outer transaction and the connection it runs on.
///
/// Obtain one from [`Client::open_session`](crate::Client::open_session),
/// pass it to [`Client::session_execute`](crate::Client::session_execute),
/// and finish it with exactly one of [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). Dropping an open session rolls it back.
pub struct Session {
    id: String,
    dialect: Dialect,
    transaction: Option<DbTransaction>,
    started_at: Instant,
    statements: u64,
    dispatch: Dispatch,
}

impl Session {
    /// Acquire a connection from `pool` and begin the outer transaction.
    pub(crate) async fn begin(pool: &DbPool, dispatch: Dispatch) -> DbResult<Self> {
        let transaction = DbTransaction::begin(pool).await?;
        let id = generate_session_id();
        let dialect = pool.dialect();

        info!(session_id = %id, dialect = %dialect, "Session started");

        Ok(Self {
            id,
            dialect,
            transaction: Some(transaction),
            started_at: Instant::now(),
            statements: 0,
            dispatch,
        })
    }

    /// Unique session identifier (`ses_` followed by 32 hex digits).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Statements that completed successfully in this session.
    pub fn statement_count(&self) -> u64 {
        self.statements
    }

    /// Time since the outer transaction began.
    pub fn age(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Commit every statement released in this session.
    pub async fn commit(self) -> DbResult<()> {
        self.finish(true).await
    }

    /// Discard every statement issued in this session.
    pub async fn rollback(self) -> DbResult<()> {
        self.finish(false).await
    }

    async fn finish(mut self, commit: bool) -> DbResult<()> {
        let dispatch = self.dispatch.clone();
        async move {
            let transaction = self.take_transaction()?;
            let (action, result) = if commit {
                ("commit", transaction.commit().await)
            } else {
                ("rollback", transaction.rollback().await)
            };
            if let Err(e) = result {
                error!(session_id = %self.id, action, error = %e, "Session end failed");
                return Err(DbError::transaction(
                    format!("Session {} failed: {}", action, e),
                    &self.id,
                ));
            }
            info!(
                session_id = %self.id,
                action,
                statements = self.statements,
                duration_ms = self.started_at.elapsed().as_millis() as u64,
                "Session ended"
            );
            Ok(())
        }
        .with_subscriber(dispatch)
        .await
    }

    fn take_transaction(&mut self) -> DbResult<DbTransaction> {
        self.transaction
            .take()
            .ok_or_else(|| DbError::transaction("Session is no longer active", &self.id))
    }

    /// Run `prepared` in a nested scope of the outer transaction.
    pub(crate) async fn execute_nested(
        &mut self,
        prepared: &PreparedQuery,
        get_results: bool,
    ) -> DbResult<Outcome> {
        let id = self.id.as_str();
        let tx = self
            .transaction
            .as_mut()
            .ok_or_else(|| DbError::transaction("Session is no longer active", id))?;

        let outcome = match tx {
            DbTransaction::MySql(tx) => {
                run_nested!(tx, executor::mysql::run, prepared, get_results, id)
            }
            DbTransaction::Postgres(tx) => {
                run_nested!(tx, executor::postgres::run, prepared, get_results, id)
            }
            DbTransaction::SQLite(tx) => {
                run_nested!(tx, executor::sqlite::run, prepared, get_results, id)
            }
        }?;

        self.statements += 1;
        debug!(
            session_id = %self.id,
            statement = self.statements,
            "Nested scope released"
        );
        Ok(outcome)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("dialect", &self.dialect)
            .field("active", &self.transaction.is_some())
            .field("statements", &self.statements)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            dispatcher::with_default(&self.dispatch, || {
                warn!(
                    session_id = %self.id,
                    statements = self.statements,
                    "Session dropped without commit or rollback; rolling back"
                );
            });
        }
    }
}

/// Generate a unique session ID.
fn generate_session_id() -> String {
    format!("ses_{}", uuid::Uuid::new_v4().simple())
}

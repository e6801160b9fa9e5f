//! Connection pool management.
//!
//! This module builds the connection factory for a [`ConnectionConfig`]
//! using database-specific pools (MySqlPool, PgPool, SqlitePool) to ensure
//! full type support. Pools are created lazily: no connection is opened
//! until a statement or session needs one.

use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, Dialect};
use sqlx::{
    MySqlPool, PgPool, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    postgres::PgConnectOptions, postgres::PgPoolOptions, sqlite::SqliteConnectOptions,
    sqlite::SqlitePoolOptions,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Build a lazy pool for `config`. Must be called inside a Tokio runtime.
    pub fn connect_lazy(config: &ConnectionConfig) -> DbResult<Self> {
        let dialect = config.dialect().ok_or_else(|| {
            DbError::connection(
                format!("Unsupported database driver '{}'", config.driver()),
                "Use one of: mysql, mariadb, postgresql, sqlite",
            )
        })?;

        let pool_opts = config.pool_options();
        pool_opts.validate().map_err(|msg| {
            DbError::connection(
                format!("Invalid pool options: {}", msg),
                "Check max_connections, min_connections and acquire_timeout",
            )
        })?;

        let is_sqlite = dialect == Dialect::SQLite;
        let max_connections = pool_opts.max_connections_or_default(is_sqlite);
        let min_connections = pool_opts.min_connections_or_default();
        let acquire_timeout = pool_opts.acquire_timeout();
        let idle_timeout = Some(pool_opts.idle_timeout());
        let test_before_acquire = pool_opts.test_before_acquire_or_default();

        let pool = match dialect {
            Dialect::MySql => {
                let mut options = MySqlConnectOptions::new()
                    .host(config.host())
                    .port(config.port())
                    .username(config.username())
                    .charset("utf8mb4");
                if !config.password().is_empty() {
                    options = options.password(config.password());
                }
                if !config.database().is_empty() {
                    options = options.database(config.database());
                }

                DbPool::MySql(
                    MySqlPoolOptions::new()
                        .min_connections(min_connections)
                        .max_connections(max_connections)
                        .acquire_timeout(acquire_timeout)
                        .idle_timeout(idle_timeout)
                        .test_before_acquire(test_before_acquire)
                        .connect_lazy_with(options),
                )
            }
            Dialect::PostgreSql => {
                let mut options = PgConnectOptions::new()
                    .host(config.host())
                    .port(config.port())
                    .username(config.username());
                if !config.password().is_empty() {
                    options = options.password(config.password());
                }
                if !config.database().is_empty() {
                    options = options.database(config.database());
                }

                DbPool::Postgres(
                    PgPoolOptions::new()
                        .min_connections(min_connections)
                        .max_connections(max_connections)
                        .acquire_timeout(acquire_timeout)
                        .idle_timeout(idle_timeout)
                        .test_before_acquire(test_before_acquire)
                        .connect_lazy_with(options),
                )
            }
            Dialect::SQLite => {
                let options = if config.database() == ":memory:" {
                    SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                        DbError::connection(
                            format!("Invalid SQLite options: {}", e),
                            "Use a file path or :memory:",
                        )
                    })?
                } else {
                    SqliteConnectOptions::new()
                        .filename(config.database())
                        .create_if_missing(true)
                };

                DbPool::SQLite(
                    SqlitePoolOptions::new()
                        .min_connections(min_connections)
                        .max_connections(max_connections)
                        .acquire_timeout(acquire_timeout)
                        .idle_timeout(idle_timeout)
                        .test_before_acquire(test_before_acquire)
                        .connect_lazy_with(options),
                )
            }
            Dialect::SqlServer => {
                return Err(DbError::connection(
                    "SQL Server has no driver in this build",
                    "Use MySQL, PostgreSQL or SQLite",
                ));
            }
        };

        info!(
            dialect = %dialect,
            url = %config.masked_url(),
            max_connections,
            "Created lazy connection pool"
        );
        Ok(pool)
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        debug!(dialect = %self.dialect(), "Closing connection pool");
        crate::impl_db_dispatch!(self, {
            MySql(pool) => pool.close().await,
            Postgres(pool) => pool.close().await,
            SQLite(pool) => pool.close().await,
        })
    }

    pub fn is_closed(&self) -> bool {
        crate::impl_db_dispatch!(self, {
            MySql(pool) => pool.is_closed(),
            Postgres(pool) => pool.is_closed(),
            SQLite(pool) => pool.is_closed(),
        })
    }

    /// How long a checkout waits before giving up.
    pub fn acquire_timeout(&self) -> Duration {
        crate::impl_db_dispatch!(self, {
            MySql(pool) => pool.options().get_acquire_timeout(),
            Postgres(pool) => pool.options().get_acquire_timeout(),
            SQLite(pool) => pool.options().get_acquire_timeout(),
        })
    }

    /// Get the dialect served by this pool.
    pub fn dialect(&self) -> Dialect {
        match self {
            DbPool::MySql(_) => Dialect::MySql,
            DbPool::Postgres(_) => Dialect::PostgreSql,
            DbPool::SQLite(_) => Dialect::SQLite,
        }
    }
}

/// Map a failure to check out a connection to a [`DbError`] with a hint.
pub(crate) fn acquire_error(pool: &DbPool, error: sqlx::Error) -> DbError {
    match error {
        sqlx::Error::PoolTimedOut => {
            let secs = u32::try_from(pool.acquire_timeout().as_secs()).unwrap_or(u32::MAX);
            DbError::timeout("connection pool acquire", secs)
        }
        sqlx::Error::PoolClosed => DbError::from(error),
        other => {
            let suggestion = connection_suggestion(pool.dialect(), &other);
            DbError::connection(format!("Failed to connect: {}", other), suggestion)
        }
    }
}

fn connection_suggestion(dialect: Dialect, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            dialect
        );
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    match dialect {
        Dialect::SQLite => "Verify the file path exists and is accessible".to_string(),
        other => format!(
            "Verify host, port and credentials for {}",
            other.display_name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolOptions;

    #[tokio::test]
    async fn test_connect_lazy_opens_nothing() {
        // Nothing listens on port 1; building the pool must still succeed
        let config = ConnectionConfig::mysql_default().with_port(1);
        let pool = DbPool::connect_lazy(&config).unwrap();
        assert_eq!(pool.dialect(), Dialect::MySql);
        assert!(!pool.is_closed());
        pool.close().await;
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn test_connect_lazy_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lazy.db");
        let config = ConnectionConfig::sqlite(path.to_string_lossy());
        let pool = DbPool::connect_lazy(&config).unwrap();
        assert_eq!(pool.dialect(), Dialect::SQLite);
        // Lazy: the file is only created on first connect
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sqlserver_has_no_driver() {
        let err = DbPool::connect_lazy(&ConnectionConfig::sqlserver_default()).unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_unknown_driver() {
        let config = ConnectionConfig::mysql_default().with_driver("oracle");
        let err = DbPool::connect_lazy(&config).unwrap_err();
        assert!(err.to_string().contains("oracle"));
    }

    #[tokio::test]
    async fn test_invalid_pool_options() {
        let config = ConnectionConfig::mysql_default().with_pool_options(PoolOptions {
            max_connections: Some(0),
            ..Default::default()
        });
        assert!(matches!(
            DbPool::connect_lazy(&config),
            Err(DbError::Connection { .. })
        ));
    }

    #[tokio::test]
    async fn test_acquire_error_classification() {
        let pool = DbPool::connect_lazy(&ConnectionConfig::mysql_default().with_port(1)).unwrap();
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = acquire_error(&pool, sqlx::Error::Io(io));
        match err {
            DbError::Connection { suggestion, .. } => {
                assert!(suggestion.contains("MySQL"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            acquire_error(&pool, sqlx::Error::PoolClosed),
            DbError::Connection { .. }
        ));
    }

    #[tokio::test]
    async fn test_acquire_timeout_reports_configured_duration() {
        let config = ConnectionConfig::mysql_default()
            .with_port(1)
            .with_pool_options(PoolOptions {
                acquire_timeout_secs: Some(7),
                ..Default::default()
            });
        let pool = DbPool::connect_lazy(&config).unwrap();
        assert_eq!(pool.acquire_timeout(), Duration::from_secs(7));

        match acquire_error(&pool, sqlx::Error::PoolTimedOut) {
            DbError::Timeout { elapsed_secs, .. } => assert_eq!(elapsed_secs, 7),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

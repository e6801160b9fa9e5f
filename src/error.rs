//! Error types for the database client.
//!
//! Every failure the client reports is a [`DbError`]. Callers distinguish the
//! three query-level outcomes (preparation, execution, empty result) from
//! connection and session problems by variant.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Query preparation failed: {message}")]
    QueryPreparation { message: String, query: String },

    #[error("Query execution failed: {message}")]
    QueryExecution {
        message: String,
        /// e.g., "23000" for an integrity constraint violation
        sql_state: Option<String>,
    },

    #[error("Query returned an empty result")]
    QueryEmptyResult { query: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Transaction error: {message} (session: {session_id})")]
    Transaction { message: String, session_id: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a preparation error for the given raw query text.
    pub fn preparation(message: impl Into<String>, query: impl Into<String>) -> Self {
        Self::QueryPreparation {
            message: message.into(),
            query: query.into(),
        }
    }

    /// Classify an error raised while the engine ran a prepared statement.
    ///
    /// Pool exhaustion and closure keep their own variants; everything else
    /// the engine reports becomes [`DbError::QueryExecution`].
    pub fn execution(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::from(err),
            sqlx::Error::Database(db_err) => Self::QueryExecution {
                message: db_err.message().to_string(),
                sql_state: db_err.code().map(|c| c.to_string()),
            },
            other => Self::QueryExecution {
                message: other.to_string(),
                sql_state: None,
            },
        }
    }

    /// Create an empty-result error.
    pub fn empty_result(query: impl Into<String>) -> Self {
        Self::QueryEmptyResult {
            query: query.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a session transaction error.
    pub fn transaction(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            session_id: session_id.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::QueryPreparation { .. } => {
                Some("Check that every :name placeholder has exactly one matching parameter")
            }
            Self::QueryEmptyResult { .. } => {
                Some("Disable the empty-result check if zero rows is an acceptable outcome")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// SQLSTATE reported by the engine, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::QueryExecution { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection parameters and credentials",
            ),
            sqlx::Error::Database(db_err) => DbError::QueryExecution {
                message: db_err.message().to_string(),
                sql_state: db_err.code().map(|c| c.to_string()),
            },
            sqlx::Error::RowNotFound => DbError::QueryExecution {
                message: "No rows returned".to_string(),
                sql_state: None,
            },
            sqlx::Error::PoolTimedOut => DbError::timeout(
                "connection pool acquire",
                crate::config::DEFAULT_ACQUIRE_TIMEOUT_SECS as u32,
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Create a new client")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::internal(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));

        let err = DbError::preparation("missing value for bind parameter 'id'", "SELECT :id");
        assert_eq!(
            err.to_string(),
            "Query preparation failed: missing value for bind parameter 'id'"
        );

        let err = DbError::empty_result("SELECT * FROM empty_table");
        assert_eq!(err.to_string(), "Query returned an empty result");
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::connection("refused", "Check the server");
        assert_eq!(err.suggestion(), Some("Check the server"));
        assert!(DbError::empty_result("q").suggestion().is_some());
        assert!(DbError::internal("x").suggestion().is_none());
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::timeout("query", 30).is_retryable());
        assert!(DbError::connection("err", "sugg").is_retryable());
        assert!(!DbError::preparation("bad", "q").is_retryable());
        assert!(!DbError::empty_result("q").is_retryable());
    }

    #[test]
    fn test_execution_keeps_pool_errors() {
        assert!(matches!(
            DbError::execution(sqlx::Error::PoolTimedOut),
            DbError::Timeout { .. }
        ));
        assert!(matches!(
            DbError::execution(sqlx::Error::PoolClosed),
            DbError::Connection { .. }
        ));
    }

    #[test]
    fn test_execution_wraps_engine_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = DbError::execution(sqlx::Error::Io(io));
        assert!(matches!(err, DbError::QueryExecution { .. }));
        assert!(err.sql_state().is_none());
        assert!(err.to_string().contains("reset by peer"));
    }

    #[test]
    fn test_from_sqlx_io_is_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: DbError = sqlx::Error::Io(io).into();
        assert!(matches!(err, DbError::Connection { .. }));
        assert!(err.is_retryable());
    }
}

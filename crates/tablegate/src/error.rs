//! Error types for tablegate

use std::time::Duration;
use thiserror::Error;

/// Result type alias for tablegate operations
pub type GateResult<T> = Result<T, GateError>;

/// Error types for table gateway operations
#[derive(Debug, Error)]
pub enum GateError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The database rejected or failed to run a compiled statement
    #[error("Query execution failed: {reason} (sql: {sql})")]
    QueryExecution {
        sql: String,
        reason: String,
        /// SQLSTATE code, when the failure came from the server
        code: Option<String>,
    },

    /// Table/column metadata lookup failed
    #[error("Schema error for table '{table}': {reason}")]
    Schema { table: String, reason: String },

    /// Row decode/normalization error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Caller input was rejected before anything was sent to the database
    #[error("Validation error: {0}")]
    Validation(String),

    /// Statement did not finish within the configured timeout
    #[error("Query timeout after {after:?} (sql: {sql})")]
    Timeout { sql: String, after: Duration },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl GateError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a schema error
    pub fn schema(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a driver error together with the SQL that produced it.
    pub fn execution(sql: &str, err: tokio_postgres::Error) -> Self {
        let (reason, code) = match err.as_db_error() {
            Some(db_err) => {
                let reason = match db_err.constraint() {
                    Some(constraint) => format!("{}: {}", constraint, db_err.message()),
                    None => db_err.message().to_string(),
                };
                (reason, Some(db_err.code().code().to_string()))
            }
            None => (err.to_string(), None),
        };
        Self::QueryExecution {
            sql: sql.to_string(),
            reason,
            code,
        }
    }

    /// SQLSTATE code of a failed statement, if the server reported one.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::QueryExecution { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Compiled SQL attached to this error, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::QueryExecution { sql, .. } | Self::Timeout { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate() == Some("23505")
    }

    /// Check if this is a foreign key violation error
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate() == Some("23503")
    }

    /// Check if this is a check constraint violation error
    pub fn is_check_violation(&self) -> bool {
        self.sqlstate() == Some("23514")
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a schema error
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for GateError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

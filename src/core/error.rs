//! Error types for the data-access layer
//!
//! This module defines all error types that can occur while reading, writing,
//! projecting or serializing data.

/// Result type alias for data-access operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Boxed driver error carried as a source
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for data-access operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// A connection could not be acquired or a transaction could not be started
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Waiting for a pooled connection took too long
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// A read statement failed inside the driver
    #[error("Data access error executing '{statement}': {source}")]
    DataAccess {
        statement: String,
        #[source]
        source: BoxError,
    },

    /// A statement of a batch failed; `index` is the position of its pattern
    #[error("Statement #{index} failed ('{statement}'): {source}")]
    StatementExecution {
        index: usize,
        statement: String,
        #[source]
        source: Box<DatabaseError>,
    },

    /// Rolling back after `cause` failed as well
    #[error("{cause}; rollback also failed: {rollback}")]
    Rollback {
        #[source]
        cause: Box<DatabaseError>,
        rollback: Box<DatabaseError>,
    },

    /// Commit or transaction-state failure
    #[error("Transaction error: {message}")]
    Transaction {
        message: String,
        #[source]
        source: BoxError,
    },

    /// Operation timeout
    #[error("Query timeout after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// Scalar projection could not coerce a cell
    #[error("Type conversion failed: cannot convert {actual} value '{value}' to {expected}")]
    TypeConversion {
        expected: String,
        actual: String,
        value: String,
    },

    /// JSON projection met a value it cannot represent
    #[error("Serialization failed for column '{column}' at row {row}: {message}")]
    Serialization {
        column: String,
        row: usize,
        message: String,
    },

    /// A statement placeholder has no value in the parameter map
    #[error("Missing value for parameter '{0}'")]
    MissingParameter(String),

    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Caller supplied an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Repository configuration is invalid
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Unsupported operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL error
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Create a connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error wrapping the driver cause
    pub fn connection_with_source<S, E>(msg: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        DatabaseError::Connection {
            message: msg.into(),
            source: Some(source.into()),
        }
    }

    /// Create a connection timeout error
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        DatabaseError::ConnectionTimeout { timeout_ms }
    }

    /// Wrap a driver failure of a read statement
    pub fn data_access<S, E>(statement: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        DatabaseError::DataAccess {
            statement: statement.into(),
            source: source.into(),
        }
    }

    /// Wrap the failure of the batch statement at `index`
    pub fn statement_execution<S: Into<String>>(
        index: usize,
        statement: S,
        source: DatabaseError,
    ) -> Self {
        DatabaseError::StatementExecution {
            index,
            statement: statement.into(),
            source: Box::new(source),
        }
    }

    /// Attach a failed rollback to the error that triggered it
    pub fn rollback_failed(cause: DatabaseError, rollback: DatabaseError) -> Self {
        DatabaseError::Rollback {
            cause: Box::new(cause),
            rollback: Box::new(rollback),
        }
    }

    /// Create a transaction error wrapping the driver cause
    pub fn transaction_with_source<S, E>(msg: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        DatabaseError::Transaction {
            message: msg.into(),
            source: source.into(),
        }
    }

    /// Create a query timeout error
    pub fn query_timeout(timeout_ms: u64) -> Self {
        DatabaseError::QueryTimeout { timeout_ms }
    }

    /// Create a type conversion error
    pub fn type_conversion(expected: &str, actual: &str, value: impl Into<String>) -> Self {
        DatabaseError::TypeConversion {
            expected: expected.to_string(),
            actual: actual.to_string(),
            value: value.into(),
        }
    }

    /// Create a serialization error for the cell at (`row`, `column`)
    pub fn serialization(column: impl Into<String>, row: usize, message: impl Into<String>) -> Self {
        DatabaseError::Serialization {
            column: column.into(),
            row,
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        DatabaseError::InvalidInput(msg.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Configuration(msg.into())
    }

    /// Create a new unsupported operation error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        DatabaseError::UnsupportedOperation(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }

    /// Index of the failing batch statement, looking through a failed rollback
    pub fn statement_index(&self) -> Option<usize> {
        match self.primary_cause() {
            DatabaseError::StatementExecution { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// The error that triggered a rollback, or `self` for every other variant
    pub fn primary_cause(&self) -> &DatabaseError {
        match self {
            DatabaseError::Rollback { cause, .. } => cause.primary_cause(),
            other => other,
        }
    }

    /// The rollback failure attached to this error, if any
    pub fn rollback_error(&self) -> Option<&DatabaseError> {
        match self {
            DatabaseError::Rollback { rollback, .. } => Some(rollback),
            _ => None,
        }
    }

    /// Whether this error was caused by a pool or operation timeout
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.primary_cause(),
            DatabaseError::ConnectionTimeout { .. } | DatabaseError::QueryTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_creation() {
        let err = DatabaseError::connection("Failed to connect");
        assert!(matches!(err, DatabaseError::Connection { .. }));

        let err = DatabaseError::type_conversion("i64", "string", "abc");
        assert!(matches!(err, DatabaseError::TypeConversion { .. }));

        let err = DatabaseError::serialization("price", 3, "NaN");
        assert!(matches!(err, DatabaseError::Serialization { row: 3, .. }));
    }

    #[test]
    fn test_error_display() {
        let err = DatabaseError::connection("Connection refused");
        assert_eq!(err.to_string(), "Connection error: Connection refused");

        let err = DatabaseError::type_conversion("i64", "string", "abc");
        assert_eq!(
            err.to_string(),
            "Type conversion failed: cannot convert string value 'abc' to i64"
        );

        let err = DatabaseError::serialization("price", 2, "non-finite float");
        assert_eq!(
            err.to_string(),
            "Serialization failed for column 'price' at row 2: non-finite float"
        );
    }

    #[test]
    fn test_rollback_keeps_statement_error_primary() {
        let statement = DatabaseError::statement_execution(
            2,
            "INSERT INTO missing VALUES (1)",
            DatabaseError::other("no such table: missing"),
        );
        let err = DatabaseError::rollback_failed(statement, DatabaseError::other("disk I/O"));

        assert_eq!(err.statement_index(), Some(2));
        assert!(matches!(
            err.primary_cause(),
            DatabaseError::StatementExecution { index: 2, .. }
        ));
        assert_eq!(
            err.rollback_error().map(|e| e.to_string()),
            Some("disk I/O".to_string())
        );

        let source = err.source().expect("rollback error must chain its cause");
        assert!(source.to_string().starts_with("Statement #2 failed"));
    }

    #[test]
    fn test_timeout_detection() {
        assert!(DatabaseError::query_timeout(10).is_timeout());
        assert!(DatabaseError::connection_timeout(10).is_timeout());
        assert!(!DatabaseError::connection("refused").is_timeout());
    }
}

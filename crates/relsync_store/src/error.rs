//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection has been closed.
    #[error("connection is closed")]
    Closed,

    /// SQLite driver error.
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The store returned a value that has no wire representation.
    #[error("unsupported value in column {column}: {message}")]
    UnsupportedValue {
        /// Zero-based column position in the result row.
        column: usize,
        /// Description of the value.
        message: String,
    },

    /// A failure injected by a test connection.
    #[error("injected failure on `{sql}`")]
    Injected {
        /// The statement that was rejected.
        sql: String,
    },
}

impl StoreError {
    /// Creates an unsupported value error.
    pub fn unsupported_value(column: usize, message: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            column,
            message: message.into(),
        }
    }

    /// Creates an injected failure error.
    pub fn injected(sql: impl Into<String>) -> Self {
        Self::Injected { sql: sql.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(StoreError::Closed.to_string(), "connection is closed");
        let err = StoreError::injected("COMMIT");
        assert_eq!(err.to_string(), "injected failure on `COMMIT`");
        let err = StoreError::unsupported_value(2, "REAL 1.5");
        assert!(err.to_string().contains("column 2"));
    }
}

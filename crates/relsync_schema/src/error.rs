//! Error types for schema metadata and column codecs.

use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised by table definitions, registration and column codecs.
///
/// Every variant is a logic error: it points at a defect in a table
/// definition, a binding, or the values handed to the engine. None of them
/// is worth retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A table definition is malformed.
    #[error("invalid definition for table {table}: {message}")]
    InvalidDefinition {
        /// Table name.
        table: String,
        /// Description of the problem.
        message: String,
    },

    /// A table with the same name is already registered.
    #[error("table {name} is already registered")]
    DuplicateTable {
        /// Table name.
        name: String,
    },

    /// A reference column names a table that is not registered (yet).
    #[error("column {table}.{column} references unregistered table {target}")]
    UnresolvedReference {
        /// Referencing table.
        table: String,
        /// Reference column.
        column: String,
        /// Referenced table name.
        target: String,
    },

    /// The reference graph contains a cycle through this table.
    #[error("reference cycle through table {table}")]
    DependencyCycle {
        /// A table on the cycle.
        table: String,
    },

    /// No table with this name is registered.
    #[error("unknown table {name}")]
    UnknownTable {
        /// Table name.
        name: String,
    },

    /// A non-nullable column was given no value.
    #[error("column {column} requires a value")]
    MissingValue {
        /// Column name.
        column: String,
    },

    /// A value has the wrong logical kind for its column.
    #[error("column {column} expects {expected}, got {actual}")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// Expected kind.
        expected: &'static str,
        /// Actual kind.
        actual: &'static str,
    },

    /// A text or binary value exceeds the column bound.
    #[error("column {column} holds at most {max}, got {actual}")]
    ValueTooLong {
        /// Column name.
        column: String,
        /// Column bound.
        max: usize,
        /// Actual length.
        actual: usize,
    },

    /// A numeric value does not fit the column.
    #[error("value out of range for column {column}: {message}")]
    ValueOutOfRange {
        /// Column name.
        column: String,
        /// Description of the value.
        message: String,
    },

    /// A stored value could not be decoded.
    #[error("cannot decode column {column}: {message}")]
    Decode {
        /// Column name.
        column: String,
        /// Description of the problem.
        message: String,
    },
}

impl SchemaError {
    /// Creates an invalid definition error.
    pub fn invalid_definition(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Creates a value out of range error.
    pub fn out_of_range(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValueOutOfRange {
            column: column.into(),
            message: message.into(),
        }
    }
}

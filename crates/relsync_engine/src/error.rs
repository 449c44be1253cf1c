//! Error types for the engine.

use relsync_schema::SchemaError;
use relsync_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while loading or saving a dataset.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Table definition or registration error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// An entity value was rejected by its column.
    #[error("invalid value in {table} #{entity}: {source}")]
    Value {
        /// Table name.
        table: String,
        /// Entity id.
        entity: i64,
        /// Codec error.
        #[source]
        source: SchemaError,
    },

    /// The store failed. The connection has been closed.
    #[error("store failure in {table}{}: {source}", entity_suffix(.entity))]
    Store {
        /// Table being processed.
        table: String,
        /// Entity being written, if any.
        entity: Option<i64>,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// A binding's accessor table does not match its table.
    #[error("binding for {table}: {message}")]
    Binding {
        /// Table name.
        table: String,
        /// Description of the mismatch.
        message: String,
    },

    /// The caller broke a lifecycle rule.
    #[error("logic error: {0}")]
    Logic(String),

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The progress port asked to stop.
    #[error("operation cancelled")]
    Cancelled,
}

fn entity_suffix(entity: &Option<i64>) -> String {
    entity.map(|id| format!(" #{id}")).unwrap_or_default()
}

impl EngineError {
    /// Creates a logic error.
    pub fn logic(message: impl Into<String>) -> Self {
        Self::Logic(message.into())
    }

    /// Creates a binding error.
    pub fn binding(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Binding {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Returns true if the connection was lost with this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Store { .. })
    }

    /// Returns true for a cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

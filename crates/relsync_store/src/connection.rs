//! Store connection port definition.

use crate::error::StoreResult;
use crate::value::SqlValue;

/// A prepared statement handle.
///
/// The handle only carries the SQL text; adapters cache the driver-level
/// statement under it. Dropping the handle releases it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
}

impl Statement {
    /// Creates a handle for the given SQL text.
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    /// Returns the SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// A forward-only cursor over result rows.
///
/// Each row holds one [`SqlValue`] per selected column, in select-list order.
pub trait Cursor {
    /// Advances to the next row, returning `None` once exhausted.
    fn next_row(&mut self) -> StoreResult<Option<Vec<SqlValue>>>;
}

/// A connection to a relational store.
///
/// Connections never auto-commit: a transaction is always open, and only
/// [`commit`](Connection::commit) makes work durable.
///
/// # Invariants
///
/// - `execute` and `query` bind `params` to the `?` placeholders in order
/// - a cursor borrows the connection; no other call can interleave with it
/// - after `close`, every call except `close` and `is_closed` fails with
///   [`crate::StoreError::Closed`], and uncommitted work is discarded
///
/// # Implementors
///
/// - [`crate::MemoryConnection`] - For testing
/// - [`crate::SqliteConnection`] - SQLite via rusqlite
pub trait Connection {
    /// Prepares a statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQL is rejected or the connection is closed.
    fn prepare(&mut self, sql: &str) -> StoreResult<Statement>;

    /// Executes a statement that returns no rows, returning the row count.
    ///
    /// # Errors
    ///
    /// Returns an error if execution fails or the connection is closed.
    fn execute(&mut self, statement: &Statement, params: &[SqlValue]) -> StoreResult<u64>;

    /// Executes a query and returns a cursor over its rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the connection is closed.
    fn query<'c>(
        &'c mut self,
        statement: &Statement,
        params: &[SqlValue],
    ) -> StoreResult<Box<dyn Cursor + 'c>>;

    /// Commits the open transaction and starts a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails or the connection is closed.
    fn commit(&mut self) -> StoreResult<()>;

    /// Rolls back the open transaction and starts a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails or the connection is closed.
    fn rollback(&mut self) -> StoreResult<()>;

    /// Closes the connection, discarding uncommitted work.
    ///
    /// Closing an already closed connection succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to close cleanly.
    fn close(&mut self) -> StoreResult<()>;

    /// Returns true once the connection has been closed.
    fn is_closed(&self) -> bool;
}

/// A cursor over rows that were fully read ahead of iteration.
#[derive(Debug, Default)]
pub struct BufferedCursor {
    rows: std::vec::IntoIter<Vec<SqlValue>>,
}

impl BufferedCursor {
    /// Creates a cursor over the given rows.
    pub fn new(rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl Cursor for BufferedCursor {
    fn next_row(&mut self) -> StoreResult<Option<Vec<SqlValue>>> {
        Ok(self.rows.next())
    }
}

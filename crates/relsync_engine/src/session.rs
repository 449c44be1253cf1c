//! The owner of the store connection.

use crate::error::{EngineError, EngineResult};
use relsync_store::{Connection, SqlValue, Statement, StoreError};

enum Drain {
    Store(StoreError),
    Row(EngineError),
}

/// Routes every store call and closes the connection on the first failure.
///
/// A failed call yields [`EngineError::Store`] carrying the table and, where
/// known, the entity. After that the connection is closed and every
/// further call fails the same way.
pub struct Session {
    conn: Box<dyn Connection>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Session {
    /// Takes ownership of a connection.
    pub fn new(conn: impl Connection + 'static) -> Self {
        Self {
            conn: Box::new(conn),
        }
    }

    /// Whether the connection is still open.
    pub fn is_connected(&self) -> bool {
        !self.conn.is_closed()
    }

    /// Prepares a statement.
    ///
    /// # Errors
    ///
    /// Closes the connection and fails on a store error.
    pub fn prepare(&mut self, table: &str, sql: &str) -> EngineResult<Statement> {
        tracing::trace!(table, sql, "prepare");
        self.conn.prepare(sql).map_err(|e| self.fail(table, None, e))
    }

    /// Executes a statement for one entity.
    ///
    /// # Errors
    ///
    /// Closes the connection and fails on a store error.
    pub fn execute(
        &mut self,
        table: &str,
        entity: Option<i64>,
        statement: &Statement,
        params: &[SqlValue],
    ) -> EngineResult<u64> {
        self.conn
            .execute(statement, params)
            .map_err(|e| self.fail(table, entity, e))
    }

    /// Runs a query and feeds every row to `each`.
    ///
    /// The cursor is dropped before this returns, on every path. An error
    /// returned by `each` stops the walk without closing the connection.
    ///
    /// # Errors
    ///
    /// Closes the connection and fails on a store error. Passes through the
    /// errors of `each`.
    pub fn query<F>(
        &mut self,
        table: &str,
        statement: &Statement,
        params: &[SqlValue],
        mut each: F,
    ) -> EngineResult<u64>
    where
        F: FnMut(Vec<SqlValue>) -> EngineResult<()>,
    {
        match drain(self.conn.as_mut(), statement, params, &mut each) {
            Ok(rows) => Ok(rows),
            Err(Drain::Row(e)) => Err(e),
            Err(Drain::Store(e)) => Err(self.fail(table, None, e)),
        }
    }

    /// Runs `SELECT COUNT(*)`-shaped SQL and returns the single integer.
    ///
    /// # Errors
    ///
    /// Closes the connection and fails on a store error.
    pub fn count(&mut self, table: &str, sql: &str) -> EngineResult<u64> {
        let statement = self.prepare(table, sql)?;
        let mut count = None;
        self.query(table, &statement, &[], |row| {
            if count.is_none() {
                count = row.first().and_then(SqlValue::as_integer);
            }
            Ok(())
        })?;
        let count = count.ok_or_else(|| {
            EngineError::logic(format!("{sql} returned no integer"))
        })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Closes the connection and fails on a store error.
    pub fn commit(&mut self, table: &str) -> EngineResult<()> {
        self.conn.commit().map_err(|e| self.fail(table, None, e))
    }

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Closes the connection and fails on a store error.
    pub fn rollback(&mut self, table: &str) -> EngineResult<()> {
        self.conn.rollback().map_err(|e| self.fail(table, None, e))
    }

    /// Closes the connection, discarding uncommitted work.
    ///
    /// # Errors
    ///
    /// Fails if the adapter reports an error while closing.
    pub fn close(&mut self) -> EngineResult<()> {
        self.conn.close().map_err(|source| EngineError::Store {
            table: String::new(),
            entity: None,
            source,
        })
    }

    fn fail(&mut self, table: &str, entity: Option<i64>, source: StoreError) -> EngineError {
        tracing::error!(table, ?entity, error = %source, "store failure, closing connection");
        if let Err(e) = self.conn.close() {
            tracing::warn!(error = %e, "failed to close connection");
        }
        EngineError::Store {
            table: table.to_owned(),
            entity,
            source,
        }
    }
}

fn drain<F>(
    conn: &mut dyn Connection,
    statement: &Statement,
    params: &[SqlValue],
    each: &mut F,
) -> Result<u64, Drain>
where
    F: FnMut(Vec<SqlValue>) -> EngineResult<()>,
{
    let mut cursor = conn.query(statement, params).map_err(Drain::Store)?;
    let mut rows = 0;
    while let Some(row) = cursor.next_row().map_err(Drain::Store)? {
        rows += 1;
        each(row).map_err(Drain::Row)?;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsync_store::MemoryConnection;

    #[test]
    fn failure_closes_connection() {
        let conn = MemoryConnection::new();
        conn.fail_when("DELETE");
        let probe = conn.clone();
        let mut session = Session::new(conn);

        let err = session.prepare("book", "DELETE FROM book").unwrap_err();
        assert!(err.is_fatal());
        assert!(!session.is_connected());
        assert!(probe.is_closed());

        let err = session.prepare("book", "SELECT 1").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Store {
                source: StoreError::Closed,
                ..
            }
        ));
    }

    #[test]
    fn row_errors_keep_connection_open() {
        let conn = MemoryConnection::new();
        conn.respond("SELECT id", vec![vec![SqlValue::Integer(1)], vec![SqlValue::Integer(2)]]);
        let mut session = Session::new(conn);

        let statement = session.prepare("book", "SELECT id FROM book").unwrap();
        let mut seen = 0;
        let err = session
            .query("book", &statement, &[], |_| {
                seen += 1;
                Err(EngineError::Cancelled)
            })
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(seen, 1);
        assert!(session.is_connected());
    }

    #[test]
    fn count_reads_first_integer() {
        let conn = MemoryConnection::new();
        conn.respond("SELECT COUNT(*)", vec![vec![SqlValue::Integer(12)]]);
        let mut session = Session::new(conn);
        assert_eq!(session.count("book", "SELECT COUNT(*) FROM book").unwrap(), 12);

        let mut empty = Session::new(MemoryConnection::new());
        assert!(matches!(
            empty.count("book", "SELECT COUNT(*) FROM book"),
            Err(EngineError::Logic(_))
        ));
    }

    #[test]
    fn execute_error_names_entity() {
        let conn = MemoryConnection::new();
        conn.fail_on_execute(1);
        let mut session = Session::new(conn);
        let statement = session.prepare("book", "DELETE FROM book WHERE id = ?").unwrap();
        let err = session
            .execute("book", Some(5), &statement, &[SqlValue::Integer(5)])
            .unwrap_err();
        assert!(matches!(err, EngineError::Store { entity: Some(5), .. }));
    }
}

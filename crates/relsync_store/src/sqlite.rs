//! SQLite connection adapter.

use crate::connection::{BufferedCursor, Connection, Cursor, Statement};
use crate::error::{StoreError, StoreResult};
use crate::value::SqlValue;
use rusqlite::types::ValueRef;
use std::path::Path;

/// Options for opening a SQLite store.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// Enforce `FOREIGN KEY` constraints.
    pub foreign_keys: bool,
    /// Statement cache capacity.
    pub statement_cache: usize,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            foreign_keys: true,
            statement_cache: 64,
        }
    }
}

impl SqliteOptions {
    /// Sets foreign key enforcement.
    #[must_use]
    pub const fn foreign_keys(mut self, value: bool) -> Self {
        self.foreign_keys = value;
        self
    }
}

/// A [`Connection`] backed by a SQLite database.
///
/// The adapter opens a transaction immediately and re-opens one after every
/// commit or rollback, so auto-commit is never in effect. Rows are read
/// ahead into a [`BufferedCursor`].
pub struct SqliteConnection {
    conn: Option<rusqlite::Connection>,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("closed", &self.conn.is_none())
            .finish()
    }
}

impl SqliteConnection {
    /// Opens (creating if needed) a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, options: SqliteOptions) -> StoreResult<Self> {
        let conn = rusqlite::Connection::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opened sqlite store");
        Self::init(conn, &options)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory(options: SqliteOptions) -> StoreResult<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::init(conn, &options)
    }

    fn init(conn: rusqlite::Connection, options: &SqliteOptions) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", options.foreign_keys)?;
        conn.set_prepared_statement_cache_capacity(options.statement_cache);
        conn.execute_batch("BEGIN")?;
        Ok(Self { conn: Some(conn) })
    }

    fn live(&self) -> StoreResult<&rusqlite::Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }
}

fn read_value(column: usize, value: ValueRef<'_>) -> StoreResult<SqlValue> {
    match value {
        ValueRef::Null => Ok(SqlValue::Null),
        ValueRef::Integer(v) => Ok(SqlValue::Integer(v)),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(SqlValue::Text)
            .map_err(|_| StoreError::unsupported_value(column, "text is not valid UTF-8")),
        ValueRef::Blob(bytes) => Ok(SqlValue::Blob(bytes.to_vec())),
        ValueRef::Real(v) => Err(StoreError::unsupported_value(column, format!("REAL {v}"))),
    }
}

impl Connection for SqliteConnection {
    fn prepare(&mut self, sql: &str) -> StoreResult<Statement> {
        self.live()?.prepare_cached(sql)?;
        Ok(Statement::new(sql))
    }

    fn execute(&mut self, statement: &Statement, params: &[SqlValue]) -> StoreResult<u64> {
        let conn = self.live()?;
        let mut stmt = conn.prepare_cached(statement.sql())?;
        let changed = stmt.execute(rusqlite::params_from_iter(params.iter()))?;
        Ok(changed as u64)
    }

    fn query<'c>(
        &'c mut self,
        statement: &Statement,
        params: &[SqlValue],
    ) -> StoreResult<Box<dyn Cursor + 'c>> {
        let conn = self.live()?;
        let mut stmt = conn.prepare_cached(statement.sql())?;
        let width = stmt.column_count();
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        let mut buffered = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for column in 0..width {
                values.push(read_value(column, row.get_ref(column)?)?);
            }
            buffered.push(values);
        }
        Ok(Box::new(BufferedCursor::new(buffered)))
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.live()?.execute_batch("COMMIT; BEGIN")?;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.live()?.execute_batch("ROLLBACK; BEGIN")?;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        tracing::debug!("closed sqlite store");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close sqlite store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> SqliteConnection {
        SqliteConnection::open_in_memory(SqliteOptions::default()).unwrap()
    }

    fn exec(conn: &mut SqliteConnection, sql: &str, params: &[SqlValue]) -> u64 {
        let stmt = conn.prepare(sql).unwrap();
        conn.execute(&stmt, params).unwrap()
    }

    fn rows(conn: &mut SqliteConnection, sql: &str) -> Vec<Vec<SqlValue>> {
        let stmt = conn.prepare(sql).unwrap();
        let mut cursor = conn.query(&stmt, &[]).unwrap();
        let mut out = Vec::new();
        while let Some(row) = cursor.next_row().unwrap() {
            out.push(row);
        }
        out
    }

    #[test]
    fn round_trips_wire_values() {
        let mut conn = memory();
        exec(&mut conn, "CREATE TABLE t (id INTEGER, name VARCHAR(10), data VARBINARY(4))", &[]);
        exec(
            &mut conn,
            "INSERT INTO t (id, name, data) VALUES (?, ?, ?)",
            &[SqlValue::Integer(1), SqlValue::from("x"), SqlValue::Blob(vec![1, 2])],
        );
        exec(
            &mut conn,
            "INSERT INTO t (id, name, data) VALUES (?, ?, ?)",
            &[SqlValue::Integer(2), SqlValue::Null, SqlValue::Null],
        );

        let got = rows(&mut conn, "SELECT id, name, data FROM t ORDER BY id");
        assert_eq!(
            got,
            vec![
                vec![SqlValue::Integer(1), SqlValue::from("x"), SqlValue::Blob(vec![1, 2])],
                vec![SqlValue::Integer(2), SqlValue::Null, SqlValue::Null],
            ]
        );
    }

    #[test]
    fn rollback_discards_and_commit_keeps() {
        let mut conn = memory();
        exec(&mut conn, "CREATE TABLE t (id INTEGER)", &[]);
        conn.commit().unwrap();

        exec(&mut conn, "INSERT INTO t (id) VALUES (?)", &[SqlValue::Integer(1)]);
        conn.rollback().unwrap();
        assert!(rows(&mut conn, "SELECT id FROM t").is_empty());

        exec(&mut conn, "INSERT INTO t (id) VALUES (?)", &[SqlValue::Integer(2)]);
        conn.commit().unwrap();
        assert_eq!(rows(&mut conn, "SELECT id FROM t"), vec![vec![SqlValue::Integer(2)]]);
    }

    #[test]
    fn close_discards_uncommitted_work() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let mut conn = SqliteConnection::open(&path, SqliteOptions::default()).unwrap();
        exec(&mut conn, "CREATE TABLE t (id INTEGER)", &[]);
        conn.commit().unwrap();
        exec(&mut conn, "INSERT INTO t (id) VALUES (?)", &[SqlValue::Integer(1)]);
        conn.close().unwrap();
        assert!(conn.is_closed());
        assert!(matches!(conn.prepare("SELECT 1"), Err(StoreError::Closed)));

        let mut conn = SqliteConnection::open(&path, SqliteOptions::default()).unwrap();
        assert!(rows(&mut conn, "SELECT id FROM t").is_empty());
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let mut conn = memory();
        exec(&mut conn, "CREATE TABLE p (id INTEGER PRIMARY KEY)", &[]);
        exec(
            &mut conn,
            "CREATE TABLE c (id INTEGER PRIMARY KEY, p INTEGER REFERENCES p (id))",
            &[],
        );
        let stmt = conn.prepare("INSERT INTO c (id, p) VALUES (?, ?)").unwrap();
        let result = conn.execute(&stmt, &[SqlValue::Integer(1), SqlValue::Integer(42)]);
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn real_values_are_rejected() {
        let mut conn = memory();
        let stmt = conn.prepare("SELECT 1.5").unwrap();
        let result = conn.query(&stmt, &[]);
        assert!(matches!(result, Err(StoreError::UnsupportedValue { column: 0, .. })));
    }
}

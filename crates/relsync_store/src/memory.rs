//! Recording in-memory connection for testing.

use crate::connection::{BufferedCursor, Connection, Cursor, Statement};
use crate::error::{StoreError, StoreResult};
use crate::value::SqlValue;
use parking_lot::Mutex;
use std::sync::Arc;

/// One call observed by a [`MemoryConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    /// A statement was prepared.
    Prepare(String),
    /// A statement was executed.
    Execute {
        /// SQL text.
        sql: String,
        /// Bound parameters.
        params: Vec<SqlValue>,
    },
    /// A query was run.
    Query {
        /// SQL text.
        sql: String,
        /// Bound parameters.
        params: Vec<SqlValue>,
    },
    /// The transaction was committed.
    Commit,
    /// The transaction was rolled back.
    Rollback,
    /// The connection was closed.
    Close,
}

#[derive(Debug, Default)]
struct MemoryState {
    journal: Vec<JournalEntry>,
    responses: Vec<(String, Vec<Vec<SqlValue>>)>,
    fail_patterns: Vec<String>,
    fail_on_execute: Option<usize>,
    executes: usize,
    uncommitted: usize,
    committed: usize,
    closed: bool,
}

impl MemoryState {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_injected(&self, sql: &str) -> StoreResult<()> {
        if self.fail_patterns.iter().any(|p| sql.contains(p.as_str())) {
            Err(StoreError::injected(sql))
        } else {
            Ok(())
        }
    }
}

/// A connection that records every call instead of talking to a store.
///
/// Clones share the same state, so a test can keep one clone as a probe
/// after moving the other into an engine.
///
/// Queries return the rows scripted with [`respond`](Self::respond) for the
/// longest matching SQL prefix, or no rows at all. Failures can be injected
/// by SQL substring or by execute ordinal.
///
/// # Example
///
/// ```rust
/// use relsync_store::{Connection, MemoryConnection, SqlValue};
///
/// let mut conn = MemoryConnection::new();
/// conn.respond("SELECT COUNT(*)", vec![vec![SqlValue::Integer(3)]]);
/// let stmt = conn.prepare("SELECT COUNT(*) FROM book").unwrap();
/// let mut cursor = conn.query(&stmt, &[]).unwrap();
/// assert_eq!(cursor.next_row().unwrap(), Some(vec![SqlValue::Integer(3)]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnection {
    /// Creates a new open connection with an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the rows returned by queries whose SQL starts with `prefix`.
    pub fn respond(&self, prefix: impl Into<String>, rows: Vec<Vec<SqlValue>>) {
        self.state.lock().responses.push((prefix.into(), rows));
    }

    /// Makes every call whose SQL contains `pattern` fail.
    ///
    /// Use `"COMMIT"` to make commits fail.
    pub fn fail_when(&self, pattern: impl Into<String>) {
        self.state.lock().fail_patterns.push(pattern.into());
    }

    /// Makes the `n`-th execute (1-based, counted from creation) fail.
    pub fn fail_on_execute(&self, n: usize) {
        self.state.lock().fail_on_execute = Some(n);
    }

    /// Returns a copy of the journal.
    #[must_use]
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state.lock().journal.clone()
    }

    /// Returns the SQL text of every executed statement, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.state
            .lock()
            .journal
            .iter()
            .filter_map(|e| match e {
                JournalEntry::Execute { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the executed statements together with their parameters.
    #[must_use]
    pub fn executions(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.state
            .lock()
            .journal
            .iter()
            .filter_map(|e| match e {
                JournalEntry::Execute { sql, params } => Some((sql.clone(), params.clone())),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of successful commits.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.count(|e| matches!(e, JournalEntry::Commit))
    }

    /// Returns the number of rollbacks.
    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.count(|e| matches!(e, JournalEntry::Rollback))
    }

    /// Returns the number of executes made durable by a commit.
    #[must_use]
    pub fn committed_writes(&self) -> usize {
        self.state.lock().committed
    }

    /// Returns the number of executes since the last commit or rollback.
    #[must_use]
    pub fn uncommitted_writes(&self) -> usize {
        self.state.lock().uncommitted
    }

    /// Clears the journal, keeping scripts and counters.
    pub fn clear_journal(&self) {
        self.state.lock().journal.clear();
    }

    fn count(&self, predicate: impl Fn(&JournalEntry) -> bool) -> usize {
        self.state.lock().journal.iter().filter(|e| predicate(e)).count()
    }
}

impl Connection for MemoryConnection {
    fn prepare(&mut self, sql: &str) -> StoreResult<Statement> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.check_injected(sql)?;
        state.journal.push(JournalEntry::Prepare(sql.to_owned()));
        Ok(Statement::new(sql))
    }

    fn execute(&mut self, statement: &Statement, params: &[SqlValue]) -> StoreResult<u64> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.executes += 1;
        if state.fail_on_execute == Some(state.executes) {
            return Err(StoreError::injected(statement.sql()));
        }
        state.check_injected(statement.sql())?;
        state.journal.push(JournalEntry::Execute {
            sql: statement.sql().to_owned(),
            params: params.to_vec(),
        });
        state.uncommitted += 1;
        Ok(1)
    }

    fn query<'c>(
        &'c mut self,
        statement: &Statement,
        params: &[SqlValue],
    ) -> StoreResult<Box<dyn Cursor + 'c>> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.check_injected(statement.sql())?;
        state.journal.push(JournalEntry::Query {
            sql: statement.sql().to_owned(),
            params: params.to_vec(),
        });
        let rows = state
            .responses
            .iter()
            .filter(|(prefix, _)| statement.sql().starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();
        Ok(Box::new(BufferedCursor::new(rows)))
    }

    fn commit(&mut self) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.check_injected("COMMIT")?;
        state.journal.push(JournalEntry::Commit);
        state.committed += state.uncommitted;
        state.uncommitted = 0;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.journal.push(JournalEntry::Rollback);
        state.uncommitted = 0;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        if state.uncommitted > 0 {
            tracing::debug!(discarded = state.uncommitted, "closing with uncommitted writes");
        }
        state.journal.push(JournalEntry::Close);
        state.uncommitted = 0;
        state.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

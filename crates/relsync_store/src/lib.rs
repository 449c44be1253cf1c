//! # relsync Store
//!
//! Relational store connection port and adapters for relsync.
//!
//! This crate is the lowest layer of relsync. A store connection is a
//! **statement executor with a transaction**: it prepares SQL text, executes
//! it with positional parameters, returns result rows, and commits or rolls
//! back. It does not know anything about tables, entities or lifecycles.
//!
//! ## Design Principles
//!
//! - Auto-commit is always off: every adapter keeps a transaction open
//! - Parameters are positional (`?`) and carried as [`SqlValue`]
//! - A nullable read yields [`SqlValue::Null`] (the `wasNull()` indicator)
//! - Statements and cursors are plain values, released when dropped
//! - A closed connection rejects every further call with [`StoreError::Closed`]
//!
//! ## Available Adapters
//!
//! - [`MemoryConnection`] - Recording connection for tests, with scripted
//!   results and failure injection
//! - [`SqliteConnection`] - SQLite via `rusqlite` (feature `sqlite`)
//!
//! ## Example
//!
//! ```rust
//! use relsync_store::{Connection, MemoryConnection, SqlValue};
//!
//! let mut conn = MemoryConnection::new();
//! let probe = conn.clone();
//! let stmt = conn.prepare("DELETE FROM book WHERE id = ?").unwrap();
//! conn.execute(&stmt, &[SqlValue::Integer(7)]).unwrap();
//! conn.commit().unwrap();
//! assert_eq!(probe.commits(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod error;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
mod value;

pub use connection::{BufferedCursor, Connection, Cursor, Statement};
pub use error::{StoreError, StoreResult};
pub use memory::{JournalEntry, MemoryConnection};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnection, SqliteOptions};
pub use value::SqlValue;

//! Test fixtures and engine helpers.
//!
//! Provides the sample library and ready-made engines over a recording
//! connection or a temporary SQLite file.

use crate::domain::{library_engine, Author, Book, Library, Publisher};
use chrono::NaiveDate;
use relsync_engine::{Engine, EngineConfig, EngineResult};
use relsync_schema::Decimal;
use relsync_store::{MemoryConnection, SqliteConnection, SqliteOptions};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Book ids of [`sample_library`] in load order.
pub const SAMPLE_BOOK_ORDER: [i64; 6] = [3, 4, 5, 6, 1, 2];

/// Author ids of [`sample_library`] in load order.
pub const SAMPLE_AUTHOR_ORDER: [i64; 4] = [2, 3, 4, 1];

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

/// A small library where every item is `NEW`.
///
/// Two authors share a last name, so their first name decides the order.
pub fn sample_library() -> Library {
    let mut library = Library::default();

    let publishers = [(1, "Penguin", Some("London")), (2, "Faber", None)];
    for (id, name, city) in publishers {
        library
            .publishers
            .add(
                id,
                Publisher {
                    id,
                    name: name.into(),
                    city: city.map(Into::into),
                },
            )
            .expect("sample ids are unique");
    }

    let authors = [
        (1, "Woolf", "Virginia", Some(1), date(1882, 1, 25)),
        (2, "Austen", "Jane", None, date(1775, 12, 16)),
        (3, "Eliot", "George", Some(2), date(1819, 11, 22)),
        (4, "Eliot", "Thomas", Some(2), None),
    ];
    for (id, last, first, publisher, born) in authors {
        library
            .authors
            .add(
                id,
                Author {
                    id,
                    last_name: last.into(),
                    first_name: first.into(),
                    publisher,
                    born,
                },
            )
            .expect("sample ids are unique");
    }

    let books = [
        (1, 1, "Mrs Dalloway", 194, Some(Decimal::new(999, 2)), date(1925, 5, 14), true),
        (2, 1, "Orlando", 228, Some(Decimal::new(1250, 2)), date(1928, 10, 11), true),
        (3, 2, "Emma", 474, None, date(1815, 12, 23), false),
        (4, 2, "Persuasion", 249, Some(Decimal::new(725, 2)), None, true),
        (5, 3, "Middlemarch", 880, Some(Decimal::new(1400, 2)), date(1871, 12, 1), true),
        (6, 4, "The Waste Land", 64, Some(Decimal::new(500, 2)), date(1922, 10, 1), false),
    ];
    for (id, author, title, pages, price, published, in_print) in books {
        library
            .books
            .add(
                id,
                Book {
                    id,
                    author,
                    title: title.into(),
                    pages,
                    price,
                    published,
                    in_print,
                },
            )
            .expect("sample ids are unique");
    }

    library
}

/// A library engine over a recording connection, plus a probe clone of
/// that connection.
pub fn memory_engine(config: EngineConfig) -> (Engine<Library>, MemoryConnection) {
    let conn = MemoryConnection::new();
    let probe = conn.clone();
    let engine = library_engine(conn, config).expect("library registers");
    (engine, probe)
}

/// A SQLite database file in a temporary directory.
///
/// The directory is removed when the value is dropped. Every call to
/// [`engine`](Self::engine) opens a fresh connection to the same file.
#[derive(Debug)]
pub struct SqliteStore {
    _dir: TempDir,
    path: PathBuf,
}

impl SqliteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("library.db");
        Self { _dir: dir, path }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a library engine on the file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the configuration is invalid.
    pub fn engine(&self, config: EngineConfig) -> EngineResult<Engine<Library>> {
        let options = SqliteOptions::default().foreign_keys(config.foreign_keys);
        let conn = SqliteConnection::open(&self.path, options).map_err(|source| {
            relsync_engine::EngineError::Store {
                table: "library".into(),
                entity: None,
                source,
            }
        })?;
        library_engine(conn, config)
    }

    /// Opens a library engine and creates the schema.
    pub fn created(&self, config: EngineConfig) -> Engine<Library> {
        let mut engine = self.engine(config).expect("Failed to open store");
        engine.create_schema().expect("Failed to create schema");
        engine
    }
}

impl Default for SqliteStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test against a fresh SQLite store with the schema created.
///
/// # Example
///
/// ```rust
/// use relsync_engine::{EngineConfig, NoProgress};
/// use relsync_testkit::{sample_library, with_sqlite_engine};
///
/// with_sqlite_engine(EngineConfig::default(), |engine| {
///     let mut library = sample_library();
///     engine.save_database(&mut library, &mut NoProgress).unwrap();
///     assert_eq!(engine.count_rows("book").unwrap(), 6);
/// });
/// ```
pub fn with_sqlite_engine<F, R>(config: EngineConfig, f: F) -> R
where
    F: FnOnce(&mut Engine<Library>) -> R,
{
    let store = SqliteStore::new();
    let mut engine = store.created(config);
    f(&mut engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_library_is_new() {
        let library = sample_library();
        assert_eq!(library.len(), 12);
        assert!(!library.is_clean());
        assert_eq!(
            library.books.count(relsync_engine::ItemState::New),
            library.books.len()
        );
    }

    #[test]
    fn sqlite_store_lives_in_temp_dir() {
        let store = SqliteStore::new();
        assert!(store.path().ends_with("library.db"));
        let engine = store.engine(EngineConfig::default()).unwrap();
        assert!(engine.is_connected());
    }
}

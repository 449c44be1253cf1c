//! Round trips through a real SQLite store.

use proptest::prelude::*;
use relsync_engine::{EngineConfig, EngineError, NoProgress};
use relsync_schema::Decimal;
use relsync_store::{SqliteConnection, SqliteOptions};
use relsync_testkit::prelude::*;

fn ids<E: Clone>(list: &relsync_engine::EntityList<E>) -> Vec<i64> {
    list.iter().map(|t| t.id()).collect()
}

fn seeded() -> SqliteStore {
    let store = SqliteStore::new();
    let mut engine = store.created(EngineConfig::default());
    let mut library = sample_library();
    engine.save_database(&mut library, &mut NoProgress).unwrap();
    store
}

#[test]
fn load_follows_referenced_sort_keys() {
    let store = seeded();
    let mut engine = store.engine(EngineConfig::default()).unwrap();
    let library = engine.load_database(&mut NoProgress).unwrap().unwrap();

    assert_eq!(ids(&library.publishers), vec![2, 1]);
    assert_eq!(ids(&library.authors), SAMPLE_AUTHOR_ORDER.to_vec());
    assert_eq!(ids(&library.books), SAMPLE_BOOK_ORDER.to_vec());
    assert!(library.is_clean());
}

#[test]
fn values_survive_the_store() {
    let store = seeded();
    let mut engine = store.engine(EngineConfig::default()).unwrap();
    let loaded = engine.load_database(&mut NoProgress).unwrap().unwrap();
    let sample = sample_library();

    for book in sample.books.live() {
        assert_eq!(loaded.books.get(book.id), Some(book));
    }
    for author in sample.authors.live() {
        assert_eq!(loaded.authors.get(author.id), Some(author));
    }
    for publisher in sample.publishers.live() {
        assert_eq!(loaded.publishers.get(publisher.id), Some(publisher));
    }
    assert_eq!(loaded.books.get(2).unwrap().price, Some(Decimal::new(125, 1)));
}

#[test]
fn edits_persist_across_connections() {
    let store = seeded();
    {
        let mut engine = store.engine(EngineConfig::default()).unwrap();
        let mut library = engine.load_database(&mut NoProgress).unwrap().unwrap();
        library
            .books
            .modify(3, |b| b.price = Some(Decimal::new(1099, 2)))
            .unwrap();
        library.books.delete(6).unwrap();
        library.authors.modify(4, |a| a.publisher = None).unwrap();
        let report = engine.save_database(&mut library, &mut NoProgress).unwrap();
        assert_eq!(report.updated, 2);
        assert_eq!(report.deleted, 1);
    }

    let mut engine = store.engine(EngineConfig::default()).unwrap();
    let library = engine.load_database(&mut NoProgress).unwrap().unwrap();
    assert_eq!(library.books.get(3).unwrap().price, Some(Decimal::new(1099, 2)));
    assert!(library.books.get(6).is_none());
    assert_eq!(library.authors.get(4).unwrap().publisher, None);
    assert_eq!(engine.count_rows("book").unwrap(), 5);
}

#[test]
fn foreign_keys_reject_orphans() {
    let store = seeded();
    let mut engine = store.engine(EngineConfig::default()).unwrap();
    let mut library = engine.load_database(&mut NoProgress).unwrap().unwrap();
    library
        .books
        .add(
            7,
            Book {
                id: 7,
                author: 99,
                title: "Nobody's Book".into(),
                pages: 1,
                price: None,
                published: None,
                in_print: false,
            },
        )
        .unwrap();

    let err = engine.save_database(&mut library, &mut NoProgress).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Store {
            entity: Some(7),
            ..
        }
    ));
    assert!(!engine.is_connected());

    let mut engine = store.engine(EngineConfig::default()).unwrap();
    assert_eq!(engine.count_rows("book").unwrap(), 6);
}

#[test]
fn unresolved_reference_fails_on_load() {
    let store = SqliteStore::new();
    let config = EngineConfig::default().with_foreign_keys(false);
    let mut engine = store.created(config.clone());
    let mut library = sample_library();
    library.authors.modify(2, |a| a.publisher = Some(99)).unwrap();
    engine.save_database(&mut library, &mut NoProgress).unwrap();

    let mut engine = store.engine(config).unwrap();
    let err = engine.load_database(&mut NoProgress).unwrap_err();
    assert!(matches!(err, EngineError::Binding { ref table, .. } if table == "author"));
    assert!(engine.is_connected());
}

#[test]
fn load_reports_at_granularity() {
    let store = seeded();
    let mut engine = store.engine(EngineConfig::default()).unwrap();
    let mut progress = RecordingProgress::new().with_granularity(4);
    engine.load_database(&mut progress).unwrap().unwrap();

    assert_eq!(
        progress.stages,
        vec!["Loading publisher", "Loading author", "Loading book", "Refreshing"]
    );
    assert_eq!(progress.step_counts, vec![2, 4, 6]);
    assert_eq!(progress.reports, vec![2, 4, 4, 6]);
}

#[test]
fn cancelled_load_keeps_connection() {
    let store = seeded();
    let mut engine = store.engine(EngineConfig::default()).unwrap();
    let mut progress = CancelAfter::new(4);
    assert!(engine.load_database(&mut progress).unwrap().is_none());
    assert_eq!(progress.reports(), 4);
    assert!(engine.is_connected());

    let library = engine.load_database(&mut NoProgress).unwrap().unwrap();
    assert_eq!(library.len(), 12);
}

#[test]
fn purge_and_drop() {
    let store = seeded();
    let mut engine = store.engine(EngineConfig::default()).unwrap();
    engine.purge_schema().unwrap();
    for table in ["publisher", "author", "book"] {
        assert_eq!(engine.count_rows(table).unwrap(), 0);
    }

    engine.drop_schema().unwrap();
    engine.drop_schema().unwrap();
    assert!(engine.count_rows("book").is_err());
    assert!(!engine.is_connected());

    let mut engine = store.engine(EngineConfig::default()).unwrap();
    engine.create_schema().unwrap();
    let library = engine.load_database(&mut NoProgress).unwrap().unwrap();
    assert!(library.is_empty());
}

fn sqlite_engine() -> relsync_engine::Engine<Library> {
    let conn = SqliteConnection::open_in_memory(SqliteOptions::default()).unwrap();
    let mut engine = library_engine(conn, EngineConfig::new().with_batch_size(7)).unwrap();
    engine.create_schema().unwrap();
    engine
}

fn sorted_books(library: &Library) -> Vec<Book> {
    let mut books: Vec<Book> = library.books.live().cloned().collect();
    books.sort_by_key(|b| b.id);
    books
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn generated_libraries_round_trip(
        library in library_strategy(5, 12),
        edits in prop::collection::vec(edit_strategy(), 0..8),
    ) {
        let mut engine = sqlite_engine();
        let mut library = library;
        engine.save_database(&mut library, &mut NoProgress).unwrap();

        let mut loaded = engine.load_database(&mut NoProgress).unwrap().unwrap();
        prop_assert_eq!(sorted_books(&loaded), sorted_books(&library));

        let keys: Vec<(String, String, String)> = loaded
            .books
            .live()
            .map(|b| {
                let author = loaded.authors.get(b.author).unwrap();
                (author.last_name.clone(), author.first_name.clone(), b.title.clone())
            })
            .collect();
        prop_assert!(keys.windows(2).all(|w| w[0] <= w[1]));

        for edit in &edits {
            edit.apply(&mut loaded);
        }
        let expected = sorted_books(&loaded);
        engine.save_database(&mut loaded, &mut NoProgress).unwrap();
        prop_assert!(loaded.is_clean());

        let reloaded = engine.load_database(&mut NoProgress).unwrap().unwrap();
        prop_assert_eq!(sorted_books(&reloaded), expected);
        prop_assert_eq!(engine.count_rows("book").unwrap() as usize, reloaded.books.len());
    }
}

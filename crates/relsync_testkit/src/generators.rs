//! Property-based test generators using proptest.
//!
//! Every generated value fits the library columns: names stay within the
//! text limits, prices within `DECIMAL(8,2)`, dates within four-digit years.

use crate::domain::{Author, Book, Library, Publisher};
use chrono::NaiveDate;
use proptest::prelude::*;
use proptest::sample::Index;
use relsync_schema::Decimal;

/// Strategy for capitalised names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{0,11}").expect("Invalid regex")
}

/// Strategy for short multi-word titles.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{0,9}( [a-z]{1,8}){0,3}").expect("Invalid regex")
}

/// Strategy for optional prices with two decimal places.
pub fn price_strategy() -> impl Strategy<Value = Option<Decimal>> {
    prop::option::of((0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2)))
}

/// Strategy for dates between 1900 and 2099.
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1900i32..2100, 1u32..=12, 1u32..=28)
        .prop_filter_map("valid date", |(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
}

/// Strategy for a consistent library of `NEW` items.
///
/// Every reference points at a generated item. There is at least one
/// author.
pub fn library_strategy(max_authors: usize, max_books: usize) -> impl Strategy<Value = Library> {
    let publishers = prop::collection::vec(
        (name_strategy(), prop::option::of(name_strategy())),
        0..3,
    );
    let authors = prop::collection::vec(
        (
            name_strategy(),
            name_strategy(),
            any::<Option<Index>>(),
            prop::option::of(date_strategy()),
        ),
        1..=max_authors.max(1),
    );
    let books = prop::collection::vec(
        (
            any::<Index>(),
            title_strategy(),
            1i32..2000,
            price_strategy(),
            prop::option::of(date_strategy()),
            any::<bool>(),
        ),
        0..=max_books,
    );

    (publishers, authors, books).prop_map(|(publishers, authors, books)| {
        let mut library = Library::default();
        let publisher_count = publishers.len();
        for (id, (name, city)) in (1i64..).zip(publishers) {
            library
                .publishers
                .add(id, Publisher { id, name, city })
                .expect("generated ids are unique");
        }

        let author_count = authors.len();
        for (id, (last_name, first_name, publisher, born)) in (1i64..).zip(authors) {
            let publisher = publisher
                .filter(|_| publisher_count > 0)
                .map(|index| index.index(publisher_count) as i64 + 1);
            library
                .authors
                .add(
                    id,
                    Author {
                        id,
                        last_name,
                        first_name,
                        publisher,
                        born,
                    },
                )
                .expect("generated ids are unique");
        }

        for (id, (author, title, pages, price, published, in_print)) in (1i64..).zip(books) {
            library
                .books
                .add(
                    id,
                    Book {
                        id,
                        author: author.index(author_count) as i64 + 1,
                        title,
                        pages,
                        price,
                        published,
                        in_print,
                    },
                )
                .expect("generated ids are unique");
        }
        library
    })
}

/// One change to the books of a loaded library.
#[derive(Debug, Clone)]
pub enum LibraryEdit {
    /// Renames a live book.
    Retitle(Index, String),
    /// Changes the price of a live book.
    Reprice(Index, Option<Decimal>),
    /// Marks a live book for deletion.
    Remove(Index),
    /// Adds a book by a live author.
    Add(Index, String, i32),
}

impl LibraryEdit {
    /// Applies the edit. Edits that find nothing to act on do nothing.
    pub fn apply(&self, library: &mut Library) {
        let books: Vec<i64> = library.books.live().map(|b| b.id).collect();
        match self {
            LibraryEdit::Retitle(index, title) if !books.is_empty() => {
                let id = books[index.index(books.len())];
                let title = title.clone();
                let _ = library.books.modify(id, |b| b.title = title);
            }
            LibraryEdit::Reprice(index, price) if !books.is_empty() => {
                let id = books[index.index(books.len())];
                let _ = library.books.modify(id, |b| b.price = *price);
            }
            LibraryEdit::Remove(index) if !books.is_empty() => {
                let _ = library.books.delete(books[index.index(books.len())]);
            }
            LibraryEdit::Add(index, title, pages) => {
                let authors: Vec<i64> = library.authors.live().map(|a| a.id).collect();
                if authors.is_empty() {
                    return;
                }
                let Ok(id) = library.books.next_id() else {
                    return;
                };
                let book = Book {
                    id,
                    author: authors[index.index(authors.len())],
                    title: title.clone(),
                    pages: *pages,
                    price: None,
                    published: None,
                    in_print: true,
                };
                let _ = library.books.add(id, book);
            }
            _ => {}
        }
    }
}

/// Strategy for a single [`LibraryEdit`].
pub fn edit_strategy() -> impl Strategy<Value = LibraryEdit> {
    prop_oneof![
        (any::<Index>(), title_strategy()).prop_map(|(i, t)| LibraryEdit::Retitle(i, t)),
        (any::<Index>(), price_strategy()).prop_map(|(i, p)| LibraryEdit::Reprice(i, p)),
        any::<Index>().prop_map(LibraryEdit::Remove),
        (any::<Index>(), title_strategy(), 1i32..2000)
            .prop_map(|(i, t, p)| LibraryEdit::Add(i, t, p)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::test_runner::TestRunner;

    proptest! {
        #[test]
        fn generated_libraries_are_consistent(library in library_strategy(4, 8)) {
            for book in library.books.live() {
                prop_assert!(library.authors.get(book.author).is_some());
                prop_assert!(book.title.chars().count() <= 80);
            }
            for author in library.authors.live() {
                if let Some(publisher) = author.publisher {
                    prop_assert!(library.publishers.get(publisher).is_some());
                }
            }
        }
    }

    #[test]
    fn edits_keep_references_valid() {
        let mut runner = TestRunner::default();
        let strategy = (library_strategy(3, 5), prop::collection::vec(edit_strategy(), 0..10));
        runner
            .run(&strategy, |(mut library, edits)| {
                for edit in &edits {
                    edit.apply(&mut library);
                }
                for book in library.books.live() {
                    prop_assert!(library.authors.get(book.author).is_some());
                }
                Ok(())
            })
            .unwrap();
    }
}

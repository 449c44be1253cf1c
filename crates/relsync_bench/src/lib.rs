//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use relsync_schema::Decimal;
use relsync_testkit::{Author, Book, Library, Publisher};

/// Builds a library of `NEW` items with `authors` authors and
/// `books_per_author` books each. Names repeat so that sorting has ties.
pub fn generate_library(authors: usize, books_per_author: usize) -> Library {
    let mut library = Library::default();
    for id in 1..=4 {
        let publisher = Publisher {
            id,
            name: format!("Publisher {id}"),
            city: None,
        };
        let _ = library.publishers.add(id, publisher);
    }

    let mut book_id = 1;
    for a in 0..authors as i64 {
        let id = a + 1;
        let author = Author {
            id,
            last_name: format!("Author{}", a % 97),
            first_name: format!("Given{}", a % 13),
            publisher: Some(a % 4 + 1),
            born: None,
        };
        let _ = library.authors.add(id, author);

        for n in 0..books_per_author as i64 {
            let book = Book {
                id: book_id,
                author: id,
                title: format!("Volume {n}"),
                pages: 100 + (n as i32 % 400),
                price: Some(Decimal::new(999 + n, 2)),
                published: None,
                in_print: n % 2 == 0,
            };
            let _ = library.books.add(book_id, book);
            book_id += 1;
        }
    }
    library
}

/// Marks every `nth` book of a saved library as changed.
pub fn touch_books(library: &mut Library, nth: usize) {
    let ids: Vec<i64> = library.books.live().map(|b| b.id).step_by(nth.max(1)).collect();
    for id in ids {
        let _ = library.books.modify(id, |b| b.pages += 1);
    }
}

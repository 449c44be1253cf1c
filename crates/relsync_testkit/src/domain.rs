//! The reference library domain.
//!
//! Three tables with a reference chain: a book belongs to an author, an
//! author optionally to a publisher. Books load in author order, which makes
//! the domain a natural check for join-based sort keys.

use chrono::NaiveDate;
use relsync_engine::{
    Engine, EngineConfig, EngineError, EngineResult, EntityBinding, EntityList, Fields,
    Registration,
};
use relsync_schema::{Column, ColumnId, Decimal, TableDef};
use relsync_store::Connection;
use serde::Serialize;

/// A publishing house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Publisher {
    /// Identity.
    pub id: i64,
    /// Name, the sort key.
    pub name: String,
    /// Home city.
    pub city: Option<String>,
}

/// An author, sorted by last then first name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    /// Identity.
    pub id: i64,
    /// Family name.
    pub last_name: String,
    /// Given name.
    pub first_name: String,
    /// Publisher under contract, if any.
    pub publisher: Option<i64>,
    /// Date of birth.
    pub born: Option<NaiveDate>,
}

/// A book, sorted by author then title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    /// Identity.
    pub id: i64,
    /// Author id.
    pub author: i64,
    /// Title.
    pub title: String,
    /// Page count.
    pub pages: i32,
    /// List price.
    pub price: Option<Decimal>,
    /// First publication.
    pub published: Option<NaiveDate>,
    /// Whether the book is still in print.
    pub in_print: bool,
}

/// The whole dataset.
#[derive(Debug, Clone, Default)]
pub struct Library {
    /// All publishers.
    pub publishers: EntityList<Publisher>,
    /// All authors.
    pub authors: EntityList<Author>,
    /// All books.
    pub books: EntityList<Book>,
}

impl Library {
    /// Whether nothing is waiting to be saved.
    pub fn is_clean(&self) -> bool {
        self.publishers.is_clean() && self.authors.is_clean() && self.books.is_clean()
    }

    /// Total number of tracked items.
    pub fn len(&self) -> usize {
        self.publishers.len() + self.authors.len() + self.books.len()
    }

    /// Whether the dataset holds no item.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Binding for [`Publisher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PublisherBinding;

impl PublisherBinding {
    /// `name` column.
    pub const NAME: ColumnId = ColumnId(1);
    /// `city` column.
    pub const CITY: ColumnId = ColumnId(2);
}

impl EntityBinding<Library> for PublisherBinding {
    type Entity = Publisher;

    fn table(&self) -> TableDef {
        TableDef::new("publisher", "id")
            .column(Column::text(Self::NAME, "name", 60).ascending())
            .column(Column::text(Self::CITY, "city", 40).nullable())
    }

    fn fields(&self) -> Fields<Publisher> {
        Fields::<Publisher>::new()
            .field(Self::NAME, |p| p.name.clone(), |p, v| p.name = v)
            .field(Self::CITY, |p| p.city.clone(), |p, v| p.city = v)
    }

    fn list<'a>(&self, data: &'a Library) -> &'a EntityList<Publisher> {
        &data.publishers
    }

    fn list_mut<'a>(&self, data: &'a mut Library) -> &'a mut EntityList<Publisher> {
        &mut data.publishers
    }

    fn blank(&self, id: i64) -> Publisher {
        Publisher {
            id,
            name: String::new(),
            city: None,
        }
    }
}

/// Binding for [`Author`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorBinding;

impl AuthorBinding {
    /// `last_name` column.
    pub const LAST_NAME: ColumnId = ColumnId(1);
    /// `first_name` column.
    pub const FIRST_NAME: ColumnId = ColumnId(2);
    /// `publisher` reference column.
    pub const PUBLISHER: ColumnId = ColumnId(3);
    /// `born` column.
    pub const BORN: ColumnId = ColumnId(4);
}

impl EntityBinding<Library> for AuthorBinding {
    type Entity = Author;

    fn table(&self) -> TableDef {
        TableDef::new("author", "id")
            .column(Column::text(Self::LAST_NAME, "last_name", 40).ascending())
            .column(Column::text(Self::FIRST_NAME, "first_name", 40).ascending())
            .column(Column::reference(Self::PUBLISHER, "publisher", "publisher").nullable())
            .column(Column::date(Self::BORN, "born").nullable())
    }

    fn fields(&self) -> Fields<Author> {
        Fields::<Author>::new()
            .field(Self::LAST_NAME, |a| a.last_name.clone(), |a, v| a.last_name = v)
            .field(Self::FIRST_NAME, |a| a.first_name.clone(), |a, v| a.first_name = v)
            .field(Self::PUBLISHER, |a| a.publisher, |a, v| a.publisher = v)
            .field(Self::BORN, |a| a.born, |a, v| a.born = v)
    }

    fn list<'a>(&self, data: &'a Library) -> &'a EntityList<Author> {
        &data.authors
    }

    fn list_mut<'a>(&self, data: &'a mut Library) -> &'a mut EntityList<Author> {
        &mut data.authors
    }

    fn blank(&self, id: i64) -> Author {
        Author {
            id,
            last_name: String::new(),
            first_name: String::new(),
            publisher: None,
            born: None,
        }
    }

    fn attach(&self, author: &mut Author, data: &Library) -> EngineResult<()> {
        match author.publisher {
            Some(publisher) if data.publishers.get(publisher).is_none() => {
                Err(EngineError::binding(
                    "author",
                    format!("author {} references missing publisher {publisher}", author.id),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Binding for [`Book`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BookBinding;

impl BookBinding {
    /// `author` reference column.
    pub const AUTHOR: ColumnId = ColumnId(1);
    /// `title` column.
    pub const TITLE: ColumnId = ColumnId(2);
    /// `pages` column.
    pub const PAGES: ColumnId = ColumnId(3);
    /// `price` column.
    pub const PRICE: ColumnId = ColumnId(4);
    /// `published` column.
    pub const PUBLISHED: ColumnId = ColumnId(5);
    /// `in_print` column.
    pub const IN_PRINT: ColumnId = ColumnId(6);
}

impl EntityBinding<Library> for BookBinding {
    type Entity = Book;

    fn table(&self) -> TableDef {
        TableDef::new("book", "id")
            .column(Column::reference(Self::AUTHOR, "author", "author").ascending())
            .column(Column::text(Self::TITLE, "title", 80).ascending())
            .column(Column::integer(Self::PAGES, "pages"))
            .column(Column::decimal(Self::PRICE, "price", 8, 2).nullable())
            .column(Column::date(Self::PUBLISHED, "published").nullable())
            .column(Column::boolean(Self::IN_PRINT, "in_print"))
    }

    fn fields(&self) -> Fields<Book> {
        Fields::<Book>::new()
            .field(Self::AUTHOR, |b| b.author, |b, v| b.author = v)
            .field(Self::TITLE, |b| b.title.clone(), |b, v| b.title = v)
            .field(Self::PAGES, |b| b.pages, |b, v| b.pages = v)
            .field(Self::PRICE, |b| b.price, |b, v| b.price = v)
            .field(Self::PUBLISHED, |b| b.published, |b, v| b.published = v)
            .field(Self::IN_PRINT, |b| b.in_print, |b, v| b.in_print = v)
    }

    fn list<'a>(&self, data: &'a Library) -> &'a EntityList<Book> {
        &data.books
    }

    fn list_mut<'a>(&self, data: &'a mut Library) -> &'a mut EntityList<Book> {
        &mut data.books
    }

    fn blank(&self, id: i64) -> Book {
        Book {
            id,
            author: 0,
            title: String::new(),
            pages: 0,
            price: None,
            published: None,
            in_print: false,
        }
    }

    fn attach(&self, book: &mut Book, data: &Library) -> EngineResult<()> {
        if data.authors.get(book.author).is_none() {
            return Err(EngineError::binding(
                "book",
                format!("book {} references missing author {}", book.id, book.author),
            ));
        }
        Ok(())
    }
}

/// The library bindings, children first, for [`Engine::register_all`].
pub fn registrations() -> Vec<Registration<Library>> {
    vec![
        Registration::new(BookBinding),
        Registration::new(AuthorBinding),
        Registration::new(PublisherBinding),
    ]
}

/// Creates an engine over `conn` with the library tables registered.
///
/// # Errors
///
/// Fails if the configuration is invalid.
pub fn library_engine(
    conn: impl Connection + 'static,
    config: EngineConfig,
) -> EngineResult<Engine<Library>> {
    let mut engine = Engine::new(conn, config)?;
    engine.register_all(registrations())?;
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsync_store::MemoryConnection;

    #[test]
    fn registers_in_dependency_order() {
        let engine = library_engine(MemoryConnection::new(), EngineConfig::default()).unwrap();
        let names: Vec<&str> = engine.schema().tables().map(|t| t.name()).collect();
        assert_eq!(names, vec!["publisher", "author", "book"]);
        assert!(engine.table("book").unwrap().sorts_on_reference());
    }

    #[test]
    fn book_load_query_follows_author_order() {
        let engine = library_engine(MemoryConnection::new(), EngineConfig::default()).unwrap();
        assert_eq!(
            engine.table("book").unwrap().load_query(),
            "SELECT a.id, a.author, a.title, a.pages, a.price, a.published, a.in_print \
             FROM book a JOIN author b ON a.author = b.id \
             ORDER BY b.last_name ASC, b.first_name ASC, a.title ASC"
        );
    }
}

//! # relsync Schema
//!
//! Table and column metadata for relsync, and every SQL string the engine
//! issues.
//!
//! ## Layers
//!
//! - [`Value`]: the logical value of an entity field
//! - [`Column`]: name, type, nullability and sort direction of one column,
//!   plus the codec between [`Value`] and [`relsync_store::SqlValue`]
//! - [`TableDef`]: an unresolved table definition
//! - [`Table`]: a registered table, with references resolved, that renders
//!   DDL, DML and load queries
//! - [`Schema`]: tables in dependency order
//!
//! Decimal values are stored as fixed-scale text rather than a native
//! decimal type.
//!
//! ## Example
//!
//! ```rust
//! use relsync_schema::{Column, ColumnId, Schema, TableDef};
//!
//! let mut schema = Schema::new();
//! schema
//!     .register(
//!         TableDef::new("author", "id")
//!             .column(Column::text(ColumnId(1), "name", 40).ascending()),
//!     )
//!     .unwrap();
//! schema
//!     .register(
//!         TableDef::new("book", "id")
//!             .column(Column::reference(ColumnId(1), "author", "author").ascending())
//!             .column(Column::text(ColumnId(2), "title", 80).ascending()),
//!     )
//!     .unwrap();
//!
//! let book = schema.get("book").unwrap();
//! assert_eq!(
//!     book.load_query(),
//!     "SELECT a.id, a.author, a.title FROM book a JOIN author b ON a.author = b.id \
//!      ORDER BY b.name ASC, a.title ASC"
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod column;
mod error;
mod registry;
mod row;
mod table;
mod value;

pub use column::{Column, ColumnId, ColumnKind, SortOrder, MAX_DECIMAL_PRECISION};
pub use error::{SchemaError, SchemaResult};
pub use registry::Schema;
pub use row::RowValues;
pub use table::{Table, TableDef};
pub use value::{ColumnValue, Value, ValueKind};

pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;

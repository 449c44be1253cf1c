//! Table descriptors and SQL statement synthesis.
//!
//! A [`TableDef`] is the unresolved definition a binding hands in. The
//! [`Schema`](crate::Schema) validates it and resolves its reference columns
//! against the tables registered before it, producing a [`Table`]. Every SQL
//! string the engine issues comes from a [`Table`], and none of these
//! functions touch the store.

use crate::column::{Column, ColumnId, ColumnKind, SortOrder, MAX_DECIMAL_PRECISION};
use crate::error::{SchemaError, SchemaResult};
use crate::row::RowValues;
use crate::value::Value;
use relsync_store::SqlValue;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

/// An unresolved table definition.
///
/// # Example
///
/// ```rust
/// use relsync_schema::{Column, ColumnId, TableDef};
///
/// let def = TableDef::new("publisher", "id")
///     .column(Column::text(ColumnId(1), "name", 60).ascending());
/// assert_eq!(def.columns().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    columns: Vec<Column>,
}

impl TableDef {
    /// Starts a definition with its identity column in slot 0.
    pub fn new(name: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![Column::identity(identity)],
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order, identity first.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Names of the tables this definition references.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().filter_map(Column::referenced_table)
    }

    /// Checks identifiers, column ids and column bounds.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidDefinition`] describing the first problem.
    pub fn validate(&self) -> SchemaResult<()> {
        check_identifier(&self.name, &self.name)?;

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for (slot, column) in self.columns.iter().enumerate() {
            check_identifier(&self.name, column.name())?;
            if !names.insert(column.name().to_ascii_lowercase()) {
                return Err(self.invalid(format!("duplicate column {}", column.name())));
            }
            if !ids.insert(column.id()) {
                return Err(self.invalid(format!("duplicate column id {}", column.id())));
            }
            let first = slot == 0;
            if first != column.is_identity() || first != (column.id() == ColumnId::IDENTITY) {
                return Err(self.invalid(format!(
                    "column {} is misplaced: only slot 0 holds the identity",
                    column.name()
                )));
            }
            if column.is_identity() && (column.is_nullable() || column.sort().is_some()) {
                return Err(self.invalid("identity column cannot be nullable or sorted"));
            }

            match column.kind() {
                ColumnKind::Text { max: 0 } | ColumnKind::Binary { max: 0 } => {
                    return Err(self.invalid(format!("column {} has zero length", column.name())));
                }
                ColumnKind::Decimal { precision, scale }
                    if *precision == 0
                        || *precision > MAX_DECIMAL_PRECISION
                        || *scale > *precision =>
                {
                    return Err(self.invalid(format!(
                        "column {} has invalid DECIMAL({precision}, {scale})",
                        column.name()
                    )));
                }
                ColumnKind::Reference { table } => check_identifier(&self.name, table)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn invalid(&self, message: impl Into<String>) -> SchemaError {
        SchemaError::invalid_definition(&self.name, message)
    }
}

fn check_identifier(table: &str, ident: &str) -> SchemaResult<()> {
    let mut chars = ident.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SchemaError::invalid_definition(
            table,
            format!("{ident:?} is not a valid identifier"),
        ))
    }
}

/// A registered table with its references resolved.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    /// Resolved target per column slot (`Some` only for references).
    targets: Vec<Option<Arc<Table>>>,
    sort_slots: Vec<usize>,
    sorts_on_reference: bool,
}

impl Table {
    /// Validates `def` and resolves its references through `lookup`.
    pub(crate) fn resolve<F>(def: TableDef, lookup: F) -> SchemaResult<Self>
    where
        F: Fn(&str) -> Option<Arc<Table>>,
    {
        def.validate()?;

        let mut targets = Vec::with_capacity(def.columns.len());
        for column in &def.columns {
            let target = match column.referenced_table() {
                Some(name) => Some(lookup(name).ok_or_else(|| {
                    SchemaError::UnresolvedReference {
                        table: def.name.clone(),
                        column: column.name().to_owned(),
                        target: name.to_owned(),
                    }
                })?),
                None => None,
            };
            targets.push(target);
        }

        let sort_slots: Vec<usize> = def
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.sort().is_some())
            .map(|(slot, _)| slot)
            .collect();
        let sorts_on_reference = sort_slots
            .iter()
            .any(|slot| def.columns[*slot].referenced_table().is_some());

        Ok(Self {
            name: def.name,
            columns: def.columns,
            targets,
            sort_slots,
            sorts_on_reference,
        })
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order, identity first.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The identity column.
    pub fn identity(&self) -> &Column {
        &self.columns[0]
    }

    /// Looks up a column by id.
    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id() == id)
    }

    /// Sort-key columns in declaration order.
    pub fn sort_columns(&self) -> impl Iterator<Item = &Column> {
        self.sort_slots.iter().map(|slot| &self.columns[*slot])
    }

    /// Whether any sort-key column is a reference.
    pub fn sorts_on_reference(&self) -> bool {
        self.sorts_on_reference
    }

    /// The resolved table a reference column points at.
    pub fn target(&self, id: ColumnId) -> Option<&Table> {
        self.columns
            .iter()
            .position(|c| c.id() == id)
            .and_then(|slot| self.targets[slot].as_deref())
    }

    /// Names of the tables this one references.
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().flatten().map(|t| t.name())
    }

    fn index_name(&self) -> String {
        format!("idx_{}_order", self.name)
    }

    /// `CREATE TABLE` with primary and foreign key constraints.
    pub fn create_table(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(Column::ddl).collect();
        for (column, target) in self.columns.iter().zip(&self.targets) {
            let identity = target.as_ref().map(|t| t.identity().name());
            if let Some(constraint) = column.constraint(&self.name, identity) {
                parts.push(constraint);
            }
        }
        format!("CREATE TABLE {} ({})", self.name, parts.join(", "))
    }

    /// `CREATE INDEX` over the sort key, if there is one.
    pub fn create_index(&self) -> Option<String> {
        if self.sort_slots.is_empty() {
            return None;
        }
        let terms: Vec<String> = self
            .sort_columns()
            .map(|c| format!("{} {}", c.name(), sort_keyword(c)))
            .collect();
        Some(format!(
            "CREATE INDEX {} ON {} ({})",
            self.index_name(),
            self.name,
            terms.join(", ")
        ))
    }

    /// Guarded `DROP INDEX`, if the table has a sort key.
    pub fn drop_index(&self) -> Option<String> {
        (!self.sort_slots.is_empty()).then(|| format!("DROP INDEX IF EXISTS {}", self.index_name()))
    }

    /// Guarded `DROP TABLE`.
    pub fn drop_table(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name)
    }

    /// The `SELECT` that loads every row in sort-key order.
    ///
    /// Columns come back in declaration order. When a sort column is a
    /// reference, the query joins the referenced table (recursively) and
    /// orders by its sort key instead of the raw foreign key value.
    ///
    /// Aliases are handed out one per join in the order the joins are
    /// planned, not per join depth. For a chain of references the two
    /// agree; sibling joins from one table each get their own alias.
    pub fn load_query(&self) -> String {
        if !self.sorts_on_reference {
            let mut sql = format!("SELECT {} FROM {}", self.column_list(None), self.name);
            if !self.sort_slots.is_empty() {
                let terms: Vec<String> = self
                    .sort_columns()
                    .map(|c| format!("{} {}", c.name(), sort_keyword(c)))
                    .collect();
                let _ = write!(sql, " ORDER BY {}", terms.join(", "));
            }
            return sql;
        }

        let mut plan = JoinPlan::default();
        let root = plan.next_alias();
        self.order_terms(&root, false, false, &mut plan);

        let mut sql = format!(
            "SELECT {} FROM {} {root}",
            self.column_list(Some(&root)),
            self.name
        );
        for join in &plan.joins {
            let _ = write!(sql, " {join}");
        }
        let _ = write!(sql, " ORDER BY {}", plan.terms.join(", "));
        sql
    }

    fn order_terms(&self, alias: &str, flip: bool, outer: bool, plan: &mut JoinPlan) {
        for slot in &self.sort_slots {
            let column = &self.columns[*slot];
            let order = sort_order(column).flipped_if(flip);

            match self.targets[*slot].as_deref() {
                Some(target) if !target.sort_slots.is_empty() => {
                    let child = plan.next_alias();
                    let outer = outer || column.is_nullable();
                    plan.joins.push(format!(
                        "{} {} {child} ON {alias}.{} = {child}.{}",
                        if outer { "LEFT JOIN" } else { "JOIN" },
                        target.name,
                        column.name(),
                        target.identity().name(),
                    ));
                    target.order_terms(&child, order == SortOrder::Desc, outer, plan);
                }
                _ => plan
                    .terms
                    .push(format!("{alias}.{} {}", column.name(), order.keyword())),
            }
        }
    }

    fn column_list(&self, alias: Option<&str>) -> String {
        let names: Vec<String> = self
            .columns
            .iter()
            .map(|c| match alias {
                Some(alias) => format!("{alias}.{}", c.name()),
                None => c.name().to_owned(),
            })
            .collect();
        names.join(", ")
    }

    /// `INSERT` with a placeholder for every column.
    pub fn insert_statement(&self) -> String {
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            self.name,
            self.column_list(None)
        )
    }

    /// `UPDATE` that sets only the columns present in `dirty`.
    ///
    /// Returns `None` when no column besides the identity is set.
    pub fn update_statement(&self, dirty: &RowValues) -> Option<String> {
        let assignments: Vec<String> = self
            .columns
            .iter()
            .skip(1)
            .filter(|c| dirty.contains(c.id()))
            .map(|c| format!("{} = ?", c.name()))
            .collect();
        if assignments.is_empty() {
            return None;
        }
        Some(format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.name,
            assignments.join(", "),
            self.identity().name()
        ))
    }

    /// `DELETE` of one row by identity.
    pub fn delete_statement(&self) -> String {
        format!("DELETE FROM {} WHERE {} = ?", self.name, self.identity().name())
    }

    /// `SELECT COUNT(*)` over the table.
    pub fn count_statement(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", self.name)
    }

    /// `DELETE` of every row.
    pub fn purge_statement(&self) -> String {
        format!("DELETE FROM {}", self.name)
    }

    /// Parameters for [`insert_statement`](Self::insert_statement).
    ///
    /// A nullable column that is not set binds null.
    ///
    /// # Errors
    ///
    /// Fails if a required column is not set or a value is rejected by its
    /// column codec.
    pub fn insert_params(&self, row: &RowValues) -> SchemaResult<Vec<SqlValue>> {
        self.columns
            .iter()
            .map(|column| match row.get(column.id()) {
                Some(value) => column.store(value),
                None => column.store(&Value::Null),
            })
            .collect()
    }

    /// Parameters for [`update_statement`](Self::update_statement), followed
    /// by the identity.
    ///
    /// # Errors
    ///
    /// Fails if a value is rejected by its column codec.
    pub fn update_params(&self, dirty: &RowValues, id: i64) -> SchemaResult<Vec<SqlValue>> {
        let mut params = Vec::with_capacity(dirty.len() + 1);
        for column in self.columns.iter().skip(1) {
            if let Some(value) = dirty.get(column.id()) {
                params.push(column.store(value)?);
            }
        }
        params.push(self.identity().store(&Value::Integer(id))?);
        Ok(params)
    }

    /// Decodes one row of [`load_query`](Self::load_query) output.
    ///
    /// # Errors
    ///
    /// Fails if the row width is wrong or a value cannot be decoded.
    pub fn decode_row(&self, raw: Vec<SqlValue>) -> SchemaResult<RowValues> {
        if raw.len() != self.columns.len() {
            return Err(SchemaError::decode(
                &self.name,
                format!("expected {} columns, got {}", self.columns.len(), raw.len()),
            ));
        }
        self.columns
            .iter()
            .zip(raw)
            .map(|(column, value)| Ok::<_, SchemaError>((column.id(), column.load(value)?)))
            .collect()
    }
}

fn sort_order(column: &Column) -> SortOrder {
    column.sort().unwrap_or(SortOrder::Asc)
}

fn sort_keyword(column: &Column) -> &'static str {
    sort_order(column).keyword()
}

#[derive(Default)]
struct JoinPlan {
    aliases: usize,
    joins: Vec<String>,
    terms: Vec<String>,
}

impl JoinPlan {
    /// `a`..`z`, then `aa`, `ab`, ...
    fn next_alias(&mut self) -> String {
        let mut n = self.aliases;
        self.aliases += 1;
        let mut out = Vec::new();
        loop {
            out.push(b'a' + (n % 26) as u8);
            if n < 26 {
                break;
            }
            n = n / 26 - 1;
        }
        out.reverse();
        String::from_utf8_lossy(&out).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn register(defs: Vec<TableDef>) -> HashMap<String, Arc<Table>> {
        let mut tables: HashMap<String, Arc<Table>> = HashMap::new();
        for def in defs {
            let table = Table::resolve(def, |name| tables.get(name).cloned()).unwrap();
            tables.insert(table.name().to_owned(), Arc::new(table));
        }
        tables
    }

    fn library() -> HashMap<String, Arc<Table>> {
        register(vec![
            TableDef::new("publisher", "id")
                .column(Column::text(ColumnId(1), "name", 60).ascending()),
            TableDef::new("author", "id")
                .column(Column::text(ColumnId(1), "last_name", 40).ascending())
                .column(Column::text(ColumnId(2), "first_name", 40).ascending())
                .column(Column::reference(ColumnId(3), "publisher", "publisher").nullable()),
            TableDef::new("book", "id")
                .column(Column::reference(ColumnId(1), "author", "author").ascending())
                .column(Column::text(ColumnId(2), "title", 80).ascending())
                .column(Column::integer(ColumnId(3), "pages"))
                .column(Column::decimal(ColumnId(4), "price", 8, 2).nullable()),
            TableDef::new("chapter", "id")
                .column(Column::reference(ColumnId(1), "book", "book").descending())
                .column(Column::integer(ColumnId(2), "number").ascending()),
        ])
    }

    #[test]
    fn ddl_statements() {
        let tables = library();
        let book = &tables["book"];
        assert_eq!(
            book.create_table(),
            "CREATE TABLE book (id INTEGER NOT NULL, author INTEGER NOT NULL, \
             title VARCHAR(80) NOT NULL, pages INTEGER NOT NULL, price VARCHAR(10), \
             CONSTRAINT pk_book PRIMARY KEY (id), \
             CONSTRAINT fk_book_author FOREIGN KEY (author) REFERENCES author (id))"
        );
        assert_eq!(
            book.create_index().unwrap(),
            "CREATE INDEX idx_book_order ON book (author ASC, title ASC)"
        );
        assert_eq!(book.drop_index().unwrap(), "DROP INDEX IF EXISTS idx_book_order");
        assert_eq!(book.drop_table(), "DROP TABLE IF EXISTS book");
    }

    #[test]
    fn unsorted_table_has_no_index() {
        let tables = register(vec![TableDef::new("tag", "id")
            .column(Column::text(ColumnId(1), "label", 20))]);
        let tag = &tables["tag"];
        assert!(tag.create_index().is_none());
        assert!(tag.drop_index().is_none());
        assert_eq!(tag.load_query(), "SELECT id, label FROM tag");
    }

    #[test]
    fn load_query_without_reference_sort() {
        let tables = library();
        assert!(!tables["author"].sorts_on_reference());
        assert_eq!(
            tables["author"].load_query(),
            "SELECT id, last_name, first_name, publisher FROM author \
             ORDER BY last_name ASC, first_name ASC"
        );
    }

    #[test]
    fn load_query_joins_referenced_sort_key() {
        let tables = library();
        assert!(tables["book"].sorts_on_reference());
        assert_eq!(
            tables["book"].load_query(),
            "SELECT a.id, a.author, a.title, a.pages, a.price FROM book a \
             JOIN author b ON a.author = b.id \
             ORDER BY b.last_name ASC, b.first_name ASC, a.title ASC"
        );
    }

    #[test]
    fn descending_reference_flips_inherited_terms() {
        let tables = library();
        assert_eq!(
            tables["chapter"].load_query(),
            "SELECT a.id, a.book, a.number FROM chapter a \
             JOIN book b ON a.book = b.id \
             JOIN author c ON b.author = c.id \
             ORDER BY c.last_name DESC, c.first_name DESC, b.title DESC, a.number ASC"
        );
    }

    #[test]
    fn nullable_reference_uses_left_join() {
        let tables = register(vec![
            TableDef::new("publisher", "publisher_id")
                .column(Column::text(ColumnId(1), "name", 60).ascending()),
            TableDef::new("imprint", "id")
                .column(Column::reference(ColumnId(1), "owner", "publisher").nullable().ascending())
                .column(Column::text(ColumnId(2), "name", 60).descending()),
        ]);
        assert_eq!(
            tables["imprint"].load_query(),
            "SELECT a.id, a.owner, a.name FROM imprint a \
             LEFT JOIN publisher b ON a.owner = b.publisher_id \
             ORDER BY b.name ASC, a.name DESC"
        );
    }

    #[test]
    fn reference_to_unsorted_table_orders_by_key() {
        let tables = register(vec![
            TableDef::new("shelf", "id").column(Column::integer(ColumnId(1), "floor")),
            TableDef::new("slot", "id")
                .column(Column::reference(ColumnId(1), "shelf", "shelf").ascending()),
        ]);
        assert_eq!(
            tables["slot"].load_query(),
            "SELECT a.id, a.shelf FROM slot a ORDER BY a.shelf ASC"
        );
    }

    #[test]
    fn dml_statements() {
        let tables = library();
        let book = &tables["book"];
        assert_eq!(
            book.insert_statement(),
            "INSERT INTO book (id, author, title, pages, price) VALUES (?, ?, ?, ?, ?)"
        );
        assert_eq!(book.delete_statement(), "DELETE FROM book WHERE id = ?");
        assert_eq!(book.count_statement(), "SELECT COUNT(*) FROM book");
        assert_eq!(book.purge_statement(), "DELETE FROM book");
    }

    #[test]
    fn update_sets_only_dirty_columns() {
        let tables = library();
        let book = &tables["book"];
        let dirty = RowValues::new()
            .with(ColumnId(4), Some(Decimal::new(1999, 2)))
            .with(ColumnId(3), 320i32);
        assert_eq!(
            book.update_statement(&dirty).unwrap(),
            "UPDATE book SET pages = ?, price = ? WHERE id = ?"
        );
        assert_eq!(
            book.update_params(&dirty, 7).unwrap(),
            vec![
                SqlValue::Integer(320),
                SqlValue::Text("19.99".into()),
                SqlValue::Integer(7)
            ]
        );

        assert!(book.update_statement(&RowValues::new()).is_none());
        let identity_only = RowValues::new().with(ColumnId::IDENTITY, 7i64);
        assert!(book.update_statement(&identity_only).is_none());
    }

    #[test]
    fn insert_params_require_values() {
        let tables = library();
        let book = &tables["book"];
        let row = RowValues::new()
            .with(ColumnId::IDENTITY, 1i64)
            .with(ColumnId(1), 4i64)
            .with(ColumnId(2), "Dune".to_owned())
            .with(ColumnId(3), 412i32);
        assert_eq!(
            book.insert_params(&row).unwrap(),
            vec![
                SqlValue::Integer(1),
                SqlValue::Integer(4),
                SqlValue::Text("Dune".into()),
                SqlValue::Integer(412),
                SqlValue::Null,
            ]
        );

        let mut missing = row;
        missing.take(ColumnId(2));
        assert_eq!(
            book.insert_params(&missing),
            Err(SchemaError::MissingValue {
                column: "title".into()
            })
        );
    }

    #[test]
    fn decode_row_checks_width() {
        let tables = library();
        let publisher = &tables["publisher"];
        let row = publisher
            .decode_row(vec![SqlValue::Integer(3), SqlValue::Text("Ace".into())])
            .unwrap();
        assert_eq!(row.get_as::<i64>(ColumnId::IDENTITY), Some(3));
        assert_eq!(row.get_as::<String>(ColumnId(1)).as_deref(), Some("Ace"));
        assert!(publisher.decode_row(vec![SqlValue::Integer(3)]).is_err());
    }

    #[test]
    fn unresolved_reference() {
        let err = Table::resolve(
            TableDef::new("book", "id").column(Column::reference(ColumnId(1), "author", "author")),
            |_| None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnresolvedReference {
                table: "book".into(),
                column: "author".into(),
                target: "author".into(),
            }
        );
    }

    #[test]
    fn validation_rejects_bad_definitions() {
        let cases = vec![
            TableDef::new("1book", "id"),
            TableDef::new("book", "id").column(Column::text(ColumnId(1), "bad name", 5)),
            TableDef::new("book", "id").column(Column::text(ColumnId(1), "ID", 5)),
            TableDef::new("book", "id")
                .column(Column::text(ColumnId(1), "a", 5))
                .column(Column::text(ColumnId(1), "b", 5)),
            TableDef::new("book", "id").column(Column::text(ColumnId(0), "a", 5)),
            TableDef::new("book", "id").column(Column::text(ColumnId(1), "a", 0)),
            TableDef::new("book", "id").column(Column::decimal(ColumnId(1), "a", 2, 3)),
            TableDef::new("book", "id").column(Column::decimal(ColumnId(1), "a", 40, 30)),
            TableDef::new("book", "id").column(Column::decimal(ColumnId(1), "a", u32::MAX, 0)),
            TableDef::new("book", "id").column(Column::identity("other")),
        ];
        for def in cases {
            assert!(
                matches!(def.validate(), Err(SchemaError::InvalidDefinition { .. })),
                "{def:?} should be rejected"
            );
        }
    }

    #[test]
    fn alias_sequence() {
        let mut plan = JoinPlan::default();
        let aliases: Vec<String> = (0..28).map(|_| plan.next_alias()).collect();
        assert_eq!(aliases[0], "a");
        assert_eq!(aliases[25], "z");
        assert_eq!(aliases[26], "aa");
        assert_eq!(aliases[27], "ab");
    }
}

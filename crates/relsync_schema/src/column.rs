//! Column descriptors and their value codecs.

use crate::error::{SchemaError, SchemaResult};
use crate::value::{Value, ValueKind};
use chrono::NaiveDate;
use relsync_store::SqlValue;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Largest DECIMAL precision a column may declare, the digit limit of
/// [`Decimal`].
pub const MAX_DECIMAL_PRECISION: u32 = 28;

/// Stable identifier of a column within its table.
///
/// Identifier 0 is reserved for the identity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnId(pub u16);

impl ColumnId {
    /// The identity column of every table.
    pub const IDENTITY: ColumnId = ColumnId(0);
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Sort direction of a sort-key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// SQL keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Returns the opposite direction when `flip` is set.
    #[must_use]
    pub fn flipped_if(self, flip: bool) -> Self {
        match (self, flip) {
            (SortOrder::Asc, true) => SortOrder::Desc,
            (SortOrder::Desc, true) => SortOrder::Asc,
            (order, false) => order,
        }
    }
}

/// The type tag of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// The primary key. Always slot 0 of a table.
    Identity,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Boolean stored as 0/1.
    Boolean,
    /// Date stored as `YYYY-MM-DD` text.
    Date,
    /// Text of at most `max` characters.
    Text {
        /// Maximum length in characters.
        max: usize,
    },
    /// Bytes of at most `max` length.
    Binary {
        /// Maximum length in bytes.
        max: usize,
    },
    /// Fixed-point decimal stored as text with exactly `scale` fraction digits.
    Decimal {
        /// Total significant digits.
        precision: u32,
        /// Fraction digits.
        scale: u32,
    },
    /// Foreign key to the identity column of `table`.
    Reference {
        /// Referenced table name.
        table: String,
    },
}

impl ColumnKind {
    /// The logical value kind this column holds.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            ColumnKind::Identity
            | ColumnKind::Integer
            | ColumnKind::BigInt
            | ColumnKind::Reference { .. } => ValueKind::Integer,
            ColumnKind::Boolean => ValueKind::Boolean,
            ColumnKind::Date => ValueKind::Date,
            ColumnKind::Text { .. } => ValueKind::Text,
            ColumnKind::Binary { .. } => ValueKind::Binary,
            ColumnKind::Decimal { .. } => ValueKind::Decimal,
        }
    }

    /// DDL type fragment.
    pub fn sql_type(&self) -> String {
        match self {
            ColumnKind::Identity | ColumnKind::Integer | ColumnKind::Reference { .. } => {
                "INTEGER".to_owned()
            }
            ColumnKind::BigInt => "BIGINT".to_owned(),
            ColumnKind::Boolean => "SMALLINT".to_owned(),
            ColumnKind::Date => "DATE".to_owned(),
            ColumnKind::Text { max } => format!("VARCHAR({max})"),
            ColumnKind::Binary { max } => format!("VARBINARY({max})"),
            // sign and decimal point
            ColumnKind::Decimal { precision, .. } => {
                format!("VARCHAR({})", precision.saturating_add(2))
            }
        }
    }
}

/// Metadata and codec for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    id: ColumnId,
    name: String,
    kind: ColumnKind,
    nullable: bool,
    sort: Option<SortOrder>,
}

impl Column {
    fn new(id: ColumnId, name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            nullable: false,
            sort: None,
        }
    }

    /// Creates the identity column.
    pub fn identity(name: impl Into<String>) -> Self {
        Self::new(ColumnId::IDENTITY, name, ColumnKind::Identity)
    }

    /// Creates a 32-bit integer column.
    pub fn integer(id: ColumnId, name: impl Into<String>) -> Self {
        Self::new(id, name, ColumnKind::Integer)
    }

    /// Creates a 64-bit integer column.
    pub fn bigint(id: ColumnId, name: impl Into<String>) -> Self {
        Self::new(id, name, ColumnKind::BigInt)
    }

    /// Creates a boolean column.
    pub fn boolean(id: ColumnId, name: impl Into<String>) -> Self {
        Self::new(id, name, ColumnKind::Boolean)
    }

    /// Creates a date column.
    pub fn date(id: ColumnId, name: impl Into<String>) -> Self {
        Self::new(id, name, ColumnKind::Date)
    }

    /// Creates a bounded text column.
    pub fn text(id: ColumnId, name: impl Into<String>, max: usize) -> Self {
        Self::new(id, name, ColumnKind::Text { max })
    }

    /// Creates a bounded binary column.
    pub fn binary(id: ColumnId, name: impl Into<String>, max: usize) -> Self {
        Self::new(id, name, ColumnKind::Binary { max })
    }

    /// Creates a decimal column stored as text.
    pub fn decimal(id: ColumnId, name: impl Into<String>, precision: u32, scale: u32) -> Self {
        Self::new(id, name, ColumnKind::Decimal { precision, scale })
    }

    /// Creates a reference to the identity column of `table`.
    pub fn reference(id: ColumnId, name: impl Into<String>, table: impl Into<String>) -> Self {
        Self::new(
            id,
            name,
            ColumnKind::Reference {
                table: table.into(),
            },
        )
    }

    /// Marks the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Makes the column part of the table's sort key.
    #[must_use]
    pub fn sorted(mut self, order: SortOrder) -> Self {
        self.sort = Some(order);
        self
    }

    /// Shorthand for `sorted(SortOrder::Asc)`.
    #[must_use]
    pub fn ascending(self) -> Self {
        self.sorted(SortOrder::Asc)
    }

    /// Shorthand for `sorted(SortOrder::Desc)`.
    #[must_use]
    pub fn descending(self) -> Self {
        self.sorted(SortOrder::Desc)
    }

    /// Column identifier.
    pub fn id(&self) -> ColumnId {
        self.id
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type tag.
    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    /// Whether the column accepts null.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Sort direction, if the column is a sort key.
    pub fn sort(&self) -> Option<SortOrder> {
        self.sort
    }

    /// Whether this is the identity column.
    pub fn is_identity(&self) -> bool {
        matches!(self.kind, ColumnKind::Identity)
    }

    /// Target table name, for reference columns.
    pub fn referenced_table(&self) -> Option<&str> {
        match &self.kind {
            ColumnKind::Reference { table } => Some(table),
            _ => None,
        }
    }

    /// Column definition fragment for `CREATE TABLE`.
    pub fn ddl(&self) -> String {
        if self.nullable {
            format!("{} {}", self.name, self.kind.sql_type())
        } else {
            format!("{} {} NOT NULL", self.name, self.kind.sql_type())
        }
    }

    /// Table constraint contributed by this column.
    ///
    /// The identity column yields the primary key. A reference column yields
    /// a foreign key on `target_identity` of its referenced table.
    pub fn constraint(&self, table: &str, target_identity: Option<&str>) -> Option<String> {
        match &self.kind {
            ColumnKind::Identity => Some(format!(
                "CONSTRAINT pk_{table} PRIMARY KEY ({})",
                self.name
            )),
            ColumnKind::Reference { table: target } => Some(format!(
                "CONSTRAINT fk_{table}_{name} FOREIGN KEY ({name}) \
                 REFERENCES {target} ({identity})",
                name = self.name,
                identity = target_identity.unwrap_or("id"),
            )),
            _ => None,
        }
    }

    /// Lowers a logical value to a statement parameter.
    ///
    /// # Errors
    ///
    /// Fails when a non-nullable column gets null, when the kind does not
    /// match, or when the value exceeds the column bounds.
    pub fn store(&self, value: &Value) -> SchemaResult<SqlValue> {
        let Some(kind) = value.kind() else {
            return if self.nullable {
                Ok(SqlValue::Null)
            } else {
                Err(SchemaError::MissingValue {
                    column: self.name.clone(),
                })
            };
        };
        if kind != self.kind.value_kind() {
            return Err(self.mismatch(value.kind_name()));
        }

        match (&self.kind, value) {
            (ColumnKind::Integer, Value::Integer(v)) => {
                if i32::try_from(*v).is_err() {
                    return Err(SchemaError::out_of_range(
                        &self.name,
                        format!("{v} does not fit INTEGER"),
                    ));
                }
                Ok(SqlValue::Integer(*v))
            }
            (_, Value::Integer(v)) => Ok(SqlValue::Integer(*v)),
            (_, Value::Boolean(b)) => Ok(SqlValue::Integer(i64::from(*b))),
            (_, Value::Date(d)) => Ok(SqlValue::Text(d.format(DATE_FORMAT).to_string())),
            (ColumnKind::Text { max }, Value::Text(s)) => {
                let len = s.chars().count();
                self.check_len(*max, len)?;
                Ok(SqlValue::Text(s.clone()))
            }
            (ColumnKind::Binary { max }, Value::Binary(b)) => {
                self.check_len(*max, b.len())?;
                Ok(SqlValue::Blob(b.clone()))
            }
            (ColumnKind::Decimal { precision, scale }, Value::Decimal(d)) => {
                self.format_decimal(*d, *precision, *scale).map(SqlValue::Text)
            }
            _ => Err(self.mismatch(value.kind_name())),
        }
    }

    /// Raises a wire value read from the store to a logical value.
    ///
    /// # Errors
    ///
    /// Fails when the wire shape does not match the column or the stored
    /// text cannot be parsed.
    pub fn load(&self, raw: SqlValue) -> SchemaResult<Value> {
        if raw.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(SchemaError::decode(&self.name, "unexpected NULL"))
            };
        }

        match (&self.kind, raw) {
            (
                ColumnKind::Identity
                | ColumnKind::Integer
                | ColumnKind::BigInt
                | ColumnKind::Reference { .. },
                SqlValue::Integer(v),
            ) => Ok(Value::Integer(v)),
            (ColumnKind::Boolean, SqlValue::Integer(v)) => match v {
                0 => Ok(Value::Boolean(false)),
                1 => Ok(Value::Boolean(true)),
                other => Err(SchemaError::decode(
                    &self.name,
                    format!("{other} is not a boolean"),
                )),
            },
            (ColumnKind::Date, SqlValue::Text(s)) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| SchemaError::decode(&self.name, format!("{s:?}: {e}"))),
            (ColumnKind::Text { .. }, SqlValue::Text(s)) => Ok(Value::Text(s)),
            (ColumnKind::Binary { .. }, SqlValue::Blob(b)) => Ok(Value::Binary(b)),
            (ColumnKind::Decimal { .. }, SqlValue::Text(s)) => Decimal::from_str(&s)
                .map(Value::Decimal)
                .map_err(|e| SchemaError::decode(&self.name, format!("{s:?}: {e}"))),
            (_, other) => Err(SchemaError::decode(
                &self.name,
                format!("unexpected {} for {}", other.type_name(), self.kind.sql_type()),
            )),
        }
    }

    fn format_decimal(&self, value: Decimal, precision: u32, scale: u32) -> SchemaResult<String> {
        let mut rounded =
            value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(scale);

        let whole = rounded.trunc().abs();
        let digits = if whole.is_zero() {
            0
        } else {
            whole.to_string().len() as u32
        };
        let allowed = precision.saturating_sub(scale);
        if digits > allowed {
            return Err(SchemaError::out_of_range(
                &self.name,
                format!("{value} exceeds DECIMAL({precision}, {scale})"),
            ));
        }
        Ok(rounded.to_string())
    }

    fn check_len(&self, max: usize, actual: usize) -> SchemaResult<()> {
        if actual > max {
            Err(SchemaError::ValueTooLong {
                column: self.name.clone(),
                max,
                actual,
            })
        } else {
            Ok(())
        }
    }

    fn mismatch(&self, actual: &'static str) -> SchemaError {
        SchemaError::TypeMismatch {
            column: self.name.clone(),
            expected: self.kind.value_kind().name(),
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn ddl_fragments() {
        assert_eq!(Column::identity("id").ddl(), "id INTEGER NOT NULL");
        assert_eq!(
            Column::text(ColumnId(1), "title", 80).ddl(),
            "title VARCHAR(80) NOT NULL"
        );
        assert_eq!(
            Column::decimal(ColumnId(2), "price", 8, 2).nullable().ddl(),
            "price VARCHAR(10)"
        );
        assert_eq!(
            Column::binary(ColumnId(3), "cover", 256).ddl(),
            "cover VARBINARY(256) NOT NULL"
        );
        assert_eq!(Column::boolean(ColumnId(4), "flag").ddl(), "flag SMALLINT NOT NULL");
        assert_eq!(Column::date(ColumnId(5), "born").ddl(), "born DATE NOT NULL");
    }

    #[test]
    fn constraints() {
        assert_eq!(
            Column::identity("id").constraint("book", None).unwrap(),
            "CONSTRAINT pk_book PRIMARY KEY (id)"
        );
        assert_eq!(
            Column::reference(ColumnId(1), "author", "author")
                .constraint("book", Some("author_id"))
                .unwrap(),
            "CONSTRAINT fk_book_author FOREIGN KEY (author) REFERENCES author (author_id)"
        );
        assert!(Column::integer(ColumnId(2), "pages").constraint("book", None).is_none());
    }

    #[test]
    fn null_handling() {
        let required = Column::text(ColumnId(1), "title", 10);
        assert_eq!(
            required.store(&Value::Null),
            Err(SchemaError::MissingValue {
                column: "title".into()
            })
        );
        assert!(required.load(SqlValue::Null).is_err());

        let optional = Column::text(ColumnId(1), "isbn", 13).nullable();
        assert_eq!(optional.store(&Value::Null).unwrap(), SqlValue::Null);
        assert_eq!(optional.load(SqlValue::Null).unwrap(), Value::Null);
    }

    #[test]
    fn rejects_wrong_kind_and_length() {
        let title = Column::text(ColumnId(1), "title", 3);
        assert!(matches!(
            title.store(&Value::Integer(1)),
            Err(SchemaError::TypeMismatch { expected: "text", actual: "integer", .. })
        ));
        assert!(matches!(
            title.store(&Value::Text("abcd".into())),
            Err(SchemaError::ValueTooLong { max: 3, actual: 4, .. })
        ));
        // bound counts characters, not bytes
        assert!(title.store(&Value::Text("äöü".into())).is_ok());

        let pages = Column::integer(ColumnId(2), "pages");
        assert!(matches!(
            pages.store(&Value::Integer(i64::from(i32::MAX) + 1)),
            Err(SchemaError::ValueOutOfRange { .. })
        ));
        assert!(Column::bigint(ColumnId(2), "size")
            .store(&Value::Integer(i64::MAX))
            .is_ok());
    }

    #[test]
    fn oversized_decimal_ddl_saturates() {
        let huge = Column::decimal(ColumnId(1), "x", u32::MAX, 0);
        assert_eq!(huge.ddl(), format!("x VARCHAR({}) NOT NULL", u32::MAX));
    }

    #[test]
    fn decimal_is_stored_as_fixed_text() {
        let price = Column::decimal(ColumnId(1), "price", 6, 2);
        assert_eq!(
            price.store(&Value::Decimal(dec("12.5"))).unwrap(),
            SqlValue::Text("12.50".into())
        );
        assert_eq!(
            price.store(&Value::Decimal(dec("0.125"))).unwrap(),
            SqlValue::Text("0.13".into())
        );
        assert_eq!(
            price.store(&Value::Decimal(dec("-3"))).unwrap(),
            SqlValue::Text("-3.00".into())
        );
        assert!(price.store(&Value::Decimal(dec("9999.99"))).is_ok());
        assert!(matches!(
            price.store(&Value::Decimal(dec("10000"))),
            Err(SchemaError::ValueOutOfRange { .. })
        ));
        assert_eq!(
            price.load(SqlValue::Text("12.50".into())).unwrap(),
            Value::Decimal(dec("12.50"))
        );
        assert!(price.load(SqlValue::Text("twelve".into())).is_err());
    }

    #[test]
    fn date_and_boolean_codecs() {
        let born = Column::date(ColumnId(1), "born");
        let day = NaiveDate::from_ymd_opt(1965, 7, 31).unwrap();
        let stored = born.store(&Value::Date(day)).unwrap();
        assert_eq!(stored, SqlValue::Text("1965-07-31".into()));
        assert_eq!(born.load(stored).unwrap(), Value::Date(day));
        assert!(born.load(SqlValue::Text("31/07/1965".into())).is_err());

        let flag = Column::boolean(ColumnId(2), "in_print");
        assert_eq!(flag.store(&Value::Boolean(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(flag.load(SqlValue::Integer(0)).unwrap(), Value::Boolean(false));
        assert!(flag.load(SqlValue::Integer(2)).is_err());
    }

    #[test]
    fn load_rejects_wrong_wire_shape() {
        let pages = Column::integer(ColumnId(1), "pages");
        assert!(matches!(
            pages.load(SqlValue::Text("12".into())),
            Err(SchemaError::Decode { .. })
        ));
    }

    #[test]
    fn sort_order_flip() {
        assert_eq!(SortOrder::Asc.flipped_if(true), SortOrder::Desc);
        assert_eq!(SortOrder::Desc.flipped_if(true), SortOrder::Asc);
        assert_eq!(SortOrder::Desc.flipped_if(false), SortOrder::Desc);
    }

    proptest! {
        #[test]
        fn decimal_reload_is_stable(units in -99_999_999i64..99_999_999, scale in 0u32..4) {
            let column = Column::decimal(ColumnId(1), "amount", 12, 2);
            let value = Decimal::new(units, scale);
            let stored = column.store(&Value::Decimal(value)).unwrap();
            let text = stored.as_text().unwrap().to_owned();
            prop_assert_eq!(text.split('.').nth(1).map(str::len), Some(2));

            let loaded = column.load(stored).unwrap();
            prop_assert_eq!(column.store(&loaded).unwrap(), SqlValue::Text(text));
        }

        #[test]
        fn text_within_bound_round_trips(s in "[a-zA-Z0-9 ]{0,24}") {
            let column = Column::text(ColumnId(1), "name", 24);
            let stored = column.store(&Value::Text(s.clone())).unwrap();
            prop_assert_eq!(column.load(stored).unwrap(), Value::Text(s));
        }
    }
}

//! Logical column values.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;

/// The logical kind of a non-null value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Signed integer (also used for identities and references).
    Integer,
    /// Boolean flag.
    Boolean,
    /// Calendar date.
    Date,
    /// Text.
    Text,
    /// Raw bytes.
    Binary,
    /// Fixed-point decimal.
    Decimal,
}

impl ValueKind {
    /// Lower-case name, for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
            ValueKind::Text => "text",
            ValueKind::Binary => "binary",
            ValueKind::Decimal => "decimal",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A logical value held by an entity field.
///
/// Columns lower these onto [`relsync_store::SqlValue`] at store time and
/// raise them back at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// The distinguished "absent" value.
    Null,
    /// Signed integer.
    Integer(i64),
    /// Boolean flag.
    Boolean(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Text.
    Text(String),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// Fixed-point decimal.
    Decimal(Decimal),
}

impl Value {
    /// Returns the kind, or `None` for [`Value::Null`].
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(ValueKind::Integer),
            Value::Boolean(_) => Some(ValueKind::Boolean),
            Value::Date(_) => Some(ValueKind::Date),
            Value::Text(_) => Some(ValueKind::Text),
            Value::Binary(_) => Some(ValueKind::Binary),
            Value::Decimal(_) => Some(ValueKind::Decimal),
        }
    }

    /// Name of the kind, `"null"` for [`Value::Null`].
    pub fn kind_name(&self) -> &'static str {
        self.kind().map_or("null", ValueKind::name)
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer, if this is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

/// A Rust type that can sit behind a column.
///
/// `Option<T>` maps `None` to [`Value::Null`]; every other implementation
/// rejects null.
pub trait ColumnValue: Sized {
    /// The logical kind this type converts to.
    const KIND: ValueKind;
    /// Whether the type can represent null.
    const NULLABLE: bool = false;

    /// Converts into a logical value.
    fn into_value(self) -> Value;

    /// Converts from a logical value, returning `None` on a kind mismatch.
    fn from_value(value: Value) -> Option<Self>;
}

impl ColumnValue for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn into_value(self) -> Value {
        Value::Integer(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_integer()
    }
}

impl ColumnValue for i32 {
    const KIND: ValueKind = ValueKind::Integer;

    fn into_value(self) -> Value {
        Value::Integer(i64::from(self))
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_integer().and_then(|v| i32::try_from(v).ok())
    }
}

impl ColumnValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn into_value(self) -> Value {
        Value::Boolean(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }
}

impl ColumnValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl ColumnValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Binary;

    fn into_value(self) -> Value {
        Value::Binary(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }
}

impl ColumnValue for NaiveDate {
    const KIND: ValueKind = ValueKind::Date;

    fn into_value(self) -> Value {
        Value::Date(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }
}

impl ColumnValue for Decimal {
    const KIND: ValueKind = ValueKind::Decimal;

    fn into_value(self) -> Value {
        Value::Decimal(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Decimal(d) => Some(d),
            _ => None,
        }
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NULLABLE: bool = true;

    fn into_value(self) -> Value {
        self.map_or(Value::Null, ColumnValue::into_value)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kinds() {
        assert_eq!(Value::Null.kind(), None);
        assert_eq!(Value::Null.kind_name(), "null");
        assert_eq!(Value::Text("a".into()).kind(), Some(ValueKind::Text));
        assert_eq!(
            Value::Decimal(Decimal::from_str("1.5").unwrap()).kind_name(),
            "decimal"
        );
    }

    #[test]
    fn option_maps_null() {
        assert_eq!(None::<String>.into_value(), Value::Null);
        assert_eq!(Option::<String>::from_value(Value::Null), Some(None));
        assert_eq!(
            Option::<i64>::from_value(Value::Integer(3)),
            Some(Some(3))
        );
        assert_eq!(String::from_value(Value::Null), None);
        assert!(<Option<bool> as ColumnValue>::NULLABLE);
        assert!(!<bool as ColumnValue>::NULLABLE);
    }

    #[test]
    fn i32_rejects_wide_values() {
        assert_eq!(i32::from_value(Value::Integer(7)), Some(7));
        assert_eq!(i32::from_value(Value::Integer(i64::MAX)), None);
    }
}

//! Per-row column value maps.

use crate::column::ColumnId;
use crate::value::{ColumnValue, Value};
use std::collections::BTreeMap;

/// Column values for one row, keyed by column id.
///
/// A column that is absent from the map is "not set". This is different
/// from a column that is set to [`Value::Null`]. Update statements are
/// built from the set columns only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowValues {
    values: BTreeMap<ColumnId, Value>,
}

impl RowValues {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column, replacing any previous value.
    pub fn set(&mut self, column: ColumnId, value: Value) {
        self.values.insert(column, value);
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, column: ColumnId, value: impl ColumnValue) -> Self {
        self.values.insert(column, value.into_value());
        self
    }

    /// Returns the value of a column, if set.
    pub fn get(&self, column: ColumnId) -> Option<&Value> {
        self.values.get(&column)
    }

    /// Returns a column converted to `T`.
    ///
    /// `None` if the column is not set or holds a different kind.
    pub fn get_as<T: ColumnValue>(&self, column: ColumnId) -> Option<T> {
        self.values.get(&column).cloned().and_then(T::from_value)
    }

    /// Removes a column, returning its value.
    pub fn take(&mut self, column: ColumnId) -> Option<Value> {
        self.values.remove(&column)
    }

    /// Whether the column is set.
    pub fn contains(&self, column: ColumnId) -> bool {
        self.values.contains_key(&column)
    }

    /// Number of set columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no column is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates set columns in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ColumnId, &Value)> {
        self.values.iter().map(|(id, v)| (*id, v))
    }

    /// Ids of the set columns, in id order.
    pub fn columns(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.values.keys().copied()
    }

    /// Returns the columns of `self` whose value differs from `snapshot`.
    ///
    /// Columns missing from `snapshot` count as changed. The identity column
    /// is never part of the result.
    #[must_use]
    pub fn changed_from(&self, snapshot: &RowValues) -> RowValues {
        let values = self
            .values
            .iter()
            .filter(|(id, _)| **id != ColumnId::IDENTITY)
            .filter(|(id, value)| snapshot.get(**id) != Some(*value))
            .map(|(id, value)| (*id, value.clone()))
            .collect();
        RowValues { values }
    }
}

impl FromIterator<(ColumnId, Value)> for RowValues {
    fn from_iter<I: IntoIterator<Item = (ColumnId, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

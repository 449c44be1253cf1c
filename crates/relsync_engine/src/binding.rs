//! Entity bindings and typed accessor tables.

use crate::error::{EngineError, EngineResult};
use crate::state::EntityList;
use relsync_schema::{ColumnId, ColumnValue, RowValues, Table, TableDef, Value, ValueKind};
use std::collections::HashSet;

struct Accessor<E> {
    column: ColumnId,
    kind: ValueKind,
    nullable: bool,
    get: Box<dyn Fn(&E) -> Value>,
    set: Box<dyn Fn(&mut E, Value) -> bool>,
}

/// Getter and setter pairs, one per non-identity column.
///
/// The identity column is not part of the table: the engine takes it from
/// the tracked item and hands it to [`EntityBinding::blank`].
///
/// # Example
///
/// ```rust
/// use relsync_engine::Fields;
/// use relsync_schema::ColumnId;
///
/// #[derive(Clone, Default)]
/// struct Tag {
///     label: String,
///     weight: Option<i64>,
/// }
///
/// let fields = Fields::<Tag>::new()
///     .field(ColumnId(1), |t| t.label.clone(), |t, v| t.label = v)
///     .field(ColumnId(2), |t| t.weight, |t, v| t.weight = v);
/// assert_eq!(fields.len(), 2);
/// ```
pub struct Fields<E> {
    accessors: Vec<Accessor<E>>,
}

impl<E> std::fmt::Debug for Fields<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.accessors.iter().map(|a| (a.column, a.kind, a.nullable)))
            .finish()
    }
}

impl<E: 'static> Default for Fields<E> {
    fn default() -> Self {
        Self {
            accessors: Vec::new(),
        }
    }
}

impl<E: 'static> Fields<E> {
    /// Creates an empty accessor table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the accessor pair for `column`.
    ///
    /// `T` fixes the value kind and, through `Option<T>`, the nullability.
    #[must_use]
    pub fn field<T: ColumnValue + 'static>(
        mut self,
        column: ColumnId,
        get: fn(&E) -> T,
        set: fn(&mut E, T),
    ) -> Self {
        self.accessors.push(Accessor {
            column,
            kind: T::KIND,
            nullable: T::NULLABLE,
            get: Box::new(move |entity| get(entity).into_value()),
            set: Box::new(move |entity, value| match T::from_value(value) {
                Some(v) => {
                    set(entity, v);
                    true
                }
                None => false,
            }),
        });
        self
    }

    /// Number of accessors.
    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    /// Whether the table has no accessor.
    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    /// Checks that every non-identity column of `table` has exactly one
    /// accessor of the matching kind and nullability.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Binding`] for the first mismatch.
    pub fn validate(&self, table: &Table) -> EngineResult<()> {
        let mut seen = HashSet::new();
        for accessor in &self.accessors {
            let Some(column) = table.column(accessor.column) else {
                return Err(EngineError::binding(
                    table.name(),
                    format!("accessor for unknown column {}", accessor.column),
                ));
            };
            if column.is_identity() {
                return Err(EngineError::binding(
                    table.name(),
                    "the identity column has no accessor",
                ));
            }
            if !seen.insert(accessor.column) {
                return Err(EngineError::binding(
                    table.name(),
                    format!("duplicate accessor for column {}", column.name()),
                ));
            }
            let expected = column.kind().value_kind();
            if accessor.kind != expected || accessor.nullable != column.is_nullable() {
                return Err(EngineError::binding(
                    table.name(),
                    format!(
                        "column {} is {}{}, accessor is {}{}",
                        column.name(),
                        if column.is_nullable() { "optional " } else { "" },
                        expected,
                        if accessor.nullable { "optional " } else { "" },
                        accessor.kind,
                    ),
                ));
            }
        }

        if let Some(missing) = table
            .columns()
            .iter()
            .skip(1)
            .find(|c| !seen.contains(&c.id()))
        {
            return Err(EngineError::binding(
                table.name(),
                format!("no accessor for column {}", missing.name()),
            ));
        }
        Ok(())
    }

    /// Reads the identity and every field into a row map.
    pub fn read(&self, id: i64, entity: &E) -> RowValues {
        let mut row = RowValues::new();
        row.set(ColumnId::IDENTITY, Value::Integer(id));
        for accessor in &self.accessors {
            row.set(accessor.column, (accessor.get)(entity));
        }
        row
    }

    /// Writes every field from a decoded row.
    ///
    /// # Errors
    ///
    /// Fails if a column is missing from the row or holds the wrong kind.
    pub fn write(&self, table: &str, entity: &mut E, row: &mut RowValues) -> EngineResult<()> {
        for accessor in &self.accessors {
            let value = row.take(accessor.column).ok_or_else(|| {
                EngineError::binding(table, format!("row has no column {}", accessor.column))
            })?;
            if !(accessor.set)(entity, value) {
                return Err(EngineError::binding(
                    table,
                    format!("column {} does not hold {}", accessor.column, accessor.kind),
                ));
            }
        }
        Ok(())
    }
}

/// Connects one entity type of dataset `D` to its table.
///
/// A binding supplies the table definition, the accessor table, and the
/// list that holds the entities inside the dataset.
pub trait EntityBinding<D>: 'static {
    /// The entity type.
    type Entity: Clone + 'static;

    /// The table definition.
    fn table(&self) -> TableDef;

    /// The accessor table, validated once at registration.
    fn fields(&self) -> Fields<Self::Entity>;

    /// The entity list inside the dataset.
    fn list<'a>(&self, data: &'a D) -> &'a EntityList<Self::Entity>;

    /// Mutable access to the entity list.
    fn list_mut<'a>(&self, data: &'a mut D) -> &'a mut EntityList<Self::Entity>;

    /// A blank entity with the given identity, filled by the accessors.
    fn blank(&self, id: i64) -> Self::Entity;

    /// Completes a loaded entity against the partially loaded dataset.
    ///
    /// Tables load in dependency order, so every referenced table is
    /// already complete here.
    fn attach(&self, _entity: &mut Self::Entity, _data: &D) -> EngineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsync_schema::{Column, Schema};

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Note {
        text: String,
        stars: Option<i32>,
        pinned: bool,
    }

    fn table() -> std::sync::Arc<Table> {
        let mut schema = Schema::new();
        schema
            .register(
                TableDef::new("note", "id")
                    .column(Column::text(ColumnId(1), "text", 100))
                    .column(Column::integer(ColumnId(2), "stars").nullable())
                    .column(Column::boolean(ColumnId(3), "pinned")),
            )
            .unwrap();
        schema.get("note").unwrap().clone()
    }

    fn fields() -> Fields<Note> {
        Fields::new()
            .field(ColumnId(1), |n: &Note| n.text.clone(), |n, v| n.text = v)
            .field(ColumnId(2), |n: &Note| n.stars, |n, v| n.stars = v)
            .field(ColumnId(3), |n: &Note| n.pinned, |n, v| n.pinned = v)
    }

    #[test]
    fn valid_table_passes() {
        fields().validate(&table()).unwrap();
    }

    #[test]
    fn read_then_write() {
        let fields = fields();
        let note = Note {
            text: "hello".into(),
            stars: Some(4),
            pinned: true,
        };
        let mut row = fields.read(7, &note);
        assert_eq!(row.get_as::<i64>(ColumnId::IDENTITY), Some(7));

        let mut copy = Note::default();
        fields.write("note", &mut copy, &mut row).unwrap();
        assert_eq!(copy, note);
    }

    #[test]
    fn missing_accessor() {
        let fields = Fields::<Note>::new()
            .field(ColumnId(1), |n: &Note| n.text.clone(), |n, v| n.text = v)
            .field(ColumnId(3), |n: &Note| n.pinned, |n, v| n.pinned = v);
        let err = fields.validate(&table()).unwrap_err();
        assert!(err.to_string().contains("no accessor for column stars"), "{err}");
    }

    #[test]
    fn wrong_kind_or_nullability() {
        let wrong_kind = Fields::<Note>::new()
            .field(ColumnId(1), |n: &Note| n.pinned, |n, v| n.pinned = v)
            .field(ColumnId(2), |n: &Note| n.stars, |n, v| n.stars = v)
            .field(ColumnId(3), |n: &Note| n.pinned, |n, v| n.pinned = v);
        assert!(matches!(
            wrong_kind.validate(&table()),
            Err(EngineError::Binding { .. })
        ));

        let not_optional = Fields::<Note>::new()
            .field(ColumnId(1), |n: &Note| n.text.clone(), |n, v| n.text = v)
            .field(ColumnId(2), |n: &Note| n.stars.unwrap_or(0), |n, v| n.stars = Some(v))
            .field(ColumnId(3), |n: &Note| n.pinned, |n, v| n.pinned = v);
        assert!(not_optional.validate(&table()).is_err());
    }

    #[test]
    fn unknown_and_duplicate_columns() {
        let unknown = fields().field(ColumnId(9), |n: &Note| n.pinned, |n, v| n.pinned = v);
        assert!(unknown.validate(&table()).is_err());

        let duplicate = fields().field(ColumnId(3), |n: &Note| n.pinned, |n, v| n.pinned = v);
        assert!(duplicate
            .validate(&table())
            .unwrap_err()
            .to_string()
            .contains("duplicate accessor"));
    }
}

//! Ordered table registry and dependency sorting.

use crate::error::{SchemaError, SchemaResult};
use crate::table::{Table, TableDef};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use std::sync::Arc;

/// Tables in registration order.
///
/// Registration order is a dependency order: a table is accepted only after
/// every table it references. Name matching is case-insensitive.
///
/// # Example
///
/// ```rust
/// use relsync_schema::{Column, ColumnId, Schema, SchemaError, TableDef};
///
/// let author = TableDef::new("author", "id").column(Column::text(ColumnId(1), "name", 40));
/// let book = TableDef::new("book", "id")
///     .column(Column::reference(ColumnId(1), "author", "author"));
///
/// let mut schema = Schema::new();
/// assert!(matches!(
///     schema.register(book.clone()),
///     Err(SchemaError::UnresolvedReference { .. })
/// ));
/// schema.register(author).unwrap();
/// schema.register(book).unwrap();
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: Vec<Arc<Table>>,
    by_name: HashMap<String, usize>,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl Schema {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates, resolves and appends a table.
    ///
    /// Returns the slot of the new table.
    ///
    /// # Errors
    ///
    /// Fails on an invalid definition, a duplicate name, or a reference to a
    /// table that is not registered yet.
    pub fn register(&mut self, def: TableDef) -> SchemaResult<usize> {
        let table = self.resolve(def)?;
        self.insert(Arc::new(table))
    }

    /// Validates and resolves a definition against the registered tables
    /// without registering it.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn resolve(&self, def: TableDef) -> SchemaResult<Table> {
        self.ensure_new(def.name())?;
        Table::resolve(def, |name| self.get(name).cloned())
    }

    /// Appends a table produced by [`resolve`](Self::resolve).
    ///
    /// # Errors
    ///
    /// Fails if the name is taken or a referenced table is not registered
    /// here.
    pub fn insert(&mut self, table: Arc<Table>) -> SchemaResult<usize> {
        self.ensure_new(table.name())?;
        for column in table.columns() {
            if let Some(target) = column.referenced_table() {
                if self.get(target).is_none() {
                    return Err(SchemaError::UnresolvedReference {
                        table: table.name().to_owned(),
                        column: column.name().to_owned(),
                        target: target.to_owned(),
                    });
                }
            }
        }
        let slot = self.tables.len();
        tracing::debug!(table = table.name(), slot, "registered table");
        self.by_name.insert(key(table.name()), slot);
        self.tables.push(table);
        Ok(slot)
    }

    fn ensure_new(&self, name: &str) -> SchemaResult<()> {
        if self.by_name.contains_key(&key(name)) {
            Err(SchemaError::DuplicateTable {
                name: name.to_owned(),
            })
        } else {
            Ok(())
        }
    }

    /// Returns a permutation of `defs` in which every table follows the
    /// tables it references.
    ///
    /// Tables already registered in this schema satisfy references too.
    /// Among independent tables the input order is kept.
    ///
    /// # Errors
    ///
    /// Fails on a reference cycle (including a self-reference), a duplicate
    /// name, or a reference to a table that is neither in `defs` nor
    /// registered.
    pub fn dependency_order(&self, defs: &[TableDef]) -> SchemaResult<Vec<usize>> {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
        for (position, def) in defs.iter().enumerate() {
            let node = graph.add_node(position);
            if nodes.insert(key(def.name()), node).is_some() || self.get(def.name()).is_some() {
                return Err(SchemaError::DuplicateTable {
                    name: def.name().to_owned(),
                });
            }
        }

        for (position, def) in defs.iter().enumerate() {
            let child = NodeIndex::new(position);
            for column in def.columns() {
                let Some(target) = column.referenced_table() else {
                    continue;
                };
                match nodes.get(&key(target)) {
                    Some(parent) => {
                        graph.update_edge(*parent, child, ());
                    }
                    None if self.get(target).is_some() => {}
                    None => {
                        return Err(SchemaError::UnresolvedReference {
                            table: def.name().to_owned(),
                            column: column.name().to_owned(),
                            target: target.to_owned(),
                        })
                    }
                }
            }
        }

        toposort(&graph, None).map_err(|cycle| SchemaError::DependencyCycle {
            table: defs[graph[cycle.node_id()]].name().to_owned(),
        })?;

        // Acyclic from here. Take the earliest ready table each round so that
        // independent tables keep their input order.
        let mut order = Vec::with_capacity(defs.len());
        let mut remaining: Vec<usize> = (0..defs.len()).collect();
        let mut indegree: Vec<usize> = (0..defs.len())
            .map(|i| {
                graph
                    .neighbors_directed(NodeIndex::new(i), Direction::Incoming)
                    .count()
            })
            .collect();
        while !remaining.is_empty() {
            let Some(pick) = remaining.iter().position(|i| indegree[*i] == 0) else {
                break;
            };
            let next = remaining.remove(pick);
            let children = graph.neighbors_directed(NodeIndex::new(next), Direction::Outgoing);
            for child in children {
                indegree[child.index()] -= 1;
            }
            order.push(next);
        }
        Ok(order)
    }

    /// Looks up a table by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Table>> {
        self.by_name.get(&key(name)).map(|slot| &self.tables[*slot])
    }

    /// Looks up a table by name, failing if it is not registered.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownTable`].
    pub fn require(&self, name: &str) -> SchemaResult<&Arc<Table>> {
        self.get(name).ok_or_else(|| SchemaError::UnknownTable {
            name: name.to_owned(),
        })
    }

    /// Slot of a table in registration order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(&key(name)).copied()
    }

    /// Tables in registration order.
    pub fn tables(&self) -> impl DoubleEndedIterator<Item = &Arc<Table>> + ExactSizeIterator {
        self.tables.iter()
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table is registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// The full `CREATE` script in registration order, one statement per line.
    pub fn ddl_script(&self) -> String {
        let mut script = String::new();
        for table in &self.tables {
            script.push_str(&table.create_table());
            script.push_str(";\n");
            if let Some(index) = table.create_index() {
                script.push_str(&index);
                script.push_str(";\n");
            }
        }
        script
    }
}

//! Per-item lifecycle tracking.

use crate::error::{EngineError, EngineResult};
use std::fmt;

/// Lifecycle state of an in-memory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    /// Matches the store.
    Clean,
    /// Created, not yet persisted.
    New,
    /// Persisted, fields differ from the last-persisted snapshot.
    Changed,
    /// Persisted, marked for removal.
    Deleted,
    /// Created and deleted before it was ever persisted.
    DelNew,
}

impl ItemState {
    /// Whether the item is marked for removal.
    pub fn is_deleted(self) -> bool {
        matches!(self, ItemState::Deleted | ItemState::DelNew)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemState::Clean => "CLEAN",
            ItemState::New => "NEW",
            ItemState::Changed => "CHANGED",
            ItemState::Deleted => "DELETED",
            ItemState::DelNew => "DELNEW",
        };
        f.write_str(name)
    }
}

/// An entity together with its identity, state and last-persisted snapshot.
#[derive(Debug, Clone)]
pub struct Tracked<E> {
    id: i64,
    state: ItemState,
    current: E,
    snapshot: Option<E>,
}

impl<E> Tracked<E> {
    /// Entity identity.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Lifecycle state.
    pub fn state(&self) -> ItemState {
        self.state
    }

    /// The entity as currently held in memory.
    pub fn entity(&self) -> &E {
        &self.current
    }

    /// The entity as last persisted, `None` if it never was.
    pub fn snapshot(&self) -> Option<&E> {
        self.snapshot.as_ref()
    }
}

/// The in-memory list for one entity type.
///
/// All state transitions except the save-time ones go through this type:
/// [`add`](Self::add) creates `NEW` items, [`modify`](Self::modify) turns
/// `CLEAN` into `CHANGED`, and [`delete`](Self::delete) marks items for
/// removal. Only the engine's save pass makes items `CLEAN` again.
#[derive(Debug, Clone)]
pub struct EntityList<E> {
    items: Vec<Tracked<E>>,
}

impl<E> Default for EntityList<E> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<E: Clone> EntityList<E> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items, including those marked for removal.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A fresh identity: one more than the largest in the list.
    ///
    /// # Errors
    ///
    /// Fails if the largest identity is already `i64::MAX`.
    pub fn next_id(&self) -> EngineResult<i64> {
        match self.items.iter().map(|t| t.id).max() {
            None => Ok(1),
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| EngineError::logic(format!("no identity left after {max}"))),
        }
    }

    /// Adds a `NEW` item.
    ///
    /// # Errors
    ///
    /// Fails if an item with this id is already in the list.
    pub fn add(&mut self, id: i64, entity: E) -> EngineResult<()> {
        self.ensure_unique(id)?;
        self.items.push(Tracked {
            id,
            state: ItemState::New,
            current: entity,
            snapshot: None,
        });
        Ok(())
    }

    /// Mutates an item in place.
    ///
    /// A `CLEAN` item becomes `CHANGED`. `NEW` and `CHANGED` items keep their
    /// state. The update pass later decides which columns really changed.
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown or the item is marked for removal.
    pub fn modify<R>(&mut self, id: i64, f: impl FnOnce(&mut E) -> R) -> EngineResult<R> {
        let item = self.find_mut(id)?;
        if item.state.is_deleted() {
            return Err(EngineError::logic(format!(
                "item {id} is {} and cannot be modified",
                item.state
            )));
        }
        let out = f(&mut item.current);
        if item.state == ItemState::Clean {
            item.state = ItemState::Changed;
        }
        Ok(out)
    }

    /// Marks an item for removal.
    ///
    /// `NEW` becomes `DELNEW`, `CLEAN` and `CHANGED` become `DELETED`.
    /// Deleting an item that is already marked is a no-op.
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown.
    pub fn delete(&mut self, id: i64) -> EngineResult<()> {
        let item = self.find_mut(id)?;
        item.state = match item.state {
            ItemState::New => ItemState::DelNew,
            ItemState::Clean | ItemState::Changed => ItemState::Deleted,
            marked => marked,
        };
        Ok(())
    }

    /// Returns the entity with this id.
    pub fn get(&self, id: i64) -> Option<&E> {
        self.tracked(id).map(Tracked::entity)
    }

    /// Returns the tracked item with this id.
    pub fn tracked(&self, id: i64) -> Option<&Tracked<E>> {
        self.items.iter().find(|t| t.id == id)
    }

    /// Returns the state of the item with this id.
    pub fn state(&self, id: i64) -> Option<ItemState> {
        self.tracked(id).map(Tracked::state)
    }

    /// Iterates items in list order.
    pub fn iter(&self) -> impl Iterator<Item = &Tracked<E>> {
        self.items.iter()
    }

    /// Iterates entities that are not marked for removal.
    pub fn live(&self) -> impl Iterator<Item = &E> {
        self.items
            .iter()
            .filter(|t| !t.state.is_deleted())
            .map(Tracked::entity)
    }

    /// Number of items in a state.
    pub fn count(&self, state: ItemState) -> usize {
        self.items.iter().filter(|t| t.state == state).count()
    }

    /// Whether every item is `CLEAN`.
    pub fn is_clean(&self) -> bool {
        self.items.iter().all(|t| t.state == ItemState::Clean)
    }

    pub(crate) fn push_loaded(&mut self, id: i64, entity: E) -> EngineResult<()> {
        self.ensure_unique(id)?;
        self.items.push(Tracked {
            id,
            state: ItemState::Clean,
            snapshot: Some(entity.clone()),
            current: entity,
        });
        Ok(())
    }

    /// Positions of the items matching `select`, in list order.
    pub(crate) fn positions(&self, select: impl Fn(ItemState) -> bool) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, t)| select(t.state))
            .map(|(pos, _)| pos)
            .collect()
    }

    pub(crate) fn at(&self, position: usize) -> Option<&Tracked<E>> {
        self.items.get(position)
    }

    /// Makes the item at `position` `CLEAN` and records its snapshot.
    pub(crate) fn mark_clean(&mut self, position: usize) {
        if let Some(item) = self.items.get_mut(position) {
            item.state = ItemState::Clean;
            item.snapshot = Some(item.current.clone());
        }
    }

    /// Removes the items at `positions`, which must be sorted descending.
    pub(crate) fn remove_descending(&mut self, positions: &[usize]) {
        for position in positions {
            if *position < self.items.len() {
                self.items.remove(*position);
            }
        }
    }

    fn ensure_unique(&self, id: i64) -> EngineResult<()> {
        if self.tracked(id).is_some() {
            Err(EngineError::logic(format!("duplicate item id {id}")))
        } else {
            Ok(())
        }
    }

    fn find_mut(&mut self, id: i64) -> EngineResult<&mut Tracked<E>> {
        self.items
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| EngineError::logic(format!("no item with id {id}")))
    }
}

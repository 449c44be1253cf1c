//! Batch boundaries for the save passes.

use crate::error::{EngineError, EngineResult};
use crate::state::ItemState;

/// The save pass an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Writing `NEW` items.
    Insert,
    /// Writing `CHANGED` items.
    Update,
    /// Removing `DELETED` and `DELNEW` items.
    Delete,
}

impl Phase {
    /// Whether an item in `state` is handled by this phase.
    pub fn selects(self, state: ItemState) -> bool {
        match self {
            Phase::Insert => state == ItemState::New,
            Phase::Update => state == ItemState::Changed,
            Phase::Delete => state.is_deleted(),
        }
    }
}

/// One uncommitted row operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    /// Registration slot of the table.
    pub table: usize,
    /// Position of the item in its list.
    pub position: usize,
    /// Phase that wrote it.
    pub phase: Phase,
}

/// Counts uncommitted row operations against a ceiling.
///
/// One tracker spans a whole save: switching tables with
/// [`set_current_table`](Self::set_current_table) keeps the running count,
/// so the ceiling bounds the save rather than each table. The tracker also
/// remembers which items each operation touched, so their in-memory
/// transition can be applied once the store commit succeeds.
#[derive(Debug, Clone)]
pub struct BatchTracker {
    ceiling: usize,
    current: Option<(usize, Phase)>,
    pending: Vec<Pending>,
    commits: u64,
}

impl BatchTracker {
    /// Creates a tracker that fills up after `ceiling` operations.
    ///
    /// # Errors
    ///
    /// Fails for a zero ceiling.
    pub fn new(ceiling: usize) -> EngineResult<Self> {
        if ceiling == 0 {
            return Err(EngineError::InvalidConfig(
                "batch ceiling must be at least 1".into(),
            ));
        }
        Ok(Self {
            ceiling,
            current: None,
            pending: Vec::new(),
            commits: 0,
        })
    }

    /// Switches the table and phase that new operations belong to.
    pub fn set_current_table(&mut self, table: usize, phase: Phase) {
        self.current = Some((table, phase));
    }

    /// The current table slot and phase.
    pub fn current(&self) -> Option<(usize, Phase)> {
        self.current
    }

    /// Records one operation on the item at `position` of the current table.
    ///
    /// # Errors
    ///
    /// Fails if no table is current.
    pub fn add_item(&mut self, position: usize) -> EngineResult<()> {
        let (table, phase) = self
            .current
            .ok_or_else(|| EngineError::logic("batch operation recorded outside a pass"))?;
        self.pending.push(Pending {
            table,
            position,
            phase,
        });
        Ok(())
    }

    /// Number of uncommitted operations.
    pub fn count(&self) -> usize {
        self.pending.len()
    }

    /// Whether the count has reached the ceiling.
    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.ceiling
    }

    /// Number of commits issued.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Resets the count after a successful store commit and returns the
    /// operations it covered.
    pub fn commit(&mut self) -> Vec<Pending> {
        self.commits += 1;
        std::mem::take(&mut self.pending)
    }

    /// Forgets the uncommitted operations after a rollback.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

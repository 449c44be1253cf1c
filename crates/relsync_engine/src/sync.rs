//! Per-table load and save passes.

use crate::batch::{BatchTracker, Pending, Phase};
use crate::binding::{EntityBinding, Fields};
use crate::engine::SaveReport;
use crate::error::{EngineError, EngineResult};
use crate::progress::Progress;
use crate::session::Session;
use crate::state::{ItemState, Tracked};
use relsync_schema::{ColumnId, Table};
use relsync_store::{SqlValue, Statement};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

/// Type-erased synchronizer, one per registered table.
pub(crate) trait TableSync<D> {
    fn table(&self) -> &Arc<Table>;

    fn load(
        &self,
        session: &mut Session,
        progress: &mut dyn Progress,
        granularity: u64,
        data: &mut D,
    ) -> EngineResult<u64>;

    fn insert_pass(&self, slot: usize, ctx: &mut SaveContext<'_, D>) -> EngineResult<()>;

    fn update_pass(&self, slot: usize, ctx: &mut SaveContext<'_, D>) -> EngineResult<()>;

    fn delete_pass(&self, slot: usize, ctx: &mut SaveContext<'_, D>) -> EngineResult<()>;

    /// Applies the in-memory transition of committed operations.
    fn apply_commit(&self, data: &mut D, covered: &[Pending]);
}

/// Everything a save pass needs, shared by all tables of one save.
pub(crate) struct SaveContext<'a, D> {
    pub session: &'a mut Session,
    pub tables: &'a [Box<dyn TableSync<D>>],
    pub data: &'a mut D,
    pub progress: &'a mut dyn Progress,
    pub tracker: BatchTracker,
    pub report: SaveReport,
    granularity: u64,
    total: u64,
}

impl<'a, D> SaveContext<'a, D> {
    pub fn new(
        session: &'a mut Session,
        tables: &'a [Box<dyn TableSync<D>>],
        data: &'a mut D,
        progress: &'a mut dyn Progress,
        tracker: BatchTracker,
        granularity: u64,
    ) -> Self {
        Self {
            session,
            tables,
            data,
            progress,
            tracker,
            report: SaveReport::default(),
            granularity,
            total: 0,
        }
    }

    fn begin(&mut self, slot: usize, phase: Phase, stage: &str, items: usize) {
        self.tracker.set_current_table(slot, phase);
        self.total = items as u64;
        self.progress.begin_stage(stage);
        self.progress.set_step_count(self.total);
    }

    fn step(&mut self, done: u64) -> EngineResult<()> {
        let due = done % self.granularity == 0 || done == self.total;
        if due && !self.progress.step_completed(done) {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    fn current_table(&self) -> &str {
        self.tracker
            .current()
            .and_then(|(slot, _)| self.tables.get(slot))
            .map_or("", |t| t.table().name())
    }

    /// Records one operation and commits if the batch is full.
    fn record(&mut self, position: usize) -> EngineResult<()> {
        self.tracker.add_item(position)?;
        if self.tracker.is_full() {
            self.commit()?;
        }
        Ok(())
    }

    /// Commits the store transaction, then moves every covered item to its
    /// post-commit state.
    pub fn commit(&mut self) -> EngineResult<()> {
        let table = self.current_table().to_owned();
        self.session.commit(&table)?;
        let covered = self.tracker.commit();
        self.report.commits += 1;
        tracing::debug!(operations = covered.len(), table = %table, "batch committed");

        let tables = self.tables;
        for (slot, sync) in tables.iter().enumerate() {
            let entries: Vec<Pending> =
                covered.iter().filter(|p| p.table == slot).copied().collect();
            if !entries.is_empty() {
                sync.apply_commit(self.data, &entries);
            }
        }
        Ok(())
    }

    /// Rolls back after a non-fatal error and forgets pending operations.
    pub fn abort(&mut self) -> EngineResult<()> {
        let discarded = self.tracker.discard();
        if self.session.is_connected() {
            let table = self.current_table().to_owned();
            tracing::info!(discarded, table = %table, "rolling back save");
            self.session.rollback(&table)?;
        }
        Ok(())
    }
}

/// Synchronizer for the table of binding `B`.
pub(crate) struct Synchronizer<B, E> {
    binding: B,
    table: Arc<Table>,
    fields: Fields<E>,
}

impl<B, E: Clone + 'static> Synchronizer<B, E> {
    pub fn new<D>(binding: B, table: Arc<Table>) -> EngineResult<Self>
    where
        B: EntityBinding<D, Entity = E>,
    {
        let fields = binding.fields();
        fields.validate(&table)?;
        Ok(Self {
            binding,
            table,
            fields,
        })
    }

    fn name(&self) -> &str {
        self.table.name()
    }

    fn invalid_position(&self, position: usize) -> EngineError {
        EngineError::logic(format!("{} has no item at position {position}", self.name()))
    }
}

fn report_loaded(progress: &mut dyn Progress, done: u64) -> EngineResult<()> {
    if progress.step_completed(done) {
        Ok(())
    } else {
        Err(EngineError::Cancelled)
    }
}

impl<D, B, E> TableSync<D> for Synchronizer<B, E>
where
    B: EntityBinding<D, Entity = E>,
    E: Clone + 'static,
{
    fn table(&self) -> &Arc<Table> {
        &self.table
    }

    fn load(
        &self,
        session: &mut Session,
        progress: &mut dyn Progress,
        granularity: u64,
        data: &mut D,
    ) -> EngineResult<u64> {
        let name = self.name();
        progress.begin_stage(&format!("Loading {name}"));
        let total = session.count(name, &self.table.count_statement())?;
        progress.set_step_count(total);
        tracing::debug!(table = name, rows = total, "load started");

        let statement = session.prepare(name, &self.table.load_query())?;
        let mut done = 0u64;
        session.query(name, &statement, &[], |raw| {
            let mut row = self.table.decode_row(raw)?;
            let id = row
                .get_as::<i64>(ColumnId::IDENTITY)
                .ok_or_else(|| EngineError::logic(format!("{name} row without identity")))?;
            let mut entity = self.binding.blank(id);
            self.fields.write(name, &mut entity, &mut row)?;
            self.binding.attach(&mut entity, data)?;
            self.binding.list_mut(data).push_loaded(id, entity)?;

            done += 1;
            if done % granularity == 0 {
                report_loaded(progress, done)?;
            }
            Ok(())
        })?;
        if done % granularity != 0 {
            report_loaded(progress, done)?;
        }

        tracing::info!(table = name, rows = done, "loaded");
        Ok(done)
    }

    fn insert_pass(&self, slot: usize, ctx: &mut SaveContext<'_, D>) -> EngineResult<()> {
        let name = self.name();
        let positions = self.binding.list(ctx.data).positions(|s| Phase::Insert.selects(s));
        ctx.begin(slot, Phase::Insert, &format!("Inserting {name}"), positions.len());
        if positions.is_empty() {
            return Ok(());
        }
        tracing::debug!(table = name, items = positions.len(), "insert pass");

        let statement = ctx.session.prepare(name, &self.table.insert_statement())?;
        for (done, position) in positions.into_iter().enumerate() {
            let (id, params) = {
                let item = self.item(ctx.data, position)?;
                let row = self.fields.read(item.id(), item.entity());
                let params = self.table.insert_params(&row).map_err(|source| EngineError::Value {
                    table: name.to_owned(),
                    entity: item.id(),
                    source,
                })?;
                (item.id(), params)
            };
            ctx.session.execute(name, Some(id), &statement, &params)?;
            ctx.report.inserted += 1;
            ctx.record(position)?;
            ctx.step(done as u64 + 1)?;
        }
        Ok(())
    }

    fn update_pass(&self, slot: usize, ctx: &mut SaveContext<'_, D>) -> EngineResult<()> {
        let name = self.name();
        let positions = self.binding.list(ctx.data).positions(|s| Phase::Update.selects(s));
        ctx.begin(slot, Phase::Update, &format!("Updating {name}"), positions.len());
        if positions.is_empty() {
            return Ok(());
        }
        tracing::debug!(table = name, items = positions.len(), "update pass");

        // One prepared statement per distinct dirty-column set.
        let mut statements: HashMap<String, Statement> = HashMap::new();
        for (done, position) in positions.into_iter().enumerate() {
            let (id, dirty) = {
                let item = self.item(ctx.data, position)?;
                let snapshot = item.snapshot().ok_or_else(|| {
                    EngineError::logic(format!("changed {name} #{} has no snapshot", item.id()))
                })?;
                let current = self.fields.read(item.id(), item.entity());
                let persisted = self.fields.read(item.id(), snapshot);
                (item.id(), current.changed_from(&persisted))
            };

            let Some(sql) = self.table.update_statement(&dirty) else {
                tracing::warn!(table = name, entity = id, "changed item has no dirty column");
                self.binding.list_mut(ctx.data).mark_clean(position);
                ctx.report.skipped += 1;
                ctx.step(done as u64 + 1)?;
                continue;
            };

            let params = self
                .table
                .update_params(&dirty, id)
                .map_err(|source| EngineError::Value {
                    table: name.to_owned(),
                    entity: id,
                    source,
                })?;
            let statement = match statements.entry(sql) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let prepared = ctx.session.prepare(name, entry.key())?;
                    entry.insert(prepared)
                }
            };
            ctx.session.execute(name, Some(id), statement, &params)?;
            ctx.report.updated += 1;
            ctx.record(position)?;
            ctx.step(done as u64 + 1)?;
        }
        Ok(())
    }

    fn delete_pass(&self, slot: usize, ctx: &mut SaveContext<'_, D>) -> EngineResult<()> {
        let name = self.name();
        let list = self.binding.list(ctx.data);
        let mut positions = list.positions(|s| Phase::Delete.selects(s));
        let persisted = list.count(ItemState::Deleted);
        ctx.begin(slot, Phase::Delete, &format!("Deleting {name}"), positions.len());
        if positions.is_empty() {
            return Ok(());
        }
        tracing::debug!(table = name, items = positions.len(), "delete pass");

        // Reverse order keeps the remaining positions valid when a commit
        // removes the items behind them.
        positions.reverse();
        let statement = if persisted > 0 {
            Some(ctx.session.prepare(name, &self.table.delete_statement())?)
        } else {
            None
        };
        for (done, position) in positions.into_iter().enumerate() {
            let (id, state) = {
                let item = self.item(ctx.data, position)?;
                (item.id(), item.state())
            };
            match (&statement, state) {
                (Some(statement), ItemState::Deleted) => {
                    ctx.session
                        .execute(name, Some(id), statement, &[SqlValue::Integer(id)])?;
                    ctx.report.deleted += 1;
                }
                _ => {
                    tracing::trace!(table = name, entity = id, "never persisted, no statement");
                    ctx.report.skipped += 1;
                }
            }
            ctx.record(position)?;
            ctx.step(done as u64 + 1)?;
        }
        Ok(())
    }

    fn apply_commit(&self, data: &mut D, covered: &[Pending]) {
        let list = self.binding.list_mut(data);
        let mut removals = Vec::new();
        for pending in covered {
            match pending.phase {
                Phase::Insert | Phase::Update => list.mark_clean(pending.position),
                Phase::Delete => removals.push(pending.position),
            }
        }
        removals.sort_unstable_by(|a, b| b.cmp(a));
        list.remove_descending(&removals);
    }
}

impl<B, E: Clone + 'static> Synchronizer<B, E> {
    fn item<'d, D>(&self, data: &'d D, position: usize) -> EngineResult<&'d Tracked<E>>
    where
        B: EntityBinding<D, Entity = E>,
    {
        self.binding
            .list(data)
            .at(position)
            .ok_or_else(|| self.invalid_position(position))
    }
}

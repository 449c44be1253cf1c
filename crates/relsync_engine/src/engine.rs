//! The engine coordinator.

use crate::batch::BatchTracker;
use crate::binding::EntityBinding;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::progress::Progress;
use crate::session::Session;
use crate::sync::{SaveContext, Synchronizer, TableSync};
use relsync_schema::{Schema, Table, TableDef};
use relsync_store::Connection;
use serde::Serialize;
use std::sync::Arc;

/// What a save did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    /// Rows inserted.
    pub inserted: u64,
    /// Rows updated.
    pub updated: u64,
    /// Rows deleted.
    pub deleted: u64,
    /// Items that needed no statement (`DELNEW` and zero-diff updates).
    pub skipped: u64,
    /// Store commits issued.
    pub commits: u64,
}

impl SaveReport {
    /// Number of statements executed.
    pub fn statements(&self) -> u64 {
        self.inserted + self.updated + self.deleted
    }
}

type Build<D> = Box<dyn FnOnce(Arc<Table>) -> EngineResult<Box<dyn TableSync<D>>>>;

/// A binding waiting to be registered by [`Engine::register_all`].
pub struct Registration<D> {
    def: TableDef,
    build: Build<D>,
}

impl<D: 'static> Registration<D> {
    /// Wraps a binding.
    pub fn new<B: EntityBinding<D>>(binding: B) -> Self {
        let def = binding.table();
        Self {
            def,
            build: Box::new(move |table| {
                let sync = Synchronizer::<B, B::Entity>::new::<D>(binding, table)?;
                Ok(Box::new(sync) as Box<dyn TableSync<D>>)
            }),
        }
    }

    /// The table definition of the binding.
    pub fn table(&self) -> &TableDef {
        &self.def
    }
}

impl<D> std::fmt::Debug for Registration<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("table", &self.def.name())
            .finish()
    }
}

/// Keeps a dataset `D` consistent with a relational store.
///
/// The engine owns the connection and one synchronizer per registered
/// table. Registration order is dependency order, and it drives every
/// multi-table operation:
///
/// | operation | order |
/// |-----------|-------|
/// | load, create | registration order |
/// | save | inserts and updates forward, deletes reversed |
/// | drop, purge | reversed |
///
/// # Example
///
/// ```rust
/// use relsync_engine::{Engine, EngineConfig, EntityBinding, EntityList, Fields, NoProgress};
/// use relsync_schema::{Column, ColumnId, TableDef};
/// use relsync_store::MemoryConnection;
///
/// #[derive(Clone)]
/// struct Tag {
///     label: String,
/// }
///
/// #[derive(Default)]
/// struct Tags {
///     tags: EntityList<Tag>,
/// }
///
/// struct TagBinding;
///
/// impl EntityBinding<Tags> for TagBinding {
///     type Entity = Tag;
///
///     fn table(&self) -> TableDef {
///         TableDef::new("tag", "id").column(Column::text(ColumnId(1), "label", 20))
///     }
///
///     fn fields(&self) -> Fields<Tag> {
///         Fields::<Tag>::new().field(ColumnId(1), |t| t.label.clone(), |t, v| t.label = v)
///     }
///
///     fn list<'a>(&self, data: &'a Tags) -> &'a EntityList<Tag> {
///         &data.tags
///     }
///
///     fn list_mut<'a>(&self, data: &'a mut Tags) -> &'a mut EntityList<Tag> {
///         &mut data.tags
///     }
///
///     fn blank(&self, _id: i64) -> Tag {
///         Tag { label: String::new() }
///     }
/// }
///
/// let conn = MemoryConnection::new();
/// let probe = conn.clone();
/// let mut engine = Engine::new(conn, EngineConfig::default()).unwrap();
/// engine.register(TagBinding).unwrap();
///
/// let mut data = Tags::default();
/// data.tags.add(1, Tag { label: "rust".into() }).unwrap();
/// let report = engine.save_database(&mut data, &mut NoProgress).unwrap();
///
/// assert_eq!(report.inserted, 1);
/// assert_eq!(probe.executed(), vec!["INSERT INTO tag (id, label) VALUES (?, ?)"]);
/// assert!(data.tags.is_clean());
/// ```
pub struct Engine<D> {
    session: Session,
    config: EngineConfig,
    schema: Schema,
    tables: Vec<Box<dyn TableSync<D>>>,
}

impl<D> std::fmt::Debug for Engine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("session", &self.session)
            .field("config", &self.config)
            .field("tables", &self.schema.len())
            .finish()
    }
}

impl<D: 'static> Engine<D> {
    /// Creates an engine over `conn`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid.
    pub fn new(conn: impl Connection + 'static, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            session: Session::new(conn),
            config,
            schema: Schema::new(),
            tables: Vec::new(),
        })
    }

    /// Registers one binding after every table it references.
    ///
    /// Returns the table's registration slot.
    ///
    /// # Errors
    ///
    /// Fails on an invalid or duplicate table, a reference to a table that
    /// is not registered yet, or an accessor table that does not match.
    pub fn register<B: EntityBinding<D>>(&mut self, binding: B) -> EngineResult<usize> {
        self.register_one(Registration::new(binding))
    }

    fn register_one(&mut self, registration: Registration<D>) -> EngineResult<usize> {
        let table = Arc::new(self.schema.resolve(registration.def)?);
        let sync = (registration.build)(Arc::clone(&table))?;
        let slot = self.schema.insert(table)?;
        self.tables.push(sync);
        Ok(slot)
    }

    /// Registers bindings given in any order.
    ///
    /// The bindings are sorted so that every table follows the tables it
    /// references. Nothing is registered if any binding fails.
    ///
    /// # Errors
    ///
    /// Fails on a reference cycle, an unknown referenced table, or any error
    /// [`register`](Self::register) reports.
    pub fn register_all(&mut self, registrations: Vec<Registration<D>>) -> EngineResult<()> {
        let defs: Vec<TableDef> = registrations.iter().map(|r| r.def.clone()).collect();
        let order = self.schema.dependency_order(&defs)?;
        tracing::debug!(
            order = ?order.iter().map(|i| defs[*i].name()).collect::<Vec<_>>(),
            "registration order"
        );

        let mut pending: Vec<Option<Registration<D>>> =
            registrations.into_iter().map(Some).collect();
        let schema = self.schema.clone();
        let registered = self.tables.len();
        for index in order {
            let Some(registration) = pending.get_mut(index).and_then(Option::take) else {
                continue;
            };
            if let Err(e) = self.register_one(registration) {
                self.schema = schema;
                self.tables.truncate(registered);
                return Err(e);
            }
        }
        Ok(())
    }

    fn granularity(&self, progress: &dyn Progress) -> u64 {
        progress
            .reporting_granularity()
            .unwrap_or(self.config.report_granularity)
            .max(1)
    }

    /// Loads every table in registration order into a fresh dataset.
    ///
    /// Returns `None` if the progress port cancelled. The connection stays
    /// open in that case.
    ///
    /// # Errors
    ///
    /// Fails on a store error (closing the connection) or when a row cannot
    /// be turned into an entity.
    pub fn load_database(&mut self, progress: &mut dyn Progress) -> EngineResult<Option<D>>
    where
        D: Default,
    {
        let granularity = self.granularity(progress);
        let mut data = D::default();
        for sync in &self.tables {
            match sync.load(&mut self.session, progress, granularity, &mut data) {
                Ok(_) => {}
                Err(EngineError::Cancelled) => {
                    tracing::info!(table = sync.table().name(), "load cancelled");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
        progress.begin_stage("Refreshing");
        Ok(Some(data))
    }

    /// Writes every pending change of `data` to the store.
    ///
    /// Inserts run parents first, then updates, then deletes children first.
    /// A commit is issued whenever the batch fills up and once more at the
    /// end. Items covered by a commit become `CLEAN`, and deleted items leave
    /// their lists.
    ///
    /// # Errors
    ///
    /// On a store error the connection is closed and uncommitted items keep
    /// their state. On cancellation or a logic error the open transaction is
    /// rolled back and the connection stays open.
    pub fn save_database(
        &mut self,
        data: &mut D,
        progress: &mut dyn Progress,
    ) -> EngineResult<SaveReport> {
        let granularity = self.granularity(progress);
        let tracker = BatchTracker::new(self.config.batch_size)?;
        let mut ctx = SaveContext::new(
            &mut self.session,
            &self.tables,
            data,
            progress,
            tracker,
            granularity,
        );

        match run_save(&mut ctx) {
            Ok(()) => {
                let report = ctx.report;
                tracing::info!(
                    inserted = report.inserted,
                    updated = report.updated,
                    deleted = report.deleted,
                    skipped = report.skipped,
                    commits = report.commits,
                    "save complete"
                );
                Ok(report)
            }
            Err(e) if e.is_fatal() => {
                ctx.tracker.discard();
                Err(e)
            }
            Err(e) => {
                ctx.abort()?;
                Err(e)
            }
        }
    }

    /// Creates every table and index in registration order and commits.
    ///
    /// # Errors
    ///
    /// Fails on a store error, closing the connection.
    pub fn create_schema(&mut self) -> EngineResult<()> {
        for sync in &self.tables {
            let table = sync.table();
            run_ddl(&mut self.session, table.name(), &table.create_table())?;
            if let Some(index) = table.create_index() {
                run_ddl(&mut self.session, table.name(), &index)?;
            }
        }
        self.session.commit("schema")?;
        tracing::info!(tables = self.tables.len(), "schema created");
        Ok(())
    }

    /// Drops every index and table in reverse registration order and
    /// commits. Missing objects are ignored.
    ///
    /// # Errors
    ///
    /// Fails on a store error, closing the connection.
    pub fn drop_schema(&mut self) -> EngineResult<()> {
        for sync in self.tables.iter().rev() {
            let table = sync.table();
            if let Some(index) = table.drop_index() {
                run_ddl(&mut self.session, table.name(), &index)?;
            }
            run_ddl(&mut self.session, table.name(), &table.drop_table())?;
        }
        self.session.commit("schema")?;
        tracing::info!(tables = self.tables.len(), "schema dropped");
        Ok(())
    }

    /// Deletes every row in reverse registration order and commits.
    ///
    /// # Errors
    ///
    /// Fails on a store error, closing the connection.
    pub fn purge_schema(&mut self) -> EngineResult<()> {
        for sync in self.tables.iter().rev() {
            let table = sync.table();
            run_ddl(&mut self.session, table.name(), &table.purge_statement())?;
        }
        self.session.commit("schema")?;
        tracing::info!(tables = self.tables.len(), "schema purged");
        Ok(())
    }

    /// Returns the number of stored rows of a table.
    ///
    /// # Errors
    ///
    /// Fails for an unknown table or on a store error.
    pub fn count_rows(&mut self, table: &str) -> EngineResult<u64> {
        let table = Arc::clone(self.schema.require(table)?);
        self.session.count(table.name(), &table.count_statement())
    }

    /// The `CREATE` script for every registered table.
    pub fn ddl_script(&self) -> String {
        self.schema.ddl_script()
    }

    /// Looks up a registered table.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.schema.get(name).map(|t| t.as_ref())
    }

    /// The registered tables.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the connection is still open.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Closes the connection, discarding uncommitted work.
    ///
    /// # Errors
    ///
    /// Fails if the adapter reports an error while closing.
    pub fn close(&mut self) -> EngineResult<()> {
        self.session.close()
    }
}

fn run_save<D>(ctx: &mut SaveContext<'_, D>) -> EngineResult<()> {
    let tables = ctx.tables;
    for (slot, sync) in tables.iter().enumerate() {
        sync.insert_pass(slot, ctx)?;
    }
    for (slot, sync) in tables.iter().enumerate() {
        sync.update_pass(slot, ctx)?;
    }
    for (slot, sync) in tables.iter().enumerate().rev() {
        sync.delete_pass(slot, ctx)?;
    }
    if ctx.tracker.count() > 0 {
        ctx.commit()?;
    }
    Ok(())
}

fn run_ddl(session: &mut Session, table: &str, sql: &str) -> EngineResult<()> {
    let statement = session.prepare(table, sql)?;
    session.execute(table, None, &statement, &[])?;
    Ok(())
}

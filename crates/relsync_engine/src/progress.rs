//! Progress reporting and cooperative cancellation.

/// Receives stage and step updates and can ask the engine to stop.
///
/// The engine announces a stage per pass and table, sets the number of steps
/// it expects, and reports completed steps every
/// [`reporting_granularity`](Progress::reporting_granularity) rows.
/// Returning `false` from [`step_completed`](Progress::step_completed) is the
/// only way to cancel.
pub trait Progress {
    /// A new stage starts.
    fn begin_stage(&mut self, name: &str);

    /// The current stage has `count` steps.
    fn set_step_count(&mut self, count: u64);

    /// `done` steps of the current stage are complete. Returns `false` to
    /// cancel the operation.
    fn step_completed(&mut self, done: u64) -> bool;

    /// Rows between two step reports. `None` defers to the engine
    /// configuration.
    fn reporting_granularity(&self) -> Option<u64> {
        None
    }
}

/// A progress port that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn begin_stage(&mut self, _name: &str) {}

    fn set_step_count(&mut self, _count: u64) {}

    fn step_completed(&mut self, _done: u64) -> bool {
        true
    }
}

/// A progress port that logs through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogProgress {
    stage: String,
    total: u64,
    granularity: Option<u64>,
}

impl LogProgress {
    /// Creates a logger that uses the engine's granularity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports every `rows` rows.
    #[must_use]
    pub fn with_granularity(mut self, rows: u64) -> Self {
        self.granularity = Some(rows.max(1));
        self
    }
}

impl Progress for LogProgress {
    fn begin_stage(&mut self, name: &str) {
        self.stage = name.to_owned();
        self.total = 0;
        tracing::info!(stage = name, "stage started");
    }

    fn set_step_count(&mut self, count: u64) {
        self.total = count;
    }

    fn step_completed(&mut self, done: u64) -> bool {
        tracing::debug!(stage = %self.stage, done, total = self.total, "progress");
        true
    }

    fn reporting_granularity(&self) -> Option<u64> {
        self.granularity
    }
}

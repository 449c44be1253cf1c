//! Progress doubles.

use relsync_engine::Progress;

/// Records every progress call.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    /// Stage names in order.
    pub stages: Vec<String>,
    /// Step counts, one per stage that announced one.
    pub step_counts: Vec<u64>,
    /// Values passed to `step_completed`.
    pub reports: Vec<u64>,
    granularity: Option<u64>,
}

impl RecordingProgress {
    /// Creates a recorder that uses the engine's default granularity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks for a report every `rows` steps.
    #[must_use]
    pub fn with_granularity(mut self, rows: u64) -> Self {
        self.granularity = Some(rows);
        self
    }

    /// Stages that start with `prefix`.
    pub fn stages_starting_with(&self, prefix: &str) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }
}

impl Progress for RecordingProgress {
    fn begin_stage(&mut self, name: &str) {
        self.stages.push(name.to_owned());
    }

    fn set_step_count(&mut self, count: u64) {
        self.step_counts.push(count);
    }

    fn step_completed(&mut self, done: u64) -> bool {
        self.reports.push(done);
        true
    }

    fn reporting_granularity(&self) -> Option<u64> {
        self.granularity
    }
}

/// Cancels on the `n`-th report, counted across all stages.
#[derive(Debug, Clone)]
pub struct CancelAfter {
    limit: usize,
    reports: usize,
}

impl CancelAfter {
    /// Cancels on report number `limit` (1-based). Reports every step.
    pub fn new(limit: usize) -> Self {
        Self { limit, reports: 0 }
    }

    /// Reports received so far, including the cancelling one.
    pub fn reports(&self) -> usize {
        self.reports
    }
}

impl Progress for CancelAfter {
    fn begin_stage(&mut self, _name: &str) {}

    fn set_step_count(&mut self, _count: u64) {}

    fn step_completed(&mut self, _done: u64) -> bool {
        self.reports += 1;
        self.reports < self.limit
    }

    fn reporting_granularity(&self) -> Option<u64> {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_after_counts_reports() {
        let mut progress = CancelAfter::new(3);
        assert!(progress.step_completed(1));
        assert!(progress.step_completed(2));
        assert!(!progress.step_completed(3));
        assert_eq!(progress.reports(), 3);
    }

    #[test]
    fn recorder_filters_stages() {
        let mut progress = RecordingProgress::new().with_granularity(2);
        progress.begin_stage("Loading book");
        progress.begin_stage("Refreshing");
        assert_eq!(progress.stages_starting_with("Loading"), vec!["Loading book"]);
        assert_eq!(progress.reporting_granularity(), Some(2));
    }
}

//! Seed command implementation.

use super::{open, CliResult};
use relsync_engine::{EngineConfig, LogProgress};
use relsync_testkit::sample_library;
use std::path::Path;

/// Saves the sample library into an existing schema.
pub fn run(path: &Path, config: EngineConfig) -> CliResult {
    let mut engine = open(path, config)?;
    let mut library = sample_library();
    let report = engine.save_database(&mut library, &mut LogProgress::new())?;
    println!(
        "Inserted {} rows in {} commits",
        report.inserted, report.commits
    );
    Ok(())
}

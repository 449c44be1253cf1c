//! Count command implementation.

use super::{open, CliResult};
use relsync_engine::EngineConfig;
use std::path::Path;

/// Prints the row count of every table in registration order.
pub fn run(path: &Path, config: EngineConfig) -> CliResult {
    let mut engine = open(path, config)?;
    let names: Vec<String> = engine
        .schema()
        .tables()
        .map(|t| t.name().to_owned())
        .collect();
    let width = names.iter().map(String::len).max().unwrap_or(0);
    for name in names {
        let rows = engine.count_rows(&name)?;
        println!("{name:<width$}  {rows}");
    }
    Ok(())
}

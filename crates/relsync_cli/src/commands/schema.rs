//! Schema commands: ddl, create, drop and purge.

use super::{open, CliResult};
use relsync_engine::EngineConfig;
use relsync_store::MemoryConnection;
use relsync_testkit::library_engine;
use std::path::Path;

/// Prints the `CREATE` script. No database is touched.
pub fn ddl(config: EngineConfig) -> CliResult {
    let engine = library_engine(MemoryConnection::new(), config)?;
    print!("{}", engine.ddl_script());
    Ok(())
}

/// Creates every table and index.
pub fn create(path: &Path, config: EngineConfig) -> CliResult {
    let mut engine = open(path, config)?;
    engine.create_schema()?;
    println!("Created {} tables in {}", engine.schema().len(), path.display());
    Ok(())
}

/// Drops every index and table that exists.
pub fn drop(path: &Path, config: EngineConfig) -> CliResult {
    let mut engine = open(path, config)?;
    engine.drop_schema()?;
    println!("Dropped {} tables in {}", engine.schema().len(), path.display());
    Ok(())
}

/// Deletes every row.
pub fn purge(path: &Path, config: EngineConfig) -> CliResult {
    let mut engine = open(path, config)?;
    engine.purge_schema()?;
    println!("Purged {} tables in {}", engine.schema().len(), path.display());
    Ok(())
}

//! CLI command implementations.

pub mod count;
pub mod dump;
pub mod schema;
pub mod seed;

use relsync_engine::{Engine, EngineConfig};
use relsync_store::{SqliteConnection, SqliteOptions};
use relsync_testkit::{library_engine, Library};
use std::path::Path;

/// Result type of every command.
pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Reads the engine settings, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {e}", path.display()))?;
    let config: EngineConfig = serde_json::from_str(&text)?;
    config.validate()?;
    tracing::debug!(?config, "loaded config");
    Ok(config)
}

/// Opens the library engine on a SQLite file.
pub fn open(path: &Path, config: EngineConfig) -> CliResult<Engine<Library>> {
    let options = SqliteOptions::default().foreign_keys(config.foreign_keys);
    let conn = SqliteConnection::open(path, options)?;
    Ok(library_engine(conn, config)?)
}

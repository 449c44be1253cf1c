//! # relsync Testkit
//!
//! Test utilities for relsync.
//!
//! This crate provides:
//! - The reference library domain (publishers, authors, books) with its
//!   entity bindings
//! - Fixtures: sample data, recording engines, temporary SQLite stores
//! - Progress doubles that record stages or cancel on demand
//! - Property-based generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use relsync_engine::{EngineConfig, NoProgress};
//! use relsync_testkit::prelude::*;
//!
//! let (mut engine, probe) = memory_engine(EngineConfig::default());
//! let mut library = sample_library();
//! let report = engine.save_database(&mut library, &mut NoProgress).unwrap();
//! assert_eq!(report.inserted as usize, probe.executed().len());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod domain;
pub mod fixtures;
pub mod generators;
pub mod progress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::domain::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::progress::*;
}

pub use domain::*;
pub use fixtures::*;
pub use progress::*;

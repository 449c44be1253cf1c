//! # relsync Engine
//!
//! Keeps an in-memory dataset consistent with a relational store.
//!
//! This crate provides:
//! - Per-item lifecycle tracking ([`EntityList`], [`ItemState`])
//! - Entity bindings with typed accessor tables ([`EntityBinding`], [`Fields`])
//! - Batched, transactional write-back ([`BatchTracker`])
//! - The connection owner that closes on failure ([`Session`])
//! - Full-dataset load, save and schema operations ([`Engine`])
//!
//! ## Lifecycle
//!
//! | from | event | to |
//! |------|-------|----|
//! | | `add` | `NEW` |
//! | `NEW` | insert committed | `CLEAN` |
//! | `CLEAN` | `modify` | `CHANGED` |
//! | `CHANGED` | update committed | `CLEAN` |
//! | `CLEAN`, `CHANGED` | `delete` | `DELETED` |
//! | `NEW` | `delete` | `DELNEW` |
//!
//! Only a successful save commit moves items back to `CLEAN` and removes
//! deleted items from their lists.
//!
//! ## Key Invariants
//!
//! - Tables are registered in dependency order: parents before children
//! - Save inserts and updates parents first, deletes children first
//! - One batch ceiling bounds the whole save, not each table
//! - A store error closes the connection; nothing is retried
//! - Cancellation is polled between rows and never closes the connection

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod binding;
mod config;
mod engine;
mod error;
mod progress;
mod session;
mod state;
mod sync;

pub use batch::{BatchTracker, Pending, Phase};
pub use binding::{EntityBinding, Fields};
pub use config::EngineConfig;
pub use engine::{Engine, Registration, SaveReport};
pub use error::{EngineError, EngineResult};
pub use progress::{LogProgress, NoProgress, Progress};
pub use session::Session;
pub use state::{EntityList, ItemState, Tracked};

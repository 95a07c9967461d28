//! Kai - backup and restore for a personal productivity tracker
//!
//! Snapshots every Kai table into one versioned JSON document and restores
//! such a document by replacing all tables inside a single transaction.
//!
//! # Architecture
//!
//! - [`backup`] - Export/import engine over a [`backup::TableAccess`] store
//! - [`storage`] - SQLite database layer
//! - [`server`] - HTTP API (`/backup/export`, `/backup/import`)
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod server;
pub mod storage;

pub use error::{Error, Result};

/// Global quiet flag for `--quiet`.
///
/// When set, commands skip their human-readable output. JSON output and
/// errors are unaffected.
pub static QUIET: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if quiet mode is active.
#[inline]
pub fn is_quiet() -> bool {
    QUIET.load(std::sync::atomic::Ordering::Relaxed)
}

//! tasknest library
//!
//! Projects and nested tasks, persisted as a history of whole-tree snapshots.
//! This module exports the core components for the binary and for tests.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod format;
pub mod logging;
pub mod migration;
pub mod state;
pub mod tree;
pub mod types;

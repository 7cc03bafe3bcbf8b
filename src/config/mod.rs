//! Configuration.
//!
//! Built-in defaults, then `./tasknest/config.yaml`, then
//! `~/.tasknest/config.yaml`, merged field by field, then environment
//! variables. Command-line flags are applied last by the caller.
//!
//! ## Environment Variables
//! - `TASKNEST_CONFIG_PATH` - Explicit config file (skips the file tiers)
//! - `TASKNEST_DB_PATH` - Database path
//! - `TASKNEST_HOST` / `TASKNEST_PORT` - REST server address
//! - `TASKNEST_PROJECT_DIR` - Project config dir (default: `./tasknest`)
//! - `TASKNEST_USER_DIR` - User config dir (default: `~/.tasknest`)

mod loader;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier, deep_merge};
pub use types::*;

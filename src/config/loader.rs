//! Tiered configuration loading.
//!
//! Tiers, lowest priority first: built-in defaults, the project file
//! `./tasknest/config.yaml`, the user file `~/.tasknest/config.yaml`, then
//! environment variables. YAML tiers are merged field by field.

use super::types::Config;
use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Explicit config file; skips the file tiers.
pub const ENV_CONFIG_PATH: &str = "TASKNEST_CONFIG_PATH";
pub const ENV_DB_PATH: &str = "TASKNEST_DB_PATH";
pub const ENV_PORT: &str = "TASKNEST_PORT";
pub const ENV_HOST: &str = "TASKNEST_HOST";
pub const ENV_PROJECT_DIR: &str = "TASKNEST_PROJECT_DIR";
pub const ENV_USER_DIR: &str = "TASKNEST_USER_DIR";

const CONFIG_FILE: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    Project = 1,
    User = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// `TASKNEST_PROJECT_DIR` or `./tasknest`, and `TASKNEST_USER_DIR` or `~/.tasknest`.
    pub fn discover() -> Self {
        let project_dir = std::env::var(ENV_PROJECT_DIR)
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("tasknest")));
        let user_dir = std::env::var(ENV_USER_DIR)
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".tasknest")));
        Self {
            project_dir,
            user_dir,
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    fn tier_files(&self) -> Vec<(ConfigTier, PathBuf)> {
        let mut files = Vec::new();
        if let Some(dir) = &self.project_dir {
            files.push((ConfigTier::Project, dir.join(CONFIG_FILE)));
        }
        if let Some(dir) = &self.user_dir {
            files.push((ConfigTier::User, dir.join(CONFIG_FILE)));
        }
        files
    }
}

/// Merge `overlay` into `base`, field by field.
///
/// Objects merge recursively. Any other overlay value replaces the base,
/// except `null`, which leaves the base untouched.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Loaded configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed, lowest tier first.
    sources: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Load from the discovered tiers, or from `explicit` / `TASKNEST_CONFIG_PATH`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from));
        Self::load_with(ConfigPaths::discover(), explicit.as_deref(), |key| {
            std::env::var(key).ok()
        })
    }

    /// Load with explicit paths and environment lookup.
    pub fn load_with<F>(paths: ConfigPaths, explicit: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (mut config, sources) = match explicit {
            Some(path) => (Config::load(path)?, vec![path.to_path_buf()]),
            None => Self::merge_tiers(&paths)?,
        };
        Self::apply_env_overrides(&mut config, env);

        debug!(sources = ?sources, db_path = %config.storage.db_path.display(), "Configuration loaded");
        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    fn merge_tiers(paths: &ConfigPaths) -> Result<(Config, Vec<PathBuf>)> {
        let mut merged = serde_json::to_value(Config::default())?;
        let mut sources = Vec::new();

        for (tier, file) in paths.tier_files() {
            if !file.exists() {
                continue;
            }
            let content = match std::fs::read_to_string(&file) {
                Ok(content) => content,
                Err(e) => {
                    warn!(tier = %tier, path = %file.display(), error = %e, "Skipping unreadable config file");
                    continue;
                }
            };
            match serde_yaml::from_str::<Value>(&content) {
                Ok(value) => {
                    merged = deep_merge(merged, value);
                    sources.push(file);
                }
                Err(e) => {
                    warn!(tier = %tier, path = %file.display(), error = %e, "Skipping invalid config file");
                }
            }
        }

        Ok((serde_json::from_value(merged)?, sources))
    }

    fn apply_env_overrides<F>(config: &mut Config, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = env(ENV_DB_PATH) {
            config.storage.db_path = PathBuf::from(db_path);
        }
        if let Some(host) = env(ENV_HOST) {
            config.server.host = host;
        }
        if let Some(port) = env(ENV_PORT) {
            match port.trim().parse::<u16>() {
                Ok(port) => config.server.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid {}", ENV_PORT),
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Config files that were merged, lowest tier first.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

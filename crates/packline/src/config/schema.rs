use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::default_database_path;
use crate::workflow::ConcurrencyGuard;

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacklineConfig {
    pub version: String,
    /// `~/` is expanded against the home directory.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_snapshot_capacity")]
    pub snapshot_capacity: usize,
    #[serde(default)]
    pub concurrency_guard: ConcurrencyGuard,
    #[serde(default = "default_actor")]
    pub default_actor: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub inbox: InboxConfig,
}

fn default_snapshot_capacity() -> usize {
    64
}

fn default_actor() -> String {
    "Staff".to_string()
}

impl Default for PacklineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            database_path: None,
            snapshot_capacity: default_snapshot_capacity(),
            concurrency_guard: ConcurrencyGuard::default(),
            default_actor: default_actor(),
            logging: LoggingConfig::default(),
            inbox: InboxConfig::default(),
        }
    }
}

impl PacklineConfig {
    /// The configured database file, or the default under the home
    /// directory.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(expand_home(path)),
            None => default_database_path(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

/// Drop folder for order sheets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxConfig {
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            directory: None,
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl InboxConfig {
    pub fn resolved_directory(&self) -> Option<PathBuf> {
        self.directory.as_deref().map(expand_home)
    }
}

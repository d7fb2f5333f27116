//! Configuration for the resources store connection cache

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the store location.
pub const PATH_OVERRIDE_VAR: &str = "RESOURCES_DB_PATH";

/// Location of the store relative to the user data directory.
const STORE_SUBPATH: &str = "kactivitymanagerd/resources/database";

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configuration shared by every connection the registry opens.
///
/// # Examples
///
/// ```
/// use resources_db::DatabaseConfig;
///
/// let config = DatabaseConfig::new("/tmp/resources.db");
/// assert_eq!(config.busy_timeout_ms, 5_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,

    /// How long a statement waits on a locked store before failing
    ///
    /// Default: 5000
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl DatabaseConfig {
    /// Create a config for an explicit store path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Override the busy timeout
    pub fn with_busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.busy_timeout_ms = busy_timeout_ms;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Resolve the store path from the environment.
    ///
    /// `RESOURCES_DB_PATH` wins, then `$XDG_DATA_HOME`, then
    /// `$HOME/.local/share`, then the working directory.
    pub fn default_path() -> PathBuf {
        resolve_path(|name| env::var_os(name).filter(|value| !value.is_empty()))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

fn resolve_path(lookup: impl Fn(&str) -> Option<std::ffi::OsString>) -> PathBuf {
    if let Some(path) = lookup(PATH_OVERRIDE_VAR) {
        return PathBuf::from(path);
    }
    if let Some(data_home) = lookup("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(STORE_SUBPATH);
    }
    if let Some(home) = lookup("HOME") {
        return PathBuf::from(home).join(".local/share").join(STORE_SUBPATH);
    }
    PathBuf::from("database")
}

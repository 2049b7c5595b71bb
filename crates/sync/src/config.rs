// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync configuration.
//!
//! Configuration is read from a TOML file, typically `replayq.toml`:
//!
//! ```toml
//! queue_key = "offline_queue"
//! replay_delay_ms = 100
//! dispatch_timeout_ms = 15000
//!
//! [storage]
//! backend = "sqlite"
//! path = "state/queue.db"
//!
//! [remote]
//! url = "https://project.supabase.co"
//! api_key = "..."
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rq_core::{FileStore, KeyValueStore, MemoryStore, SqliteStore};

use crate::store::DEFAULT_QUEUE_KEY;

const STATE_DIR_NAME: &str = "replayq";
const SQLITE_FILE_NAME: &str = "queue.db";

/// Error type for configuration handling.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed but semantically invalid.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// The configured storage backend could not be opened.
    #[error("failed to open storage: {0}")]
    Store(#[from] rq_core::Error),
}

/// Result type for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Key the queue is persisted under.
    #[serde(default = "default_queue_key")]
    pub queue_key: String,
    /// Pause before each dispatch during replay, in milliseconds. 0 = no pause.
    #[serde(default = "default_replay_delay_ms")]
    pub replay_delay_ms: u64,
    /// Upper bound on a single remote call, in milliseconds. Absent = unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_timeout_ms: Option<u64>,
    /// Buffer size of the sync event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Local persistence backend.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Remote REST endpoint (optional - hosts may supply their own sink).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
    /// Directory relative storage paths are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// Which key-value backend holds the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per key in a directory.
    #[default]
    File,
    /// A `kv` table in a SQLite database.
    Sqlite,
    /// Process memory only; nothing survives a restart.
    Memory,
}

/// Local persistence configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory (file backend) or database file (sqlite backend).
    /// Defaults to the platform's local data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// PostgREST endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the project, e.g. `https://project.supabase.co`.
    pub url: String,
    /// API key sent as `apikey` and as the bearer token.
    pub api_key: String,
    /// Database schema, when not the default `public`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl RemoteConfig {
    /// Validates the URL. Returns an error message if it is unusable.
    pub fn validate_url(&self) -> Option<String> {
        let url = &self.url;
        if url.starts_with("http://") || url.starts_with("https://") {
            return None;
        }
        Some(format!(
            "invalid remote URL '{}': must be http:// or https://",
            url
        ))
    }
}

fn default_queue_key() -> String {
    DEFAULT_QUEUE_KEY.to_string()
}

fn default_replay_delay_ms() -> u64 {
    100
}

fn default_event_capacity() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Config {
            queue_key: default_queue_key(),
            replay_delay_ms: default_replay_delay_ms(),
            dispatch_timeout_ms: None,
            event_capacity: default_event_capacity(),
            storage: StorageConfig::default(),
            remote: None,
            base_dir: None,
        }
    }
}

impl Config {
    /// Loads and validates configuration from a TOML file.
    ///
    /// Relative storage paths are resolved against the file's directory.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue_key.trim().is_empty() {
            return Err(ConfigError::Invalid("queue_key must not be empty".into()));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_capacity must be at least 1".into(),
            ));
        }
        if self.dispatch_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "dispatch_timeout_ms must be positive (omit it to disable)".into(),
            ));
        }
        if let Some(msg) = self.remote.as_ref().and_then(RemoteConfig::validate_url) {
            return Err(ConfigError::Invalid(msg));
        }
        Ok(())
    }

    /// Pause before each dispatch during replay.
    pub fn replay_delay(&self) -> Duration {
        Duration::from_millis(self.replay_delay_ms)
    }

    /// Upper bound on a single remote call, if any.
    pub fn dispatch_timeout(&self) -> Option<Duration> {
        self.dispatch_timeout_ms.map(Duration::from_millis)
    }

    /// Resolves where the configured backend keeps its data.
    ///
    /// Returns `None` for the memory backend.
    pub fn storage_path(&self) -> ConfigResult<Option<PathBuf>> {
        if self.storage.backend == StorageBackend::Memory {
            return Ok(None);
        }

        let path = match &self.storage.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => match &self.base_dir {
                Some(base) => base.join(path),
                None => path.clone(),
            },
            None => {
                let data_dir = dirs::data_local_dir().ok_or_else(|| {
                    ConfigError::Invalid(
                        "no local data directory; set storage.path explicitly".into(),
                    )
                })?;
                let dir = data_dir.join(STATE_DIR_NAME);
                match self.storage.backend {
                    StorageBackend::Sqlite => dir.join(SQLITE_FILE_NAME),
                    _ => dir,
                }
            }
        };
        Ok(Some(path))
    }

    /// Opens the configured key-value backend.
    pub fn open_store(&self) -> ConfigResult<Box<dyn KeyValueStore>> {
        let path = self.storage_path()?;
        let store: Box<dyn KeyValueStore> = match (self.storage.backend, path) {
            (StorageBackend::File, Some(dir)) => Box::new(FileStore::open(&dir)?),
            (StorageBackend::Sqlite, Some(db)) => Box::new(SqliteStore::open(&db)?),
            _ => Box::new(MemoryStore::new()),
        };
        Ok(store)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

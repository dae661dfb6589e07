use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use biome_monorepo_types::LOCK_FILE_NAMES;

use crate::error::EngineError;

const DEFAULT_INIT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 2;
const DEFAULT_DEBOUNCE_MS: u64 = 200;

fn default_lock_files() -> Vec<String> {
    LOCK_FILE_NAMES.iter().map(ToString::to_string).collect()
}

const fn default_init_timeout_secs() -> u64 {
    DEFAULT_INIT_TIMEOUT_SECS
}

const fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

const fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

/// `~/.biome-monorepo/config.toml`. Every section and field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub discovery: DiscoveryConfig,
    pub lsp: LspSettings,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Lock file names whose changes trigger a restart.
    #[serde(default = "default_lock_files")]
    pub lock_files: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            lock_files: default_lock_files(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LspSettings {
    /// Upper bound on the initialize handshake. 0 is treated as 1.
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
    /// How long a server gets to exit after `shutdown` before it is killed.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for LspSettings {
    fn default() -> Self {
        Self {
            init_timeout_secs: DEFAULT_INIT_TIMEOUT_SECS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl LspSettings {
    #[must_use]
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs.max(1))
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Lock-file events closer together than this collapse into one.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl WatchConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl EngineConfig {
    /// Load the user config. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, EngineError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, EngineError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {}: {err}", path.display());
                return Err(EngineError::ConfigRead {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {}: {err}", path.display());
                Err(EngineError::ConfigParse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }
}

#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".biome-monorepo"))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

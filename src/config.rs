use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wizard::{DEFAULT_DEBOUNCE_MS, DEFAULT_KEY_PREFIX};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub wizard: WizardConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

/// Wizard behaviour shared by every form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    /// Quiet period in milliseconds before a draft is written.
    pub debounce_ms: u64,
    /// Namespace prepended to the form id to build the draft key.
    pub key_prefix: String,
    /// Query parameter that mirrors the current step in the location.
    pub step_param: String,
}

/// Data directory configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Override the default data directory.
    pub data_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
    /// Also write JSON logs to `<data_dir>/logs`.
    pub file_logging: bool,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            step_param: "step".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl AppConfig {
    /// Load configuration from `~/.config/form-wizard/config.toml`.
    /// Returns `Default` if the file is missing or unparseable.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        if !config_path.exists() {
            tracing::debug!("No config file at {} - using defaults", config_path.display());
            return Self::default();
        }

        match Self::load_from(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::warn!("{e} - using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolved data directory (override or XDG default).
    pub fn data_dir(&self) -> PathBuf {
        self.data.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("form-wizard"))
                .unwrap_or_else(|| PathBuf::from("data"))
        })
    }

    /// Directory holding persisted drafts.
    pub fn drafts_dir(&self) -> PathBuf {
        self.data_dir().join("drafts")
    }

    /// Directory holding log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("form-wizard").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}

//! Engine configuration.
//!
//! Stored in TOML format at `~/.config/sbi/config.toml` (or XDG equivalent).
//! Every key is optional; command-line flags win over the file, and
//! `SBI_SNAPSHOT` wins over the file's `snapshot`.
//!
//! # Example Configuration
//!
//! ```toml
//! snapshot = "/var/lib/bi/snapshot.json"
//! output = "table"
//! log_filter = "smart_bi_engine=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the configured snapshot path.
pub const SNAPSHOT_ENV: &str = "SBI_SNAPSHOT";

/// Errors that can occur when loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

/// How report results are printed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Snapshot JSON the reports read from.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,

    /// Default output format for `sbi run` and `sbi validate`.
    #[serde(default)]
    pub output: OutputFormat,

    /// `tracing` filter directive used when `RUST_LOG` is unset and no `-v`
    /// flag is given.
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl EngineConfig {
    /// Load configuration from the default location.
    ///
    /// Returns the default config if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the default configuration file path.
    ///
    /// Uses XDG conventions:
    /// - Primary: `$XDG_CONFIG_HOME/sbi/config.toml`
    /// - Fallback: platform-specific config dir (e.g., `~/.config/sbi/config.toml` on Linux)
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join("sbi").join("config.toml"));
        }

        dirs::config_dir()
            .map(|p| p.join("sbi").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.snapshot
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::Validation("snapshot path must not be empty".into()));
        }
        if let Some(filter) = &self.log_filter
            && let Err(e) = tracing_subscriber::EnvFilter::try_new(filter)
        {
            return Err(ConfigError::Validation(format!(
                "invalid log_filter '{filter}': {e}"
            )));
        }
        Ok(())
    }

    /// Apply `SBI_SNAPSHOT` on top of the file's value.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var(SNAPSHOT_ENV)
            && !path.trim().is_empty()
        {
            self.snapshot = Some(PathBuf::from(path));
        }
        self
    }

    /// Resolve the snapshot to read: explicit flag, then env/file.
    pub fn resolve_snapshot(&self, flag: Option<&Path>) -> Result<PathBuf, ConfigError> {
        flag.map(Path::to_path_buf)
            .or_else(|| self.snapshot.clone())
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "no snapshot configured; pass --snapshot, set {SNAPSHOT_ENV}, or add `snapshot` to the config file"
                ))
            })
    }
}

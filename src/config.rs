//! Configuration system
//!
//! Handles loading engine configuration from files and environment
//! variables. Supports TOML config files and environment variable
//! overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::bg::GlucoseUnit;
use crate::datetime::TimePrefs;
use crate::store::DedupPolicy;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine behavior configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Duplicate-id resolution within one ingest batch
    #[serde(default)]
    pub dedup: DedupPolicy,
}

/// Default display preferences applied when a query supplies none
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub timezone_aware: bool,

    /// IANA timezone name, e.g. "America/Los_Angeles"
    #[serde(default)]
    pub timezone_name: Option<String>,

    #[serde(default = "default_bg_units")]
    pub bg_units: String,
}

fn default_bg_units() -> String {
    GlucoseUnit::MgDl.label().to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone_aware: false,
            timezone_name: None,
            bg_units: default_bg_units(),
        }
    }
}

impl DisplayConfig {
    /// Resolve into engine time preferences
    ///
    /// An unparseable timezone name degrades to UTC rather than failing
    /// the load.
    pub fn time_prefs(&self) -> TimePrefs {
        TimePrefs {
            timezone_aware: self.timezone_aware,
            timezone_name: self
                .timezone_name
                .as_deref()
                .and_then(|name| name.parse().ok()),
        }
    }

    /// Resolve the configured glucose unit, defaulting to mg/dL
    pub fn glucose_unit(&self) -> GlucoseUnit {
        GlucoseUnit::parse(&self.bg_units).unwrap_or_default()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(dedup) = std::env::var("DIATREND_DEDUP") {
            if dedup.eq_ignore_ascii_case("first") {
                config.engine.dedup = DedupPolicy::First;
            } else if dedup.eq_ignore_ascii_case("last") {
                config.engine.dedup = DedupPolicy::Last;
            }
        }

        if let Ok(timezone) = std::env::var("DIATREND_TIMEZONE") {
            config.display.timezone_aware = true;
            config.display.timezone_name = Some(timezone);
        }
        if let Ok(units) = std::env::var("DIATREND_BG_UNITS") {
            config.display.bg_units = units;
        }

        if let Ok(level) = std::env::var("DIATREND_LOG_LEVEL") {
            config.logging.level = level;
        }

        config
    }

    /// Load from the default path if present, else fall back to env
    pub fn load_default() -> Self {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path).unwrap_or_else(|e| {
                tracing::warn!("config load failed, using defaults: {e}");
                Self::from_env()
            }),
            _ => Self::from_env(),
        }
    }

    /// The conventional config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("diatrend").join("config.toml"))
    }
}

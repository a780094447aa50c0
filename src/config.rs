/*!
 * Configuration for the Stratus CLI
 */

use crate::error::{Result, StratusError};
use crate::s3::S3Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the access key id
pub const ENV_ACCESS_KEY: &str = "S3_AKI";
/// Environment variable holding the secret key
pub const ENV_SECRET_KEY: &str = "S3_KEY";
pub const ENV_SESSION_TOKEN: &str = "S3_SESSION_TOKEN";
pub const ENV_BUCKET: &str = "S3_BUCKET";
pub const ENV_REGION: &str = "S3_REGION";
pub const ENV_ENDPOINT: &str = "S3_ENDPOINT";

/// Top-level configuration file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection and upload settings
    pub s3: S3Config,

    /// Log level
    pub log_level: LogLevel,

    /// Write JSON logs to this file instead of stderr
    pub log_file: Option<PathBuf>,

    /// Verbose output (forces debug logging)
    pub verbose: bool,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    #[default]
    Warn,

    /// Info, warnings, and errors
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StratusError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| StratusError::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `~/.config/stratus/config.toml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stratus").join("config.toml"))
    }

    /// Load the file at `path`, or the default file if it exists, or defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Overlay settings from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Overlay settings from an arbitrary variable lookup
    ///
    /// Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(bucket) = get(ENV_BUCKET) {
            self.s3.bucket = bucket;
        }
        if let Some(region) = get(ENV_REGION) {
            self.s3.region = region;
        }
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            self.s3.endpoint = Some(endpoint);
        }
        if let Some(access_key) = get(ENV_ACCESS_KEY) {
            self.s3.access_key = Some(access_key);
        }
        if let Some(secret_key) = get(ENV_SECRET_KEY) {
            self.s3.secret_key = Some(secret_key);
        }
        if let Some(token) = get(ENV_SESSION_TOKEN) {
            self.s3.session_token = Some(token);
        }
    }
}

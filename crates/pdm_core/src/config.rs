//! Service configuration.
//!
//! # Responsibility
//! - Hold defaults applied to submissions that omit a policy or version.
//! - Load those defaults from JSON with every key optional.
//!
//! # Invariants
//! - `initial_version` is never empty after validation.
//! - Unknown `defaultMode` names are rejected at load time.

use crate::model::definition::{VersionControlMode, DEFAULT_VERSION};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Errors raised while loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    EmptyInitialVersion,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::EmptyInitialVersion => write!(f, "initialVersion cannot be empty"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::EmptyInitialVersion => None,
        }
    }
}

/// Optional logging section; see [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    pub level: Option<String>,
    /// Absolute directory for rolling log files.
    pub log_dir: String,
}

/// Defaults used by [`crate::service::definition_service::DefinitionService`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Mode used when a submission does not name one.
    pub default_mode: VersionControlMode,
    /// Version given to candidates that do not carry one.
    pub initial_version: String,
    pub logging: Option<LoggingConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_mode: VersionControlMode::default(),
            initial_version: DEFAULT_VERSION.to_string(),
            logging: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_version.trim().is_empty() {
            return Err(ConfigError::EmptyInitialVersion);
        }
        Ok(())
    }
}

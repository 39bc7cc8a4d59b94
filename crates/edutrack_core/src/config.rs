//! Runtime configuration for hosts embedding the core.
//!
//! # Responsibility
//! - Collect log, database and session settings from the environment or a
//!   JSON document.
//! - Normalize and validate them before any subsystem starts.
//!
//! # Invariants
//! - A validated config has a canonical log level and an absolute log dir.
//! - `db_path = None` means an in-memory database.

use crate::gateway::path::{CollectionPath, PathError};
use crate::logging::{default_log_level, normalize_level, normalize_log_dir};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_LOG_LEVEL: &str = "EDUTRACK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "EDUTRACK_LOG_DIR";
pub const ENV_DB_PATH: &str = "EDUTRACK_DB_PATH";
pub const ENV_USER_ID: &str = "EDUTRACK_USER_ID";

const DEFAULT_LOG_DIR_NAME: &str = "edutrack-logs";

/// Configuration load/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
    InvalidLogLevel(String),
    InvalidLogDir(String),
    InvalidUserId(PathError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid config json: {err}"),
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
            Self::InvalidLogDir(message) => write!(f, "{message}"),
            Self::InvalidUserId(err) => write!(f, "invalid user id: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::InvalidUserId(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// File logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level_string")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level_string(),
            log_dir: default_log_dir(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// SQLite document database file; in-memory when absent.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// User to sign in on startup.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl CoreConfig {
    /// Reads `EDUTRACK_*` variables; unset or blank values keep defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|trimmed| !trimmed.is_empty())
        };

        let mut config = Self::default();
        if let Some(level) = value(ENV_LOG_LEVEL) {
            config.logging.level = level;
        }
        if let Some(dir) = value(ENV_LOG_DIR) {
            config.logging.log_dir = PathBuf::from(dir);
        }
        config.db_path = value(ENV_DB_PATH).map(PathBuf::from);
        config.user_id = value(ENV_USER_ID);

        config.validate()?;
        Ok(config)
    }

    /// Normalizes the log level in place and checks every field.
    ///
    /// # Errors
    /// - Unknown log level.
    /// - Empty or relative log dir.
    /// - `user_id` that is not a valid document path segment.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.logging.level = normalize_level(&self.logging.level)
            .map_err(ConfigError::InvalidLogLevel)?
            .to_string();
        let dir = self.logging.log_dir.to_string_lossy().into_owned();
        self.logging.log_dir = normalize_log_dir(&dir).map_err(ConfigError::InvalidLogDir)?;
        if let Some(user_id) = &self.user_id {
            CollectionPath::user_subjects(user_id).map_err(ConfigError::InvalidUserId)?;
        }
        Ok(())
    }
}

fn default_level_string() -> String {
    default_log_level().to_string()
}

fn default_log_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, ENV_DB_PATH, ENV_LOG_LEVEL, ENV_USER_ID};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn lookup_applies_values_and_ignores_blank_ones() {
        let config = CoreConfig::from_lookup(lookup(&[
            (ENV_LOG_LEVEL, " WARNING "),
            (ENV_DB_PATH, "   "),
            (ENV_USER_ID, "user-42"),
        ]))
        .unwrap();

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.db_path, None);
        assert_eq!(config.user_id.as_deref(), Some("user-42"));
        assert!(config.logging.log_dir.is_absolute());
    }

    #[test]
    fn json_config_fills_defaults() {
        let config = CoreConfig::from_json_str(r#"{"db_path": "/tmp/edutrack.sqlite3"}"#).unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/edutrack.sqlite3")));
        assert!(config.user_id.is_none());
    }

    #[test]
    fn rejects_relative_log_dir_and_bad_user() {
        let err = CoreConfig::from_json_str(r#"{"logging": {"log_dir": "logs"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogDir(_)));

        let err = CoreConfig::from_lookup(lookup(&[(ENV_USER_ID, "a/b")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUserId(_)));
    }

    #[test]
    fn rejects_unknown_level_and_fields() {
        let err = CoreConfig::from_lookup(lookup(&[(ENV_LOG_LEVEL, "verbose")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(_)));

        let err = CoreConfig::from_json_str(r#"{"dbPath": "/x"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}

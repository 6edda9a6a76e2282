//! Store configuration.
//!
//! # Responsibility
//! - Describe where the database lives and how long waits may take.
//! - Load that description from JSON with defaults for missing fields.
//!
//! # Invariants
//! - A config returned by `from_json_str`/`load` has passed `validate()`.

use crate::db::DEFAULT_BUSY_TIMEOUT;
use crate::live::DEFAULT_AWAIT_TIMEOUT;
use crate::logging::{default_log_level, init_logging, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Settings for opening a `ShoppingStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite file path; a private in-memory database when unset.
    pub database_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    /// Budget for blocking waits on live queries.
    pub await_timeout_ms: u64,
    pub log_level: String,
    /// Absolute directory for rolling logs; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: duration_to_millis(DEFAULT_BUSY_TIMEOUT),
            await_timeout_ms: duration_to_millis(DEFAULT_AWAIT_TIMEOUT),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Parses and validates a JSON config; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the JSON config at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.await_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "await_timeout_ms must be greater than zero".to_string(),
            ));
        }
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn await_timeout(&self) -> Duration {
        Duration::from_millis(self.await_timeout_ms)
    }

    /// Starts file logging when `log_dir` is set.
    ///
    /// Returns `Ok(false)` when logging is not configured.
    pub fn init_logging(&self) -> Result<bool, String> {
        let Some(dir) = &self.log_dir else {
            return Ok(false);
        };
        let dir = dir
            .to_str()
            .ok_or_else(|| format!("log_dir is not valid UTF-8: `{}`", dir.display()))?;
        init_logging(&self.log_level, dir)?;
        Ok(true)
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_object_uses_defaults() {
        let config = StoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert!(config.database_path.is_none());
        assert_eq!(config.await_timeout(), Duration::from_secs(2));
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config = StoreConfig::from_json_str(
            r#"{"database_path":"/tmp/shopping.db","await_timeout_ms":250,"log_level":"WARN"}"#,
        )
        .unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/shopping.db")));
        assert_eq!(config.await_timeout(), Duration::from_millis(250));
        assert_eq!(config.log_level, "WARN");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = StoreConfig::from_json_str(r#"{"cache_size":10}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero = StoreConfig::from_json_str(r#"{"await_timeout_ms":0}"#).unwrap_err();
        assert!(matches!(zero, ConfigError::Invalid(_)));

        let level = StoreConfig::from_json_str(r#"{"log_level":"loud"}"#).unwrap_err();
        assert!(matches!(level, ConfigError::Invalid(message) if message.contains("loud")));

        let relative = StoreConfig::from_json_str(r#"{"log_dir":"logs"}"#).unwrap_err();
        assert!(matches!(relative, ConfigError::Invalid(_)));
    }

    #[test]
    fn init_logging_without_dir_is_a_no_op() {
        assert_eq!(StoreConfig::default().init_logging(), Ok(false));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

//! Configuration for coordinators.
//!
//! Configuration can be loaded from a TOML file:
//!
//! ```toml
//! name = "outbox"
//!
//! [retry]
//! enabled = true
//! max_attempts = 5
//! base_delay_ms = 500
//! ```

use crate::operation::Operation;
use crate::retry::{RetryPolicy, Retrying};
use resync_core::Backoff;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Root configuration for one coordinator.
#[derive(Debug, Clone, Deserialize)]
pub struct ResyncConfig {
    /// Name used in log output (default: "resync").
    #[serde(default = "default_name")]
    pub name: String,
    /// Retry collaborator wrapped around the operation.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Wrap the operation in a retry policy (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Total attempts per run, first one included (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds (default: 500).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on the exponential delay in milliseconds (default: 30s).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Upper bound of random jitter in milliseconds (default: 1000).
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

// Default value functions
fn default_name() -> String {
    "resync".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_jitter_ms() -> u64 {
    1_000
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

impl ResyncConfig {
    /// Default configuration with the given name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but make no sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        if self.retry.enabled && self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }
}

impl RetryConfig {
    /// Enabled retry configuration with default timings.
    pub fn enabled(max_attempts: u32) -> Self {
        Self {
            enabled: true,
            max_attempts,
            ..Self::default()
        }
    }

    /// The policy described by this configuration.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Backoff::new(
                Duration::from_millis(self.base_delay_ms),
                Duration::from_millis(self.max_delay_ms),
                Duration::from_millis(self.max_jitter_ms),
            ),
        }
    }

    /// Box `operation`, wrapped in [`Retrying`] when retry is enabled.
    pub(crate) fn wrap<T, O>(&self, operation: O) -> Arc<dyn Operation<T>>
    where
        T: Clone + Send + 'static,
        O: Operation<T>,
    {
        if self.enabled {
            Arc::new(Retrying::new(operation, self.policy()))
        } else {
            Arc::new(operation)
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to parse inline configuration.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Configuration parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = ResyncConfig::default();
        assert_eq!(config.name, "resync");
        assert!(!config.retry.enabled);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
name = "outbox"

[retry]
enabled = true
max_attempts = 5
base_delay_ms = 250
max_delay_ms = 10000
max_jitter_ms = 0
"#;

        let config = ResyncConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.name, "outbox");
        assert!(config.retry.enabled);
        assert_eq!(config.retry.max_attempts, 5);

        let policy = config.retry.policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff.base_delay(1), Duration::from_millis(250));
        assert_eq!(policy.backoff.max, Duration::from_secs(10));
        assert_eq!(policy.backoff.max_jitter, Duration::ZERO);
    }

    #[test]
    fn config_missing_fields_use_defaults() {
        let config = ResyncConfig::from_toml_str("").unwrap();
        assert_eq!(config.name, "resync");
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.retry.max_delay_ms, 30_000);

        let config = ResyncConfig::from_toml_str("[retry]\nenabled = true\n").unwrap();
        assert!(config.retry.enabled);
        assert_eq!(config.retry.max_jitter_ms, 1_000);
    }

    #[test]
    fn zero_attempts_rejected_when_enabled() {
        let err = ResyncConfig::from_toml_str("[retry]\nenabled = true\nmax_attempts = 0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn base_above_max_rejected() {
        let err = ResyncConfig::from_toml_str(
            "[retry]\nbase_delay_ms = 5000\nmax_delay_ms = 1000\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn empty_name_rejected() {
        let err = ResyncConfig::from_toml_str("name = \"  \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = ResyncConfig::from_toml_str("name = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"pull-messages\"").unwrap();
        writeln!(file, "[retry]").unwrap();
        writeln!(file, "enabled = true").unwrap();

        let config = ResyncConfig::from_file(file.path()).unwrap();
        assert_eq!(config.name, "pull-messages");
        assert!(config.retry.enabled);
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ResyncConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn builder_pattern() {
        let config = ResyncConfig::named("drafts").with_retry(RetryConfig::enabled(4));
        assert_eq!(config.name, "drafts");
        assert!(config.retry.enabled);
        assert_eq!(config.retry.max_attempts, 4);
    }
}

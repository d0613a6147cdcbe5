//! Retry configuration loading and parsing
//!
//! A retry loop can be described in YAML instead of code:
//!
//! ```yaml
//! retries: -1        # negative retries forever
//! period-ms: 250     # zero or negative falls back to five seconds
//! timeout-ms: 60000  # optional overall time limit
//! ```

use std::fs;
use std::time::Duration;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::{effective_period, RetrierBuilder, RetryBudget};

/// Retry settings as read from a configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Number of attempts; negative means unbounded
    #[serde(default = "default_retries")]
    pub retries: i64,

    /// Pause between attempts in milliseconds
    #[serde(default)]
    pub period_ms: Option<i64>,

    /// Overall time limit in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_retries() -> i64 {
    3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            period_ms: None,
            timeout_ms: None,
        }
    }
}

impl RetryConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: RetryConfig = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        tracing::debug!(path = %path, "loaded retry configuration");
        Self::from_yaml_str(&content)
    }

    /// Check the values for consistency
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == Some(0) {
            return Err(Error::invalid_config(
                "timeout-ms must be greater than zero when set",
            ));
        }
        Ok(())
    }

    /// The attempt budget
    pub fn budget(&self) -> RetryBudget {
        RetryBudget::from_signed(self.retries)
    }

    /// The effective pause between attempts
    pub fn period(&self) -> Duration {
        let period = self
            .period_ms
            .filter(|ms| *ms > 0)
            .map(|ms| Duration::from_millis(ms.unsigned_abs()));
        effective_period(period)
    }

    /// The overall time limit, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// A retrier builder preloaded with these settings
    pub fn to_builder(&self) -> RetrierBuilder {
        let builder = RetrierBuilder::new()
            .budget(self.budget())
            .period(self.period());

        match self.timeout() {
            Some(limit) => builder.timeout(limit),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::from_yaml_str("{}").unwrap();

        assert_eq!(config, RetryConfig::default());
        assert_eq!(config.budget(), RetryBudget::Attempts(3));
        assert_eq!(config.period(), Duration::from_secs(5));
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_kebab_case_keys() {
        let config = RetryConfig::from_yaml_str(
            "retries: -1\nperiod-ms: 250\ntimeout-ms: 60000\n",
        )
        .unwrap();

        assert_eq!(config.budget(), RetryBudget::Unbounded);
        assert_eq!(config.period(), Duration::from_millis(250));
        assert_eq!(config.timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_non_positive_period_falls_back() {
        for period in ["0", "-20"] {
            let config =
                RetryConfig::from_yaml_str(&format!("period-ms: {}\n", period)).unwrap();
            assert_eq!(config.period(), Duration::from_secs(5), "period-ms: {}", period);
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = RetryConfig::from_yaml_str("timeout-ms: 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = RetryConfig::from_yaml_str("retries: [not a number]\n").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().join("retry.yaml")).unwrap();
        fs::write(&path, "retries: 7\nperiod-ms: 15\n").unwrap();

        let config = RetryConfig::load(&path).unwrap();

        assert_eq!(config.retries, 7);
        assert_eq!(config.period(), Duration::from_millis(15));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().join("absent.yaml")).unwrap();

        let err = RetryConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_to_builder_carries_settings() {
        let config = RetryConfig {
            retries: 2,
            period_ms: Some(40),
            timeout_ms: Some(1000),
        };

        let retrier = config.to_builder().build();

        assert_eq!(retrier.budget(), RetryBudget::Attempts(2));
        assert_eq!(retrier.period(), Duration::from_millis(40));
    }
}

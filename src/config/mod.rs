//! Configuration loading and management

use crate::core::query::DEFAULT_LIMIT;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of calls a tenant may make per window
pub const DEFAULT_DAILY_LIMIT: u64 = 50_000;

/// Length of a usage window (one day)
pub const DEFAULT_WINDOW_SECS: u64 = 86_400;

/// Page sizes applied to entity listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Used when a request carries no `limit`
    pub default_limit: u64,

    /// Upper bound on `limit`; unbounded when absent
    pub max_limit: Option<u64>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: None,
        }
    }
}

/// Usage accounting settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Limit for tenants without a stored one
    pub default_daily_limit: u64,

    pub window_secs: u64,

    /// How often blocked tenants are re-checked
    pub refresh_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_daily_limit: DEFAULT_DAILY_LIMIT,
            window_secs: DEFAULT_WINDOW_SECS,
            refresh_interval_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        // tokio::time::interval panics on a zero period
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

/// Complete configuration for the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrudlyConfig {
    pub pagination: PaginationConfig,

    pub rate_limit: RateLimitConfig,
}

impl CrudlyConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    ///
    /// Missing sections and keys fall back to their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CrudlyConfig::default();

        assert_eq!(config.pagination.default_limit, 20);
        assert_eq!(config.pagination.max_limit, None);
        assert_eq!(config.rate_limit.default_daily_limit, 50_000);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = CrudlyConfig::from_yaml_str(
            r#"
pagination:
  max_limit: 100
rate_limit:
  default_daily_limit: 10
"#,
        )
        .unwrap();

        assert_eq!(config.pagination.default_limit, 20);
        assert_eq!(config.pagination.max_limit, Some(100));
        assert_eq!(config.rate_limit.default_daily_limit, 10);
        assert_eq!(config.rate_limit.refresh_interval_secs, 60);
    }

    #[test]
    fn test_yaml_serialization() {
        let config = CrudlyConfig {
            pagination: PaginationConfig {
                default_limit: 5,
                max_limit: Some(50),
            },
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();

        let parsed = CrudlyConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rate_limit:\n  window_secs: 3600").unwrap();

        let config = CrudlyConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.rate_limit.window(), Duration::from_secs(3600));

        assert!(CrudlyConfig::from_yaml_file("/nonexistent/crudly.yaml").is_err());
    }

    #[test]
    fn test_zero_refresh_interval_is_clamped() {
        let config = RateLimitConfig {
            refresh_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }
}

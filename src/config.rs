//! Configuration types for the throttler
//!
//! Everything a throttler needs can be described in YAML or JSON and
//! loaded with [`ThrottlerConfig::load`]. Every field has a default, so an
//! empty document is a valid configuration.

use crate::error::{Error, Result};
use crate::throttle::BackoffPolicy;
use crate::types::{BackoffOverflow, GateKind};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Marker that forces a retry when found in a response body
pub const DEFAULT_RETRY_MARKER: &str = "exceeded";

/// Highest rate for which `1s / rps` is still a positive interval
pub const MAX_REQUESTS_PER_SECOND: u32 = 1_000_000_000;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete throttler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottlerConfig {
    /// Outbound requests per second shared by all callers
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Maximum attempts per dispatch
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Body substring that forces a retry (`null` disables body inspection)
    #[serde(default = "default_retry_marker")]
    pub retry_marker: Option<String>,

    /// Status codes retried without looking at the body
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,

    /// Backoff between attempts
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Rate gate settings
    #[serde(default)]
    pub gate: GateConfig,

    /// Settings for the default reqwest transport
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for ThrottlerConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            retry_limit: default_retry_limit(),
            retry_marker: default_retry_marker(),
            retry_statuses: default_retry_statuses(),
            backoff: BackoffConfig::default(),
            gate: GateConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_retry_limit() -> u32 {
    3
}

fn default_retry_marker() -> Option<String> {
    Some(DEFAULT_RETRY_MARKER.to_string())
}

fn default_retry_statuses() -> Vec<u16> {
    vec![429, 502]
}

impl ThrottlerConfig {
    /// Load a config file; `.json` files are parsed as JSON, anything else as YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // serde_yaml rejects an empty document, treat it as all defaults
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field for values a throttler cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_second == 0 {
            return Err(Error::invalid_value(
                "requests_per_second",
                "must be greater than zero",
            ));
        }
        if self.requests_per_second > MAX_REQUESTS_PER_SECOND {
            return Err(Error::invalid_value(
                "requests_per_second",
                format!("must be at most {MAX_REQUESTS_PER_SECOND}"),
            ));
        }
        if self.retry_marker.as_deref() == Some("") {
            return Err(Error::invalid_value(
                "retry_marker",
                "must not be empty, use null to disable body inspection",
            ));
        }
        self.retry_status_codes()?;
        self.backoff.validate()?;
        self.gate.validate()?;
        self.transport.validate()
    }

    /// Interval between two rate gate permits
    pub fn interval(&self) -> Duration {
        Duration::from_secs(1) / self.requests_per_second.max(1)
    }

    /// Retry statuses as typed status codes
    pub fn retry_status_codes(&self) -> Result<Vec<StatusCode>> {
        self.retry_statuses
            .iter()
            .map(|&code| {
                StatusCode::from_u16(code).map_err(|_| {
                    Error::invalid_value("retry_statuses", format!("{code} is not an HTTP status"))
                })
            })
            .collect()
    }
}

// ============================================================================
// Backoff
// ============================================================================

/// Backoff between retry attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// First delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Ceiling in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,

    /// Behaviour when doubling passes the ceiling
    #[serde(default)]
    pub overflow: BackoffOverflow,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
            overflow: BackoffOverflow::default(),
        }
    }
}

fn default_initial_ms() -> u64 {
    1_000
}

fn default_max_ms() -> u64 {
    60_000
}

impl BackoffConfig {
    fn validate(&self) -> Result<()> {
        if self.initial_ms == 0 {
            return Err(Error::invalid_value(
                "backoff.initial_ms",
                "must be greater than zero",
            ));
        }
        if self.max_ms < self.initial_ms {
            return Err(Error::invalid_value(
                "backoff.max_ms",
                "must not be below backoff.initial_ms",
            ));
        }
        Ok(())
    }

    /// Backoff policy described by this config
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.initial_ms),
            Duration::from_millis(self.max_ms),
            self.overflow,
        )
    }
}

// ============================================================================
// Rate Gate
// ============================================================================

/// Rate gate settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Gate implementation
    #[serde(default)]
    pub kind: GateKind,

    /// Permits that may accumulate (token bucket only)
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            kind: GateKind::default(),
            burst: default_burst(),
        }
    }
}

fn default_burst() -> u32 {
    1
}

impl GateConfig {
    fn validate(&self) -> Result<()> {
        if self.burst == 0 {
            return Err(Error::invalid_value("gate.burst", "must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Settings for the default reqwest transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Whole-exchange timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("throttler/{}", env!("CARGO_PKG_VERSION"))
}

impl TransportConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(Error::invalid_value(
                "transport.timeout_seconds",
                "must be greater than zero",
            ));
        }
        if self.connect_timeout_seconds == 0 {
            return Err(Error::invalid_value(
                "transport.connect_timeout_seconds",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ThrottlerConfig::default();
        assert_eq!(config.requests_per_second, 10);
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.retry_marker.as_deref(), Some("exceeded"));
        assert_eq!(config.retry_statuses, vec![429, 502]);
        assert_eq!(config.backoff.initial_ms, 1_000);
        assert_eq!(config.backoff.max_ms, 60_000);
        assert_eq!(config.backoff.overflow, BackoffOverflow::Wrap);
        assert_eq!(config.gate.kind, GateKind::Ticker);
        assert_eq!(config.interval(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = ThrottlerConfig::from_yaml_str("").unwrap();
        assert_eq!(config, ThrottlerConfig::default());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
requests_per_second: 4
retry_limit: 6
retry_marker: "rate limit"
retry_statuses: [429, 503]
backoff:
  initial_ms: 250
  max_ms: 4000
  overflow: cap
gate:
  kind: token_bucket
  burst: 2
transport:
  timeout_seconds: 5
"#;

        let config = ThrottlerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.requests_per_second, 4);
        assert_eq!(config.retry_limit, 6);
        assert_eq!(config.retry_marker.as_deref(), Some("rate limit"));
        assert_eq!(
            config.retry_status_codes().unwrap(),
            vec![StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE]
        );
        assert_eq!(config.backoff.overflow, BackoffOverflow::Cap);
        assert_eq!(config.gate.kind, GateKind::TokenBucket);
        assert_eq!(config.gate.burst, 2);
        assert_eq!(config.transport.timeout_seconds, 5);
        assert_eq!(config.transport.connect_timeout_seconds, 10);
        assert_eq!(config.interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_null_marker_disables_inspection() {
        let config = ThrottlerConfig::from_yaml_str("retry_marker: null").unwrap();
        assert_eq!(config.retry_marker, None);
    }

    #[test]
    fn test_parse_json() {
        let config =
            ThrottlerConfig::from_json_str(r#"{"requests_per_second": 2, "retry_limit": 0}"#)
                .unwrap();
        assert_eq!(config.requests_per_second, 2);
        assert_eq!(config.retry_limit, 0);
    }

    #[test]
    fn test_validation_errors() {
        let err = ThrottlerConfig::from_yaml_str("requests_per_second: 0").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfigValue { ref field, .. } if field == "requests_per_second"
        ));

        let err = ThrottlerConfig::from_yaml_str("requests_per_second: 2000000000").unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));

        let err = ThrottlerConfig::from_yaml_str("retry_marker: \"\"").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfigValue { ref field, .. } if field == "retry_marker"
        ));

        let err = ThrottlerConfig::from_yaml_str("retry_statuses: [42]").unwrap_err();
        assert!(err.to_string().contains("42 is not an HTTP status"));

        let yaml = "backoff:\n  initial_ms: 500\n  max_ms: 100";
        let err = ThrottlerConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfigValue { ref field, .. } if field == "backoff.max_ms"
        ));

        let err = ThrottlerConfig::from_yaml_str("gate:\n  burst: 0").unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = ThrottlerConfig::from_yaml_str("requests_per_second: [").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "requests_per_second: 3").unwrap();
        let config = ThrottlerConfig::load(yaml.path()).unwrap();
        assert_eq!(config.requests_per_second, 3);

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(json, r#"{{"retry_limit": 9}}"#).unwrap();
        let config = ThrottlerConfig::load(json.path()).unwrap();
        assert_eq!(config.retry_limit, 9);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ThrottlerConfig::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_backoff_policy_from_config() {
        let policy = BackoffConfig::default().policy();
        assert_eq!(policy.initial(), Duration::from_secs(1));
        assert_eq!(policy.ceiling(), Duration::from_secs(60));
        assert_eq!(policy.overflow(), BackoffOverflow::Wrap);
    }
}

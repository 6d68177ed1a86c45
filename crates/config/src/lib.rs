//! Configuration values for the restitch continuation engine.
//!
//! The engine has no user-facing configuration surface of its own; whatever
//! DSL or flag layer sits above it resolves to the values here. Loads from
//! TOML with serde defaults and validates at construction.

use restitch_core::error::ConfigError;
use restitch_core::format::FormatPreference;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Hard ceiling on continuation attempts, applied regardless of caller
/// configuration, to bound worst-case cost.
pub const MAX_ATTEMPTS_CEILING: u32 = 20;

/// What to do when the merge comes back degraded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Return the degraded result plus metadata explaining the degradation.
    #[default]
    ReturnPartial,
    /// Surface any `merge_success == false` as a hard error.
    RaiseError,
}

/// Configuration consumed by one continuation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationConfig {
    /// Hard cap on retry-loop iterations, 1..=20.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Forces merger selection, or defers it to the format detector.
    #[serde(default)]
    pub output_format: FormatPreference,

    /// Whether a failed/degraded merge is returned or raised.
    #[serde(default)]
    pub on_failure: FailurePolicy,

    /// Timeout for each transport call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            output_format: FormatPreference::default(),
            on_failure: FailurePolicy::default(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ContinuationConfig {
    /// Validate and normalize the configuration.
    ///
    /// `max_attempts == 0` is rejected; values above [`MAX_ATTEMPTS_CEILING`]
    /// are clamped to the ceiling rather than rejected, since the caller's
    /// intent ("retry a lot") is still honorable within the cost bound.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.max_attempts > MAX_ATTEMPTS_CEILING {
            warn!(
                requested = self.max_attempts,
                ceiling = MAX_ATTEMPTS_CEILING,
                "max_attempts above hard ceiling, clamping"
            );
            self.max_attempts = MAX_ATTEMPTS_CEILING;
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(self)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()
    }

    /// Load from a TOML file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restitch_core::format::OutputFormat;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ContinuationConfig::default().validate().unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.output_format, FormatPreference::Auto);
        assert_eq!(config.on_failure, FailurePolicy::ReturnPartial);
        assert_eq!(config.request_timeout_secs, 120);
    }

    #[test]
    fn zero_attempts_rejected() {
        let config = ContinuationConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn attempts_clamped_to_ceiling() {
        let config = ContinuationConfig {
            max_attempts: 100,
            ..Default::default()
        };
        let config = config.validate().unwrap();
        assert_eq!(config.max_attempts, MAX_ATTEMPTS_CEILING);
    }

    #[test]
    fn parses_toml() {
        let config = ContinuationConfig::from_toml_str(
            r#"
            max_attempts = 5
            output_format = "structured_data"
            on_failure = "raise_error"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(
            config.output_format.as_explicit(),
            Some(OutputFormat::StructuredData)
        );
        assert_eq!(config.on_failure, FailurePolicy::RaiseError);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = ContinuationConfig::from_toml_str("").unwrap();
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_attempts = 7").unwrap();
        let config = ContinuationConfig::load(file.path()).unwrap();
        assert_eq!(config.max_attempts, 7);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ContinuationConfig::load("/nonexistent/restitch.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

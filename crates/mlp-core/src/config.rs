//! Engine configuration
//!
//! Loaded from TOML. Every section is optional; missing keys take defaults.
//!
//! ```toml
//! default_total_weeks = 12
//! lock_policy = "after_week_rollover"
//!
//! [analytics]
//! participation_weight = 0.7
//! length_weight = 0.3
//! ```

use crate::error::ConfigError;
use mlp_analytics::AnalyticsConfig;
use mlp_kernel::{LedgerPolicy, LockPolicy, DEFAULT_MAX_RESPONSE_CHARS, DEFAULT_MAX_WEEKS, DEFAULT_TOTAL_WEEKS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Program length used when a caller does not supply themes
    pub default_total_weeks: u32,
    /// Upper bound on program length
    pub max_total_weeks: u32,
    /// When response amendments stop being accepted
    pub lock_policy: LockPolicy,
    /// Longest accepted response, in characters
    pub max_response_chars: usize,
    /// Scoring and read budgets
    pub analytics: AnalyticsConfig,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With lock policy
    #[inline]
    #[must_use]
    pub fn with_lock_policy(mut self, lock_policy: LockPolicy) -> Self {
        self.lock_policy = lock_policy;
        self
    }

    /// With response length cap
    #[inline]
    #[must_use]
    pub fn with_max_response_chars(mut self, max: usize) -> Self {
        self.max_response_chars = max;
        self
    }

    /// With default program length
    #[inline]
    #[must_use]
    pub fn with_default_total_weeks(mut self, weeks: u32) -> Self {
        self.default_total_weeks = weeks;
        self
    }

    /// With analytics settings
    #[inline]
    #[must_use]
    pub fn with_analytics(mut self, analytics: AnalyticsConfig) -> Self {
        self.analytics = analytics;
        self
    }

    /// Ledger settings derived from this config
    #[inline]
    #[must_use]
    pub fn ledger_policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            lock: self.lock_policy,
            max_response_chars: self.max_response_chars,
        }
    }

    /// Parse and validate
    ///
    /// # Errors
    /// - `ConfigError::Parse` for malformed TOML or unknown enum values
    /// - `ConfigError::Invalid` when a value is out of range
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    ///
    /// # Errors
    /// - `ConfigError::Io` when the file cannot be read
    /// - see [`EngineConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// - `ConfigError::Invalid` if serialization fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// # Errors
    /// - `ConfigError::Invalid` naming the offending setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_total_weeks == 0 {
            return Err(ConfigError::Invalid("max_total_weeks must be positive".to_string()));
        }
        if self.default_total_weeks == 0 || self.default_total_weeks > self.max_total_weeks {
            return Err(ConfigError::Invalid(format!(
                "default_total_weeks must be within 1..={}, got {}",
                self.max_total_weeks, self.default_total_weeks
            )));
        }
        if self.max_response_chars == 0 {
            return Err(ConfigError::Invalid("max_response_chars must be positive".to_string()));
        }
        self.analytics
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_total_weeks: DEFAULT_TOTAL_WEEKS,
            max_total_weeks: DEFAULT_MAX_WEEKS,
            lock_policy: LockPolicy::Never,
            max_response_chars: DEFAULT_MAX_RESPONSE_CHARS,
            analytics: AnalyticsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            lock_policy = "after_week_rollover"

            [analytics]
            participation_weight = 0.7
            length_weight = 0.3
            "#,
        )
        .unwrap();
        assert_eq!(config.lock_policy, LockPolicy::AfterWeekRollover);
        assert_eq!(config.analytics.target_response_chars, 280);
        assert_eq!(config.default_total_weeks, 12);
    }

    #[test]
    fn bad_weights_rejected() {
        let err = EngineConfig::from_toml_str(
            "[analytics]\nparticipation_weight = 0.9\nlength_weight = 0.4\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_lock_policy_is_parse_error() {
        let err = EngineConfig::from_toml_str("lock_policy = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file_round_trips() {
        let config = EngineConfig::new()
            .with_lock_policy(LockPolicy::AfterWeekRollover)
            .with_default_total_weeks(8);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes()).unwrap();

        assert_eq!(EngineConfig::load(file.path()).unwrap(), config);
        assert!(matches!(
            EngineConfig::load(file.path().with_extension("missing")),
            Err(ConfigError::Io { .. })
        ));
    }
}

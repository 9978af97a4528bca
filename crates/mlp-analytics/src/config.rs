//! Aggregator configuration

use crate::error::AnalyticsError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tolerance when checking that the engagement weights sum to one
const WEIGHT_EPSILON: f64 = 1e-6;

/// Tunables for scoring, trend length and read budgets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Weight of participation in the engagement score
    pub participation_weight: f64,
    /// Weight of response length in the engagement score
    pub length_weight: f64,
    /// Average response length that earns the full length component
    pub target_response_chars: u32,
    /// Weeks kept in each trend series
    pub trend_window: usize,
    /// Time budget for one snapshot read
    pub query_timeout_ms: u64,
    /// Maximum cached snapshots
    pub snapshot_capacity: u64,
}

impl AnalyticsConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With engagement weights
    #[inline]
    #[must_use]
    pub fn with_weights(mut self, participation: f64, length: f64) -> Self {
        self.participation_weight = participation;
        self.length_weight = length;
        self
    }

    /// With target response length
    #[inline]
    #[must_use]
    pub fn with_target_chars(mut self, chars: u32) -> Self {
        self.target_response_chars = chars;
        self
    }

    /// With trend window size
    #[inline]
    #[must_use]
    pub fn with_trend_window(mut self, weeks: usize) -> Self {
        self.trend_window = weeks;
        self
    }

    /// With read time budget
    #[inline]
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Reject weights that are negative or do not sum to one, and zero sizes
    ///
    /// # Errors
    /// - `AnalyticsError::InvalidConfig` naming the offending setting
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        let (wp, wl) = (self.participation_weight, self.length_weight);
        if !wp.is_finite() || !wl.is_finite() || wp < 0.0 || wl < 0.0 {
            return Err(AnalyticsError::InvalidConfig(format!(
                "weights must be non-negative, got {wp} and {wl}"
            )));
        }
        if (wp + wl - 1.0).abs() > WEIGHT_EPSILON {
            return Err(AnalyticsError::InvalidConfig(format!(
                "weights must sum to 1.0, got {}",
                wp + wl
            )));
        }
        if self.target_response_chars == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "target_response_chars must be positive".to_string(),
            ));
        }
        if self.trend_window == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "trend_window must be positive".to_string(),
            ));
        }
        if self.query_timeout_ms == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "query_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            participation_weight: 0.6,
            length_weight: 0.4,
            target_response_chars: 280,
            trend_window: 12,
            query_timeout_ms: 2_000,
            snapshot_capacity: 1_024,
        }
    }
}

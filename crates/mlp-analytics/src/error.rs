//! Error types for analytics

use mlp_content::{OrgId, TeamId};

/// Analytics read and configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyticsError {
    /// No team with this id is known to the aggregator
    #[error("unknown team: {0}")]
    UnknownTeam(TeamId),

    /// No organization with this id is known to the aggregator
    #[error("unknown organization: {0}")]
    UnknownOrganization(OrgId),

    /// Week range is empty or starts at 0
    #[error("invalid period {from_week}..={to_week}")]
    InvalidPeriod { from_week: u32, to_week: u32 },

    /// Read exceeded its time budget; no partial data is returned
    #[error("analytics query timed out after {budget_ms}ms")]
    Timeout { budget_ms: u64 },

    /// Rejected configuration
    #[error("invalid analytics config: {0}")]
    InvalidConfig(String),

    /// Background computation failed to complete
    #[error("snapshot computation aborted: {0}")]
    Aborted(String),
}

impl AnalyticsError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if the scope itself does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownTeam(_) | Self::UnknownOrganization(_))
    }
}

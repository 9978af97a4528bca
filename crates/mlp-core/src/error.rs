//! Error types for the engine facade
//!
//! Component errors collapse into one taxonomy callers can branch on:
//! not found, invalid input, invalid transition or state, locked, timeout,
//! forbidden and conflict. Nothing here is fatal to the service.

use mlp_analytics::AnalyticsError;
use mlp_content::{CatalogError, TeamId, UserId};
use mlp_kernel::{Capability, LedgerError, Role, TrackerError};
use std::path::PathBuf;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Referenced entity does not exist
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Malformed request
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Action not allowed from the current process status
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Process status temporarily blocks the action
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Response edit window closed
    #[error("response to week {week} is locked")]
    Locked { week: u32 },

    /// Analytics read exceeded its budget
    #[error("operation timed out after {budget_ms}ms")]
    Timeout { budget_ms: u64 },

    /// Caller lacks the capability
    #[error("{role} may not {capability:?}")]
    Forbidden { role: Role, capability: Capability },

    /// Not a member of the team the request targets
    #[error("user {user_id} is not a member of team {team_id}")]
    NotAMember { user_id: UserId, team_id: TeamId },

    /// Publish raced or skipped a version
    #[error("conflict: {0}")]
    Conflict(String),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Denied by role or membership
    #[inline]
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. } | Self::NotAMember { .. })
    }

    /// Short machine-readable kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidInput { .. } => "invalid_input",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::InvalidState(_) => "invalid_state",
            Self::Locked { .. } => "locked",
            Self::Timeout { .. } => "timeout",
            Self::Forbidden { .. } | Self::NotAMember { .. } => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Config(_) => "config",
        }
    }

    pub(crate) fn not_found(what: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }
}

impl From<CatalogError> for EngineError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound { process_id, week } => {
                Self::not_found("content unit", format!("{process_id} week {week}"))
            }
            CatalogError::UnknownUnit(id) => Self::not_found("content unit", id),
            CatalogError::UnknownVersion { .. } => Self::not_found("content version", err),
            CatalogError::AlreadyPublished { .. } | CatalogError::VersionGap { .. } => {
                Self::Conflict(err.to_string())
            }
            CatalogError::InvalidWeek => Self::InvalidInput {
                field: "week",
                reason: err.to_string(),
            },
            CatalogError::EmptyUnit => Self::InvalidInput {
                field: "fields",
                reason: err.to_string(),
            },
        }
    }
}

impl From<TrackerError> for EngineError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::NotFound(id) => Self::not_found("process", id),
            TrackerError::InvalidTransition { .. } | TrackerError::StateMachine(_) => {
                Self::InvalidTransition(err.to_string())
            }
            TrackerError::InvalidState { .. } => Self::InvalidState(err.to_string()),
            TrackerError::InvalidInput { field, reason } => Self::InvalidInput { field, reason },
            TrackerError::Content(inner) => inner.into(),
        }
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UnitNotFound(id) => Self::not_found("content unit", id),
            LedgerError::ProcessNotFound(id) => Self::not_found("process", id),
            LedgerError::InvalidInput { field, reason } => Self::InvalidInput { field, reason },
            LedgerError::Locked { week } => Self::Locked { week },
        }
    }
}

impl From<AnalyticsError> for EngineError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::UnknownTeam(id) => Self::not_found("team", id),
            AnalyticsError::UnknownOrganization(id) => Self::not_found("organization", id),
            AnalyticsError::InvalidPeriod { .. } => Self::InvalidInput {
                field: "period",
                reason: err.to_string(),
            },
            AnalyticsError::Timeout { budget_ms } => Self::Timeout { budget_ms },
            AnalyticsError::InvalidConfig(reason) => Self::Config(ConfigError::Invalid(reason)),
            AnalyticsError::Aborted(reason) => Self::Conflict(reason),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML for the config schema
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed but out of range
    #[error("{0}")]
    Invalid(String),
}

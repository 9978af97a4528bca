//! Error types for the kernel
//!
//! Every failure here is per-request: a bad call is reported to the caller
//! and never poisons tracker or ledger state.

use crate::process::{ProcessAction, ProcessStatus};
use mlp_content::{CatalogError, ContentUnitId, ProcessId};

/// Illegal edge in the process status graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal status transition {from:?} -> {to:?}")]
pub struct StateMachineError {
    pub from: ProcessStatus,
    pub to: ProcessStatus,
}

/// Process tracker errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// Unknown process
    #[error("process not found: {0}")]
    NotFound(ProcessId),

    /// Action not allowed from the current status
    #[error("cannot {action} a {from} process")]
    InvalidTransition {
        from: ProcessStatus,
        action: ProcessAction,
    },

    /// Process is in a status that temporarily blocks the action
    #[error("cannot {action} while process is {status}")]
    InvalidState {
        status: ProcessStatus,
        action: ProcessAction,
    },

    /// Malformed request
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Content for the tracked week is not authored yet
    #[error("no content yet: {0}")]
    Content(#[from] CatalogError),

    /// Status graph violation
    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

impl TrackerError {
    /// Conflict with the current process state (surfaced as 409-style)
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. } | Self::InvalidState { .. } | Self::StateMachine(_)
        )
    }

    /// Tracker failures never clear up on their own
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Missing content for the tracked week; fixed by publishing it
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Content(inner) if inner.is_not_found())
    }
}

/// Response ledger errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Unit id does not resolve through the catalog
    #[error("content unit not found: {0}")]
    UnitNotFound(ContentUnitId),

    /// Owning process is gone
    #[error("process not found: {0}")]
    ProcessNotFound(ProcessId),

    /// Rejected text
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Edit window closed
    #[error("response to week {week} is locked; the process has moved on")]
    Locked { week: u32 },
}

impl LedgerError {
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Audit chain errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// A link or an event body was altered
    #[error("audit chain broken at sequence {0}")]
    IntegrityViolation(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_error_display() {
        let err = TrackerError::InvalidTransition {
            from: ProcessStatus::Completed,
            action: ProcessAction::Advance,
        };
        assert_eq!(err.to_string(), "cannot advance a completed process");
        assert!(err.is_conflict());
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_content_is_recoverable() {
        let err = TrackerError::from(CatalogError::NotFound {
            process_id: "p1".into(),
            week: 3,
        });
        assert!(err.is_recoverable());
        assert!(!TrackerError::NotFound("p1".into()).is_recoverable());
    }

    #[test]
    fn ledger_error_display() {
        let err = LedgerError::InvalidInput {
            field: "text",
            reason: "must not be blank".to_string(),
        };
        assert!(err.to_string().contains("invalid text"));
    }
}

use crate::error::StateMachineError;
use crate::process::{ProcessAction, ProcessStatus};

/// Validates a status transition.
///
/// Illegal transitions are returned as errors so callers can surface them as
/// conflicts. Enable the `strict-debug` feature to panic instead.
pub fn validate_transition(from: ProcessStatus, to: ProcessStatus) -> Result<(), StateMachineError> {
    if allowed(from, to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal process transition attempted: {:?} -> {:?}", from, to);

        #[cfg(not(feature = "strict-debug"))]
        Err(StateMachineError { from, to })
    }
}

pub fn allowed_transitions(from: ProcessStatus) -> Vec<ProcessStatus> {
    use ProcessStatus::*;
    match from {
        Planned => vec![Active],
        Active => vec![Paused, Completed],
        Paused => vec![Active],
        Completed => vec![],
    }
}

/// Actions a caller may attempt from `from`.
pub fn allowed_actions(from: ProcessStatus) -> Vec<ProcessAction> {
    use ProcessAction::*;
    match from {
        ProcessStatus::Planned => vec![Start],
        ProcessStatus::Active => vec![Advance, Pause, OverrideWeek],
        ProcessStatus::Paused => vec![Resume],
        ProcessStatus::Completed => vec![],
    }
}

fn allowed(from: ProcessStatus, to: ProcessStatus) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

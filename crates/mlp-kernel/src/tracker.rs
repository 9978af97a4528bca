//! Process tracker
//!
//! Owns every [`Process`] and is the only writer of its status and week.
//! Weekly advances carry a scheduler [`Tick`]; the tracker remembers the last
//! tick it applied per process and turns replays into no-ops, so an external
//! cron firing twice cannot skip a week.

use crate::error::TrackerError;
use crate::logging::AuditLog;
use crate::process::{
    AdvanceOutcome, Process, ProcessAction, ProcessSpec, ProcessStatus, Tick,
};
use crate::state_machine::{allowed_actions, validate_transition};
use crate::store::ProcessStore;
use crate::sync::KeyedLocks;
use chrono::Utc;
use mlp_content::{ContentCatalog, ContentUnit, ProcessId, TeamId};
use std::sync::Arc;

/// Upper bound on program length unless configured otherwise
pub const DEFAULT_MAX_WEEKS: u32 = 52;

/// Process state machine driver
pub struct ProcessTracker {
    store: Arc<dyn ProcessStore>,
    catalog: Arc<dyn ContentCatalog>,
    audit: Arc<AuditLog>,
    locks: KeyedLocks<ProcessId>,
    max_weeks: u32,
}

impl std::fmt::Debug for ProcessTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessTracker")
            .field("max_weeks", &self.max_weeks)
            .finish_non_exhaustive()
    }
}

impl ProcessTracker {
    /// Create tracker over a store and catalog
    #[must_use]
    pub fn new(
        store: Arc<dyn ProcessStore>,
        catalog: Arc<dyn ContentCatalog>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            store,
            catalog,
            audit,
            locks: KeyedLocks::new(),
            max_weeks: DEFAULT_MAX_WEEKS,
        }
    }

    /// With a different program length cap
    #[inline]
    #[must_use]
    pub fn with_max_weeks(mut self, max_weeks: u32) -> Self {
        self.max_weeks = max_weeks.max(1);
        self
    }

    /// Create a planned process
    ///
    /// # Errors
    /// - `TrackerError::InvalidInput` for a blank name, an empty or oversized
    ///   theme sequence, or a blank theme
    pub fn create(&self, spec: ProcessSpec) -> Result<Process, TrackerError> {
        if spec.name.trim().is_empty() {
            return Err(TrackerError::InvalidInput {
                field: "name",
                reason: "must not be blank".to_string(),
            });
        }
        if spec.themes.is_empty() {
            return Err(TrackerError::InvalidInput {
                field: "themes",
                reason: "at least one weekly theme is required".to_string(),
            });
        }
        if spec.themes.len() > self.max_weeks as usize {
            return Err(TrackerError::InvalidInput {
                field: "themes",
                reason: format!(
                    "{} weeks exceeds the maximum of {}",
                    spec.themes.len(),
                    self.max_weeks
                ),
            });
        }
        if let Some(pos) = spec.themes.iter().position(mlp_content::Theme::is_blank) {
            return Err(TrackerError::InvalidInput {
                field: "themes",
                reason: format!("theme for week {} is blank", pos + 1),
            });
        }

        let process = Process::from_spec(spec, Utc::now());
        self.store.put(process.clone());
        self.audit.append(
            process.id.as_str(),
            "process_created",
            format!("team={} weeks={}", process.team_id, process.total_weeks()),
        );
        tracing::info!(
            process_id = %process.id,
            team_id = %process.team_id,
            weeks = process.total_weeks(),
            "process created"
        );
        Ok(process)
    }

    /// Look up a process
    ///
    /// # Errors
    /// - `TrackerError::NotFound` for an unknown id
    pub fn get(&self, id: &ProcessId) -> Result<Process, TrackerError> {
        self.store
            .get(id)
            .ok_or_else(|| TrackerError::NotFound(id.clone()))
    }

    /// Every process
    #[must_use]
    pub fn list(&self) -> Vec<Process> {
        self.store.list()
    }

    /// Processes of one team, oldest first
    #[must_use]
    pub fn for_team(&self, team_id: &TeamId) -> Vec<Process> {
        self.store.for_team(team_id)
    }

    /// The team's running (active or paused) process, newest first
    #[must_use]
    pub fn active_for_team(&self, team_id: &TeamId) -> Option<Process> {
        self.store
            .for_team(team_id)
            .into_iter()
            .rev()
            .find(|p| matches!(p.status, ProcessStatus::Active | ProcessStatus::Paused))
    }

    /// planned -> active, week 1
    ///
    /// # Errors
    /// - `TrackerError::InvalidTransition` unless the process is planned
    pub fn start(&self, id: &ProcessId) -> Result<Process, TrackerError> {
        let (process, ()) = self.mutate(id, |p| {
            ensure_action(p, ProcessAction::Start)?;
            validate_transition(p.status, ProcessStatus::Active)?;
            p.status = ProcessStatus::Active;
            p.current_week = 1;
            Ok(((), true))
        })?;
        self.audit.append(id.as_str(), "process_started", "week=1");
        tracing::info!(process_id = %id, "process started");
        Ok(process)
    }

    /// Move an active process one week forward
    ///
    /// A tick at or below the last applied tick is a replay and changes
    /// nothing. Moving past week N completes the process.
    ///
    /// # Errors
    /// - `TrackerError::InvalidState` while paused
    /// - `TrackerError::InvalidTransition` when planned or completed
    pub fn advance_week(&self, id: &ProcessId, tick: Tick) -> Result<AdvanceOutcome, TrackerError> {
        let (process, outcome) = self.mutate(id, |p| {
            ensure_action(p, ProcessAction::Advance)?;
            if let Some(last_tick) = p.last_tick {
                if tick <= last_tick {
                    return Ok((AdvanceOutcome::Replayed { last_tick }, false));
                }
            }

            p.last_tick = Some(tick);
            p.current_week += 1;
            if p.current_week > p.total_weeks() {
                validate_transition(p.status, ProcessStatus::Completed)?;
                p.status = ProcessStatus::Completed;
                p.current_week = p.total_weeks() + 1;
                Ok((AdvanceOutcome::Completed, true))
            } else {
                Ok((AdvanceOutcome::Advanced { week: p.current_week }, true))
            }
        })?;

        match outcome {
            AdvanceOutcome::Replayed { last_tick } => {
                tracing::debug!(process_id = %id, %tick, %last_tick, "advance replay ignored");
            }
            AdvanceOutcome::Advanced { week } => {
                self.audit
                    .append(id.as_str(), "week_advanced", format!("week={week} tick={tick}"));
                tracing::info!(process_id = %id, week, %tick, "week advanced");
            }
            AdvanceOutcome::Completed => {
                self.audit.append(
                    id.as_str(),
                    "process_completed",
                    format!("weeks={} tick={tick}", process.total_weeks()),
                );
                tracing::info!(process_id = %id, %tick, "process completed");
            }
        }
        Ok(outcome)
    }

    /// active -> paused
    ///
    /// # Errors
    /// - `TrackerError::InvalidTransition` unless active
    pub fn pause(&self, id: &ProcessId) -> Result<Process, TrackerError> {
        self.set_status(id, ProcessAction::Pause, ProcessStatus::Paused)
    }

    /// paused -> active
    ///
    /// # Errors
    /// - `TrackerError::InvalidTransition` unless paused
    pub fn resume(&self, id: &ProcessId) -> Result<Process, TrackerError> {
        self.set_status(id, ProcessAction::Resume, ProcessStatus::Active)
    }

    /// Admin override: jump forward to `week`
    ///
    /// Going past week N completes an active process. The tick guard is left
    /// untouched so the next scheduled advance still applies.
    ///
    /// # Errors
    /// - `TrackerError::InvalidInput` when `week` is behind the tracked week
    /// - `TrackerError::InvalidState` while paused
    /// - `TrackerError::InvalidTransition` when planned or completed
    pub fn override_week(&self, id: &ProcessId, week: u32) -> Result<Process, TrackerError> {
        let (process, changed) = self.mutate(id, |p| {
            ensure_action(p, ProcessAction::OverrideWeek)?;
            if week < p.current_week {
                return Err(TrackerError::InvalidInput {
                    field: "week",
                    reason: format!("cannot move back from week {} to {week}", p.current_week),
                });
            }
            if week == p.current_week {
                return Ok((false, false));
            }
            if week > p.total_weeks() {
                validate_transition(p.status, ProcessStatus::Completed)?;
                p.status = ProcessStatus::Completed;
                p.current_week = p.total_weeks() + 1;
            } else {
                p.current_week = week;
            }
            Ok((true, true))
        })?;

        if changed {
            self.audit.append(
                id.as_str(),
                "week_overridden",
                format!("week={} status={}", process.current_week, process.status),
            );
            tracing::warn!(
                process_id = %id,
                week = process.current_week,
                status = %process.status,
                "week overridden by admin"
            );
        }
        Ok(process)
    }

    /// Published unit for the tracked week
    ///
    /// # Errors
    /// - `TrackerError::NotFound` for an unknown process
    /// - `TrackerError::Content` when the week has no content yet
    pub fn current_content_unit(&self, id: &ProcessId) -> Result<ContentUnit, TrackerError> {
        let process = self.get(id)?;
        self.catalog
            .get_unit(&process.id, process.current_week)
            .map_err(TrackerError::from)
    }

    fn set_status(
        &self,
        id: &ProcessId,
        action: ProcessAction,
        to: ProcessStatus,
    ) -> Result<Process, TrackerError> {
        let (process, ()) = self.mutate(id, |p| {
            ensure_action(p, action)?;
            validate_transition(p.status, to)?;
            p.status = to;
            Ok(((), true))
        })?;
        self.audit
            .append(id.as_str(), format!("process_{to}"), format!("week={}", process.current_week));
        tracing::info!(process_id = %id, status = %to, "process status changed");
        Ok(process)
    }

    /// Read-modify-write under the process lock; `f` reports whether it
    /// changed anything worth persisting.
    fn mutate<R>(
        &self,
        id: &ProcessId,
        f: impl FnOnce(&mut Process) -> Result<(R, bool), TrackerError>,
    ) -> Result<(Process, R), TrackerError> {
        self.locks.with_lock(id, || {
            let mut process = self.get(id)?;
            let (result, dirty) = f(&mut process)?;
            if dirty {
                process.updated_at = Utc::now();
                self.store.put(process.clone());
            }
            Ok((process, result))
        })
    }
}

fn ensure_action(process: &Process, action: ProcessAction) -> Result<(), TrackerError> {
    if allowed_actions(process.status).contains(&action) {
        return Ok(());
    }
    if process.status == ProcessStatus::Paused
        && matches!(action, ProcessAction::Advance | ProcessAction::OverrideWeek)
    {
        return Err(TrackerError::InvalidState {
            status: process.status,
            action,
        });
    }
    Err(TrackerError::InvalidTransition {
        from: process.status,
        action,
    })
}

//! Engine facade
//!
//! The single entry point for callers. Every operation takes the acting
//! [`Viewer`], checks capabilities through the role gate, delegates to the
//! catalog, tracker or ledger, and keeps analytics in step with each write.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::teams::{Team, TeamDirectory, Viewer};
use chrono::{DateTime, Utc};
use mlp_analytics::{AggregateSnapshot, AnalyticsAggregator, Period, ResponseChange, ResponseEvent, Scope};
use mlp_content::{
    ContentCatalog, ContentFields, ContentKind, ContentUnit, ContentUnitId, InMemoryCatalog, OrgId,
    ProcessId, ResponseId, TeamId, Theme, UnitDraft, UserId,
};
use mlp_kernel::role_gate::{self, Capability, VisibleUnit};
use mlp_kernel::{
    AdvanceOutcome, AuditLog, InMemoryProcessStore, InMemoryResponseStore, Process, ProcessSpec,
    ProcessStatus, ProcessStore, ProcessTracker, Response, ResponseLedger, ResponseStore,
    SubmitOutcome, Tick,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Authoring collaborator's publish request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub process_id: ProcessId,
    pub week: u32,
    /// Defaults to the process theme for `week`
    #[serde(default)]
    pub theme: Option<Theme>,
    pub kind: ContentKind,
    pub fields: ContentFields,
    /// 1 for a first publish, latest + 1 to supersede
    pub version: u32,
}

/// What a team member sees for the current week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUnit {
    pub process_id: ProcessId,
    pub status: ProcessStatus,
    pub week: u32,
    pub total_weeks: u32,
    pub unit: VisibleUnit,
    /// True once the viewer answered any version of this week's unit
    pub completed: bool,
    pub my_response: Option<Response>,
}

/// Acknowledgement of a stored response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub response_id: ResponseId,
    pub content_unit_id: ContentUnitId,
    pub completed: bool,
    pub submitted_at: DateTime<Utc>,
    pub revision: u32,
    pub outcome: SubmitOutcome,
}

/// One past answer, with the questions of the version answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionEntry {
    pub response_id: ResponseId,
    pub process_id: ProcessId,
    pub week: u32,
    pub theme: Theme,
    pub unit_version: u32,
    pub questions: Vec<String>,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
    pub revision: u32,
}

/// Process and content progression engine
pub struct Engine {
    config: EngineConfig,
    catalog: Arc<dyn ContentCatalog>,
    tracker: Arc<ProcessTracker>,
    ledger: ResponseLedger,
    analytics: AnalyticsAggregator,
    directory: TeamDirectory,
    audit: Arc<AuditLog>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("tracker", &self.tracker)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine over in-memory stores
    ///
    /// # Errors
    /// - `EngineError::Config` when the config does not validate
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_stores(
            config,
            Arc::new(InMemoryCatalog::new()),
            Arc::new(InMemoryProcessStore::new()),
            Arc::new(InMemoryResponseStore::new()),
        )
    }

    /// Engine over caller-provided stores
    ///
    /// # Errors
    /// - `EngineError::Config` when the config does not validate
    pub fn with_stores(
        config: EngineConfig,
        catalog: Arc<dyn ContentCatalog>,
        processes: Arc<dyn ProcessStore>,
        responses: Arc<dyn ResponseStore>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let audit = Arc::new(AuditLog::new());
        let tracker = Arc::new(
            ProcessTracker::new(processes, Arc::clone(&catalog), Arc::clone(&audit))
                .with_max_weeks(config.max_total_weeks),
        );
        let ledger = ResponseLedger::new(
            Arc::clone(&catalog),
            Arc::clone(&tracker),
            responses,
            Arc::clone(&audit),
        )
        .with_policy(config.ledger_policy());
        let analytics = AnalyticsAggregator::new(config.analytics)?;

        Ok(Self {
            config,
            catalog,
            tracker,
            ledger,
            analytics,
            directory: TeamDirectory::new(),
            audit,
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn tracker(&self) -> &ProcessTracker {
        &self.tracker
    }

    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &ResponseLedger {
        &self.ledger
    }

    #[inline]
    #[must_use]
    pub fn analytics_aggregator(&self) -> &AnalyticsAggregator {
        &self.analytics
    }

    #[inline]
    #[must_use]
    pub fn directory(&self) -> &TeamDirectory {
        &self.directory
    }

    #[inline]
    #[must_use]
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    // ---- teams ----

    /// # Errors
    /// - `EngineError::Forbidden` without `AdministerProcesses`
    pub fn create_team(&self, actor: &Viewer, org_id: &OrgId, name: &str) -> Result<Team, EngineError> {
        require(actor, Capability::AdministerProcesses)?;
        let team = self.directory.create(org_id, name)?;
        self.analytics.register_team(org_id, &team.id, 0);
        Ok(team)
    }

    /// # Errors
    /// - `EngineError::Forbidden` without `AdministerProcesses`
    /// - `EngineError::NotFound` for an unknown team
    pub fn add_member(&self, actor: &Viewer, team_id: &TeamId, user_id: &UserId) -> Result<(), EngineError> {
        require(actor, Capability::AdministerProcesses)?;
        let members = self.directory.add_member(team_id, user_id)?;
        self.analytics.set_members(team_id, members)?;
        Ok(())
    }

    /// # Errors
    /// - `EngineError::Forbidden` without `AdministerProcesses`
    /// - `EngineError::NotFound` for an unknown team
    pub fn remove_member(&self, actor: &Viewer, team_id: &TeamId, user_id: &UserId) -> Result<(), EngineError> {
        require(actor, Capability::AdministerProcesses)?;
        let members = self.directory.remove_member(team_id, user_id)?;
        self.analytics.set_members(team_id, members)?;
        Ok(())
    }

    /// # Errors
    /// - `EngineError::Forbidden` without `AdministerProcesses`
    /// - `EngineError::NotAMember` when the user is not on the team
    pub fn set_leader(&self, actor: &Viewer, team_id: &TeamId, user_id: &UserId) -> Result<(), EngineError> {
        require(actor, Capability::AdministerProcesses)?;
        self.directory.set_leader(team_id, user_id)
    }

    // ---- processes ----

    /// # Errors
    /// - `EngineError::Forbidden` without `AdministerProcesses`
    /// - `EngineError::NotFound` for an unknown team
    /// - `EngineError::InvalidInput` for a bad name or theme sequence
    pub fn create_process(&self, actor: &Viewer, spec: ProcessSpec) -> Result<Process, EngineError> {
        require(actor, Capability::AdministerProcesses)?;
        self.directory.get(&spec.team_id)?;
        Ok(self.tracker.create(spec)?)
    }

    /// # Errors
    /// - `EngineError::Forbidden` without `AdministerProcesses`
    /// - `EngineError::InvalidTransition` unless planned
    pub fn start_process(&self, actor: &Viewer, process_id: &ProcessId) -> Result<Process, EngineError> {
        require(actor, Capability::AdministerProcesses)?;
        self.start_scheduled(process_id)
    }

    /// Start on behalf of the scheduler
    pub(crate) fn start_scheduled(&self, process_id: &ProcessId) -> Result<Process, EngineError> {
        let process = self.tracker.start(process_id)?;
        self.analytics.note_week(&process.team_id, process.current_week, &process.themes);
        Ok(process)
    }

    /// # Errors
    /// - `EngineError::Forbidden` without `AdministerProcesses`
    /// - `EngineError::InvalidTransition` unless active
    pub fn pause_process(&self, actor: &Viewer, process_id: &ProcessId) -> Result<Process, EngineError> {
        require(actor, Capability::AdministerProcesses)?;
        Ok(self.tracker.pause(process_id)?)
    }

    /// # Errors
    /// - `EngineError::Forbidden` without `AdministerProcesses`
    /// - `EngineError::InvalidTransition` unless paused
    pub fn resume_process(&self, actor: &Viewer, process_id: &ProcessId) -> Result<Process, EngineError> {
        require(actor, Capability::AdministerProcesses)?;
        Ok(self.tracker.resume(process_id)?)
    }

    /// Manual weekly advance
    ///
    /// # Errors
    /// - `EngineError::Forbidden` without `AdministerProcesses`
    /// - `EngineError::InvalidState` while paused
    /// - `EngineError::InvalidTransition` when planned or completed
    pub fn advance_process(
        &self,
        actor: &Viewer,
        process_id: &ProcessId,
        tick: Tick,
    ) -> Result<AdvanceOutcome, EngineError> {
        require(actor, Capability::AdministerProcesses)?;
        self.advance_scheduled(process_id, tick)
    }

    /// Advance on behalf of the scheduler
    pub(crate) fn advance_scheduled(
        &self,
        process_id: &ProcessId,
        tick: Tick,
    ) -> Result<AdvanceOutcome, EngineError> {
        let outcome = self.tracker.advance_week(process_id, tick)?;
        if outcome.changed() {
            self.note_progress(process_id)?;
        }
        Ok(outcome)
    }

    /// Admin override of the tracked week, forward only
    ///
    /// # Errors
    /// - `EngineError::Forbidden` without `AdministerProcesses`
    /// - `EngineError::InvalidInput` when moving backwards
    /// - `EngineError::InvalidState` while paused
    pub fn override_week(&self, actor: &Viewer, process_id: &ProcessId, week: u32) -> Result<Process, EngineError> {
        require(actor, Capability::AdministerProcesses)?;
        let process = self.tracker.override_week(process_id, week)?;
        self.note_progress(process_id)?;
        Ok(process)
    }

    /// # Errors
    /// - `EngineError::NotFound`
    pub fn process(&self, process_id: &ProcessId) -> Result<Process, EngineError> {
        Ok(self.tracker.get(process_id)?)
    }

    /// Processes of a team, oldest first
    #[must_use]
    pub fn processes_for_team(&self, team_id: &TeamId) -> Vec<Process> {
        self.tracker.for_team(team_id)
    }

    fn note_progress(&self, process_id: &ProcessId) -> Result<(), EngineError> {
        let process = self.tracker.get(process_id)?;
        let reached = process.current_week.min(process.total_weeks());
        self.analytics.note_week(&process.team_id, reached, &process.themes);
        Ok(())
    }

    // ---- content ----

    /// Publish a unit version for one week of a process
    ///
    /// # Errors
    /// - `EngineError::Forbidden` without `AdministerProcesses`
    /// - `EngineError::InvalidInput` for a week outside the program or empty fields
    /// - `EngineError::Conflict` for a version that is not latest + 1
    pub fn publish_content_unit(&self, actor: &Viewer, request: PublishRequest) -> Result<ContentUnit, EngineError> {
        require(actor, Capability::AdministerProcesses)?;
        let process = self.tracker.get(&request.process_id)?;
        if request.week > process.total_weeks() {
            return Err(EngineError::InvalidInput {
                field: "week",
                reason: format!(
                    "week {} is outside a {}-week program",
                    request.week,
                    process.total_weeks()
                ),
            });
        }
        let theme = match request.theme {
            Some(theme) if !theme.is_blank() => theme,
            _ => process
                .theme_for(request.week)
                .cloned()
                .ok_or_else(|| EngineError::InvalidInput {
                    field: "week",
                    reason: "week must be at least 1".to_string(),
                })?,
        };
        let draft = UnitDraft::new(request.process_id, request.week, theme, request.kind)
            .with_version(request.version)
            .with_fields(request.fields);
        let unit = self.catalog.publish(draft)?;
        self.audit.append(
            unit.id.as_str(),
            "content_published",
            format!("process={} week={} version={}", unit.process_id, unit.week, unit.version),
        );
        Ok(unit)
    }

    /// The viewer's team unit for the tracked week, filtered for their role
    ///
    /// # Errors
    /// - `EngineError::NotAMember` for outsiders without team insight rights
    /// - `EngineError::NotFound` with no running process or no content yet
    pub fn current_unit(&self, viewer: &Viewer, team_id: &TeamId) -> Result<CurrentUnit, EngineError> {
        self.ensure_team_access(viewer, team_id)?;
        let process = self
            .tracker
            .active_for_team(team_id)
            .ok_or_else(|| EngineError::not_found("running process for team", team_id))?;
        let unit = self.catalog.get_unit(&process.id, process.current_week)?;

        let my_response = self
            .catalog
            .versions(&process.id, process.current_week)
            .iter()
            .rev()
            .find_map(|u| self.ledger.get(&u.id, &viewer.user_id));

        Ok(CurrentUnit {
            process_id: process.id.clone(),
            status: process.status,
            week: process.current_week,
            total_weeks: process.total_weeks(),
            unit: role_gate::view_unit(viewer.role, &unit),
            completed: my_response.as_ref().is_some_and(|r| r.completed),
            my_response,
        })
    }

    /// Store the viewer's answer to a unit
    ///
    /// # Errors
    /// - `EngineError::NotFound` for an unknown unit
    /// - `EngineError::NotAMember` when the viewer is not on the process team
    /// - `EngineError::InvalidState` for a week the team has not reached
    /// - `EngineError::InvalidInput` for blank or oversized text
    /// - `EngineError::Locked` when the edit window closed
    pub fn submit_response(
        &self,
        viewer: &Viewer,
        unit_id: &ContentUnitId,
        text: &str,
    ) -> Result<SubmitReceipt, EngineError> {
        let unit = self.catalog.get_by_id(unit_id)?;
        let process = self.tracker.get(&unit.process_id)?;
        if !self.directory.is_member(&process.team_id, &viewer.user_id) {
            return Err(EngineError::NotAMember {
                user_id: viewer.user_id.clone(),
                team_id: process.team_id,
            });
        }
        if process.status == ProcessStatus::Planned
            || (process.status != ProcessStatus::Completed && unit.week > process.current_week)
        {
            return Err(EngineError::InvalidState(format!(
                "week {} has not started for this team",
                unit.week
            )));
        }

        let submission = self.ledger.submit(unit_id, &viewer.user_id, text)?;
        let change = match submission.outcome {
            SubmitOutcome::Created => Some(ResponseChange::Created),
            SubmitOutcome::Amended { previous_chars } => Some(ResponseChange::Amended { previous_chars }),
            SubmitOutcome::Superseded => None,
        };
        if let Some(change) = change {
            self.analytics.record(&ResponseEvent {
                team_id: submission.response.team_id.clone(),
                user_id: viewer.user_id.clone(),
                week: submission.response.week,
                theme: submission.response.theme.clone(),
                chars: submission.response.char_count(),
                change,
            });
        }

        let response = submission.response;
        Ok(SubmitReceipt {
            response_id: response.id,
            content_unit_id: response.content_unit_id,
            completed: response.completed,
            submitted_at: response.submitted_at,
            revision: response.revision,
            outcome: submission.outcome,
        })
    }

    /// The viewer's own answers, newest week first
    #[must_use]
    pub fn reflection_history(&self, viewer: &Viewer) -> Vec<ReflectionEntry> {
        self.ledger
            .for_user(&viewer.user_id)
            .into_iter()
            .filter_map(|response| {
                let unit = self.catalog.get_by_id(&response.content_unit_id).ok()?;
                Some(ReflectionEntry {
                    response_id: response.id,
                    process_id: response.process_id,
                    week: response.week,
                    theme: response.theme,
                    unit_version: unit.version,
                    questions: role_gate::visible_fields(viewer.role, &unit).questions(),
                    text: response.text,
                    submitted_at: response.submitted_at,
                    revision: response.revision,
                })
            })
            .collect()
    }

    // ---- analytics ----

    /// Rollup for a team or organization
    ///
    /// # Errors
    /// - `EngineError::Forbidden` without the matching insight capability
    /// - `EngineError::NotAMember` for a leader outside the team
    /// - `EngineError::Timeout` when the read budget runs out
    pub async fn analytics(
        &self,
        viewer: &Viewer,
        scope: Scope,
        period: Period,
    ) -> Result<AggregateSnapshot, EngineError> {
        match &scope {
            Scope::Team(team_id) => {
                require(viewer, Capability::ViewTeamInsights)?;
                self.ensure_team_access(viewer, team_id)?;
            }
            Scope::Organization(_) => require(viewer, Capability::ViewOrganizationAnalytics)?,
        }
        Ok(self.analytics.snapshot(scope, period).await?)
    }

    /// Members may see their own team; leaders only their own; admins and
    /// operations staff any team
    fn ensure_team_access(&self, viewer: &Viewer, team_id: &TeamId) -> Result<(), EngineError> {
        let team = self.directory.get(team_id)?;
        let any_team = role_gate::permits(viewer.role, Capability::AdministerProcesses)
            || role_gate::permits(viewer.role, Capability::ViewOrganizationAnalytics);
        if any_team || team.is_member(&viewer.user_id) {
            return Ok(());
        }
        Err(EngineError::NotAMember {
            user_id: viewer.user_id.clone(),
            team_id: team_id.clone(),
        })
    }
}

pub(crate) fn require(viewer: &Viewer, capability: Capability) -> Result<(), EngineError> {
    if role_gate::permits(viewer.role, capability) {
        return Ok(());
    }
    tracing::debug!(user_id = %viewer.user_id, role = %viewer.role, ?capability, "capability denied");
    Err(EngineError::Forbidden {
        role: viewer.role,
        capability,
    })
}

//! Organization overview
//!
//! The dashboard read: one organization snapshot plus per-team and
//! per-process summaries taken from the tracker and the aggregator.

use crate::engine::{require, Engine};
use crate::error::EngineError;
use crate::teams::Viewer;
use chrono::{DateTime, NaiveDate, Utc};
use mlp_analytics::{percent, Period, Scope, ThemeStat};
use mlp_content::{OrgId, ProcessId, TeamId, Theme};
use mlp_kernel::{Capability, Process, ProcessStatus};
use serde::{Deserialize, Serialize};

/// Themes listed in the overview
const TOP_THEMES: usize = 5;

/// Calendar position of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    OnTrack,
    Behind,
}

/// One process in the overview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessProgress {
    pub process_id: ProcessId,
    pub team_id: TeamId,
    pub name: String,
    pub status: ProcessStatus,
    pub completed_weeks: u32,
    pub total_weeks: u32,
    pub progress_percent: u8,
    pub schedule: ScheduleStatus,
}

impl ProcessProgress {
    fn of(process: &Process, today: NaiveDate) -> Self {
        let total = process.total_weeks();
        let completed = process.completed_weeks();
        Self {
            process_id: process.id.clone(),
            team_id: process.team_id.clone(),
            name: process.name.clone(),
            status: process.status,
            completed_weeks: completed,
            total_weeks: total,
            progress_percent: if total == 0 {
                0
            } else {
                percent(f64::from(completed) / f64::from(total))
            },
            schedule: if process.is_behind_schedule(today) {
                ScheduleStatus::Behind
            } else {
                ScheduleStatus::OnTrack
            },
        }
    }
}

/// One team in the overview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamStat {
    pub team_id: TeamId,
    pub name: String,
    pub members: usize,
    pub status: Option<ProcessStatus>,
    pub current_week: Option<u32>,
    pub current_theme: Option<Theme>,
    /// Participation in the team's current week
    pub participation_percent: u8,
    pub reflections: u64,
}

/// Organization dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationOverview {
    pub org_id: OrgId,
    pub active_processes: usize,
    pub total_members: usize,
    /// Distinct users who answered at least once
    pub total_participants: usize,
    pub participation_percent: u8,
    pub engagement_percent: u8,
    pub total_reflections: u64,
    pub avg_reflections_per_participant: f64,
    pub top_themes: Vec<ThemeStat>,
    pub teams: Vec<TeamStat>,
    pub processes: Vec<ProcessProgress>,
    pub stale: bool,
    pub generated_at: DateTime<Utc>,
}

impl Engine {
    /// Organization dashboard as of today
    ///
    /// # Errors
    /// See [`Engine::overview_on`]
    pub async fn overview(&self, viewer: &Viewer, org_id: &OrgId) -> Result<OrganizationOverview, EngineError> {
        self.overview_on(viewer, org_id, Utc::now().date_naive()).await
    }

    /// Organization dashboard with schedule checks against `today`
    ///
    /// # Errors
    /// - `EngineError::Forbidden` without `ViewOrganizationAnalytics`
    /// - `EngineError::NotFound` for an organization without teams
    /// - `EngineError::Timeout` when the analytics read runs out of budget
    pub async fn overview_on(
        &self,
        viewer: &Viewer,
        org_id: &OrgId,
        today: NaiveDate,
    ) -> Result<OrganizationOverview, EngineError> {
        require(viewer, Capability::ViewOrganizationAnalytics)?;
        let teams = self.directory().teams_of(org_id);
        if teams.is_empty() {
            return Err(EngineError::not_found("organization", org_id));
        }

        let snapshot = self
            .analytics_aggregator()
            .snapshot(Scope::Organization(org_id.clone()), Period::all())
            .await?;

        let mut team_stats = Vec::with_capacity(teams.len());
        let mut processes = Vec::new();
        for team in &teams {
            let team_processes = self.processes_for_team(&team.id);
            let running = self.tracker().active_for_team(&team.id);
            let latest = running.as_ref().or(team_processes.last());
            let totals = self.analytics_aggregator().team_totals(&team.id)?;

            team_stats.push(TeamStat {
                team_id: team.id.clone(),
                name: team.name.clone(),
                members: team.member_count(),
                status: latest.map(|p| p.status),
                current_week: latest.map(|p| p.current_week.min(p.total_weeks())),
                current_theme: latest.and_then(|p| p.current_theme().cloned()),
                participation_percent: percent(totals.current_participation),
                reflections: totals.total_responses,
            });
            processes.extend(team_processes.iter().map(|p| ProcessProgress::of(p, today)));
        }

        let total_participants = self.analytics_aggregator().organization_participants(org_id);
        #[allow(clippy::cast_precision_loss)]
        let avg_reflections_per_participant = if total_participants == 0 {
            0.0
        } else {
            snapshot.total_responses as f64 / total_participants as f64
        };

        Ok(OrganizationOverview {
            org_id: org_id.clone(),
            active_processes: processes
                .iter()
                .filter(|p| p.status == ProcessStatus::Active)
                .count(),
            total_members: teams.iter().map(|t| t.member_count()).sum(),
            total_participants,
            participation_percent: snapshot.participation_percent,
            engagement_percent: snapshot.engagement_percent,
            total_reflections: snapshot.total_responses,
            avg_reflections_per_participant,
            top_themes: snapshot.top_themes(TOP_THEMES).to_vec(),
            teams: team_stats,
            processes,
            stale: snapshot.stale,
            generated_at: Utc::now(),
        })
    }
}

//! Process aggregate
//!
//! A process is one team's run through an ordered sequence of weekly themes.

use chrono::{DateTime, NaiveDate, Utc};
use mlp_content::{ProcessId, TeamId, Theme};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default program length in weeks
pub const DEFAULT_TOTAL_WEEKS: u32 = 12;

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Planned,
    Active,
    Paused,
    Completed,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessStatus::Planned => "planned",
            ProcessStatus::Active => "active",
            ProcessStatus::Paused => "paused",
            ProcessStatus::Completed => "completed",
        })
    }
}

/// Operations that mutate a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessAction {
    Start,
    Advance,
    Pause,
    Resume,
    OverrideWeek,
}

impl fmt::Display for ProcessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessAction::Start => "start",
            ProcessAction::Advance => "advance",
            ProcessAction::Pause => "pause",
            ProcessAction::Resume => "resume",
            ProcessAction::OverrideWeek => "override the week of",
        })
    }
}

/// Monotonic scheduler period identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tick(pub u64);

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Admin request to create a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub team_id: TeamId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub themes: Vec<Theme>,
    pub start_date: NaiveDate,
}

impl ProcessSpec {
    /// New spec
    #[must_use]
    pub fn new(
        team_id: TeamId,
        name: impl Into<String>,
        themes: Vec<Theme>,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            team_id,
            name: name.into(),
            description: String::new(),
            themes,
            start_date,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A team's multi-week program instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub id: ProcessId,
    pub team_id: TeamId,
    pub name: String,
    pub description: String,
    pub themes: Vec<Theme>,
    pub start_date: NaiveDate,
    pub status: ProcessStatus,
    /// 1..=N while running, N+1 once completed
    pub current_week: u32,
    /// Last scheduler tick that advanced this process
    pub last_tick: Option<Tick>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Process {
    pub(crate) fn from_spec(spec: ProcessSpec, now: DateTime<Utc>) -> Self {
        Self {
            id: ProcessId::generate(),
            team_id: spec.team_id,
            name: spec.name,
            description: spec.description,
            themes: spec.themes,
            start_date: spec.start_date,
            status: ProcessStatus::Planned,
            current_week: 1,
            last_tick: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Program length N
    #[inline]
    #[must_use]
    pub fn total_weeks(&self) -> u32 {
        u32::try_from(self.themes.len()).unwrap_or(u32::MAX)
    }

    /// Theme of a week, `None` outside 1..=N
    #[must_use]
    pub fn theme_for(&self, week: u32) -> Option<&Theme> {
        let index = usize::try_from(week.checked_sub(1)?).ok()?;
        self.themes.get(index)
    }

    /// Theme of the tracked week
    #[inline]
    #[must_use]
    pub fn current_theme(&self) -> Option<&Theme> {
        self.theme_for(self.current_week)
    }

    /// True once the process has rolled over past `week`
    #[inline]
    #[must_use]
    pub fn has_passed(&self, week: u32) -> bool {
        self.status == ProcessStatus::Completed || self.current_week > week
    }

    /// Weeks fully behind the team
    #[must_use]
    pub fn completed_weeks(&self) -> u32 {
        match self.status {
            ProcessStatus::Planned => 0,
            ProcessStatus::Completed => self.total_weeks(),
            ProcessStatus::Active | ProcessStatus::Paused => self.current_week.saturating_sub(1),
        }
    }

    /// Week the calendar says the team should be on, 0 before the start date
    #[must_use]
    pub fn scheduled_week(&self, on: NaiveDate) -> u32 {
        let days = (on - self.start_date).num_days();
        if days < 0 {
            return 0;
        }
        u32::try_from(days / 7 + 1).unwrap_or(u32::MAX)
    }

    /// True when the calendar is ahead of the tracked week
    #[must_use]
    pub fn is_behind_schedule(&self, on: NaiveDate) -> bool {
        self.status != ProcessStatus::Completed
            && self.scheduled_week(on).min(self.total_weeks()) > self.current_week
    }
}

/// Result of an advance request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceOutcome {
    /// Moved to `week`
    Advanced { week: u32 },
    /// Moved past the last week
    Completed,
    /// Tick already applied; nothing changed
    Replayed { last_tick: Tick },
}

impl AdvanceOutcome {
    /// True when the call changed the process
    #[inline]
    #[must_use]
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Replayed { .. })
    }
}

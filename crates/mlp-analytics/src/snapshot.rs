//! Aggregate snapshots and how they are derived from team tallies

use crate::config::AnalyticsConfig;
use crate::counters::{TeamTally, TrendPoint, TrendWindow};
use crate::error::AnalyticsError;
use crate::score::{engagement_score, length_ratio, participation_rate, percent, rank_themes, ThemeStat};
use chrono::{DateTime, Utc};
use mlp_content::{OrgId, TeamId, Theme, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// What a snapshot aggregates over
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Team(TeamId),
    Organization(OrgId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Team(id) => write!(f, "team:{id}"),
            Scope::Organization(id) => write!(f, "org:{id}"),
        }
    }
}

/// Inclusive program week range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub from_week: u32,
    pub to_week: u32,
}

impl Period {
    #[inline]
    #[must_use]
    pub const fn new(from_week: u32, to_week: u32) -> Self {
        Self { from_week, to_week }
    }

    /// A single week
    #[inline]
    #[must_use]
    pub const fn week(week: u32) -> Self {
        Self::new(week, week)
    }

    /// Every week of the program
    #[inline]
    #[must_use]
    pub const fn all() -> Self {
        Self::new(1, u32::MAX)
    }

    /// # Errors
    /// - `AnalyticsError::InvalidPeriod` when the range is empty or starts at 0
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.from_week == 0 || self.from_week > self.to_week {
            return Err(AnalyticsError::InvalidPeriod {
                from_week: self.from_week,
                to_week: self.to_week,
            });
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, week: u32) -> bool {
        (self.from_week..=self.to_week).contains(&week)
    }
}

/// Scoring parameters a snapshot was computed with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub participation: f64,
    pub length: f64,
    pub target_response_chars: u32,
}

impl From<&AnalyticsConfig> for Weights {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            participation: config.participation_weight,
            length: config.length_weight,
            target_response_chars: config.target_response_chars,
        }
    }
}

/// Read-optimized rollup for one (scope, period)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub scope: Scope,
    pub period: Period,
    /// Mean weekly participation over the elapsed weeks of the period
    pub participation_rate: f64,
    pub participation_percent: u8,
    pub engagement_score: f64,
    pub engagement_percent: u8,
    pub total_responses: u64,
    /// Distinct users who responded within the period
    pub responders: usize,
    pub members: usize,
    /// Ranked, best theme first
    pub theme_breakdown: Vec<ThemeStat>,
    pub trend: Vec<TrendPoint>,
    pub weights: Weights,
    /// Served from cache without reflecting the latest writes
    pub stale: bool,
    pub computed_at: DateTime<Utc>,
}

impl AggregateSnapshot {
    /// Highest ranked themes
    #[must_use]
    pub fn top_themes(&self, n: usize) -> &[ThemeStat] {
        &self.theme_breakdown[..n.min(self.theme_breakdown.len())]
    }
}

#[derive(Default)]
struct ThemeAccumulator {
    responses: u64,
    responders: usize,
    member_weeks: usize,
    chars: u64,
}

/// Fold tallies into a snapshot
///
/// A week counts once at least one team in scope has reached it; teams that
/// have not reached a week contribute neither responders nor members to it.
/// A team that reached a week counts toward that week's theme even if nobody
/// on it responded.
pub(crate) fn compute(
    scope: Scope,
    period: Period,
    tallies: &[TeamTally],
    config: &AnalyticsConfig,
) -> AggregateSnapshot {
    let horizon = tallies.iter().map(|t| t.current_week).max().unwrap_or(0);
    let last = period.to_week.min(horizon);

    let mut weekly_participation = Vec::new();
    let mut weekly_engagement = Vec::new();
    let mut total_responses = 0u64;
    let mut responders: HashSet<&UserId> = HashSet::new();
    let mut themes: BTreeMap<Theme, ThemeAccumulator> = BTreeMap::new();
    let mut org_trend = TrendWindow::new(config.trend_window);

    for week in period.from_week..=last {
        let (mut week_responders, mut week_members, mut week_responses, mut week_chars) = (0, 0, 0, 0);
        for tally in tallies.iter().filter(|t| t.current_week >= week) {
            week_members += tally.members;
            let counter = tally.weeks.get(&week);
            if let Some(theme) = tally.themes.get(&week) {
                let acc = themes.entry(theme.clone()).or_default();
                acc.member_weeks += tally.members;
                if let Some(counter) = counter {
                    acc.responses += counter.responses;
                    acc.responders += counter.responder_count();
                    acc.chars += counter.total_chars;
                }
            }
            let Some(counter) = counter else {
                continue;
            };
            week_responders += counter.responder_count();
            week_responses += counter.responses;
            week_chars += counter.total_chars;
            responders.extend(counter.responders.iter());
        }
        total_responses += week_responses;
        if week_members == 0 {
            continue;
        }
        let participation = participation_rate(week_responders, week_members);
        let length = length_ratio(week_chars, week_responses, config.target_response_chars);
        weekly_participation.push(participation);
        weekly_engagement.push(engagement_score(participation, length, config));
        org_trend.upsert(week, participation);
    }

    let mut theme_breakdown: Vec<ThemeStat> = themes
        .into_iter()
        .map(|(theme, acc)| {
            let participation = participation_rate(acc.responders, acc.member_weeks);
            let length = length_ratio(acc.chars, acc.responses, config.target_response_chars);
            ThemeStat {
                theme,
                response_count: acc.responses,
                participation_percent: percent(participation),
                engagement_percent: percent(engagement_score(participation, length, config)),
            }
        })
        .collect();
    rank_themes(&mut theme_breakdown);

    let trend = match (&scope, tallies) {
        (Scope::Team(_), [tally]) => tally
            .trend
            .points()
            .into_iter()
            .filter(|p| period.contains(p.week))
            .collect(),
        _ => org_trend.points(),
    };

    let participation = mean(&weekly_participation);
    let engagement = mean(&weekly_engagement);
    AggregateSnapshot {
        scope,
        period,
        participation_rate: participation,
        participation_percent: percent(participation),
        engagement_score: engagement,
        engagement_percent: percent(engagement),
        total_responses,
        responders: responders.len(),
        members: tallies.iter().map(|t| t.members).sum(),
        theme_breakdown,
        trend,
        weights: Weights::from(config),
        stale: false,
        computed_at: Utc::now(),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::{ResponseChange, ResponseEvent};

    fn record(tally: &mut TeamTally, user: &str, week: u32, theme: &str, chars: usize) {
        tally.apply(&ResponseEvent {
            team_id: TeamId::from("t1"),
            user_id: UserId::from(user),
            week,
            theme: Theme::new(theme),
            chars,
            change: ResponseChange::Created,
        });
    }

    #[test]
    fn week_six_of_twelve_seven_of_eight() {
        let config = AnalyticsConfig::default();
        let mut tally = TeamTally::new(None, 8, config.trend_window);
        tally.current_week = 6;
        for u in 0..7 {
            record(&mut tally, &format!("u{u}"), 6, "Feedback", 280);
        }
        let snap = compute(Scope::Team("t1".into()), Period::week(6), &[tally], &config);
        assert!((snap.participation_rate - 0.875).abs() < 1e-9);
        assert_eq!(snap.participation_percent, 88);
        // 0.6 * 0.875 + 0.4 * 1.0
        assert!((snap.engagement_score - 0.925).abs() < 1e-9);
        assert_eq!(snap.responders, 7);
        assert_eq!(snap.trend.len(), 1);
    }

    #[test]
    fn weeks_without_responses_count_as_zero() {
        let config = AnalyticsConfig::default();
        let mut tally = TeamTally::new(None, 4, config.trend_window);
        record(&mut tally, "u1", 1, "A", 10);
        record(&mut tally, "u2", 1, "A", 10);
        tally.current_week = 2;
        let snap = compute(Scope::Team("t1".into()), Period::all(), &[tally], &config);
        assert!((snap.participation_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn empty_scope_is_all_zero() {
        let config = AnalyticsConfig::default();
        let snap = compute(Scope::Organization("o1".into()), Period::all(), &[], &config);
        assert_eq!(snap.participation_percent, 0);
        assert_eq!(snap.total_responses, 0);
        assert!(snap.theme_breakdown.is_empty());
    }

    #[test]
    fn organization_pools_members_of_teams_that_reached_the_week() {
        let config = AnalyticsConfig::default();
        let mut a = TeamTally::new(None, 4, 12);
        record(&mut a, "u1", 2, "Trust", 100);
        let mut b = TeamTally::new(None, 6, 12);
        b.current_week = 1;
        let snap = compute(Scope::Organization("o1".into()), Period::week(2), &[a, b], &config);
        // team b has not reached week 2
        assert!((snap.participation_rate - 0.25).abs() < 1e-9);
        assert_eq!(snap.members, 10);
    }

    #[test]
    fn silent_teams_dilute_theme_participation() {
        let config = AnalyticsConfig::default();
        let themes = [Theme::new("Trust")];
        let mut a = TeamTally::new(None, 4, 12);
        a.reach_week(1, &themes);
        record(&mut a, "u1", 1, "Trust", 280);
        record(&mut a, "u2", 1, "Trust", 280);
        let mut b = TeamTally::new(None, 4, 12);
        b.reach_week(1, &themes);

        let snap = compute(Scope::Organization("o1".into()), Period::week(1), &[a, b], &config);
        assert_eq!(snap.theme_breakdown.len(), 1);
        let trust = &snap.theme_breakdown[0];
        assert_eq!(trust.theme.as_str(), "Trust");
        assert_eq!(trust.response_count, 2);
        assert_eq!(trust.participation_percent, 25);
        assert_eq!(snap.participation_percent, 25);
    }

    #[test]
    fn period_validation() {
        assert!(Period::new(0, 3).validate().is_err());
        assert!(Period::new(4, 3).validate().is_err());
        assert!(Period::week(1).validate().is_ok());
    }
}

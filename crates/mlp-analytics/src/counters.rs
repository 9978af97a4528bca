//! Running counters
//!
//! Every ledger write lands here as a [`ResponseEvent`] and bumps a handful of
//! integers. Snapshots are computed from these counters only; raw responses
//! are never rescanned.

use mlp_content::{OrgId, TeamId, Theme, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// How a ledger write changed the stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseChange {
    Created,
    Amended { previous_chars: usize },
}

/// A ledger write as seen by analytics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub week: u32,
    pub theme: Theme,
    pub chars: usize,
    pub change: ResponseChange,
}

/// Counters for one (team, week)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekCounter {
    pub responses: u64,
    pub responders: HashSet<UserId>,
    pub total_chars: u64,
}

impl WeekCounter {
    #[inline]
    #[must_use]
    pub fn responder_count(&self) -> usize {
        self.responders.len()
    }
}

/// One trend sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub week: u32,
    pub participation: f64,
}

/// Fixed-size participation series ordered by week
#[derive(Debug, Clone, PartialEq)]
pub struct TrendWindow {
    capacity: usize,
    points: VecDeque<TrendPoint>,
}

impl TrendWindow {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    /// Set the sample for `week`, evicting the oldest week when full
    ///
    /// A week older than everything retained in a full window is dropped.
    pub fn upsert(&mut self, week: u32, participation: f64) {
        let pos = self.points.partition_point(|p| p.week < week);
        if let Some(point) = self.points.get_mut(pos).filter(|p| p.week == week) {
            point.participation = participation;
            return;
        }
        if self.points.len() == self.capacity {
            if pos == 0 {
                return;
            }
            self.points.pop_front();
            self.points.insert(pos - 1, TrendPoint { week, participation });
        } else {
            self.points.insert(pos, TrendPoint { week, participation });
        }
    }

    #[must_use]
    pub fn points(&self) -> Vec<TrendPoint> {
        self.points.iter().copied().collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Everything the aggregator keeps for one team
#[derive(Debug, Clone)]
pub struct TeamTally {
    pub org_id: Option<OrgId>,
    pub members: usize,
    /// Latest week the team's process reached
    pub current_week: u32,
    pub weeks: BTreeMap<u32, WeekCounter>,
    /// Theme of each reached week, known with or without responses
    pub themes: BTreeMap<u32, Theme>,
    pub participants: HashSet<UserId>,
    pub trend: TrendWindow,
}

impl TeamTally {
    #[must_use]
    pub fn new(org_id: Option<OrgId>, members: usize, trend_window: usize) -> Self {
        Self {
            org_id,
            members,
            current_week: 0,
            weeks: BTreeMap::new(),
            themes: BTreeMap::new(),
            participants: HashSet::new(),
            trend: TrendWindow::new(trend_window),
        }
    }

    /// Fold one ledger write into the counters
    pub fn apply(&mut self, event: &ResponseEvent) {
        self.themes
            .entry(event.week)
            .or_insert_with(|| event.theme.clone());
        let counter = self.weeks.entry(event.week).or_default();
        let chars = event.chars as u64;
        match event.change {
            ResponseChange::Created => {
                counter.responses += 1;
                counter.total_chars += chars;
                counter.responders.insert(event.user_id.clone());
            }
            ResponseChange::Amended { previous_chars } => {
                counter.total_chars = (counter.total_chars + chars).saturating_sub(previous_chars as u64);
                // amendments of rows created before a restart still count the user
                counter.responders.insert(event.user_id.clone());
                if counter.responses == 0 {
                    counter.responses = 1;
                }
            }
        }
        self.participants.insert(event.user_id.clone());
        self.reach(event.week);
        self.refresh_trend_point(event.week);
    }

    /// The team's process reached `week`
    ///
    /// `themes` is the process theme sequence, week 1 first. Every newly
    /// reached week gets a trend sample, zero until someone responds.
    pub fn reach_week(&mut self, week: u32, themes: &[Theme]) {
        for (w, theme) in (1..=week).zip(themes) {
            self.themes.entry(w).or_insert_with(|| theme.clone());
        }
        self.reach(week);
    }

    fn reach(&mut self, week: u32) {
        if week <= self.current_week {
            return;
        }
        for w in self.current_week + 1..=week {
            self.refresh_trend_point(w);
        }
        self.current_week = week;
    }

    /// Recompute the trend sample for `week` from the current member count
    pub fn refresh_trend_point(&mut self, week: u32) {
        let responders = self.weeks.get(&week).map_or(0, WeekCounter::responder_count);
        let rate = crate::score::participation_rate(responders, self.members);
        self.trend.upsert(week, rate);
    }

    /// Recompute every retained trend sample, after a membership change
    pub fn refresh_trend(&mut self) {
        let weeks: Vec<u32> = self.trend.points().iter().map(|p| p.week).collect();
        for week in weeks {
            self.refresh_trend_point(week);
        }
    }

    /// Total stored responses across all weeks
    #[must_use]
    pub fn total_responses(&self) -> u64 {
        self.weeks.values().map(|c| c.responses).sum()
    }

    /// Responders in `week`
    #[must_use]
    pub fn responders(&self, week: u32) -> usize {
        self.weeks.get(&week).map_or(0, WeekCounter::responder_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(user: &str, week: u32, chars: usize, change: ResponseChange) -> ResponseEvent {
        ResponseEvent {
            team_id: TeamId::from("t1"),
            user_id: UserId::from(user),
            week,
            theme: Theme::new(format!("Theme {week}")),
            chars,
            change,
        }
    }

    #[test]
    fn window_evicts_oldest_week() {
        let mut window = TrendWindow::new(3);
        for week in 1..=4 {
            window.upsert(week, 0.5);
        }
        let weeks: Vec<_> = window.points().iter().map(|p| p.week).collect();
        assert_eq!(weeks, vec![2, 3, 4]);

        // too old for a full window
        window.upsert(1, 1.0);
        assert_eq!(window.points()[0].week, 2);
    }

    #[test]
    fn window_updates_in_place_and_keeps_order() {
        let mut window = TrendWindow::new(4);
        window.upsert(3, 0.1);
        window.upsert(1, 0.2);
        window.upsert(2, 0.3);
        window.upsert(3, 0.9);
        let weeks: Vec<_> = window.points().iter().map(|p| p.week).collect();
        assert_eq!(weeks, vec![1, 2, 3]);
        assert!((window.points()[2].participation - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn full_window_inserts_between_retained_weeks() {
        let mut window = TrendWindow::new(3);
        window.upsert(2, 0.0);
        window.upsert(4, 0.0);
        window.upsert(5, 0.0);
        window.upsert(3, 0.0);
        let weeks: Vec<_> = window.points().iter().map(|p| p.week).collect();
        assert_eq!(weeks, vec![3, 4, 5]);
    }

    #[test]
    fn amendments_adjust_length_not_count() {
        let mut tally = TeamTally::new(None, 4, 12);
        tally.apply(&event("u1", 1, 100, ResponseChange::Created));
        tally.apply(&event("u1", 1, 40, ResponseChange::Amended { previous_chars: 100 }));
        tally.apply(&event("u2", 1, 60, ResponseChange::Created));

        let week = &tally.weeks[&1];
        assert_eq!(week.responses, 2);
        assert_eq!(week.responder_count(), 2);
        assert_eq!(week.total_chars, 100);
        assert!((tally.trend.points()[0].participation - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn membership_change_rescales_trend() {
        let mut tally = TeamTally::new(None, 2, 12);
        tally.apply(&event("u1", 1, 10, ResponseChange::Created));
        tally.members = 4;
        tally.refresh_trend();
        assert!((tally.trend.points()[0].participation - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn reached_weeks_without_responses_join_the_trend() {
        let mut tally = TeamTally::new(None, 4, 12);
        let themes: Vec<_> = (1..=6).map(|w| Theme::new(format!("Theme {w}"))).collect();
        tally.reach_week(1, &themes);
        tally.apply(&event("u1", 1, 10, ResponseChange::Created));
        tally.reach_week(3, &themes);
        tally.apply(&event("u2", 3, 10, ResponseChange::Created));
        tally.apply(&event("u3", 3, 10, ResponseChange::Created));

        let trend = tally.trend.points();
        let weeks: Vec<_> = trend.iter().map(|p| p.week).collect();
        assert_eq!(weeks, vec![1, 2, 3]);
        assert!(trend[1].participation.abs() < f64::EPSILON);
        assert!((trend[2].participation - 0.5).abs() < f64::EPSILON);
        assert_eq!(tally.themes[&2].as_str(), "Theme 2");
        assert!(!tally.weeks.contains_key(&2));
    }

    #[test]
    fn responses_past_the_known_week_fill_the_gap() {
        let mut tally = TeamTally::new(None, 2, 12);
        tally.apply(&event("u1", 1, 10, ResponseChange::Created));
        tally.apply(&event("u1", 4, 10, ResponseChange::Created));
        let weeks: Vec<_> = tally.trend.points().iter().map(|p| p.week).collect();
        assert_eq!(weeks, vec![1, 2, 3, 4]);
        assert_eq!(tally.current_week, 4);
    }
}

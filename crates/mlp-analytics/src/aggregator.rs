//! Analytics aggregator
//!
//! Counters are updated on every ledger write. Cached snapshots for the
//! written team and its organization are recomputed inside the same call; a
//! recompute that fails leaves the old snapshot in place marked stale, and
//! the next read retries. Reads run on the blocking pool under the configured
//! time budget.

use crate::config::AnalyticsConfig;
use crate::counters::{ResponseEvent, TeamTally, TrendPoint};
use crate::error::AnalyticsError;
use crate::score::participation_rate;
use crate::snapshot::{compute, AggregateSnapshot, Period, Scope};
use dashmap::DashMap;
use mlp_content::{OrgId, TeamId, Theme, UserId};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SnapshotKey {
    scope: Scope,
    period: Period,
}

/// Headline numbers for one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamTotals {
    pub members: usize,
    pub total_responses: u64,
    /// Distinct users who ever responded
    pub participants: usize,
    pub current_week: u32,
    pub current_participation: f64,
    pub trend: Vec<TrendPoint>,
}

/// Incremental participation and engagement rollups
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct AnalyticsAggregator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: AnalyticsConfig,
    teams: DashMap<TeamId, TeamTally>,
    orgs: DashMap<OrgId, BTreeSet<TeamId>>,
    cache: Cache<SnapshotKey, Arc<AggregateSnapshot>>,
    #[cfg(test)]
    faults: faults::Faults,
}

impl AnalyticsAggregator {
    /// # Errors
    /// - `AnalyticsError::InvalidConfig` when the config does not validate
    pub fn new(config: AnalyticsConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                teams: DashMap::new(),
                orgs: DashMap::new(),
                cache: Cache::new(config.snapshot_capacity),
                #[cfg(test)]
                faults: faults::Faults::default(),
            }),
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &AnalyticsConfig {
        &self.inner.config
    }

    /// Declare a team and its member count, or update both
    pub fn register_team(&self, org_id: &OrgId, team_id: &TeamId, members: usize) {
        {
            let mut tally = self
                .inner
                .teams
                .entry(team_id.clone())
                .or_insert_with(|| TeamTally::new(None, members, self.inner.config.trend_window));
            if let Some(previous) = tally.org_id.replace(org_id.clone()) {
                if &previous != org_id {
                    if let Some(mut teams) = self.inner.orgs.get_mut(&previous) {
                        teams.remove(team_id);
                    }
                }
            }
            tally.members = members;
            tally.refresh_trend();
        }
        self.inner
            .orgs
            .entry(org_id.clone())
            .or_default()
            .insert(team_id.clone());
        tracing::debug!(org_id = %org_id, team_id = %team_id, members, "team registered");
        self.invalidate_team(team_id);
    }

    /// Update a known team's member count
    ///
    /// # Errors
    /// - `AnalyticsError::UnknownTeam` when the team was never registered
    pub fn set_members(&self, team_id: &TeamId, members: usize) -> Result<(), AnalyticsError> {
        {
            let mut tally = self
                .inner
                .teams
                .get_mut(team_id)
                .ok_or_else(|| AnalyticsError::UnknownTeam(team_id.clone()))?;
            tally.members = members;
            tally.refresh_trend();
        }
        self.invalidate_team(team_id);
        Ok(())
    }

    /// Fold a ledger write into the counters and refresh affected snapshots
    ///
    /// Never fails: a recompute error only marks snapshots stale.
    pub fn record(&self, event: &ResponseEvent) {
        self.inner
            .teams
            .entry(event.team_id.clone())
            .or_insert_with(|| {
                tracing::debug!(team_id = %event.team_id, "response for unregistered team");
                TeamTally::new(None, 0, self.inner.config.trend_window)
            })
            .apply(event);
        self.inner.refresh_scopes(&event.team_id);
    }

    /// The team's process reached `week`; its snapshots no longer cover the
    /// elapsed weeks and are marked stale
    ///
    /// `themes` is the process theme sequence, week 1 first.
    pub fn note_week(&self, team_id: &TeamId, week: u32, themes: &[Theme]) {
        if let Some(mut tally) = self.inner.teams.get_mut(team_id) {
            tally.reach_week(week, themes);
        }
        self.invalidate_team(team_id);
    }

    /// Mark every cached snapshot covering `team_id` stale
    pub fn invalidate_team(&self, team_id: &TeamId) {
        let scopes = self.inner.affected_scopes(team_id);
        let mut marked = 0usize;
        for key in self.inner.cached_keys(&scopes) {
            if let Some(snapshot) = self.inner.cache.get(&key) {
                if !snapshot.stale {
                    let mut stale = (*snapshot).clone();
                    stale.stale = true;
                    self.inner.cache.insert(key, Arc::new(stale));
                    marked += 1;
                }
            }
        }
        if marked > 0 {
            tracing::debug!(team_id = %team_id, marked, "snapshots marked stale");
        }
    }

    /// Participation of one team in one week, in `[0, 1]`
    ///
    /// # Errors
    /// - `AnalyticsError::UnknownTeam`
    pub fn participation_rate(&self, team_id: &TeamId, week: u32) -> Result<f64, AnalyticsError> {
        let tally = self
            .inner
            .teams
            .get(team_id)
            .ok_or_else(|| AnalyticsError::UnknownTeam(team_id.clone()))?;
        Ok(participation_rate(tally.responders(week), tally.members))
    }

    /// Headline numbers for a team
    ///
    /// # Errors
    /// - `AnalyticsError::UnknownTeam`
    pub fn team_totals(&self, team_id: &TeamId) -> Result<TeamTotals, AnalyticsError> {
        let tally = self
            .inner
            .teams
            .get(team_id)
            .ok_or_else(|| AnalyticsError::UnknownTeam(team_id.clone()))?;
        Ok(TeamTotals {
            members: tally.members,
            total_responses: tally.total_responses(),
            participants: tally.participants.len(),
            current_week: tally.current_week,
            current_participation: participation_rate(
                tally.responders(tally.current_week),
                tally.members,
            ),
            trend: tally.trend.points(),
        })
    }

    /// Distinct users who responded in any team of the organization
    #[must_use]
    pub fn organization_participants(&self, org_id: &OrgId) -> usize {
        let Some(teams) = self.inner.orgs.get(org_id).map(|t| t.clone()) else {
            return 0;
        };
        let mut users: HashSet<UserId> = HashSet::new();
        for team_id in &teams {
            if let Some(tally) = self.inner.teams.get(team_id) {
                users.extend(tally.participants.iter().cloned());
            }
        }
        users.len()
    }

    /// Teams registered under an organization
    #[must_use]
    pub fn teams_of(&self, org_id: &OrgId) -> Vec<TeamId> {
        self.inner
            .orgs
            .get(org_id)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot for `scope` over `period`, within the configured time budget
    ///
    /// # Errors
    /// - `AnalyticsError::InvalidPeriod` for an empty week range
    /// - `AnalyticsError::UnknownTeam` / `UnknownOrganization` with nothing cached
    /// - `AnalyticsError::Timeout` when the budget runs out
    pub async fn snapshot(
        &self,
        scope: Scope,
        period: Period,
    ) -> Result<AggregateSnapshot, AnalyticsError> {
        period.validate()?;
        let budget = self.inner.config.query_timeout();
        let inner = Arc::clone(&self.inner);
        let key = SnapshotKey { scope, period };
        let task = tokio::task::spawn_blocking(move || inner.read(&key));

        match tokio::time::timeout(budget, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(AnalyticsError::Aborted(join.to_string())),
            Err(_) => {
                let budget_ms = self.inner.config.query_timeout_ms;
                tracing::warn!(budget_ms, "analytics query timed out");
                Err(AnalyticsError::Timeout { budget_ms })
            }
        }
    }

    /// Number of cached snapshots
    #[must_use]
    pub fn cached_snapshots(&self) -> u64 {
        self.inner.cache.run_pending_tasks();
        self.inner.cache.entry_count()
    }
}

impl Inner {
    fn read(&self, key: &SnapshotKey) -> Result<AggregateSnapshot, AnalyticsError> {
        let cached = self.cache.get(key);
        if let Some(snapshot) = cached.as_ref().filter(|s| !s.stale) {
            return Ok((**snapshot).clone());
        }
        match self.compute(key) {
            Ok(snapshot) => {
                self.cache.insert(key.clone(), Arc::new(snapshot.clone()));
                Ok(snapshot)
            }
            Err(err) => match cached {
                Some(stale) => {
                    tracing::warn!(scope = %key.scope, error = %err, "serving stale snapshot");
                    Ok((*stale).clone())
                }
                None => Err(err),
            },
        }
    }

    fn compute(&self, key: &SnapshotKey) -> Result<AggregateSnapshot, AnalyticsError> {
        #[cfg(test)]
        self.faults.inject()?;

        let tallies: Vec<TeamTally> = match &key.scope {
            Scope::Team(team_id) => {
                let tally = self
                    .teams
                    .get(team_id)
                    .ok_or_else(|| AnalyticsError::UnknownTeam(team_id.clone()))?;
                vec![tally.clone()]
            }
            Scope::Organization(org_id) => {
                let teams = self
                    .orgs
                    .get(org_id)
                    .map(|t| t.clone())
                    .ok_or_else(|| AnalyticsError::UnknownOrganization(org_id.clone()))?;
                teams
                    .iter()
                    .filter_map(|id| self.teams.get(id).map(|t| t.clone()))
                    .collect()
            }
        };
        Ok(compute(key.scope.clone(), key.period, &tallies, &self.config))
    }

    fn affected_scopes(&self, team_id: &TeamId) -> Vec<Scope> {
        let mut scopes = vec![Scope::Team(team_id.clone())];
        if let Some(org_id) = self.teams.get(team_id).and_then(|t| t.org_id.clone()) {
            scopes.push(Scope::Organization(org_id));
        }
        scopes
    }

    fn cached_keys(&self, scopes: &[Scope]) -> Vec<SnapshotKey> {
        self.cache
            .iter()
            .filter(|(key, _)| scopes.contains(&key.scope))
            .map(|(key, _)| (*key).clone())
            .collect()
    }

    /// Recompute cached snapshots touched by a write to `team_id`
    fn refresh_scopes(&self, team_id: &TeamId) {
        for key in self.cached_keys(&self.affected_scopes(team_id)) {
            match self.compute(&key) {
                Ok(snapshot) => self.cache.insert(key, Arc::new(snapshot)),
                Err(err) => {
                    tracing::warn!(scope = %key.scope, error = %err, "snapshot recompute failed, marking stale");
                    if let Some(snapshot) = self.cache.get(&key) {
                        let mut stale = (*snapshot).clone();
                        stale.stale = true;
                        self.cache.insert(key, Arc::new(stale));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod faults {
    use crate::error::AnalyticsError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    pub(super) struct Faults {
        pub(super) fail: AtomicBool,
        pub(super) delay: Mutex<Option<Duration>>,
    }

    impl Faults {
        pub(super) fn inject(&self) -> Result<(), AnalyticsError> {
            if let Some(delay) = *self.delay.lock() {
                std::thread::sleep(delay);
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(AnalyticsError::Aborted("injected".to_string()));
            }
            Ok(())
        }
    }
}

//! Response ledger
//!
//! One row per (content unit, user). Submitting again amends the row in place
//! until the lock policy closes the edit window. A unit counts as completed
//! the moment a non-blank response is stored; there is no draft state.

use crate::error::LedgerError;
use crate::logging::AuditLog;
use crate::store::ResponseStore;
use crate::sync::KeyedLocks;
use crate::tracker::ProcessTracker;
use chrono::{DateTime, Utc};
use mlp_content::{ContentCatalog, ContentUnitId, ProcessId, ResponseId, TeamId, Theme, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default cap on response length, in characters
pub const DEFAULT_MAX_RESPONSE_CHARS: usize = 10_000;

/// When amendments stop being accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPolicy {
    /// Responses stay editable forever
    #[default]
    Never,
    /// Responses lock once the team's process moves past the unit's week
    AfterWeekRollover,
}

/// Ledger tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    pub lock: LockPolicy,
    pub max_response_chars: usize,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            lock: LockPolicy::Never,
            max_response_chars: DEFAULT_MAX_RESPONSE_CHARS,
        }
    }
}

/// Unique key of a response row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseKey {
    pub content_unit_id: ContentUnitId,
    pub user_id: UserId,
}

/// A user's free-text answer to one content unit version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: ResponseId,
    pub content_unit_id: ContentUnitId,
    pub user_id: UserId,
    pub process_id: ProcessId,
    pub team_id: TeamId,
    pub week: u32,
    pub theme: Theme,
    pub text: String,
    pub first_submitted_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub completed: bool,
    /// 1 on creation, +1 per amendment
    pub revision: u32,
}

impl Response {
    #[inline]
    #[must_use]
    pub fn key(&self) -> ResponseKey {
        ResponseKey {
            content_unit_id: self.content_unit_id.clone(),
            user_id: self.user_id.clone(),
        }
    }

    /// Length used by engagement scoring
    #[inline]
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// What a submit did to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Created,
    Amended { previous_chars: usize },
    /// An older write lost to a newer stored one; nothing changed
    Superseded,
}

/// Result of [`ResponseLedger::submit`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// The row as stored after the call
    pub response: Response,
    pub outcome: SubmitOutcome,
}

/// Validating, idempotent response store
pub struct ResponseLedger {
    catalog: Arc<dyn ContentCatalog>,
    tracker: Arc<ProcessTracker>,
    store: Arc<dyn ResponseStore>,
    audit: Arc<AuditLog>,
    locks: KeyedLocks<ResponseKey>,
    policy: LedgerPolicy,
}

impl std::fmt::Debug for ResponseLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseLedger")
            .field("policy", &self.policy)
            .field("responses", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl ResponseLedger {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn ContentCatalog>,
        tracker: Arc<ProcessTracker>,
        store: Arc<dyn ResponseStore>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            catalog,
            tracker,
            store,
            audit,
            locks: KeyedLocks::new(),
            policy: LedgerPolicy::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: LedgerPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[inline]
    #[must_use]
    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    /// Record `text` as `user_id`'s response, stamped now
    ///
    /// # Errors
    /// See [`ResponseLedger::submit_at`]
    pub fn submit(
        &self,
        unit_id: &ContentUnitId,
        user_id: &UserId,
        text: &str,
    ) -> Result<Submission, LedgerError> {
        self.submit_at(unit_id, user_id, text, Utc::now())
    }

    /// Record `text` with an explicit submission time
    ///
    /// Concurrent writes for the same (unit, user) serialize; the one with
    /// the latest `submitted_at` wins.
    ///
    /// # Errors
    /// - `LedgerError::InvalidInput` for blank or oversized text
    /// - `LedgerError::UnitNotFound` when the unit does not resolve
    /// - `LedgerError::Locked` when amending after the edit window closed
    pub fn submit_at(
        &self,
        unit_id: &ContentUnitId,
        user_id: &UserId,
        text: &str,
        submitted_at: DateTime<Utc>,
    ) -> Result<Submission, LedgerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LedgerError::InvalidInput {
                field: "text",
                reason: "must not be blank".to_string(),
            });
        }
        let chars = text.chars().count();
        if chars > self.policy.max_response_chars {
            return Err(LedgerError::InvalidInput {
                field: "text",
                reason: format!(
                    "{chars} characters exceeds the limit of {}",
                    self.policy.max_response_chars
                ),
            });
        }

        let unit = self
            .catalog
            .get_by_id(unit_id)
            .map_err(|_| LedgerError::UnitNotFound(unit_id.clone()))?;
        let process = self
            .tracker
            .get(&unit.process_id)
            .map_err(|_| LedgerError::ProcessNotFound(unit.process_id.clone()))?;

        let key = ResponseKey {
            content_unit_id: unit.id.clone(),
            user_id: user_id.clone(),
        };

        let submission = self.locks.with_lock(&key, || {
            let Some(mut existing) = self.store.get(&key) else {
                let response = Response {
                    id: ResponseId::generate(),
                    content_unit_id: unit.id.clone(),
                    user_id: user_id.clone(),
                    process_id: process.id.clone(),
                    team_id: process.team_id.clone(),
                    week: unit.week,
                    theme: unit.theme.clone(),
                    text: text.to_string(),
                    first_submitted_at: submitted_at,
                    submitted_at,
                    completed: true,
                    revision: 1,
                };
                self.store.put(response.clone());
                return Ok(Submission {
                    response,
                    outcome: SubmitOutcome::Created,
                });
            };

            if self.policy.lock == LockPolicy::AfterWeekRollover && process.has_passed(unit.week) {
                return Err(LedgerError::Locked { week: unit.week });
            }
            if submitted_at < existing.submitted_at {
                return Ok(Submission {
                    response: existing,
                    outcome: SubmitOutcome::Superseded,
                });
            }

            let previous_chars = existing.char_count();
            existing.text = text.to_string();
            existing.submitted_at = submitted_at;
            existing.revision += 1;
            self.store.put(existing.clone());
            Ok(Submission {
                response: existing,
                outcome: SubmitOutcome::Amended { previous_chars },
            })
        })?;

        match submission.outcome {
            SubmitOutcome::Created => {
                self.audit.append(
                    submission.response.id.as_str(),
                    "response_created",
                    format!("unit={} user={}", unit_id, user_id),
                );
                tracing::info!(
                    unit_id = %unit_id,
                    user_id = %user_id,
                    week = unit.week,
                    "response recorded"
                );
            }
            SubmitOutcome::Amended { .. } => {
                self.audit.append(
                    submission.response.id.as_str(),
                    "response_amended",
                    format!("revision={}", submission.response.revision),
                );
                tracing::info!(
                    unit_id = %unit_id,
                    user_id = %user_id,
                    revision = submission.response.revision,
                    "response amended"
                );
            }
            SubmitOutcome::Superseded => {
                tracing::debug!(unit_id = %unit_id, user_id = %user_id, "stale response write ignored");
            }
        }
        Ok(submission)
    }

    /// Stored response, if any
    #[must_use]
    pub fn get(&self, unit_id: &ContentUnitId, user_id: &UserId) -> Option<Response> {
        self.store.get(&ResponseKey {
            content_unit_id: unit_id.clone(),
            user_id: user_id.clone(),
        })
    }

    /// True once the user has a stored response to the unit
    #[must_use]
    pub fn is_completed(&self, unit_id: &ContentUnitId, user_id: &UserId) -> bool {
        self.get(unit_id, user_id).is_some_and(|r| r.completed)
    }

    /// Every response by one user, newest week first
    #[must_use]
    pub fn for_user(&self, user_id: &UserId) -> Vec<Response> {
        let mut responses = self.store.for_user(user_id);
        responses.sort_by(|a, b| b.week.cmp(&a.week).then(b.submitted_at.cmp(&a.submitted_at)));
        responses
    }

    /// Every response to one unit version
    #[must_use]
    pub fn for_unit(&self, unit_id: &ContentUnitId) -> Vec<Response> {
        self.store.for_unit(unit_id)
    }

    /// Number of stored rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessSpec, Tick};
    use crate::store::{InMemoryProcessStore, InMemoryResponseStore};
    use chrono::{Duration, NaiveDate};
    use mlp_content::{ContentFields, ContentKind, FieldKey, InMemoryCatalog, UnitDraft};
    use pretty_assertions::assert_eq;

    struct Fixture {
        ledger: ResponseLedger,
        tracker: Arc<ProcessTracker>,
        process_id: ProcessId,
        week1: ContentUnitId,
    }

    fn fixture(policy: LedgerPolicy) -> Fixture {
        let catalog = Arc::new(InMemoryCatalog::new());
        let audit = Arc::new(AuditLog::new());
        let tracker = Arc::new(ProcessTracker::new(
            Arc::new(InMemoryProcessStore::new()),
            catalog.clone(),
            audit.clone(),
        ));
        let process = tracker
            .create(ProcessSpec::new(
                TeamId::from("t1"),
                "Psychological safety",
                vec![Theme::new("Trust"), Theme::new("Candor")],
                NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            ))
            .unwrap();
        tracker.start(&process.id).unwrap();
        let unit = catalog
            .publish(
                UnitDraft::new(process.id.clone(), 1, Theme::new("Trust"), ContentKind::Reflection)
                    .with_fields(ContentFields::new().with_text(FieldKey::SelfReflection, "Who do you trust?")),
            )
            .unwrap();
        let ledger = ResponseLedger::new(
            catalog,
            tracker.clone(),
            Arc::new(InMemoryResponseStore::new()),
            audit,
        )
        .with_policy(policy);
        Fixture {
            ledger,
            tracker,
            process_id: process.id,
            week1: unit.id,
        }
    }

    #[test]
    fn first_submit_creates_completed_row() {
        let f = fixture(LedgerPolicy::default());
        let user = UserId::from("u1");
        let s = f.ledger.submit(&f.week1, &user, "  My manager  ").unwrap();
        assert_eq!(s.outcome, SubmitOutcome::Created);
        assert_eq!(s.response.text, "My manager");
        assert_eq!(s.response.revision, 1);
        assert_eq!(s.response.theme.as_str(), "Trust");
        assert!(f.ledger.is_completed(&f.week1, &user));
        assert!(!f.ledger.is_completed(&f.week1, &UserId::from("u2")));
    }

    #[test]
    fn resubmit_amends_the_same_row() {
        let f = fixture(LedgerPolicy::default());
        let user = UserId::from("u1");
        let first = f.ledger.submit(&f.week1, &user, "draft answer").unwrap();
        let second = f.ledger.submit(&f.week1, &user, "final").unwrap();

        assert_eq!(second.outcome, SubmitOutcome::Amended { previous_chars: 12 });
        assert_eq!(second.response.id, first.response.id);
        assert_eq!(second.response.first_submitted_at, first.response.first_submitted_at);
        assert_eq!(second.response.revision, 2);
        assert_eq!(f.ledger.len(), 1);
        assert_eq!(f.ledger.for_unit(&f.week1).len(), 1);
    }

    #[test]
    fn blank_and_oversized_text_rejected() {
        let f = fixture(LedgerPolicy {
            lock: LockPolicy::Never,
            max_response_chars: 5,
        });
        let user = UserId::from("u1");
        assert!(matches!(
            f.ledger.submit(&f.week1, &user, " \n\t"),
            Err(LedgerError::InvalidInput { field: "text", .. })
        ));
        assert!(matches!(
            f.ledger.submit(&f.week1, &user, "too long"),
            Err(LedgerError::InvalidInput { field: "text", .. })
        ));
        // counted in characters, not bytes
        assert!(f.ledger.submit(&f.week1, &user, "blåbær").is_err());
        assert!(f.ledger.submit(&f.week1, &user, "ærlig").is_ok());
        assert_eq!(f.ledger.len(), 1);
    }

    #[test]
    fn unknown_unit_is_not_found() {
        let f = fixture(LedgerPolicy::default());
        let err = f
            .ledger
            .submit(&ContentUnitId::from("nope"), &UserId::from("u1"), "hi")
            .unwrap_err();
        assert_eq!(err, LedgerError::UnitNotFound(ContentUnitId::from("nope")));
    }

    #[test]
    fn older_write_is_superseded() {
        let f = fixture(LedgerPolicy::default());
        let user = UserId::from("u1");
        let now = Utc::now();
        f.ledger.submit_at(&f.week1, &user, "newer", now).unwrap();
        let stale = f
            .ledger
            .submit_at(&f.week1, &user, "older", now - Duration::seconds(30))
            .unwrap();
        assert_eq!(stale.outcome, SubmitOutcome::Superseded);
        assert_eq!(f.ledger.get(&f.week1, &user).unwrap().text, "newer");
    }

    #[test]
    fn amendments_lock_after_rollover() {
        let f = fixture(LedgerPolicy {
            lock: LockPolicy::AfterWeekRollover,
            max_response_chars: DEFAULT_MAX_RESPONSE_CHARS,
        });
        let early = UserId::from("u1");
        let late = UserId::from("u2");
        f.ledger.submit(&f.week1, &early, "on time").unwrap();
        f.tracker.advance_week(&f.process_id, Tick(1)).unwrap();

        assert_eq!(
            f.ledger.submit(&f.week1, &early, "edit").unwrap_err(),
            LedgerError::Locked { week: 1 }
        );
        // a first submission after rollover is still accepted
        let s = f.ledger.submit(&f.week1, &late, "catching up").unwrap();
        assert_eq!(s.outcome, SubmitOutcome::Created);
    }

    #[test]
    fn never_policy_allows_late_edits() {
        let f = fixture(LedgerPolicy::default());
        let user = UserId::from("u1");
        f.ledger.submit(&f.week1, &user, "first").unwrap();
        f.tracker.advance_week(&f.process_id, Tick(1)).unwrap();
        f.tracker.advance_week(&f.process_id, Tick(2)).unwrap();
        assert!(f.ledger.submit(&f.week1, &user, "second").is_ok());
    }

    #[test]
    fn concurrent_submits_keep_one_row() {
        let f = Arc::new(fixture(LedgerPolicy::default()));
        let user = UserId::from("u1");
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let f = Arc::clone(&f);
                let user = user.clone();
                std::thread::spawn(move || {
                    f.ledger.submit(&f.week1, &user, &format!("answer {i}")).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(f.ledger.len(), 1);
        let row = f.ledger.get(&f.week1, &user).unwrap();
        assert!((1..=8).contains(&row.revision));
    }
}

//! Append-only content catalog
//!
//! Units are keyed by (process, week). Each key holds every published
//! version, oldest first; readers get the latest unless they ask for a
//! specific version.

use crate::id::{ContentUnitId, ProcessId};
use crate::unit::{ContentUnit, UnitDraft};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Catalog errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// No unit published for the key
    #[error("no content for process {process_id} week {week}")]
    NotFound { process_id: ProcessId, week: u32 },

    /// No unit with this id
    #[error("content unit not found: {0}")]
    UnknownUnit(ContentUnitId),

    /// Requested version was never published
    #[error("process {process_id} week {week} has no version {version}")]
    UnknownVersion {
        process_id: ProcessId,
        week: u32,
        version: u32,
    },

    /// Version is not newer than what is already published
    #[error("week {week} already published at version {latest}, got version {requested}")]
    AlreadyPublished {
        week: u32,
        latest: u32,
        requested: u32,
    },

    /// Version skips over the next expected version
    #[error("week {week} expects version {expected}, got version {requested}")]
    VersionGap {
        week: u32,
        expected: u32,
        requested: u32,
    },

    /// Weeks are numbered from 1
    #[error("week must be at least 1")]
    InvalidWeek,

    /// Draft has no visible section
    #[error("content unit has no visible sections")]
    EmptyUnit,
}

impl CatalogError {
    /// Lookup failure (as opposed to a rejected publication)
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::UnknownUnit(_) | Self::UnknownVersion { .. }
        )
    }

    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Read/publish contract over the content store
pub trait ContentCatalog: Send + Sync {
    /// Latest version for (process, week)
    fn get_unit(&self, process_id: &ProcessId, week: u32) -> Result<ContentUnit, CatalogError>;

    /// Specific version for (process, week)
    fn get_version(
        &self,
        process_id: &ProcessId,
        week: u32,
        version: u32,
    ) -> Result<ContentUnit, CatalogError>;

    /// Any version by id
    fn get_by_id(&self, id: &ContentUnitId) -> Result<ContentUnit, CatalogError>;

    /// Publish a first version or an explicit supersession
    fn publish(&self, draft: UnitDraft) -> Result<ContentUnit, CatalogError>;

    /// Weeks with at least one published version, ascending
    fn list_weeks(&self, process_id: &ProcessId) -> Vec<u32>;

    /// Every version for (process, week), oldest first
    fn versions(&self, process_id: &ProcessId, week: u32) -> Vec<ContentUnit>;
}

type WeekVersions = BTreeMap<u32, Vec<ContentUnit>>;

/// In-memory catalog
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    by_process: RwLock<BTreeMap<ProcessId, WeekVersions>>,
    /// unit id -> (process, week, version)
    by_id: DashMap<ContentUnitId, (ProcessId, u32, u32)>,
}

impl InMemoryCatalog {
    /// Empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of published versions
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.by_id.len()
    }
}

impl ContentCatalog for InMemoryCatalog {
    fn get_unit(&self, process_id: &ProcessId, week: u32) -> Result<ContentUnit, CatalogError> {
        self.by_process
            .read()
            .get(process_id)
            .and_then(|weeks| weeks.get(&week))
            .and_then(|versions| versions.last().cloned())
            .ok_or_else(|| CatalogError::NotFound {
                process_id: process_id.clone(),
                week,
            })
    }

    fn get_version(
        &self,
        process_id: &ProcessId,
        week: u32,
        version: u32,
    ) -> Result<ContentUnit, CatalogError> {
        self.by_process
            .read()
            .get(process_id)
            .and_then(|weeks| weeks.get(&week))
            .and_then(|versions| versions.iter().find(|u| u.version == version).cloned())
            .ok_or_else(|| CatalogError::UnknownVersion {
                process_id: process_id.clone(),
                week,
                version,
            })
    }

    fn get_by_id(&self, id: &ContentUnitId) -> Result<ContentUnit, CatalogError> {
        let (process_id, week, version) = self
            .by_id
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CatalogError::UnknownUnit(id.clone()))?;
        self.get_version(&process_id, week, version)
    }

    fn publish(&self, draft: UnitDraft) -> Result<ContentUnit, CatalogError> {
        if draft.week == 0 {
            return Err(CatalogError::InvalidWeek);
        }
        if draft.fields.is_empty() {
            return Err(CatalogError::EmptyUnit);
        }

        let mut guard = self.by_process.write();
        let latest = guard
            .get(&draft.process_id)
            .and_then(|weeks| weeks.get(&draft.week))
            .and_then(|versions| versions.last())
            .map_or(0, |u| u.version);
        let expected = latest + 1;
        if draft.version <= latest {
            return Err(CatalogError::AlreadyPublished {
                week: draft.week,
                latest,
                requested: draft.version,
            });
        }
        if draft.version != expected {
            return Err(CatalogError::VersionGap {
                week: draft.week,
                expected,
                requested: draft.version,
            });
        }

        let unit = draft.seal(Utc::now());
        guard
            .entry(unit.process_id.clone())
            .or_default()
            .entry(unit.week)
            .or_default()
            .push(unit.clone());
        self.by_id.insert(
            unit.id.clone(),
            (unit.process_id.clone(), unit.week, unit.version),
        );

        tracing::info!(
            process_id = %unit.process_id,
            week = unit.week,
            version = unit.version,
            digest = %unit.digest.short(),
            "content unit published"
        );
        Ok(unit)
    }

    fn list_weeks(&self, process_id: &ProcessId) -> Vec<u32> {
        self.by_process
            .read()
            .get(process_id)
            .map(|weeks| weeks.keys().copied().collect())
            .unwrap_or_default()
    }

    fn versions(&self, process_id: &ProcessId, week: u32) -> Vec<ContentUnit> {
        self.by_process
            .read()
            .get(process_id)
            .and_then(|weeks| weeks.get(&week))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{ContentFields, ContentKind, FieldKey, Theme};
    use pretty_assertions::assert_eq;

    fn draft(week: u32, version: u32) -> UnitDraft {
        UnitDraft::new(
            ProcessId::from("p1"),
            week,
            Theme::new("Boundaries"),
            ContentKind::Reflection,
        )
        .with_version(version)
        .with_fields(ContentFields::new().with_questions(["What did you decline this week?"]))
    }

    #[test]
    fn publish_and_get_latest() {
        let catalog = InMemoryCatalog::new();
        let v1 = catalog.publish(draft(2, 1)).unwrap();
        assert_eq!(catalog.get_unit(&"p1".into(), 2).unwrap(), v1);
        assert_eq!(catalog.get_by_id(&v1.id).unwrap(), v1);
    }

    #[test]
    fn republish_without_version_bump_is_rejected() {
        let catalog = InMemoryCatalog::new();
        catalog.publish(draft(1, 1)).unwrap();
        let err = catalog.publish(draft(1, 1)).unwrap_err();
        assert_eq!(
            err,
            CatalogError::AlreadyPublished {
                week: 1,
                latest: 1,
                requested: 1
            }
        );
    }

    #[test]
    fn supersession_keeps_old_versions() {
        let catalog = InMemoryCatalog::new();
        let v1 = catalog.publish(draft(1, 1)).unwrap();
        let v2 = catalog.publish(draft(1, 2)).unwrap();

        assert_eq!(catalog.get_unit(&"p1".into(), 1).unwrap().id, v2.id);
        assert_eq!(catalog.get_by_id(&v1.id).unwrap().version, 1);
        assert_eq!(catalog.versions(&"p1".into(), 1).len(), 2);
        assert_eq!(catalog.unit_count(), 2);
    }

    #[test]
    fn version_gap_is_rejected() {
        let catalog = InMemoryCatalog::new();
        assert!(matches!(
            catalog.publish(draft(1, 3)),
            Err(CatalogError::VersionGap { expected: 1, .. })
        ));
    }

    #[test]
    fn week_zero_and_empty_units_are_rejected() {
        let catalog = InMemoryCatalog::new();
        assert_eq!(catalog.publish(draft(0, 1)), Err(CatalogError::InvalidWeek));

        let empty = draft(1, 1).with_fields(ContentFields::new().with_text(FieldKey::Insight, " "));
        assert_eq!(catalog.publish(empty), Err(CatalogError::EmptyUnit));
    }

    #[test]
    fn list_weeks_is_ordered() {
        let catalog = InMemoryCatalog::new();
        for week in [5, 1, 3] {
            catalog.publish(draft(week, 1)).unwrap();
        }
        assert_eq!(catalog.list_weeks(&"p1".into()), vec![1, 3, 5]);
        assert!(catalog.list_weeks(&"other".into()).is_empty());
    }

    #[test]
    fn rejected_publish_leaves_no_week_behind() {
        let catalog = InMemoryCatalog::new();
        assert!(catalog.publish(draft(4, 3)).is_err());
        assert!(catalog.list_weeks(&"p1".into()).is_empty());
        assert!(catalog.versions(&"p1".into(), 4).is_empty());

        catalog.publish(draft(2, 1)).unwrap();
        assert!(catalog.publish(draft(2, 1)).is_err());
        assert!(catalog.publish(draft(5, 2)).is_err());
        assert_eq!(catalog.list_weeks(&"p1".into()), vec![2]);
    }

    #[test]
    fn missing_unit_is_not_found() {
        let catalog = InMemoryCatalog::new();
        let err = catalog.get_unit(&"p1".into(), 4).unwrap_err();
        assert!(err.is_not_found());
    }

    proptest::proptest! {
        #[test]
        fn versions_stay_contiguous(requests in proptest::collection::vec(0u32..6, 1..20)) {
            let catalog = InMemoryCatalog::new();
            let mut accepted = 0u32;
            for version in requests {
                match catalog.publish(draft(1, version)) {
                    Ok(unit) => {
                        accepted += 1;
                        proptest::prop_assert_eq!(unit.version, accepted);
                    }
                    Err(err) => proptest::prop_assert!(!err.is_not_found()),
                }
            }
            let versions: Vec<u32> = catalog.versions(&"p1".into(), 1).iter().map(|u| u.version).collect();
            proptest::prop_assert_eq!(versions, (1..=accepted).collect::<Vec<_>>());
        }
    }
}

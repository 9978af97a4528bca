//! Randomized operation sequences against the tracker and ledger

use chrono::NaiveDate;
use mlp_content::{
    ContentCatalog, ContentFields, ContentKind, FieldKey, InMemoryCatalog, ProcessId, TeamId, Theme,
    UnitDraft, UserId,
};
use mlp_kernel::prelude::*;
use mlp_kernel::{ProcessAction, TrackerError};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Advance(u64),
    Pause,
    Resume,
    Override(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u64..40).prop_map(Op::Advance),
        1 => Just(Op::Pause),
        1 => Just(Op::Resume),
        1 => (0u32..20).prop_map(Op::Override),
    ]
}

fn setup(weeks: usize) -> (Arc<ProcessTracker>, Arc<InMemoryCatalog>, ProcessId) {
    let catalog = Arc::new(InMemoryCatalog::new());
    let tracker = Arc::new(ProcessTracker::new(
        Arc::new(InMemoryProcessStore::new()),
        catalog.clone(),
        Arc::new(AuditLog::new()),
    ));
    let process = tracker
        .create(ProcessSpec::new(
            TeamId::from("team-a"),
            "Feedback culture",
            (1..=weeks).map(|w| Theme::new(format!("Theme {w}"))).collect(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        ))
        .unwrap();
    tracker.start(&process.id).unwrap();
    (tracker, catalog, process.id)
}

proptest! {
    #[test]
    fn prop_week_stays_in_range_and_never_regresses(
        weeks in 1usize..15,
        ops in prop::collection::vec(op(), 0..60),
    ) {
        let (tracker, _, id) = setup(weeks);
        let total = u32::try_from(weeks).unwrap();
        let mut last_week = 1;

        for op in ops {
            let before = tracker.get(&id).unwrap();
            let res = match op {
                Op::Advance(t) => tracker.advance_week(&id, Tick(t)).map(|_| ()),
                Op::Pause => tracker.pause(&id).map(|_| ()),
                Op::Resume => tracker.resume(&id).map(|_| ()),
                Op::Override(w) => tracker.override_week(&id, w).map(|_| ()),
            };
            let after = tracker.get(&id).unwrap();

            if res.is_err() {
                // rejected calls leave the process untouched
                prop_assert_eq!(&before, &after);
            }
            prop_assert!(after.current_week >= last_week);
            prop_assert!(after.current_week >= 1 && after.current_week <= total + 1);
            if after.status == ProcessStatus::Completed {
                prop_assert_eq!(after.current_week, total + 1);
            } else {
                prop_assert!(after.current_week <= total);
            }
            last_week = after.current_week;
        }
    }

    #[test]
    fn prop_each_tick_applies_at_most_once(ticks in prop::collection::vec(0u64..10, 1..30)) {
        let (tracker, _, id) = setup(52);
        for t in &ticks {
            tracker.advance_week(&id, Tick(*t)).unwrap();
        }
        // only ticks above the running maximum advance
        let mut max = None;
        let mut applied = 0u32;
        for t in ticks {
            if max.map_or(true, |m| t > m) {
                applied += 1;
                max = Some(t);
            }
        }
        prop_assert_eq!(tracker.get(&id).unwrap().current_week, 1 + applied);
    }
}

#[test]
fn paused_advance_reports_state_not_transition() {
    let (tracker, _, id) = setup(3);
    tracker.pause(&id).unwrap();
    let err = tracker.advance_week(&id, Tick(1)).unwrap_err();
    assert_eq!(
        err,
        TrackerError::InvalidState {
            status: ProcessStatus::Paused,
            action: ProcessAction::Advance,
        }
    );
    assert!(err.is_conflict());
}

#[test]
fn paused_override_is_rejected_until_resumed() {
    let (tracker, _, id) = setup(6);
    tracker.pause(&id).unwrap();
    let err = tracker.override_week(&id, 4).unwrap_err();
    assert!(matches!(err, TrackerError::InvalidState { status: ProcessStatus::Paused, .. }));
    assert_eq!(tracker.get(&id).unwrap().current_week, 1);

    tracker.resume(&id).unwrap();
    assert_eq!(tracker.override_week(&id, 4).unwrap().current_week, 4);
}

#[test]
fn responses_survive_catalog_republish() {
    let (tracker, catalog, id) = setup(2);
    let draft = |version, text: &str| {
        UnitDraft::new(id.clone(), 1, Theme::new("Theme 1"), ContentKind::Reflection)
            .with_version(version)
            .with_fields(ContentFields::new().with_text(FieldKey::SelfReflection, text))
    };
    let v1 = catalog.publish(draft(1, "first wording")).unwrap();
    let ledger = ResponseLedger::new(
        catalog.clone(),
        tracker,
        Arc::new(InMemoryResponseStore::new()),
        Arc::new(AuditLog::new()),
    );
    let user = UserId::from("u1");
    ledger.submit(&v1.id, &user, "answer to v1").unwrap();

    let v2 = catalog.publish(draft(2, "second wording")).unwrap();
    assert_eq!(catalog.get_unit(&id, 1).unwrap().id, v2.id);

    // the old row still points at the version it answered
    let row = ledger.get(&v1.id, &user).unwrap();
    assert_eq!(row.content_unit_id, v1.id);
    assert!(ledger.get(&v2.id, &user).is_none());
}

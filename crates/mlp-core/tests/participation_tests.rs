use mlp_analytics::{Period, Scope};
use mlp_test_utils::{seed_running_program, seed_team, setup_engine};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn participation_matches_distinct_responders(
        size in 1usize..10,
        answers in proptest::collection::vec((0usize..10, 1u8..4), 0..30),
    ) {
        let engine = setup_engine();
        let team = seed_team(&engine, "Ops", size);
        seed_running_program(&engine, &team.team_id, 2);

        let mut responders = std::collections::BTreeSet::new();
        for (member, words) in answers {
            let member = member % size;
            let viewer = team.member(member);
            let unit = engine.current_unit(&viewer, &team.team_id).unwrap().unit;
            engine
                .submit_response(&viewer, &unit.id, &"word ".repeat(usize::from(words)))
                .unwrap();
            responders.insert(member);
        }

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let snap = rt
            .block_on(engine.analytics(&team.leader(), Scope::Team(team.team_id.clone()), Period::week(1)))
            .unwrap();

        #[allow(clippy::cast_precision_loss)]
        let expected = responders.len() as f64 / size as f64;
        prop_assert!((snap.participation_rate - expected).abs() < 1e-9);
        prop_assert!(snap.participation_percent <= 100);
        prop_assert_eq!(snap.responders, responders.len());
        prop_assert_eq!(engine.ledger().len(), responders.len());
    }
}

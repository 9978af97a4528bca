use mlp_analytics::{
    AnalyticsAggregator, AnalyticsConfig, Period, ResponseChange, ResponseEvent, Scope,
};
use mlp_content::{OrgId, TeamId, Theme, UserId};
use pretty_assertions::assert_eq;

fn event(team: &str, user: &str, week: u32, theme: &str, chars: usize) -> ResponseEvent {
    ResponseEvent {
        team_id: TeamId::from(team),
        user_id: UserId::from(user),
        week,
        theme: Theme::new(theme),
        chars,
        change: ResponseChange::Created,
    }
}

#[tokio::test]
async fn organization_snapshot_ranks_themes() {
    let agg = AnalyticsAggregator::new(AnalyticsConfig::default()).unwrap();
    let org = OrgId::from("acme");
    agg.register_team(&org, &TeamId::from("sales"), 10);
    agg.register_team(&org, &TeamId::from("ops"), 10);

    // week 1 "Trust": everyone answers at full length
    for u in 0..10 {
        agg.record(&event("sales", &format!("s{u}"), 1, "Trust", 280));
    }
    // week 2 "Candor": half answer, briefly
    for u in 0..5 {
        agg.record(&event("sales", &format!("s{u}"), 2, "Candor", 28));
    }
    for u in 0..3 {
        agg.record(&event("ops", &format!("o{u}"), 1, "Trust", 140));
    }

    let snap = agg
        .snapshot(Scope::Organization(org.clone()), Period::all())
        .await
        .unwrap();
    assert_eq!(snap.total_responses, 18);
    assert_eq!(snap.responders, 13);
    assert_eq!(snap.members, 20);
    let themes: Vec<_> = snap.theme_breakdown.iter().map(|t| t.theme.as_str()).collect();
    assert_eq!(themes, vec!["Trust", "Candor"]);
    assert_eq!(snap.top_themes(1).len(), 1);
    assert!((snap.weights.participation - 0.6).abs() < f64::EPSILON);
    assert!(!snap.trend.is_empty());
}

#[tokio::test]
async fn team_trend_is_bounded() {
    let agg = AnalyticsAggregator::new(AnalyticsConfig::default().with_trend_window(4)).unwrap();
    let team = TeamId::from("t1");
    agg.register_team(&OrgId::from("o1"), &team, 2);
    for week in 1..=10 {
        agg.record(&event("t1", "u1", week, &format!("Theme {week}"), 50));
    }
    let snap = agg.snapshot(Scope::Team(team.clone()), Period::all()).await.unwrap();
    let weeks: Vec<_> = snap.trend.iter().map(|p| p.week).collect();
    assert_eq!(weeks, vec![7, 8, 9, 10]);
    assert_eq!(agg.team_totals(&team).unwrap().trend.len(), 4);
}

#[tokio::test]
async fn snapshots_serialize_with_scope_tag() {
    let agg = AnalyticsAggregator::new(AnalyticsConfig::default()).unwrap();
    agg.register_team(&OrgId::from("o1"), &TeamId::from("t1"), 1);
    let snap = agg
        .snapshot(Scope::Team(TeamId::from("t1")), Period::week(1))
        .await
        .unwrap();
    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["scope"]["kind"], "team");
    assert_eq!(json["scope"]["id"], "t1");
    assert_eq!(json["stale"], false);
}

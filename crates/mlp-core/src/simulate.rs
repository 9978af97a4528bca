//! Seeded in-memory program run
//!
//! Builds an organization, runs every team through a full program with
//! randomized responses, and reports the final overview. Used by the
//! `mlp-engine simulate` command and as an end-to-end smoke test.

use crate::config::EngineConfig;
use crate::engine::{Engine, PublishRequest};
use crate::error::EngineError;
use crate::overview::OrganizationOverview;
use crate::scheduler::WeeklyScheduler;
use crate::teams::Viewer;
use chrono::{Duration, NaiveDate};
use mlp_content::{ContentFields, ContentKind, FieldKey, OrgId, Theme, UserId};
use mlp_kernel::{ProcessSpec, Role};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Weekly themes used when a program does not name its own
pub const SAMPLE_THEMES: [&str; 12] = [
    "Psychological safety",
    "Active listening",
    "Giving feedback",
    "Receiving feedback",
    "Trust",
    "Recognition",
    "Stress prevention",
    "Collaboration",
    "Handling conflict",
    "Inclusion",
    "Learning from mistakes",
    "Celebrating progress",
];

const WORDS: [&str; 16] = [
    "we", "team", "listened", "feedback", "meeting", "tried", "together", "week", "noticed",
    "better", "asked", "colleague", "trust", "shared", "goal", "learned",
];

/// `themes` sample themes, cycling when more weeks than samples are needed
#[must_use]
pub fn sample_themes(weeks: u32) -> Vec<Theme> {
    (0..weeks as usize)
        .map(|i| {
            let base = SAMPLE_THEMES[i % SAMPLE_THEMES.len()];
            match i / SAMPLE_THEMES.len() {
                0 => Theme::new(base),
                round => Theme::new(format!("{base} ({})", round + 1)),
            }
        })
        .collect()
}

/// Simulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub weeks: u32,
    pub teams: usize,
    pub members: usize,
    pub seed: u64,
    /// Probability that a member answers in a given week
    pub response_rate: f64,
    pub start_date: NaiveDate,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            weeks: 12,
            teams: 2,
            members: 8,
            seed: 42,
            response_rate: 0.8,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
        }
    }
}

/// Final state of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub weeks: u32,
    pub responses: usize,
    pub audit_events: usize,
    pub audit_verified: bool,
    pub overview: OrganizationOverview,
}

/// Run a full program for every team
///
/// # Errors
/// - any engine error; a correct run never produces one
pub async fn run_simulation(
    engine_config: EngineConfig,
    sim: SimulationConfig,
) -> Result<SimulationReport, EngineError> {
    if !(0.0..=1.0).contains(&sim.response_rate) {
        return Err(EngineError::InvalidInput {
            field: "response_rate",
            reason: format!("{} is outside 0..=1", sim.response_rate),
        });
    }
    let engine = Arc::new(Engine::new(engine_config)?);
    let scheduler = WeeklyScheduler::new(Arc::clone(&engine));
    let mut rng = StdRng::seed_from_u64(sim.seed);
    let admin = Viewer::new("sim-admin", Role::OrgAdmin);
    let org = OrgId::from("sim-org");

    let mut rosters = Vec::with_capacity(sim.teams);
    for t in 0..sim.teams {
        let team = engine.create_team(&admin, &org, &format!("Team {}", t + 1))?;
        let mut members = Vec::with_capacity(sim.members);
        for m in 0..sim.members {
            let user = UserId::from(format!("user-{t}-{m}"));
            engine.add_member(&admin, &team.id, &user)?;
            members.push(user);
        }
        if let Some(first) = members.first() {
            engine.set_leader(&admin, &team.id, first)?;
        }

        let process = engine.create_process(
            &admin,
            ProcessSpec::new(
                team.id.clone(),
                format!("{} program", team.name),
                sample_themes(sim.weeks),
                sim.start_date,
            ),
        )?;
        for week in 1..=sim.weeks {
            engine.publish_content_unit(
                &admin,
                PublishRequest {
                    process_id: process.id.clone(),
                    week,
                    theme: None,
                    kind: ContentKind::Reflection,
                    fields: ContentFields::new()
                        .with_text(FieldKey::SelfReflection, "What did you notice this week?")
                        .with_text(FieldKey::LeaderOnlyGuidance, "Open the next team meeting with this")
                        .with_questions(["What went well?", "What will you try next?"]),
                    version: 1,
                },
            )?;
        }
        rosters.push((team.id, members));
    }

    scheduler.run(sim.start_date);
    for week in 1..=i64::from(sim.weeks) {
        for (team_id, members) in &rosters {
            for user in members {
                if !rng.random_bool(sim.response_rate) {
                    continue;
                }
                let viewer = Viewer::new(user.clone(), Role::Employee);
                let current = engine.current_unit(&viewer, team_id)?;
                let words = rng.random_range(5..60);
                let text = (0..words)
                    .map(|_| WORDS[rng.random_range(0..WORDS.len())])
                    .collect::<Vec<_>>()
                    .join(" ");
                engine.submit_response(&viewer, &current.unit.id, &text)?;
            }
        }
        scheduler.run(sim.start_date + Duration::weeks(week));
    }

    let last_day = sim.start_date + Duration::weeks(i64::from(sim.weeks));
    let overview = engine.overview_on(&admin, &org, last_day).await?;
    let audit = engine.audit_log();
    Ok(SimulationReport {
        seed: sim.seed,
        weeks: sim.weeks,
        responses: engine.ledger().len(),
        audit_events: audit.len(),
        audit_verified: audit.verify_integrity().is_ok(),
        overview,
    })
}

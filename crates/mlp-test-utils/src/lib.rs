//! Testing utilities for MLP workspace
//!
//! Shared fixtures: an engine with one organization, a staffed team and a
//! fully authored program.

#![allow(missing_docs)]

use chrono::NaiveDate;
use mlp_content::{ContentFields, ContentKind, FieldKey, OrgId, TeamId, UserId};
use mlp_core::simulate::sample_themes;
use mlp_core::{Engine, EngineConfig, PublishRequest, Viewer};
use mlp_kernel::{Process, ProcessSpec, Role};
use std::sync::Arc;

pub const ORG: &str = "acme";

pub fn admin() -> Viewer {
    Viewer::new("admin", Role::OrgAdmin)
}

pub fn employee(user: &str) -> Viewer {
    Viewer::new(user, Role::Employee)
}

pub fn leader(user: &str) -> Viewer {
    Viewer::new(user, Role::Leader)
}

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Fields with every section filled in
pub fn full_fields(week: u32) -> ContentFields {
    ContentFields::new()
        .with_text(FieldKey::SelfReflection, format!("Week {week}: what did you notice?"))
        .with_text(FieldKey::Insight, "Small habits compound")
        .with_text(FieldKey::ActionInstructions, "Try one thing this week")
        .with_text(FieldKey::LeaderOnlyGuidance, "Raise it in the Monday meeting")
        .with_text(FieldKey::AuthoringNotes, "drafted from the org profile")
        .with_questions(["What went well?", "What was hard?"])
}

pub fn setup_engine() -> Arc<Engine> {
    setup_engine_with(EngineConfig::default())
}

pub fn setup_engine_with(config: EngineConfig) -> Arc<Engine> {
    Arc::new(Engine::new(config).unwrap())
}

/// Staffed team in [`ORG`]; the first member leads
pub struct SeededTeam {
    pub team_id: TeamId,
    pub members: Vec<UserId>,
}

impl SeededTeam {
    pub fn leader(&self) -> Viewer {
        leader(self.members[0].as_str())
    }

    pub fn member(&self, index: usize) -> Viewer {
        employee(self.members[index].as_str())
    }
}

pub fn seed_team(engine: &Engine, name: &str, size: usize) -> SeededTeam {
    let admin = admin();
    let team = engine.create_team(&admin, &OrgId::from(ORG), name).unwrap();
    let members: Vec<UserId> = (0..size)
        .map(|i| UserId::from(format!("{}-{i}", name.to_lowercase())))
        .collect();
    for user in &members {
        engine.add_member(&admin, &team.id, user).unwrap();
    }
    if let Some(first) = members.first() {
        engine.set_leader(&admin, &team.id, first).unwrap();
    }
    SeededTeam {
        team_id: team.id,
        members,
    }
}

/// Planned process with every week published at version 1
pub fn seed_program(engine: &Engine, team_id: &TeamId, weeks: u32) -> Process {
    let admin = admin();
    let process = engine
        .create_process(
            &admin,
            ProcessSpec::new(team_id.clone(), "Team health", sample_themes(weeks), start_date()),
        )
        .unwrap();
    for week in 1..=weeks {
        engine
            .publish_content_unit(
                &admin,
                PublishRequest {
                    process_id: process.id.clone(),
                    week,
                    theme: None,
                    kind: ContentKind::Microlearning,
                    fields: full_fields(week),
                    version: 1,
                },
            )
            .unwrap();
    }
    process
}

/// [`seed_program`] and start it
pub fn seed_running_program(engine: &Engine, team_id: &TeamId, weeks: u32) -> Process {
    let process = seed_program(engine, team_id, weeks);
    engine.start_process(&admin(), &process.id).unwrap()
}

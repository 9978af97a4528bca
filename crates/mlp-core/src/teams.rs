//! Teams and membership

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mlp_content::{OrgId, TeamId, UserId};
use mlp_kernel::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Who is making a request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewer {
    pub user_id: UserId,
    pub role: Role,
}

impl Viewer {
    #[inline]
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// A team inside an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub org_id: OrgId,
    pub name: String,
    pub members: BTreeSet<UserId>,
    pub leader_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Team {
    #[inline]
    #[must_use]
    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    #[inline]
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Team registry
#[derive(Debug, Default)]
pub struct TeamDirectory {
    teams: DashMap<TeamId, Team>,
}

impl TeamDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty team
    ///
    /// # Errors
    /// - `EngineError::InvalidInput` for a blank name
    pub fn create(&self, org_id: &OrgId, name: &str) -> Result<Team, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidInput {
                field: "name",
                reason: "must not be blank".to_string(),
            });
        }
        let team = Team {
            id: TeamId::generate(),
            org_id: org_id.clone(),
            name: name.to_string(),
            members: BTreeSet::new(),
            leader_id: None,
            created_at: Utc::now(),
        };
        self.teams.insert(team.id.clone(), team.clone());
        tracing::info!(team_id = %team.id, org_id = %org_id, "team created");
        Ok(team)
    }

    /// # Errors
    /// - `EngineError::NotFound`
    pub fn get(&self, team_id: &TeamId) -> Result<Team, EngineError> {
        self.teams
            .get(team_id)
            .map(|t| t.clone())
            .ok_or_else(|| EngineError::not_found("team", team_id))
    }

    /// Add a member; returns the new member count
    ///
    /// # Errors
    /// - `EngineError::NotFound` for an unknown team
    pub fn add_member(&self, team_id: &TeamId, user_id: &UserId) -> Result<usize, EngineError> {
        self.update(team_id, |team| {
            team.members.insert(user_id.clone());
            Ok(team.member_count())
        })
    }

    /// Remove a member, clearing the leader slot if they held it
    ///
    /// # Errors
    /// - `EngineError::NotFound` for an unknown team
    pub fn remove_member(&self, team_id: &TeamId, user_id: &UserId) -> Result<usize, EngineError> {
        self.update(team_id, |team| {
            team.members.remove(user_id);
            if team.leader_id.as_ref() == Some(user_id) {
                team.leader_id = None;
            }
            Ok(team.member_count())
        })
    }

    /// Appoint a leader from the team's members
    ///
    /// # Errors
    /// - `EngineError::NotFound` for an unknown team
    /// - `EngineError::NotAMember` when `user_id` is not on the team
    pub fn set_leader(&self, team_id: &TeamId, user_id: &UserId) -> Result<(), EngineError> {
        self.update(team_id, |team| {
            if !team.is_member(user_id) {
                return Err(EngineError::NotAMember {
                    user_id: user_id.clone(),
                    team_id: team.id.clone(),
                });
            }
            team.leader_id = Some(user_id.clone());
            Ok(())
        })
    }

    /// Teams of one organization, by name
    #[must_use]
    pub fn teams_of(&self, org_id: &OrgId) -> Vec<Team> {
        let mut teams: Vec<Team> = self
            .teams
            .iter()
            .filter(|t| &t.org_id == org_id)
            .map(|t| t.value().clone())
            .collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        teams
    }

    /// Teams a user belongs to
    #[must_use]
    pub fn memberships(&self, user_id: &UserId) -> Vec<TeamId> {
        let mut teams: Vec<TeamId> = self
            .teams
            .iter()
            .filter(|t| t.is_member(user_id))
            .map(|t| t.id.clone())
            .collect();
        teams.sort();
        teams
    }

    #[must_use]
    pub fn is_member(&self, team_id: &TeamId, user_id: &UserId) -> bool {
        self.teams.get(team_id).is_some_and(|t| t.is_member(user_id))
    }

    fn update<R>(
        &self,
        team_id: &TeamId,
        f: impl FnOnce(&mut Team) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let mut team = self
            .teams
            .get_mut(team_id)
            .ok_or_else(|| EngineError::not_found("team", team_id))?;
        f(&mut team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_lifecycle() {
        let dir = TeamDirectory::new();
        let team = dir.create(&"o1".into(), "Platform").unwrap();
        assert_eq!(dir.add_member(&team.id, &"u1".into()).unwrap(), 1);
        assert_eq!(dir.add_member(&team.id, &"u1".into()).unwrap(), 1);
        assert_eq!(dir.add_member(&team.id, &"u2".into()).unwrap(), 2);

        dir.set_leader(&team.id, &"u2".into()).unwrap();
        assert_eq!(dir.get(&team.id).unwrap().leader_id, Some("u2".into()));

        dir.remove_member(&team.id, &"u2".into()).unwrap();
        assert!(dir.get(&team.id).unwrap().leader_id.is_none());
        assert!(dir.is_member(&team.id, &"u1".into()));
        assert_eq!(dir.memberships(&"u1".into()), vec![team.id]);
    }

    #[test]
    fn leader_must_be_member() {
        let dir = TeamDirectory::new();
        let team = dir.create(&"o1".into(), "Platform").unwrap();
        let err = dir.set_leader(&team.id, &"stranger".into()).unwrap_err();
        assert!(err.is_forbidden());
    }

    #[test]
    fn blank_name_and_unknown_team() {
        let dir = TeamDirectory::new();
        assert!(dir.create(&"o1".into(), "  ").is_err());
        assert_eq!(dir.add_member(&"nope".into(), &"u1".into()).unwrap_err().kind(), "not_found");
    }

    #[test]
    fn teams_are_scoped_to_org() {
        let dir = TeamDirectory::new();
        dir.create(&"o1".into(), "B").unwrap();
        dir.create(&"o1".into(), "A").unwrap();
        dir.create(&"o2".into(), "C").unwrap();
        let names: Vec<_> = dir.teams_of(&"o1".into()).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}

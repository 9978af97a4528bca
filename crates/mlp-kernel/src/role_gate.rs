//! Role gate
//!
//! Single place where roles are turned into decisions: which sections of a
//! unit a role may read, and which capabilities it holds. Everything here is
//! pure and total. Role strings the engine does not recognize fall back to
//! the employee policy.

use chrono::{DateTime, Utc};
use mlp_content::{
    Audience, ContentDigest, ContentFields, ContentKind, ContentUnit, ContentUnitId, FieldKey, Theme,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of organization roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Role {
    Employee,
    Leader,
    ProcessAdmin,
    OrgAdmin,
    /// Operations staff: organization analytics without authoring rights
    Drift,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Employee,
        Role::Leader,
        Role::ProcessAdmin,
        Role::OrgAdmin,
        Role::Drift,
    ];

    /// Parse a role claim from the identity provider; unknown claims map to
    /// [`Role::Employee`]
    #[must_use]
    pub fn from_claim(claim: &str) -> Self {
        match claim.trim().to_ascii_lowercase().as_str() {
            "leader" => Role::Leader,
            "process_admin" => Role::ProcessAdmin,
            "org_admin" => Role::OrgAdmin,
            "drift" => Role::Drift,
            "employee" => Role::Employee,
            other => {
                tracing::debug!(claim = other, "unknown role claim, using employee policy");
                Role::Employee
            }
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Leader => "leader",
            Role::ProcessAdmin => "process_admin",
            Role::OrgAdmin => "org_admin",
            Role::Drift => "drift",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from_claim(&value)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::from_claim(value)
    }
}

impl From<Role> for &'static str {
    fn from(value: Role) -> Self {
        value.as_str()
    }
}

/// Per-role section visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPolicy {
    pub leader_guidance: bool,
    pub authoring_metadata: bool,
}

/// Role-gated actions outside content display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Create, schedule, publish and override processes
    AdministerProcesses,
    /// Team-scoped analytics and insights
    ViewTeamInsights,
    /// Organization-wide analytics
    ViewOrganizationAnalytics,
}

/// Visibility policy for `role`
#[must_use]
pub const fn policy_for(role: Role) -> FieldPolicy {
    match role {
        Role::Employee | Role::Drift => FieldPolicy {
            leader_guidance: false,
            authoring_metadata: false,
        },
        Role::Leader => FieldPolicy {
            leader_guidance: true,
            authoring_metadata: false,
        },
        Role::ProcessAdmin | Role::OrgAdmin => FieldPolicy {
            leader_guidance: true,
            authoring_metadata: true,
        },
    }
}

/// True when `role` holds `capability`
#[must_use]
pub const fn permits(role: Role, capability: Capability) -> bool {
    match capability {
        Capability::AdministerProcesses => matches!(role, Role::ProcessAdmin | Role::OrgAdmin),
        Capability::ViewTeamInsights => !matches!(role, Role::Employee),
        Capability::ViewOrganizationAnalytics => matches!(role, Role::OrgAdmin | Role::Drift),
    }
}

/// Sections of `unit` that `role` may read
#[must_use]
pub fn visible_fields(role: Role, unit: &ContentUnit) -> ContentFields {
    let policy = policy_for(role);
    unit.fields.retain_keys(|key| match key.audience() {
        Audience::Everyone => true,
        Audience::Leaders => policy.leader_guidance,
        Audience::Authors => policy.authoring_metadata,
    })
}

/// Publication metadata shown to content administrators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoringMetadata {
    pub version: u32,
    pub digest: ContentDigest,
    pub published_at: DateTime<Utc>,
}

/// A unit as one role sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleUnit {
    pub id: ContentUnitId,
    pub week: u32,
    pub theme: Theme,
    pub kind: ContentKind,
    pub fields: ContentFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authoring: Option<AuthoringMetadata>,
}

/// Filter a whole unit for `role`
#[must_use]
pub fn view_unit(role: Role, unit: &ContentUnit) -> VisibleUnit {
    let authoring = policy_for(role).authoring_metadata.then(|| AuthoringMetadata {
        version: unit.version,
        digest: unit.digest,
        published_at: unit.published_at,
    });
    VisibleUnit {
        id: unit.id.clone(),
        week: unit.week,
        theme: unit.theme.clone(),
        kind: unit.kind,
        fields: visible_fields(role, unit),
        authoring,
    }
}

/// Sections of `unit` withheld from `role`
#[must_use]
pub fn hidden_keys(role: Role, unit: &ContentUnit) -> Vec<FieldKey> {
    let visible = visible_fields(role, unit);
    unit.fields.keys().filter(|k| !visible.contains(*k)).collect()
}

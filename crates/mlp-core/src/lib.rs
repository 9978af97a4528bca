//! MLP Core
//!
//! The microlearning process engine: teams move through a weekly sequence
//! of themes, members answer each week's content unit, and leaders and
//! operations staff read participation rollups.
//!
//! # Architecture
//!
//! ```text
//! Viewer -> Engine -> RoleGate (capabilities, field filtering)
//!                  -> ProcessTracker (weekly state machine)
//!                  -> ContentCatalog (versioned units)
//!                  -> ResponseLedger (one row per unit and user)
//!                  -> AnalyticsAggregator (incremental rollups)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use mlp_core::prelude::*;
//!
//! let engine = Engine::new(EngineConfig::default())?;
//! let admin = Viewer::new("admin", Role::OrgAdmin);
//! let team = engine.create_team(&admin, &"acme".into(), "Platform")?;
//! engine.add_member(&admin, &team.id, &"ada".into())?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod overview;
pub mod scheduler;
pub mod simulate;
pub mod teams;

pub use config::EngineConfig;
pub use engine::{CurrentUnit, Engine, PublishRequest, ReflectionEntry, SubmitReceipt};
pub use error::{ConfigError, EngineError};
pub use overview::{OrganizationOverview, ProcessProgress, ScheduleStatus, TeamStat};
pub use scheduler::{iso_week_tick, SchedulerReport, WeeklyScheduler};
pub use teams::{Team, TeamDirectory, Viewer};

/// Common imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::engine::{Engine, PublishRequest};
    pub use crate::error::EngineError;
    pub use crate::scheduler::WeeklyScheduler;
    pub use crate::teams::Viewer;
    pub use mlp_analytics::{Period, Scope};
    pub use mlp_content::{ContentFields, ContentKind, FieldKey, OrgId, TeamId, Theme, UserId};
    pub use mlp_kernel::{LockPolicy, ProcessSpec, ProcessStatus, Role, Tick};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

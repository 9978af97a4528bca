//! MLP Kernel
//!
//! Process progression core: the process state machine and its tracker, the
//! role gate that filters content per viewer, and the response ledger.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mlp_kernel::prelude::*;
//!
//! let tracker = Arc::new(ProcessTracker::new(processes, catalog.clone(), audit.clone()));
//! let process = tracker.create(ProcessSpec::new(team_id, "Feedback culture", themes, start))?;
//! tracker.start(&process.id)?;
//! tracker.advance_week(&process.id, Tick(1))?;
//!
//! let ledger = ResponseLedger::new(catalog, tracker.clone(), responses, audit);
//! ledger.submit(&unit_id, &user_id, "We agreed on a weekly check-in")?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod ledger;
pub mod logging;
pub mod process;
pub mod role_gate;
pub mod state_machine;
pub mod store;
pub mod sync;
pub mod tracker;

pub use error::*;
pub use ledger::{
    LedgerPolicy, LockPolicy, Response, ResponseKey, ResponseLedger, SubmitOutcome, Submission,
    DEFAULT_MAX_RESPONSE_CHARS,
};
pub use logging::{AuditEvent, AuditLog};
pub use process::{
    AdvanceOutcome, Process, ProcessAction, ProcessSpec, ProcessStatus, Tick, DEFAULT_TOTAL_WEEKS,
};
pub use role_gate::{Capability, FieldPolicy, Role, VisibleUnit};
pub use store::{InMemoryProcessStore, InMemoryResponseStore, ProcessStore, ResponseStore};
pub use tracker::{ProcessTracker, DEFAULT_MAX_WEEKS};

/// Common imports
pub mod prelude {
    pub use crate::ledger::{LedgerPolicy, LockPolicy, ResponseLedger, SubmitOutcome};
    pub use crate::process::{AdvanceOutcome, ProcessSpec, ProcessStatus, Tick};
    pub use crate::role_gate::{permits, view_unit, Capability, Role};
    pub use crate::store::{InMemoryProcessStore, InMemoryResponseStore};
    pub use crate::tracker::ProcessTracker;
    pub use crate::logging::AuditLog;
    pub use std::sync::Arc;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

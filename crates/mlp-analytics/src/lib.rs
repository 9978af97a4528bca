//! MLP Analytics
//!
//! Participation and engagement rollups derived from response writes.
//!
//! # Core Concepts
//!
//! - [`ResponseEvent`]: one ledger write, folded into per-(team, week) counters
//! - [`AggregateSnapshot`]: cached rollup for a [`Scope`] and [`Period`]
//! - [`AnalyticsAggregator`]: owns counters and the snapshot cache
//!
//! Participation is `responders / members`, clamped to `[0, 1]`. Engagement
//! blends participation with average response length using the weights in
//! [`AnalyticsConfig`].

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod aggregator;
mod config;
mod counters;
mod error;
mod score;
mod snapshot;

pub use aggregator::{AnalyticsAggregator, TeamTotals};
pub use config::AnalyticsConfig;
pub use counters::{ResponseChange, ResponseEvent, TeamTally, TrendPoint, TrendWindow, WeekCounter};
pub use error::AnalyticsError;
pub use score::{engagement_score, length_ratio, participation_rate, percent, rank_themes, ThemeStat};
pub use snapshot::{AggregateSnapshot, Period, Scope, Weights};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

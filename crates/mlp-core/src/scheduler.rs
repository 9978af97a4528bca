//! Weekly scheduler
//!
//! Meant to be driven by an external cron. The tick is derived from the ISO
//! week of the run date, so running twice in the same week is harmless: the
//! tracker ignores ticks it has already applied.

use crate::engine::Engine;
use chrono::{Datelike, NaiveDate};
use mlp_content::ProcessId;
use mlp_kernel::{AdvanceOutcome, ProcessStatus, Tick};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tick for the ISO week containing `date`, e.g. 2024-W07 -> 202407
#[must_use]
pub fn iso_week_tick(date: NaiveDate) -> Tick {
    let iso = date.iso_week();
    let year = u64::try_from(iso.year()).unwrap_or(0);
    Tick(year * 100 + u64::from(iso.week()))
}

/// What one scheduler run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerReport {
    pub tick: Option<Tick>,
    /// Planned processes whose start date arrived
    pub started: Vec<ProcessId>,
    pub advanced: Vec<(ProcessId, AdvanceOutcome)>,
    pub failed: Vec<(ProcessId, String)>,
}

impl SchedulerReport {
    /// Processes that actually moved this run
    #[must_use]
    pub fn changed(&self) -> usize {
        self.started.len() + self.advanced.iter().filter(|(_, o)| o.changed()).count()
    }
}

/// Starts due processes and advances active ones at most one week per run
#[derive(Debug, Clone)]
pub struct WeeklyScheduler {
    engine: Arc<Engine>,
}

impl WeeklyScheduler {
    #[must_use]
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Run for `today`
    ///
    /// Failures are collected per process; one bad process never stops the
    /// run.
    pub fn run(&self, today: NaiveDate) -> SchedulerReport {
        let tick = iso_week_tick(today);
        let mut report = SchedulerReport {
            tick: Some(tick),
            ..SchedulerReport::default()
        };

        for process in self.engine.tracker().list() {
            match process.status {
                ProcessStatus::Planned if process.start_date <= today => {
                    match self.engine.start_scheduled(&process.id) {
                        Ok(_) => report.started.push(process.id),
                        Err(err) => report.failed.push((process.id, err.to_string())),
                    }
                }
                ProcessStatus::Active if process.scheduled_week(today) > process.current_week => {
                    match self.engine.advance_scheduled(&process.id, tick) {
                        Ok(outcome) => report.advanced.push((process.id, outcome)),
                        Err(err) => report.failed.push((process.id, err.to_string())),
                    }
                }
                _ => {}
            }
        }

        for (process_id, err) in &report.failed {
            tracing::warn!(process_id = %process_id, error = %err, "scheduled transition failed");
        }
        tracing::info!(
            %tick,
            started = report.started.len(),
            advanced = report.advanced.len(),
            failed = report.failed.len(),
            "weekly scheduler run finished"
        );
        report
    }
}

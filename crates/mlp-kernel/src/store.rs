//! Storage seams
//!
//! The kernel talks to persistence only through these traits. The in-memory
//! implementations back tests and the simulator; a database adapter only has
//! to provide plain get/put, since the kernel does its own per-key locking.

use crate::ledger::{Response, ResponseKey};
use crate::process::Process;
use dashmap::DashMap;
use mlp_content::{ContentUnitId, ProcessId, TeamId, UserId};

/// Durable process collection
pub trait ProcessStore: Send + Sync {
    fn get(&self, id: &ProcessId) -> Option<Process>;
    fn put(&self, process: Process);
    fn list(&self) -> Vec<Process>;

    /// Processes of one team, oldest first
    fn for_team(&self, team_id: &TeamId) -> Vec<Process> {
        let mut processes: Vec<_> = self
            .list()
            .into_iter()
            .filter(|p| &p.team_id == team_id)
            .collect();
        processes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        processes
    }
}

/// Durable response collection, unique on (content unit, user)
pub trait ResponseStore: Send + Sync {
    fn get(&self, key: &ResponseKey) -> Option<Response>;
    fn put(&self, response: Response);
    fn for_user(&self, user_id: &UserId) -> Vec<Response>;
    fn for_unit(&self, unit_id: &ContentUnitId) -> Vec<Response>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProcessStore {
    processes: DashMap<ProcessId, Process>,
}

impl InMemoryProcessStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessStore for InMemoryProcessStore {
    fn get(&self, id: &ProcessId) -> Option<Process> {
        self.processes.get(id).map(|p| p.value().clone())
    }

    fn put(&self, process: Process) {
        self.processes.insert(process.id.clone(), process);
    }

    fn list(&self) -> Vec<Process> {
        self.processes.iter().map(|p| p.value().clone()).collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryResponseStore {
    responses: DashMap<ResponseKey, Response>,
}

impl InMemoryResponseStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseStore for InMemoryResponseStore {
    fn get(&self, key: &ResponseKey) -> Option<Response> {
        self.responses.get(key).map(|r| r.value().clone())
    }

    fn put(&self, response: Response) {
        self.responses.insert(response.key(), response);
    }

    fn for_user(&self, user_id: &UserId) -> Vec<Response> {
        self.responses
            .iter()
            .filter(|r| &r.key().user_id == user_id)
            .map(|r| r.value().clone())
            .collect()
    }

    fn for_unit(&self, unit_id: &ContentUnitId) -> Vec<Response> {
        self.responses
            .iter()
            .filter(|r| &r.key().content_unit_id == unit_id)
            .map(|r| r.value().clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.responses.len()
    }
}

//! Snapshot types handed to renderers.

use serde::Serialize;

use crate::stages::StageDef;
use crate::status::Status;
use crate::types::ElapsedSecs;

/// One stage of a running job and its current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub name: String,
    pub icon: String,
    pub status: Status,
}

impl Stage {
    /// A queued stage built from its registry entry.
    pub fn queued(def: &StageDef) -> Self {
        Self {
            name: def.name.to_string(),
            icon: def.icon.to_string(),
            status: Status::Queued,
        }
    }
}

/// Immutable snapshot of a job's progress.
///
/// Every emission is a fresh value; renderers can keep or diff them
/// freely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    /// 0..=99 while running, exactly 100 once the job completed.
    pub percentage: f64,
    pub stages: Vec<Stage>,
    pub elapsed_seconds: ElapsedSecs,
    /// Newest first, at most 50 entries.
    pub logs: Vec<String>,
    pub completed: bool,
    /// Full terminal payload of the `complete` event.
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ProgressView {
    /// Status of the stage called `name`, if it exists.
    pub fn stage_status(&self, name: &str) -> Option<Status> {
        self.stages.iter().find(|s| s.name == name).map(|s| s.status)
    }

    /// Whether the snapshot is final (completed or failed).
    pub fn is_terminal(&self) -> bool {
        self.completed || self.error.is_some()
    }
}

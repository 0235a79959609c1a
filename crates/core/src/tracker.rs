//! Progress state machine.
//!
//! [`ProgressTracker`] owns the per-session view state and advances it
//! through pure transitions: every accepted event or tick yields a new
//! [`ProgressView`] snapshot, rejected input yields nothing. It knows
//! nothing about timers or sockets; the caller supplies the elapsed time.

use serde_json::Value;

use crate::error::CoreError;
use crate::events::ProgressEvent;
use crate::log_trail::LogTrail;
use crate::stages::{validate_stages, JobKind, StageDef};
use crate::status::{classify, promote, Status};
use crate::types::ElapsedSecs;
use crate::view::{ProgressView, Stage};

/// Log line recorded when the stream reports `connected`.
pub const CONNECTED_LOG_LINE: &str = "Connected to research backend...";

/// Percentage ceiling while the job is still running. 100 is reserved for
/// the `complete` event.
pub const MAX_RUNNING_PERCENTAGE: f64 = 99.0;

/// Outcome of feeding one input to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Unknown, malformed or post-terminal input. Nothing to emit.
    Ignored,
    /// State changed; emit the snapshot and keep going.
    Updated(ProgressView),
    /// Terminal event processed; emit the snapshot, then stop the ticker
    /// and the transport.
    Finished(ProgressView),
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    stages: Vec<Stage>,
    logs: LogTrail,
    percentage: f64,
    elapsed: ElapsedSecs,
    completed: bool,
    result: Option<Value>,
    error: Option<String>,
}

impl ProgressTracker {
    /// Fresh tracker with every stage queued.
    ///
    /// Fails with [`CoreError::InvalidStages`] for an empty list or
    /// duplicate stage names.
    pub fn new(stages: &[StageDef]) -> Result<Self, CoreError> {
        validate_stages(stages)?;
        Ok(Self::with_stages(stages))
    }

    /// Tracker for one of the built-in registries.
    pub fn for_kind(kind: JobKind) -> Self {
        Self::with_stages(kind.stages())
    }

    fn with_stages(stages: &[StageDef]) -> Self {
        Self {
            stages: stages.iter().map(Stage::queued).collect(),
            logs: LogTrail::new(),
            percentage: 0.0,
            elapsed: 0,
            completed: false,
            result: None,
            error: None,
        }
    }

    /// Current snapshot.
    pub fn view(&self) -> ProgressView {
        ProgressView {
            percentage: self.percentage,
            stages: self.stages.clone(),
            elapsed_seconds: self.elapsed,
            logs: self.logs.to_vec(),
            completed: self.completed,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }

    /// Whether a `complete` or `error` event has been processed.
    pub fn is_terminal(&self) -> bool {
        self.completed || self.error.is_some()
    }

    /// Timer tick: only the elapsed time changes. Returns `None` once the
    /// session is terminal.
    pub fn tick(&mut self, elapsed: ElapsedSecs) -> Option<ProgressView> {
        if self.is_terminal() {
            return None;
        }
        self.set_elapsed(elapsed);
        Some(self.view())
    }

    /// Classify and apply a raw stream message.
    pub fn apply(&mut self, raw: &Value, elapsed: ElapsedSecs) -> Transition {
        match ProgressEvent::from_value(raw) {
            Some(event) => self.apply_event(event, elapsed),
            None => Transition::Ignored,
        }
    }

    /// Apply an already classified event.
    pub fn apply_event(&mut self, event: ProgressEvent, elapsed: ElapsedSecs) -> Transition {
        if self.is_terminal() {
            return Transition::Ignored;
        }
        self.set_elapsed(elapsed);

        match event {
            ProgressEvent::Connected => {
                self.logs.push(CONNECTED_LOG_LINE);
                Transition::Updated(self.view())
            }
            ProgressEvent::Progress { agent, message } => {
                if let Some(agent) = agent {
                    self.advance_stage(&agent, classify(&message));
                }
                self.logs.push(message);
                self.percentage = self.running_percentage();
                Transition::Updated(self.view())
            }
            ProgressEvent::Complete { payload } => {
                for stage in &mut self.stages {
                    stage.status = Status::Complete;
                }
                self.percentage = 100.0;
                self.completed = true;
                self.result = Some(payload);
                Transition::Finished(self.view())
            }
            ProgressEvent::Error { error } => {
                self.error = Some(error);
                Transition::Finished(self.view())
            }
        }
    }

    fn advance_stage(&mut self, name: &str, incoming: Option<Status>) {
        // Unknown stage names only contribute their log line.
        if let Some(stage) = self.stages.iter_mut().find(|s| s.name == name) {
            stage.status = promote(stage.status, incoming);
        }
    }

    /// Completed-stage share of the total, capped below 100.
    fn running_percentage(&self) -> f64 {
        if self.stages.is_empty() {
            return 0.0;
        }
        let done = self
            .stages
            .iter()
            .filter(|s| s.status == Status::Complete)
            .count();
        (100.0 * done as f64 / self.stages.len() as f64).min(MAX_RUNNING_PERCENTAGE)
    }

    fn set_elapsed(&mut self, elapsed: ElapsedSecs) {
        self.elapsed = self.elapsed.max(elapsed);
    }
}

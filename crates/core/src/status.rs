//! Stage status lattice and free-text status classification.
//!
//! [`promote`] decides whether an incoming status may overwrite a stage's
//! current one. [`classify`] infers a status from a progress message; it
//! is kept separate so a structured status field can replace it later
//! without touching the lattice.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution status of a single stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not started yet.
    #[default]
    Queued,
    /// Currently running.
    Active,
    /// A progress message reported a failure. Still superseded by `Complete`.
    Error,
    /// Finished. Never re-activated.
    Complete,
}

impl Status {
    /// Position in the lattice. `Active` and `Error` share a rank.
    pub fn rank(self) -> u8 {
        match self {
            Status::Queued => 0,
            Status::Active | Status::Error => 1,
            Status::Complete => 2,
        }
    }

    /// Lower-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Queued => "queued",
            Status::Active => "active",
            Status::Error => "error",
            Status::Complete => "complete",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge an incoming status into the current one without ever regressing.
pub fn promote(current: Status, incoming: Option<Status>) -> Status {
    let Some(incoming) = incoming else {
        return current;
    };

    if incoming.rank() < current.rank() {
        return current;
    }

    // Equal-rank moves between active and error are allowed, but a
    // finished stage is never pulled back to active.
    if current == Status::Complete && incoming == Status::Active {
        return current;
    }

    incoming
}

/// Infer a status from a free-text progress message.
///
/// Checks are ordered and the first match wins, so "Generating final
/// report" counts as active even though it mentions neither start nor
/// completion, and "Failed to complete" counts as an error.
pub fn classify(message: &str) -> Option<Status> {
    let lower = message.to_lowercase();

    if lower.contains("error") || lower.contains("failed") {
        return Some(Status::Error);
    }
    if lower.contains("started")
        || lower.contains("start")
        || lower.contains("generating final report")
    {
        return Some(Status::Active);
    }
    if lower.contains("completed") || lower.contains("complete") {
        return Some(Status::Complete);
    }
    None
}

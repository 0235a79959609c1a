//! Bounded newest-first log of progress messages.

use std::collections::VecDeque;

/// Maximum number of entries kept in a [`LogTrail`].
pub const LOG_TRAIL_CAPACITY: usize = 50;

/// Newest-first list of log lines, capped at [`LOG_TRAIL_CAPACITY`].
///
/// Pushing past the cap silently drops the oldest entry. Entries are
/// never reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogTrail {
    entries: VecDeque<String>,
}

impl LogTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` as the newest line.
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push_front(entry.into());
        self.entries.truncate(LOG_TRAIL_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent line, if any.
    pub fn newest(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    /// Newest-first copy for a snapshot.
    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

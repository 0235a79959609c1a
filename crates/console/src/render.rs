//! Plain-text rendering of progress snapshots.
//!
//! The ticker emits a snapshot every second even when nothing but the
//! clock moved, so [`LineRenderer`] only hands back a line when the
//! rendered text actually differs from the previous one.

use serde_json::Value;

use analyst_core::status::Status;
use analyst_core::view::ProgressView;

pub const BAR_WIDTH: usize = 20;

/// `m:ss`, with minutes unbounded.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Fixed-width bar such as `[########------------]`.
pub fn progress_bar(percentage: f64, width: usize) -> String {
    let fraction = (percentage / 100.0).clamp(0.0, 1.0);
    let filled = ((fraction * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

pub fn status_marker(status: Status) -> char {
    match status {
        Status::Queued => '.',
        Status::Active => '>',
        Status::Error => '!',
        Status::Complete => '+',
    }
}

/// One status line for a snapshot.
pub fn render_line(view: &ProgressView) -> String {
    let stages = view
        .stages
        .iter()
        .map(|s| format!("{}{}", status_marker(s.status), s.name))
        .collect::<Vec<_>>()
        .join(" ");

    let mut line = format!(
        "{} {:>3.0}% {:>6}  {}",
        progress_bar(view.percentage, BAR_WIDTH),
        view.percentage,
        format_elapsed(view.elapsed_seconds),
        stages,
    );
    if let Some(newest) = view.logs.first() {
        line.push_str("  | ");
        line.push_str(newest);
    }
    line
}

/// Suppresses repeated lines.
#[derive(Debug, Default)]
pub struct LineRenderer {
    last: Option<String>,
}

impl LineRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The line for `view`, or `None` if it equals the previous one.
    pub fn next(&mut self, view: &ProgressView) -> Option<String> {
        let line = render_line(view);
        if self.last.as_deref() == Some(line.as_str()) {
            return None;
        }
        self.last = Some(line.clone());
        Some(line)
    }
}

/// Final message for a terminal snapshot, `None` while still running.
pub fn summary(view: &ProgressView) -> Option<String> {
    if let Some(error) = &view.error {
        return Some(format!(
            "Research failed after {}: {error}",
            format_elapsed(view.elapsed_seconds)
        ));
    }
    if view.completed {
        return Some(format!(
            "Research complete in {}",
            format_elapsed(view.elapsed_seconds)
        ));
    }
    None
}

/// The markdown report carried by a `complete` payload, if any.
pub fn report_text(result: &Value) -> Option<&str> {
    result.get("report").and_then(Value::as_str)
}

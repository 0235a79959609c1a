/// Opaque session identifier issued by the job-submission endpoint.
pub type SessionId = String;

/// Whole seconds elapsed since a session's aggregator started.
pub type ElapsedSecs = u64;

//! Progress stream event types.
//!
//! The backend pushes JSON objects with a `type` discriminator. The
//! transport forwards them as raw [`serde_json::Value`]s; the tracker
//! turns them into a [`ProgressEvent`] with [`ProgressEvent::from_value`].
//! Anything that does not decode is ignored.

use serde_json::Value;

/// The stream is open and the backend is attached to the session.
pub const MSG_TYPE_CONNECTED: &str = "connected";

/// A stage reported progress (`agent` + free-text `message`).
pub const MSG_TYPE_PROGRESS: &str = "progress";

/// The job finished; the whole message is the result payload.
pub const MSG_TYPE_COMPLETE: &str = "complete";

/// The job failed, or the stream was lost.
pub const MSG_TYPE_ERROR: &str = "error";

/// Error text of the event synthesized when the stream dies without a
/// terminal message.
pub const CONNECTION_LOST: &str = "Connection lost";

/// Fallback error text when an `error` event carries no usable string.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Read the `type` discriminator of a raw message, if it is a string.
pub fn message_type(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

/// Whether a raw message ends the session (`complete` or `error`).
pub fn is_terminal(value: &Value) -> bool {
    matches!(message_type(value), Some(MSG_TYPE_COMPLETE | MSG_TYPE_ERROR))
}

/// The error event a transport forwards when the connection is gone for good.
pub fn connection_lost() -> Value {
    serde_json::json!({
        "type": MSG_TYPE_ERROR,
        "error": CONNECTION_LOST,
    })
}

/// A classified inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Connected,
    Progress {
        /// Stage name, when the message is attributed to one.
        agent: Option<String>,
        message: String,
    },
    Complete {
        /// The full terminal message, passed through untouched.
        payload: Value,
    },
    Error {
        error: String,
    },
}

impl ProgressEvent {
    /// Classify a raw message. Returns `None` for unknown or missing types.
    ///
    /// Lenient about field shapes: a non-string `message` becomes empty,
    /// a non-string `agent` is treated as absent and a missing `error`
    /// becomes [`UNKNOWN_ERROR`].
    pub fn from_value(value: &Value) -> Option<Self> {
        match message_type(value)? {
            MSG_TYPE_CONNECTED => Some(ProgressEvent::Connected),
            MSG_TYPE_PROGRESS => Some(ProgressEvent::Progress {
                agent: value
                    .get("agent")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            MSG_TYPE_COMPLETE => Some(ProgressEvent::Complete {
                payload: value.clone(),
            }),
            MSG_TYPE_ERROR => Some(ProgressEvent::Error {
                error: value
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or(UNKNOWN_ERROR)
                    .to_string(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_connected() {
        assert_eq!(
            ProgressEvent::from_value(&json!({"type": "connected"})),
            Some(ProgressEvent::Connected)
        );
    }

    #[test]
    fn decode_progress_with_agent() {
        let event = ProgressEvent::from_value(&json!({
            "type": "progress",
            "agent": "Risk Analyst",
            "message": "Risk Analyst started",
        }));
        assert_matches!(
            event,
            Some(ProgressEvent::Progress { agent: Some(a), message }) if a == "Risk Analyst" && message == "Risk Analyst started"
        );
    }

    #[test]
    fn decode_progress_defaults() {
        let event = ProgressEvent::from_value(&json!({"type": "progress", "agent": 7, "message": null}));
        assert_eq!(
            event,
            Some(ProgressEvent::Progress {
                agent: None,
                message: String::new(),
            })
        );
    }

    #[test]
    fn decode_complete_keeps_payload() {
        let raw = json!({"type": "complete", "report": "# AAPL", "sections": {"a": 1}});
        assert_matches!(
            ProgressEvent::from_value(&raw),
            Some(ProgressEvent::Complete { payload }) if payload == raw
        );
    }

    #[test]
    fn decode_error_with_and_without_text() {
        assert_eq!(
            ProgressEvent::from_value(&json!({"type": "error", "error": "boom"})),
            Some(ProgressEvent::Error { error: "boom".into() })
        );
        assert_eq!(
            ProgressEvent::from_value(&json!({"type": "error"})),
            Some(ProgressEvent::Error { error: UNKNOWN_ERROR.into() })
        );
    }

    #[test]
    fn unknown_or_missing_type_is_ignored() {
        assert_eq!(ProgressEvent::from_value(&json!({"type": "heartbeat"})), None);
        assert_eq!(ProgressEvent::from_value(&json!({"message": "hi"})), None);
        assert_eq!(ProgressEvent::from_value(&json!({"type": 3})), None);
        assert_eq!(ProgressEvent::from_value(&json!([1, 2])), None);
    }

    #[test]
    fn terminal_detection() {
        assert!(is_terminal(&json!({"type": "complete"})));
        assert!(is_terminal(&connection_lost()));
        assert!(!is_terminal(&json!({"type": "progress"})));
        assert!(!is_terminal(&json!("complete")));
    }
}

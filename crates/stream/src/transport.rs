//! Event stream transport loop.
//!
//! Reads a `text/event-stream` response, decodes each `message` event
//! as JSON and hands it to the caller's callback. A dropped connection
//! is re-opened with backoff; only a terminal failure (bad status, wrong
//! content type, attempts exhausted) produces the synthesized
//! `Connection lost` error. Closing the handle ends everything silently.

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Url;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use analyst_core::events::{connection_lost, is_terminal};

use crate::reconnect::{Backoff, ReconnectConfig};
use crate::sse::{SseDecoder, SseEvent, DEFAULT_EVENT_TYPE};

const EVENT_STREAM_MIME: &str = "text/event-stream";
const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Handle to a running progress stream.
///
/// [`close`](Self::close) is idempotent and safe after the stream ended
/// on its own. Dropping the handle closes the stream.
#[derive(Debug)]
pub struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether the stream was closed or has finished on its own.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.task.is_finished()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Errors that end one connection attempt.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The configured URL cannot address a progress stream.
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),

    /// Network-level failure while connecting or reading.
    #[error("Stream request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("Stream endpoint returned HTTP {0}")]
    Status(u16),

    /// The backend answered with something other than an event stream.
    #[error("Unexpected content type: {0:?}")]
    ContentType(String),

    /// The server closed the response body.
    #[error("Stream ended by server")]
    Ended,
}

impl StreamError {
    /// Whether a reconnect may fix this, as opposed to a hard failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, StreamError::Request(_) | StreamError::Ended)
    }
}

/// How one connection attempt ended.
enum Attempt {
    /// A `complete` or `error` message was forwarded.
    Terminal,
    /// The connection went away. `opened` is true if a valid event
    /// stream response was received first.
    Dropped { opened: bool, error: StreamError },
    /// Hard failure; do not reconnect.
    Failed(StreamError),
}

pub(crate) fn spawn<F>(
    http: reqwest::Client,
    url: Result<Url, StreamError>,
    reconnect: ReconnectConfig,
    on_event: F,
    cancel: CancellationToken,
) -> StreamHandle
where
    F: FnMut(Value) + Send + 'static,
{
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        run(http, url, reconnect, on_event, task_cancel).await;
    });
    StreamHandle { cancel, task }
}

async fn run<F>(
    http: reqwest::Client,
    url: Result<Url, StreamError>,
    reconnect: ReconnectConfig,
    mut on_event: F,
    cancel: CancellationToken,
) where
    F: FnMut(Value),
{
    let url = match url {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, "Cannot open progress stream");
            on_event(connection_lost());
            cancel.cancel();
            return;
        }
    };

    let mut decoder = SseDecoder::new();
    let mut backoff = Backoff::new(reconnect);

    loop {
        let attempt = tokio::select! {
            _ = cancel.cancelled() => return,
            attempt = read_stream(&http, &url, &mut decoder, &mut on_event) => attempt,
        };

        let wait = match attempt {
            Attempt::Terminal => {
                tracing::debug!(path = url.path(), "Progress stream finished");
                cancel.cancel();
                return;
            }
            Attempt::Failed(e) => {
                tracing::warn!(path = url.path(), error = %e, "Progress stream failed");
                on_event(connection_lost());
                cancel.cancel();
                return;
            }
            Attempt::Dropped { opened, error } => {
                if opened {
                    backoff.reset(decoder.retry());
                }
                let Some(wait) = backoff.next_wait() else {
                    tracing::warn!(
                        path = url.path(),
                        error = %error,
                        attempts = backoff.attempts(),
                        "Progress stream lost, giving up",
                    );
                    on_event(connection_lost());
                    cancel.cancel();
                    return;
                };
                tracing::info!(
                    path = url.path(),
                    error = %error,
                    attempt = backoff.attempts(),
                    delay_ms = wait.as_millis() as u64,
                    "Progress stream dropped, reconnecting",
                );
                wait
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

/// One connection attempt: open, then forward events until the body
/// ends, a read fails, or a terminal message goes through.
async fn read_stream<F>(
    http: &reqwest::Client,
    url: &Url,
    decoder: &mut SseDecoder,
    on_event: &mut F,
) -> Attempt
where
    F: FnMut(Value),
{
    let mut request = http
        .get(url.clone())
        .header(ACCEPT, EVENT_STREAM_MIME)
        .header(CACHE_CONTROL, "no-cache");
    if let Some(id) = decoder.last_event_id() {
        request = request.header(LAST_EVENT_ID_HEADER, id);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            return Attempt::Dropped {
                opened: false,
                error: e.into(),
            }
        }
    };

    if let Err(e) = check_response(&response) {
        return Attempt::Failed(e);
    }

    tracing::info!(path = url.path(), "Progress stream opened");
    decoder.reset_frame();

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                return Attempt::Dropped {
                    opened: true,
                    error: e.into(),
                }
            }
        };
        for event in decoder.push(&chunk) {
            if forward(event, on_event) {
                return Attempt::Terminal;
            }
        }
    }

    Attempt::Dropped {
        opened: true,
        error: StreamError::Ended,
    }
}

/// Only a 2xx `text/event-stream` response counts as an open stream.
fn check_response(response: &reqwest::Response) -> Result<(), StreamError> {
    let status = response.status();
    if !status.is_success() {
        return Err(StreamError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type
        .to_ascii_lowercase()
        .starts_with(EVENT_STREAM_MIME)
    {
        return Err(StreamError::ContentType(content_type.to_string()));
    }
    Ok(())
}

/// Decode and forward one event. Returns `true` if it was terminal.
fn forward<F>(event: SseEvent, on_event: &mut F) -> bool
where
    F: FnMut(Value),
{
    if event.event != DEFAULT_EVENT_TYPE {
        tracing::debug!(event = %event.event, "Ignoring named stream event");
        return false;
    }

    match serde_json::from_str::<Value>(&event.data) {
        Ok(value) => {
            let terminal = is_terminal(&value);
            on_event(value);
            terminal
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                raw_message = %event.data,
                "Dropping malformed progress message",
            );
            false
        }
    }
}

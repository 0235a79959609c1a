//! Progress stream client for a research backend.
//!
//! [`StreamClient`] holds the connection configuration for one backend.
//! Call [`StreamClient::open`] to attach to a session's event stream.

use reqwest::Url;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::StreamConfig;
use crate::reconnect::ReconnectConfig;
use crate::transport::{self, StreamError, StreamHandle};

/// Path segments of the per-session progress endpoint.
const PROGRESS_PATH: [&str; 2] = ["research", "progress"];

/// Query parameter carrying the bearer credential. Event streams cannot
/// send custom headers.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Configuration handle for a research backend's progress streams.
#[derive(Debug, Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    base_url: String,
    reconnect: ReconnectConfig,
}

impl StreamClient {
    pub fn new(config: &StreamConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(http: reqwest::Client, config: &StreamConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            reconnect: config.reconnect.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build `{base}/research/progress/{session_id}[?token=...]`.
    pub fn progress_url(
        &self,
        session_id: &str,
        credential: Option<&str>,
    ) -> Result<Url, StreamError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StreamError::InvalidUrl(format!("{}: {e}", self.base_url)))?;

        url.path_segments_mut()
            .map_err(|_| StreamError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(PROGRESS_PATH)
            .push(session_id);

        if let Some(token) = credential {
            url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, token);
        }
        Ok(url)
    }

    /// Open the progress stream of `session_id`.
    ///
    /// `on_event` receives every decoded JSON message, including the
    /// terminal `complete`/`error` one after which the stream closes
    /// itself. Must be called from within a Tokio runtime.
    pub fn open<F>(&self, session_id: &str, credential: Option<&str>, on_event: F) -> StreamHandle
    where
        F: FnMut(Value) + Send + 'static,
    {
        self.open_scoped(session_id, credential, on_event, &CancellationToken::new())
    }

    /// Like [`open`](Self::open), but the stream also closes when `parent`
    /// is cancelled.
    pub fn open_scoped<F>(
        &self,
        session_id: &str,
        credential: Option<&str>,
        on_event: F,
        parent: &CancellationToken,
    ) -> StreamHandle
    where
        F: FnMut(Value) + Send + 'static,
    {
        let url = self.progress_url(session_id, credential);
        transport::spawn(
            self.http.clone(),
            url,
            self.reconnect.clone(),
            on_event,
            parent.child_token(),
        )
    }
}

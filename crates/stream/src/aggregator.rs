//! Per-session progress aggregator.
//!
//! [`ProgressAggregator`] owns one session's [`ProgressTracker`], a
//! one-second ticker and the session's progress stream. A single task
//! `select!`s between the ticker and the stream's events, so the two
//! sources interleave freely but never race: a tick only ever touches the
//! elapsed time. Every state change is pushed to a [`ViewSink`] as a
//! fresh [`ProgressView`].

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use analyst_core::error::CoreError;
use analyst_core::stages::{JobKind, StageDef};
use analyst_core::tracker::{ProgressTracker, Transition};
use analyst_core::types::{ElapsedSecs, SessionId};
use analyst_core::view::ProgressView;

use crate::client::StreamClient;
use crate::transport::StreamHandle;

/// Period of the elapsed-time ticker.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Receiver of progress snapshots.
///
/// Implemented for any `FnMut(ProgressView)` closure, so a channel
/// sender can be adapted with `move |view| { let _ = tx.send(view); }`.
pub trait ViewSink: Send + 'static {
    fn emit(&mut self, view: ProgressView);
}

impl<F> ViewSink for F
where
    F: FnMut(ProgressView) + Send + 'static,
{
    fn emit(&mut self, view: ProgressView) {
        (self)(view)
    }
}

/// Live aggregation of one session's progress stream.
///
/// Dropping the aggregator disposes it.
#[derive(Debug)]
pub struct ProgressAggregator {
    session_id: SessionId,
    cancel: CancellationToken,
    done: CancellationToken,
}

impl ProgressAggregator {
    /// Start tracking `session_id` with the stages of `kind`.
    ///
    /// The initial all-queued snapshot reaches `sink` before this returns
    /// and before the stream is opened. Must be called from within a
    /// Tokio runtime.
    pub fn start<S: ViewSink>(
        client: &StreamClient,
        kind: JobKind,
        session_id: impl Into<SessionId>,
        credential: Option<&str>,
        sink: S,
    ) -> Self {
        let tracker = ProgressTracker::for_kind(kind);
        Self::open(client, tracker, session_id.into(), credential, sink)
    }

    /// Like [`start`](Self::start) with an explicit stage list.
    ///
    /// Fails with [`CoreError::InvalidStages`] for an empty list or
    /// duplicate names; nothing is emitted or opened in that case.
    pub fn start_with_stages<S: ViewSink>(
        client: &StreamClient,
        stages: &[StageDef],
        session_id: impl Into<SessionId>,
        credential: Option<&str>,
        sink: S,
    ) -> Result<Self, CoreError> {
        let tracker = ProgressTracker::new(stages)?;
        Ok(Self::open(client, tracker, session_id.into(), credential, sink))
    }

    /// Drive an aggregator from an arbitrary source of raw messages
    /// instead of a network stream. The session ends when the sender
    /// side is dropped.
    pub fn attach<S: ViewSink>(
        stages: &[StageDef],
        session_id: impl Into<SessionId>,
        events: mpsc::UnboundedReceiver<Value>,
        mut sink: S,
    ) -> Result<Self, CoreError> {
        let tracker = ProgressTracker::new(stages)?;
        let started = Instant::now();
        sink.emit(tracker.view());
        Ok(Self::spawn(
            session_id.into(),
            tracker,
            started,
            events,
            None,
            sink,
            CancellationToken::new(),
        ))
    }

    fn open<S: ViewSink>(
        client: &StreamClient,
        tracker: ProgressTracker,
        session_id: SessionId,
        credential: Option<&str>,
        mut sink: S,
    ) -> Self {
        let started = Instant::now();
        sink.emit(tracker.view());

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = client.open_scoped(
            &session_id,
            credential,
            move |event| {
                // The session task may already be gone; late events are moot.
                let _ = tx.send(event);
            },
            &cancel,
        );

        Self::spawn(session_id, tracker, started, rx, Some(stream), sink, cancel)
    }

    fn spawn<S: ViewSink>(
        session_id: SessionId,
        tracker: ProgressTracker,
        started: Instant,
        events: mpsc::UnboundedReceiver<Value>,
        stream: Option<StreamHandle>,
        sink: S,
        cancel: CancellationToken,
    ) -> Self {
        let done = CancellationToken::new();
        let span = tracing::info_span!("progress_session", session_id = %session_id);

        tokio::spawn(
            run_session(tracker, started, events, stream, sink, cancel.clone(), done.clone())
                .instrument(span),
        );

        Self {
            session_id,
            cancel,
            done,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stop the ticker and close the stream. Idempotent, valid in any
    /// state.
    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    /// Whether the session task has stopped.
    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Resolves once the session task has stopped: after a terminal
    /// event, after the event source closed, or after [`dispose`](Self::dispose).
    pub async fn finished(&self) {
        self.done.cancelled().await
    }
}

impl Drop for ProgressAggregator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_session<S: ViewSink>(
    mut tracker: ProgressTracker,
    started: Instant,
    mut events: mpsc::UnboundedReceiver<Value>,
    stream: Option<StreamHandle>,
    mut sink: S,
    cancel: CancellationToken,
    done: CancellationToken,
) {
    let _done = done.drop_guard();
    let mut ticker = tokio::time::interval_at(started + TICK_INTERVAL, TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Tracking progress");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::debug!("Session disposed");
                break;
            }

            event = events.recv() => {
                let Some(raw) = event else {
                    tracing::debug!("Event source closed");
                    break;
                };
                match tracker.apply(&raw, elapsed_secs(started)) {
                    Transition::Ignored => {
                        tracing::debug!(raw_message = %raw, "Ignoring unrecognised progress message");
                    }
                    Transition::Updated(view) => {
                        tracing::debug!(percentage = view.percentage, "Progress updated");
                        sink.emit(view);
                    }
                    Transition::Finished(view) => {
                        if let Some(error) = &view.error {
                            tracing::warn!(error = %error, "Research failed");
                        } else {
                            tracing::info!(elapsed_seconds = view.elapsed_seconds, "Research complete");
                        }
                        sink.emit(view);
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                if let Some(view) = tracker.tick(elapsed_secs(started)) {
                    sink.emit(view);
                }
            }
        }
    }

    if let Some(stream) = stream {
        stream.close();
    }
}

fn elapsed_secs(started: Instant) -> ElapsedSecs {
    started.elapsed().as_secs()
}

//! Research backend client library.
//!
//! Provides the job-submission REST client, a server-sent-events
//! transport for per-session progress streams (with protocol-level
//! reconnection), and [`ProgressAggregator`](aggregator::ProgressAggregator),
//! which folds a stream into [`ProgressView`](analyst_core::view::ProgressView)
//! snapshots on a one-second ticker.

pub mod aggregator;
pub mod api;
pub mod client;
pub mod config;
pub mod reconnect;
pub mod sse;
pub mod transport;

//! Pure domain logic for tracking research job progress.
//!
//! Everything in this crate is synchronous and free of I/O: the stage
//! registry, the status lattice, inbound event decoding and the
//! [`ProgressTracker`](tracker::ProgressTracker) state machine that
//! produces [`ProgressView`](view::ProgressView) snapshots.

pub mod error;
pub mod events;
pub mod log_trail;
pub mod stages;
pub mod status;
pub mod tracker;
pub mod types;
pub mod view;

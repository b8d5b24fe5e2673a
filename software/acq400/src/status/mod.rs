//! Acquisition state tracking.
//!
//! A [`StatusPoller`] thread owns the telemetry link, keeps the latest
//! [`StatusVector`](acq400_shared::StatusVector) in a [`StatusCell`], and
//! raises [`TransitionSignal`]s that callers block on through a
//! [`StateSynchronizer`]. A [`CancelToken`] shared by all of them ends the
//! session when the appliance misbehaves or the handle shuts down.

mod cancel;
mod cell;
mod poller;
mod signal;
mod synchronizer;
mod tracker;

pub use cancel::{CancelReason, CancelToken};
pub use cell::StatusCell;
pub use poller::{PollerConfig, StatusPoller, StatusPollerHandle};
pub use signal::{Transition, TransitionSignal};
pub use synchronizer::StateSynchronizer;
pub use tracker::{StatusTracker, TrackerOutcome};

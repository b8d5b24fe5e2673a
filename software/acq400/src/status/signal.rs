//! Edge signals between the status poller and waiting callers.

use std::fmt;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};

/// The transitions a caller can wait for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The appliance reported the armed phase
    Armed,
    /// The appliance went from an active phase back to idle
    Stopped,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Armed => write!(f, "armed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// A flag with at most one pending occurrence.
///
/// Backed by a one-slot channel: raising a pending signal is a no-op,
/// so occurrences collapse, and each consume releases exactly one waiter.
#[derive(Clone, Debug)]
pub struct TransitionSignal {
    transition: Transition,
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl TransitionSignal {
    pub fn new(transition: Transition) -> Self {
        let (tx, rx) = bounded(1);
        Self { transition, tx, rx }
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    /// Raise the signal. Returns `false` if it was already pending.
    pub fn raise(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }

    pub fn is_pending(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Consume a pending occurrence without blocking.
    pub fn try_consume(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// Block for up to `timeout` and consume an occurrence if one arrives.
    pub fn consume_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => true,
            // Both ends live in this struct, so disconnection cannot happen
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

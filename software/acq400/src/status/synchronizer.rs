//! Blocking waits on acquisition transitions.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{CancelToken, Transition, TransitionSignal};
use crate::{Acq400Error, Result};

/// Blocking wait interface over the armed and stopped signals.
///
/// Each wait sleeps on its signal for at most one `tick` at a time and checks
/// the cancel token between ticks, so a cancelled handle is noticed within
/// one tick.
#[derive(Clone, Debug)]
pub struct StateSynchronizer {
    armed: TransitionSignal,
    stopped: TransitionSignal,
    cancel: CancelToken,
    tick: Duration,
}

impl StateSynchronizer {
    pub fn new(cancel: CancelToken, tick: Duration) -> Self {
        Self {
            armed: TransitionSignal::new(Transition::Armed),
            stopped: TransitionSignal::new(Transition::Stopped),
            cancel,
            tick,
        }
    }

    /// The signal raised for a transition, for the poller side.
    pub fn signal(&self, transition: Transition) -> &TransitionSignal {
        match transition {
            Transition::Armed => &self.armed,
            Transition::Stopped => &self.stopped,
        }
    }

    /// Block until the appliance is armed.
    pub fn wait_armed(&self) -> Result<()> {
        self.wait(&self.armed, None).map(|_| ())
    }

    /// Block until a capture has stopped.
    pub fn wait_stopped(&self) -> Result<()> {
        self.wait(&self.stopped, None).map(|_| ())
    }

    /// Like [`Self::wait_armed`], giving up after `timeout` with `Ok(false)`.
    pub fn wait_armed_timeout(&self, timeout: Duration) -> Result<bool> {
        self.wait(&self.armed, Some(Instant::now() + timeout))
    }

    /// Like [`Self::wait_stopped`], giving up after `timeout` with `Ok(false)`.
    pub fn wait_stopped_timeout(&self, timeout: Duration) -> Result<bool> {
        self.wait(&self.stopped, Some(Instant::now() + timeout))
    }

    fn wait(&self, signal: &TransitionSignal, deadline: Option<Instant>) -> Result<bool> {
        debug!("Waiting for {}", signal.transition());
        loop {
            let tick = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Ok(false);
                    }
                    left.min(self.tick)
                }
                None => self.tick,
            };

            if signal.consume_timeout(tick) {
                debug!("Consumed {}", signal.transition());
                return Ok(true);
            }

            if let Some(reason) = self.cancel.reason() {
                warn!("Abandoning wait for {}: {reason}", signal.transition());
                return Err(Acq400Error::Cancelled(reason));
            }
        }
    }
}

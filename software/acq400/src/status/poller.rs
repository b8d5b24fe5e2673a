//! Background thread that follows the telemetry stream.

use std::io::{BufRead, BufReader, ErrorKind};
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, trace, warn};

use acq400_shared::StatusVector;

use super::{
    CancelReason, CancelToken, StateSynchronizer, StatusCell, StatusTracker, Transition,
    TrackerOutcome,
};
use crate::context::DeviceCtx;
use crate::socket::{is_idle, Connector, Link};
use crate::Result;

/// Telemetry link settings for a poller.
#[derive(Clone, Debug)]
pub struct PollerConfig {
    pub port: u16,
    pub read_timeout: Duration,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl From<&DeviceCtx> for PollerConfig {
    fn from(ctx: &DeviceCtx) -> Self {
        Self {
            port: ctx.ports.telemetry,
            read_timeout: ctx.telemetry_read_timeout(),
            reconnect_attempts: ctx.telemetry_reconnect_attempts,
            reconnect_delay: ctx.telemetry_reconnect_delay(),
        }
    }
}

/// Join handle for a running status poller.
pub struct StatusPollerHandle {
    cancel: CancelToken,
    join: Option<JoinHandle<()>>,
}

impl StatusPollerHandle {
    /// Check if the thread is still running.
    pub fn is_running(&self) -> bool {
        self.join
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Cancel with `Shutdown` (unless already cancelled) and wait for the
    /// thread to exit. The thread notices within one telemetry read timeout.
    pub fn stop(&mut self) -> Result<()> {
        self.cancel.cancel(CancelReason::Shutdown);
        match self.join.take() {
            Some(h) => h.join().map_err(|_| {
                crate::Acq400Error::Config("status poller thread panicked".to_string())
            }),
            None => Ok(()),
        }
    }
}

impl Drop for StatusPollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel(CancelReason::Shutdown);
    }
}

/// Owns the telemetry link and turns records into status updates and signals.
pub struct StatusPoller {
    host: String,
    connector: Arc<dyn Connector>,
    config: PollerConfig,
    link: BufReader<Box<dyn Link>>,
    tracker: StatusTracker,
    cell: StatusCell,
    sync: StateSynchronizer,
    cancel: CancelToken,
}

impl StatusPoller {
    /// Connect to the telemetry service and start following it on a new
    /// thread. Failing to connect is reported here, on the caller's thread.
    pub fn spawn(
        connector: Arc<dyn Connector>,
        config: PollerConfig,
        seed: StatusVector,
        cell: StatusCell,
        sync: StateSynchronizer,
        cancel: CancelToken,
    ) -> Result<StatusPollerHandle> {
        let link = connector.connect(config.port, Some(config.read_timeout))?;
        let host = connector.host().to_owned();
        let poller = Self {
            host: host.clone(),
            connector,
            config,
            link: BufReader::new(link),
            tracker: StatusTracker::new(seed),
            cell,
            sync,
            cancel: cancel.clone(),
        };

        let join = Builder::new()
            .name(format!("acq400-status-{host}"))
            .spawn(move || poller.run())?;

        Ok(StatusPollerHandle {
            cancel,
            join: Some(join),
        })
    }

    /// Follow telemetry until cancelled, faulted, or the link is lost.
    fn run(mut self) {
        info!("{}: status monitor running", self.host);
        let mut raw = Vec::new();
        let mut attempts_left = self.config.reconnect_attempts;

        while !self.cancel.is_cancelled() {
            match self.link.read_until(b'\n', &mut raw) {
                Ok(0) => {
                    if !self.reconnect(&mut attempts_left, "telemetry closed by appliance") {
                        break;
                    }
                    raw.clear();
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&raw).into_owned();
                    raw.clear();
                    match self.process(&line) {
                        Some(true) => attempts_left = self.config.reconnect_attempts,
                        Some(false) => break,
                        None => {}
                    }
                }
                // Partial lines stay in `raw` until the rest arrives
                Err(e) if is_idle(&e) || e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    if !self.reconnect(&mut attempts_left, &e.to_string()) {
                        break;
                    }
                    raw.clear();
                }
            }
        }

        info!("{}: status monitor exiting", self.host);
    }

    /// Handle one line. Returns `None` for noise, `Some(true)` for an
    /// accepted record, and `Some(false)` when the loop must stop.
    fn process(&mut self, line: &str) -> Option<bool> {
        let outcome = match self.tracker.apply_line(line) {
            Some(outcome) => outcome,
            None => {
                trace!("{}: ignoring telemetry `{}`", self.host, line.trim_end());
                return None;
            }
        };

        match outcome {
            TrackerOutcome::Updated {
                status,
                armed,
                stopped,
            } => {
                trace!("{}: status {status}", self.host);
                // Publish before signalling so a released waiter reads this record
                self.cell.store(status);
                if stopped {
                    info!("{} STOPPED", self.host);
                    self.sync.signal(Transition::Stopped).raise();
                }
                if armed {
                    info!("{} ARMED", self.host);
                    self.sync.signal(Transition::Armed).raise();
                }
                Some(true)
            }
            TrackerOutcome::Fault { from, to } => {
                error!("{}: skipped ARM {from} -> {to}", self.host);
                self.cancel
                    .cancel(CancelReason::SequencingFault { from, to });
                Some(false)
            }
            TrackerOutcome::Halted => Some(false),
        }
    }

    /// Try to re-establish the telemetry link, or cancel the handle
    /// if the budget is spent. Returns whether to keep running.
    fn reconnect(&mut self, attempts_left: &mut u32, why: &str) -> bool {
        while *attempts_left > 0 {
            *attempts_left -= 1;
            warn!(
                "{}: telemetry link lost ({why}); reconnecting, {} attempt(s) left after this",
                self.host, attempts_left
            );

            // Sleep in short steps so shutdown is not held up by the delay
            let until = Instant::now() + self.config.reconnect_delay;
            while Instant::now() < until {
                if self.cancel.is_cancelled() {
                    return false;
                }
                std::thread::sleep(
                    until
                        .saturating_duration_since(Instant::now())
                        .min(Duration::from_millis(10)),
                );
            }

            match self
                .connector
                .connect(self.config.port, Some(self.config.read_timeout))
            {
                Ok(link) => {
                    info!("{}: telemetry link re-established", self.host);
                    self.link = BufReader::new(link);
                    return true;
                }
                Err(e) => warn!("{}: reconnect failed: {e}", self.host),
            }
        }

        if self.cancel.cancel(CancelReason::TelemetryLost(why.to_owned())) {
            error!("{}: telemetry link lost: {why}", self.host);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::MockupConnector;

    const PORT: u16 = 2235;

    fn config(reconnect_attempts: u32) -> PollerConfig {
        PollerConfig {
            port: PORT,
            read_timeout: Duration::from_millis(10),
            reconnect_attempts,
            reconnect_delay: Duration::from_millis(5),
        }
    }

    struct Rig {
        handle: StatusPollerHandle,
        cell: StatusCell,
        sync: StateSynchronizer,
        cancel: CancelToken,
    }

    fn spawn(mockup: &MockupConnector, reconnect_attempts: u32) -> Rig {
        let cancel = CancelToken::new();
        let seed = StatusVector::new(0, 0, 0, 0, 0);
        let cell = StatusCell::new(seed);
        let sync = StateSynchronizer::new(cancel.clone(), Duration::from_millis(10));
        let handle = StatusPoller::spawn(
            Arc::new(mockup.clone()),
            config(reconnect_attempts),
            seed,
            cell.clone(),
            sync.clone(),
            cancel.clone(),
        )
        .unwrap();
        Rig {
            handle,
            cell,
            sync,
            cancel,
        }
    }

    #[test]
    fn records_are_published_and_signalled() {
        let mockup = MockupConnector::new("uut");
        let tx = mockup.add_live_stream(PORT);
        let mut rig = spawn(&mockup, 0);

        // Records may arrive split across deliveries and mixed with noise
        tx.send(b"0 100 900 0 0\nnoise\n1 100 ".to_vec()).unwrap();
        tx.send(b"900 0 0\n".to_vec()).unwrap();
        rig.sync.wait_armed().unwrap();
        assert_eq!(rig.cell.load(), StatusVector::new(1, 100, 900, 0, 0));

        tx.send(b"2 100 900 15 0\n0 100 900 1000 0\n".to_vec())
            .unwrap();
        rig.sync.wait_stopped().unwrap();
        assert_eq!(rig.cell.load(), StatusVector::new(0, 100, 900, 1000, 0));
        assert!(!rig.cancel.is_cancelled());

        rig.handle.stop().unwrap();
        assert_eq!(rig.cancel.reason(), Some(CancelReason::Shutdown));
        assert!(!rig.handle.is_running());
    }

    #[test]
    fn skipped_arm_cancels_and_stops_processing() {
        let mockup = MockupConnector::new("uut");
        let tx = mockup.add_live_stream(PORT);
        let mut rig = spawn(&mockup, 0);

        tx.send(b"0 100 900 0 0\n3 100 900 500 0\n".to_vec()).unwrap();
        match rig.sync.wait_stopped() {
            Err(crate::Acq400Error::Cancelled(reason)) => {
                assert_eq!(reason, CancelReason::SequencingFault { from: 0, to: 3 })
            }
            other => panic!("expected sequencing fault, got {other:?}"),
        }
        rig.handle.stop().unwrap();

        // Nothing after the fault is processed, and no signal was raised
        let _ = tx.send(b"1 100 900 0 0\n".to_vec());
        assert_eq!(rig.cell.load(), StatusVector::new(0, 100, 900, 0, 0));
        assert!(!rig.sync.signal(Transition::Armed).is_pending());
        assert!(!rig.sync.signal(Transition::Stopped).is_pending());
    }

    #[test]
    fn lost_link_is_fatal_by_default() {
        let mockup = MockupConnector::new("uut");
        mockup.add_stream(PORT, vec![b"0 1 1 0 0\n".to_vec()]);
        let mut rig = spawn(&mockup, 0);

        assert!(matches!(
            rig.sync.wait_armed(),
            Err(crate::Acq400Error::Cancelled(CancelReason::TelemetryLost(_)))
        ));
        rig.handle.stop().unwrap();
        assert_eq!(mockup.connections(PORT), 1);
    }

    #[test]
    fn reconnect_budget_resumes_tracking() {
        let mockup = MockupConnector::new("uut");
        mockup.add_stream(PORT, vec![b"0 1 1 0 0\n".to_vec()]);
        let tx = mockup.add_live_stream(PORT);
        let mut rig = spawn(&mockup, 1);

        tx.send(b"1 1 1 0 0\n".to_vec()).unwrap();
        rig.sync.wait_armed().unwrap();
        assert_eq!(mockup.connections(PORT), 2);
        assert!(!rig.cancel.is_cancelled());
        rig.handle.stop().unwrap();
    }

    #[test]
    fn unreachable_telemetry_fails_on_spawn() {
        let mockup = MockupConnector::new("uut");
        let cancel = CancelToken::new();
        let result = StatusPoller::spawn(
            Arc::new(mockup),
            config(0),
            StatusVector::default(),
            StatusCell::default(),
            StateSynchronizer::new(cancel.clone(), Duration::from_millis(10)),
            cancel,
        );
        assert!(matches!(result, Err(crate::Acq400Error::Connect { .. })));
    }
}

//! Edge detection on successive telemetry records.

use acq400_shared::StatusVector;

/// What one telemetry record did to the tracked state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerOutcome {
    /// The record was accepted and is now the current status.
    Updated {
        status: StatusVector,
        /// `state == 1`; raised on every such record, not only on entry
        armed: bool,
        /// `state` went from nonzero to zero
        stopped: bool,
    },

    /// `state` went from idle to beyond armed. The record is not accepted
    /// and the tracker refuses everything afterwards.
    Fault { from: u32, to: u32 },

    /// A fault already happened; the record was ignored.
    Halted,
}

/// Previous-record state for deriving transitions.
#[derive(Clone, Debug)]
pub struct StatusTracker {
    current: StatusVector,
    faulted: bool,
}

impl StatusTracker {
    /// Start from a seed status, normally a synchronous query of site 0.
    pub fn new(seed: StatusVector) -> Self {
        Self {
            current: seed,
            faulted: false,
        }
    }

    pub fn current(&self) -> StatusVector {
        self.current
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Apply the next record.
    pub fn apply(&mut self, next: StatusVector) -> TrackerOutcome {
        if self.faulted {
            return TrackerOutcome::Halted;
        }

        let prev = self.current.state;
        if prev == 0 && next.state > 1 {
            self.faulted = true;
            return TrackerOutcome::Fault {
                from: prev,
                to: next.state,
            };
        }

        self.current = next;
        TrackerOutcome::Updated {
            status: next,
            armed: next.state == 1,
            stopped: prev != 0 && next.state == 0,
        }
    }

    /// Apply a raw telemetry line. Lines that are not records return `None`
    /// and change nothing.
    pub fn apply_line(&mut self, line: &str) -> Option<TrackerOutcome> {
        StatusVector::from_record(line).map(|next| self.apply(next))
    }
}

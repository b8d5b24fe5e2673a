//! Set-once cancellation shared by every part of a device handle.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Why a device handle was cancelled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// Orderly shutdown requested by the owner
    Shutdown,

    /// The appliance went from idle straight past the armed phase
    SequencingFault { from: u32, to: u32 },

    /// The telemetry link failed and could not be re-established
    TelemetryLost(String),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "shut down"),
            Self::SequencingFault { from, to } => {
                write!(f, "sequencing fault, state skipped ARM {from} -> {to}")
            }
            Self::TelemetryLost(msg) => write!(f, "telemetry lost: {msg}"),
        }
    }
}

/// One-way flag with the first reason it was set for.
///
/// Once set it is never cleared; a cancelled handle must be rebuilt.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    reason: Arc<OnceCell<CancelReason>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `false` if it was already set, in which case
    /// the original reason is kept.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        self.reason.set(reason).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.get().cloned()
    }
}

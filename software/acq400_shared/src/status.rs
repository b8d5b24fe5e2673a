//! Transient status telemetry records.
//!
//! The telemetry service emits one text line per update, of the form
//! `state pre post elapsed demux`, five whitespace-separated non-negative
//! integers. Anything else on the stream is noise.

use core::fmt;
use core::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::enum_with_unknown;

static RECORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\d+)\b")
        .expect("telemetry record pattern is a valid regex")
});

enum_with_unknown!(
    /// Acquisition phase reported in the first field of a telemetry record.
    pub enum AcqState(u32) {
        /// Not capturing
        Idle = 0,
        /// Primed and waiting for a trigger
        Arm = 1,
        /// Filling the pre-trigger window
        RunPre = 2,
        /// Filling the post-trigger window
        RunPost = 3,
        /// Capture complete, appliance is post-processing
        PostProcess = 4,
        /// Releasing capture resources before returning to idle
        Cleanup = 5,
    }
);

/// One parsed telemetry record.
///
/// Always replaced as a whole; never mutated field by field once shared.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusVector {
    /// Authoritative acquisition phase, see [`AcqState`]
    pub state: u32,
    /// Pre-trigger window length in samples
    pub pre: u32,
    /// Post-trigger window length in samples
    pub post: u32,
    /// Samples captured so far
    pub elapsed: u32,
    /// Demultiplex stage flag
    pub demux: u32,
}

impl StatusVector {
    pub const fn new(state: u32, pre: u32, post: u32, elapsed: u32, demux: u32) -> Self {
        Self {
            state,
            pre,
            post,
            elapsed,
            demux,
        }
    }

    /// Find the first five-integer group in `line`.
    ///
    /// Returns `None` for lines without a match, including matches whose
    /// fields do not fit in a `u32`.
    pub fn from_record(line: &str) -> Option<Self> {
        let caps = RECORD.captures(line)?;
        let mut fields = [0_u32; 5];
        for i in 0..5 {
            fields[i] = caps.get(i + 1)?.as_str().parse().ok()?;
        }
        let [state, pre, post, elapsed, demux] = fields;
        Some(Self::new(state, pre, post, elapsed, demux))
    }

    /// Named acquisition phase.
    pub fn acq_state(&self) -> AcqState {
        AcqState::from(self.state)
    }

    /// Total capture length, pre plus post.
    pub fn samples(&self) -> u64 {
        self.pre as u64 + self.post as u64
    }
}

impl fmt::Display for StatusVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.state, self.pre, self.post, self.elapsed, self.demux
        )
    }
}

/// A status query answered with something that is not a telemetry record.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("not a status record: `{0}`")]
pub struct ParseStatusError(pub String);

impl FromStr for StatusVector {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_record(s).ok_or_else(|| ParseStatusError(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrips_through_display() {
        let records = [
            "0 0 0 0 0",
            "1 100 900 0 0",
            "3 5000 4294967295 12345 1",
        ];
        for record in records {
            let parsed = StatusVector::from_record(record).unwrap();
            assert_eq!(parsed.to_string(), record);
        }
    }

    #[test]
    fn surrounding_noise_and_whitespace_are_tolerated() {
        let parsed = StatusVector::from_record("uut: 2  100\t900 15 0 \r\n").unwrap();
        assert_eq!(parsed, StatusVector::new(2, 100, 900, 15, 0));
        assert_eq!(parsed.acq_state(), AcqState::RunPre);
    }

    #[test]
    fn non_records_are_rejected() {
        for line in ["", "hello", "1 2 3 4", "1 2 x 4 5", "-1 2 3 4 5x"] {
            assert_eq!(StatusVector::from_record(line), None, "`{line}`");
        }
        // Overflowing fields are noise, not a record
        assert_eq!(StatusVector::from_record("0 99999999999 0 0 0"), None);
    }

    #[test]
    fn unknown_states_keep_their_value() {
        let v = StatusVector::new(9, 0, 0, 0, 0);
        assert_eq!(v.acq_state(), AcqState::Unknown(9));
        assert_eq!(u32::from(v.acq_state()), 9);
        assert_eq!(u32::from(AcqState::Cleanup), 5);
    }

    #[test]
    fn from_str_reports_the_offending_text() {
        let err = "busy".parse::<StatusVector>().unwrap_err();
        assert_eq!(err, ParseStatusError("busy".to_owned()));
        assert_eq!("0 10 20 0 0".parse::<StatusVector>().unwrap().samples(), 30);
    }

    #[test]
    fn serde_roundtrip() {
        let v = StatusVector::new(1, 2, 3, 4, 5);
        let s = serde_json::to_string(&v).unwrap();
        assert_eq!(serde_json::from_str::<StatusVector>(&s).unwrap(), v);
    }
}

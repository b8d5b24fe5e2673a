//! Settings for one device handle, shared with its appendages
//! (status poller, channel readers, sinks).

use std::default::Default;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use acq400_shared::{
    SampleWidth, DATA0_PORT, SEGMENT_LOAD_PORT, SEGMENT_SHOW_PORT, SITE0_PORT, TELEMETRY_PORT,
};

use crate::Result;

/// Service ports on the appliance.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortMap {
    /// Site 0 configuration service; site N is at `site0 + N`
    pub site0: u16,
    pub segment_load: u16,
    pub segment_show: u16,
    pub telemetry: u16,
    /// Channel data base; channel N is at `data0 + N`
    pub data0: u16,
}

impl Default for PortMap {
    fn default() -> Self {
        Self {
            site0: SITE0_PORT,
            segment_load: SEGMENT_LOAD_PORT,
            segment_show: SEGMENT_SHOW_PORT,
            telemetry: TELEMETRY_PORT,
            data0: DATA0_PORT,
        }
    }
}

impl PortMap {
    /// Configuration service port for a site.
    pub fn site(&self, index: u32) -> Option<u16> {
        u16::try_from(index)
            .ok()
            .and_then(|i| self.site0.checked_add(i))
    }

    /// Data service port for a 1-based channel.
    pub fn channel(&self, channel: u32) -> Option<u16> {
        u16::try_from(channel)
            .ok()
            .and_then(|c| self.data0.checked_add(c))
    }
}

/// Device handle configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
#[non_exhaustive]
pub struct DeviceCtx {
    /// IP address or DNS name of the appliance
    pub host: String,

    pub ports: PortMap,

    /// Run a status monitor thread. Disable for passive access,
    /// e.g. tracing on a second connection to a system driven elsewhere.
    pub monitor: bool,

    /// Tick of the blocking waits; bounds how long a cancelled
    /// handle can go unnoticed by a waiter.
    pub poll_interval_ms: u64,

    pub connect_timeout_ms: u64,

    /// Read timeout on the telemetry link. Idle telemetry is not an error;
    /// the timeout only lets the poller notice shutdown.
    pub telemetry_read_timeout_ms: u64,

    /// Reconnect attempts after the telemetry link drops.
    /// Zero keeps the link-loss-is-fatal behavior.
    pub telemetry_reconnect_attempts: u32,

    pub telemetry_reconnect_delay_ms: u64,

    /// Largest single read on a channel data link
    pub max_chunk: usize,

    pub sample_width: SampleWidth,

    /// If set, every channel read is dumped as raw samples to this directory
    pub save_data: Option<PathBuf>,

    /// A name for this op, used for log and output file names.
    pub op_name: String,

    /// A directory to place log output.
    pub op_dir: PathBuf,
}

impl Default for DeviceCtx {
    fn default() -> Self {
        // Use current time with seconds as op name, replacing characters
        // in the name that would be invalid on Windows.
        let op_name = DateTime::<Utc>::from(SystemTime::now())
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            .replace(':', "");
        Self {
            host: "localhost".to_owned(),
            ports: PortMap::default(),
            monitor: true,
            poll_interval_ms: 100,
            connect_timeout_ms: 5_000,
            telemetry_read_timeout_ms: 250,
            telemetry_reconnect_attempts: 0,
            telemetry_reconnect_delay_ms: 500,
            max_chunk: 4096,
            sample_width: SampleWidth::Short,
            save_data: None,
            op_name,
            op_dir: fs::canonicalize("./").unwrap_or_default(),
        }
    }
}

impl DeviceCtx {
    /// Defaults for the appliance at `host`.
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_owned(),
            ..Default::default()
        }
    }

    pub fn with_monitor(mut self, monitor: bool) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_save_data(mut self, dir: Option<PathBuf>) -> Self {
        self.save_data = dir;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    pub fn telemetry_read_timeout(&self) -> Duration {
        Duration::from_millis(self.telemetry_read_timeout_ms.max(1))
    }

    pub fn telemetry_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.telemetry_reconnect_delay_ms)
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let ctx: Self = serde_json::from_str(&text)?;
        ctx.validate()?;
        Ok(ctx)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check for settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(crate::Acq400Error::Config("host must not be empty".into()));
        }
        if self.max_chunk == 0 {
            return Err(crate::Acq400Error::Config(
                "max_chunk must be nonzero".into(),
            ));
        }
        Ok(())
    }
}

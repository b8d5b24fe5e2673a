//! Sinks receive each channel's samples after a read, usually to persist them.

use std::path::{Path, PathBuf};

use acq400_shared::ChannelBuffer;

use crate::context::DeviceCtx;
use crate::{Acq400Error, Result};

mod csv;
pub use csv::CsvSink;

mod raw;
pub use raw::RawFileSink;

/// A plugin that receives channel data from the device handle
/// one channel at a time.
#[typetag::serde(tag = "type")]
pub trait CaptureSink: Send + Sync {
    /// Set up the sink before the first channel arrives
    fn init(&mut self, ctx: &DeviceCtx) -> Result<()>;

    /// Ingest one channel's samples
    fn consume(&mut self, channel: u32, data: &ChannelBuffer) -> Result<()>;

    /// Flush and release anything held, ready for the next `init`
    fn terminate(&mut self) -> Result<()>;
}

/// Output file stem for a channel, `<host>_CH<NN>`.
pub fn channel_file_stem(host: &str, channel: u32) -> String {
    format!("{host}_CH{channel:02}")
}

/// Create `dir` and any missing parents. Succeeds if it already exists.
fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Acq400Error::Sink(format!("unable to create {}: {e}", dir.display())))?;
    Ok(dir.to_path_buf())
}

/// Host name recorded at `init`, or an error for an uninitialized sink.
fn initialized<'a>(host: &'a Option<String>, sink: &str) -> Result<&'a str> {
    host.as_deref()
        .ok_or_else(|| Acq400Error::Sink(format!("{sink} must be initialized before consuming data")))
}

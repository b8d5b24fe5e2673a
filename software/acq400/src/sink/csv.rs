//! A plain-text CSV data target, one file per channel.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use acq400_shared::ChannelBuffer;

use super::{channel_file_stem, ensure_dir, initialized, CaptureSink};
use crate::context::DeviceCtx;
use crate::Result;

/// CSV header row
pub const CSV_HEADER: &str = "index,value\n";

/// Writes each channel to `<dir>/<host>_CH<NN>.csv` with one sample per row.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CsvSink {
    dir: PathBuf,

    #[serde(skip)]
    host: Option<String>,
}

impl CsvSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, host: None }
    }
}

#[typetag::serde]
impl CaptureSink for CsvSink {
    fn init(&mut self, ctx: &DeviceCtx) -> Result<()> {
        ensure_dir(&self.dir)?;
        self.host = Some(ctx.host.clone());
        Ok(())
    }

    fn consume(&mut self, channel: u32, data: &ChannelBuffer) -> Result<()> {
        let host = initialized(&self.host, "CsvSink")?;
        let path = self
            .dir
            .join(format!("{}.csv", channel_file_stem(host, channel)));

        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(CSV_HEADER.as_bytes())?;
        for (i, value) in data.iter().enumerate() {
            writeln!(writer, "{i},{value}")?;
        }
        writer.flush()?;
        debug!("Wrote {} rows to {}", data.len(), path.display());
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        self.host = None;
        Ok(())
    }
}

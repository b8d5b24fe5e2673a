//! Raw binary channel dumps, byte-for-byte as the appliance sent them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use acq400_shared::ChannelBuffer;

use super::{channel_file_stem, ensure_dir, initialized, CaptureSink};
use crate::context::DeviceCtx;
use crate::Result;

/// Writes each channel to `<dir>/<host>_CH<NN>` as little-endian samples.
/// A channel read again overwrites its previous file.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct RawFileSink {
    dir: PathBuf,

    #[serde(skip)]
    host: Option<String>,
}

impl RawFileSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, host: None }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[typetag::serde]
impl CaptureSink for RawFileSink {
    fn init(&mut self, ctx: &DeviceCtx) -> Result<()> {
        ensure_dir(&self.dir)?;
        self.host = Some(ctx.host.clone());
        Ok(())
    }

    fn consume(&mut self, channel: u32, data: &ChannelBuffer) -> Result<()> {
        let host = initialized(&self.host, "RawFileSink")?;
        let path = self.dir.join(channel_file_stem(host, channel));

        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(&data.to_le_bytes())?;
        writer.flush()?;
        debug!("Wrote {} samples to {}", data.len(), path.display());
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        self.host = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_raw_little_endian_per_channel() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("shots").join("1");
        let mut sink = RawFileSink::new(dir.clone());
        sink.init(&DeviceCtx::new("uut")).unwrap();
        // Creating the directory twice is fine
        sink.init(&DeviceCtx::new("uut")).unwrap();

        sink.consume(3, &ChannelBuffer::I16(vec![1, -2])).unwrap();
        sink.consume(12, &ChannelBuffer::I32(vec![0x0102_0304])).unwrap();

        assert_eq!(
            std::fs::read(dir.join("uut_CH03")).unwrap(),
            vec![0x01, 0x00, 0xfe, 0xff]
        );
        assert_eq!(
            std::fs::read(dir.join("uut_CH12")).unwrap(),
            vec![0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn consume_before_init_is_refused() {
        let root = tempfile::tempdir().unwrap();
        let mut sink = RawFileSink::new(root.path().to_path_buf());
        assert!(matches!(
            sink.consume(1, &ChannelBuffer::I16(vec![0])),
            Err(crate::Acq400Error::Sink(_))
        ));
    }
}

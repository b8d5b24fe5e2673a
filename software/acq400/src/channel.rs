//! Post-shot channel data upload.
//!
//! The channel data service has no framing: connecting to `data0 + ch`
//! yields the channel's samples as bare little-endian integers. The reader
//! has to know the byte count in advance and must not read past it.

use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use acq400_shared::{ChannelBuffer, SampleWidth};

use crate::context::{DeviceCtx, PortMap};
use crate::socket::Connector;
use crate::{Acq400Error, Result};

/// Accumulate exactly `count` samples of `width` from `src` and decode them.
///
/// Reads are at most `max_chunk` bytes and never ask for more than the bytes
/// still missing. Short deliveries are normal; the source closing early is
/// [`Acq400Error::ShortRead`], and nothing partial is returned.
pub fn read_samples<R: Read + ?Sized>(
    src: &mut R,
    channel: u32,
    count: usize,
    width: SampleWidth,
    max_chunk: usize,
) -> Result<ChannelBuffer> {
    let expected = count
        .checked_mul(width.bytes())
        .ok_or_else(|| Acq400Error::Config(format!("{count} samples overflow a buffer")))?;
    let max_chunk = max_chunk.max(1);

    let mut buf = vec![0_u8; expected];
    let mut received = 0;
    while received < expected {
        let end = expected.min(received + max_chunk);
        match src.read(&mut buf[received..end]) {
            Ok(0) => {
                return Err(Acq400Error::ShortRead {
                    channel,
                    expected,
                    received,
                })
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    ChannelBuffer::decode(&buf, width, count).ok_or(Acq400Error::ShortRead {
        channel,
        expected,
        received,
    })
}

/// Opens one connection per channel and reads its samples.
#[derive(Clone)]
pub struct ChannelStreamReader {
    connector: Arc<dyn Connector>,
    ports: PortMap,
    width: SampleWidth,
    max_chunk: usize,
}

impl ChannelStreamReader {
    pub fn new(connector: Arc<dyn Connector>, ctx: &DeviceCtx) -> Self {
        Self {
            connector,
            ports: ctx.ports,
            width: ctx.sample_width,
            max_chunk: ctx.max_chunk,
        }
    }

    pub fn width(&self) -> SampleWidth {
        self.width
    }

    /// Read `count` samples of 1-based `channel`.
    pub fn read(&self, channel: u32, count: usize) -> Result<ChannelBuffer> {
        if channel == 0 {
            return Err(Acq400Error::InvalidChannel(channel));
        }
        let port = self
            .ports
            .channel(channel)
            .ok_or(Acq400Error::InvalidChannel(channel))?;
        if count == 0 {
            return Ok(match self.width {
                SampleWidth::Short => ChannelBuffer::I16(Vec::new()),
                SampleWidth::Long => ChannelBuffer::I32(Vec::new()),
            });
        }

        let start = Instant::now();
        let mut link = self.connector.connect(port, None)?;
        let data = read_samples(link.as_mut(), channel, count, self.width, self.max_chunk)?;

        let secs = start.elapsed().as_secs_f64();
        let megabytes = (count * self.width.bytes()) as f64 / 1e6;
        debug!(
            "{} CH{channel:02} complete.. {secs:.3} s {:.2} MB/s",
            self.connector.host(),
            if secs > 0.0 { megabytes / secs } else { 0.0 }
        );

        Ok(data)
    }
}

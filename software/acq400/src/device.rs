//! Host-side proxy for one appliance.
//!
//! Discovers and keeps every site service, runs a status monitor on the
//! telemetry port, and handles post-shot upload of channel data.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use acq400_shared::{AcqState, ChannelBuffer, StatusVector};

use crate::channel::ChannelStreamReader;
use crate::context::DeviceCtx;
use crate::sink::{CaptureSink, RawFileSink};
use crate::site::{SiteClient, SiteMap};
use crate::socket::{Connector, TcpConnector};
use crate::status::{
    CancelReason, CancelToken, PollerConfig, StateSynchronizer, StatusCell, StatusPoller,
    StatusPollerHandle,
};
use crate::{Acq400Error, Result};

/// Which channels to upload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ChannelSelection {
    /// Every channel, 1 to `NCHAN`
    #[default]
    All,
    One(u32),
    /// In the given order. An empty list means all channels.
    List(Vec<u32>),
}

impl From<u32> for ChannelSelection {
    fn from(ch: u32) -> Self {
        Self::One(ch)
    }
}

impl From<Vec<u32>> for ChannelSelection {
    fn from(channels: Vec<u32>) -> Self {
        Self::List(channels)
    }
}

impl From<&[u32]> for ChannelSelection {
    fn from(channels: &[u32]) -> Self {
        Self::List(channels.to_vec())
    }
}

/// Handle for one appliance.
///
/// ```no_run
/// use acq400::{Acq400, ChannelSelection, DeviceCtx};
///
/// let mut uut = Acq400::new(DeviceCtx::new("acq2106_001"))?;
/// uut.wait_armed()?;
/// uut.wait_stopped()?;
/// let data = uut.read_channels(ChannelSelection::All)?;
/// uut.shutdown()?;
/// # Ok::<(), acq400::Acq400Error>(())
/// ```
pub struct Acq400 {
    ctx: DeviceCtx,
    connector: Arc<dyn Connector>,
    sites: SiteMap,
    status: StatusCell,
    sync: Option<StateSynchronizer>,
    poller: Option<StatusPollerHandle>,
    cancel: CancelToken,
    reader: ChannelStreamReader,
    sinks: Vec<Box<dyn CaptureSink>>,
    shut_down: bool,
}

impl Acq400 {
    /// Connect to the appliance named in `ctx` over TCP.
    pub fn new(ctx: DeviceCtx) -> Result<Self> {
        let connector = TcpConnector::new(&ctx.host, ctx.connect_timeout());
        Self::with_connector(ctx, Arc::new(connector))
    }

    /// Connect through any [`Connector`], e.g. an in-process mockup.
    pub fn with_connector(ctx: DeviceCtx, connector: Arc<dyn Connector>) -> Result<Self> {
        ctx.validate()?;

        let sites = SiteMap::discover(connector.as_ref(), &ctx.ports)?;

        // Valid before the first telemetry record, or with no monitor at all
        let seed: StatusVector = sites.s0().get("state")?.parse()?;
        let status = StatusCell::new(seed);
        let cancel = CancelToken::new();

        let (sync, poller) = if ctx.monitor {
            let sync = StateSynchronizer::new(cancel.clone(), ctx.poll_interval());
            let handle = StatusPoller::spawn(
                Arc::clone(&connector),
                PollerConfig::from(&ctx),
                seed,
                status.clone(),
                sync.clone(),
                cancel.clone(),
            )?;
            (Some(sync), Some(handle))
        } else {
            (None, None)
        };

        let reader = ChannelStreamReader::new(Arc::clone(&connector), &ctx);

        let mut uut = Self {
            ctx,
            connector,
            sites,
            status,
            sync,
            poller,
            cancel,
            reader,
            sinks: Vec::new(),
            shut_down: false,
        };
        if let Some(dir) = uut.ctx.save_data.clone() {
            uut.add_sink(Box::new(RawFileSink::new(dir)))?;
        }

        info!(
            "{}: ready, {} module(s), seed status {seed}",
            uut.host(),
            uut.mod_count()
        );
        Ok(uut)
    }

    pub fn ctx(&self) -> &DeviceCtx {
        &self.ctx
    }

    pub fn host(&self) -> &str {
        self.connector.host()
    }

    /// Latest status snapshot.
    pub fn status(&self) -> StatusVector {
        self.status.load()
    }

    pub fn state(&self) -> u32 {
        self.status().state
    }

    pub fn acq_state(&self) -> AcqState {
        self.status().acq_state()
    }

    pub fn pre_samples(&self) -> u32 {
        self.status().pre
    }

    pub fn post_samples(&self) -> u32 {
        self.status().post
    }

    pub fn elapsed_samples(&self) -> u32 {
        self.status().elapsed
    }

    pub fn demux_status(&self) -> u32 {
        self.status().demux
    }

    /// Samples per channel in the last capture, pre plus post.
    pub fn samples(&self) -> u64 {
        self.status().samples()
    }

    /// Number of module sites, not counting site 0.
    pub fn mod_count(&self) -> usize {
        self.sites.module_count()
    }

    pub fn sites(&self) -> &SiteMap {
        &self.sites
    }

    pub fn s0(&self) -> &SiteClient {
        self.sites.s0()
    }

    pub fn site(&self, index: u32) -> Result<&SiteClient> {
        self.sites.get(index)
    }

    /// Look up a site by service name, `s0`, `s1`, ...
    pub fn site_by_name(&self, name: &str) -> Result<&SiteClient> {
        self.sites.by_name(name)
    }

    pub fn nchan(&self) -> Result<u32> {
        self.s0().get_parsed("NCHAN")
    }

    pub fn model(&self) -> Result<String> {
        self.s0().get("MODEL")
    }

    /// Upload one channel of the last capture, `samples()` long.
    pub fn read_chan(&mut self, channel: u32) -> Result<ChannelBuffer> {
        let count = usize::try_from(self.samples())
            .map_err(|_| Acq400Error::Config(format!("{} samples overflow a buffer", self.samples())))?;
        let data = self.reader.read(channel, count)?;
        for sink in self.sinks.iter_mut() {
            sink.consume(channel, &data)?;
        }
        Ok(data)
    }

    /// Upload channels one after another, in the requested order.
    pub fn read_channels(
        &mut self,
        selection: impl Into<ChannelSelection>,
    ) -> Result<Vec<ChannelBuffer>> {
        let channels = match selection.into() {
            ChannelSelection::One(ch) => vec![ch],
            ChannelSelection::List(list) if !list.is_empty() => list,
            ChannelSelection::List(_) | ChannelSelection::All => (1..=self.nchan()?).collect(),
        };

        channels.into_iter().map(|ch| self.read_chan(ch)).collect()
    }

    fn synchronizer(&self) -> Result<&StateSynchronizer> {
        self.sync.as_ref().ok_or(Acq400Error::NotMonitored)
    }

    /// Block until the appliance arms.
    pub fn wait_armed(&self) -> Result<()> {
        self.synchronizer()?.wait_armed()
    }

    /// Block until a capture completes.
    pub fn wait_stopped(&self) -> Result<()> {
        self.synchronizer()?.wait_stopped()
    }

    pub fn wait_armed_timeout(&self, timeout: Duration) -> Result<bool> {
        self.synchronizer()?.wait_armed_timeout(timeout)
    }

    pub fn wait_stopped_timeout(&self, timeout: Duration) -> Result<bool> {
        self.synchronizer()?.wait_stopped_timeout(timeout)
    }

    /// Send segment definitions, one per line. Nothing is read back.
    pub fn load_segments<S: AsRef<str>>(&self, segments: &[S]) -> Result<()> {
        let mut link = self.connector.connect(self.ctx.ports.segment_load, None)?;
        for seg in segments {
            link.write_all(seg.as_ref().as_bytes())?;
            link.write_all(b"\n")?;
        }
        link.flush()?;
        Ok(())
    }

    /// Read the segment table until the appliance closes the connection.
    pub fn show_segments(&self) -> Result<String> {
        let mut link = self.connector.connect(self.ctx.ports.segment_show, None)?;
        let mut text = Vec::new();
        link.read_to_end(&mut text)?;
        let text = String::from_utf8_lossy(&text).into_owned();
        info!("{}: segments\n{}", self.host(), text.trim_end());
        Ok(text)
    }

    /// Attach a sink that receives every channel read from now on.
    pub fn add_sink(&mut self, mut sink: Box<dyn CaptureSink>) -> Result<()> {
        sink.init(&self.ctx)?;
        self.sinks.push(sink);
        Ok(())
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Why the handle was cancelled, if it was.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.cancel.reason()
    }

    /// Whether the status monitor thread is still following telemetry.
    pub fn is_monitoring(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| p.is_running())
    }

    /// Stop the status monitor and close out the sinks.
    /// Later calls do nothing.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        self.cancel.cancel(CancelReason::Shutdown);
        let mut result = match self.poller.as_mut() {
            Some(poller) => poller.stop(),
            None => Ok(()),
        };
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.terminate() {
                warn!("Error terminating sink: {e}");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        info!("{}: shut down", self.host());
        result
    }
}

impl Drop for Acq400 {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Error shutting down device handle: {e}");
        }
    }
}

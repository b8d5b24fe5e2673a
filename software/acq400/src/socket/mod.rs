//! Byte-stream connections to the appliance's services.
//!
//! Every component opens and owns its own connection; nothing is shared
//! across threads. A [`Connector`] knows how to reach one appliance and
//! hands out a fresh [`Link`] per call.

pub mod mockup;
pub mod tcp;

use std::io::{self, Read, Write};
use std::time::Duration;

use crate::Result;

pub use mockup::MockupConnector;
pub use tcp::TcpConnector;

/// A connected, bidirectional byte stream.
pub trait Link: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> Link for T {}

/// Opens connections to numbered service ports on one appliance.
pub trait Connector: Send + Sync {
    /// Name of the appliance, for logs and output file names
    fn host(&self) -> &str;

    /// Open a new connection to `port`.
    ///
    /// With a `read_timeout`, reads that see no data for that long fail with
    /// [`io::ErrorKind::WouldBlock`] or [`io::ErrorKind::TimedOut`]
    /// instead of blocking forever; see [`is_idle`].
    fn connect(&self, port: u16, read_timeout: Option<Duration>) -> Result<Box<dyn Link>>;
}

/// Whether a read error only means that no data arrived before the timeout.
pub fn is_idle(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

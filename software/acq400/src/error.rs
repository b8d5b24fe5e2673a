//! Error type for the host client.
//!
//! Recoverable conditions (an unknown site, a knob that answers with garbage)
//! are returned to the immediate caller. Fatal conditions on the telemetry
//! link cancel the device handle, and every later wait reports
//! [`Acq400Error::Cancelled`] with the reason.

use acq400_shared::{ParseStatusError, SiteListError};
use thiserror::Error;

use crate::status::CancelReason;

/// Convenience alias for results using the client error type.
pub type Result<T> = std::result::Result<T, Acq400Error>;

#[derive(Error, Debug)]
pub enum Acq400Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to connect to port {port}: {source}")]
    Connect {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("No such site: {0}")]
    NoSuchSite(String),

    #[error("Malformed response to `{key}`: `{value}`")]
    MalformedResponse { key: String, value: String },

    #[error("Bad SITELIST: {0}")]
    SiteList(#[from] SiteListError),

    #[error("Bad status: {0}")]
    Status(#[from] ParseStatusError),

    #[error("Invalid channel {0}; channels are numbered from 1")]
    InvalidChannel(u32),

    #[error("Channel {channel} closed after {received} of {expected} bytes")]
    ShortRead {
        channel: u32,
        expected: usize,
        received: usize,
    },

    #[error("Device handle cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("Status monitor is not running on this device handle")]
    NotMonitored,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sink error: {0}")]
    Sink(String),
}

impl From<serde_json::Error> for Acq400Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

//! Implementation of Connector trait for stdlib TCP streams

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use super::{Connector, Link};
use crate::{Acq400Error, Result};

/// Connects to an appliance by IP address or DNS name.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    host: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: &str, connect_timeout: Duration) -> Self {
        Self {
            host: host.to_owned(),
            connect_timeout,
        }
    }
}

impl Connector for TcpConnector {
    fn host(&self) -> &str {
        &self.host
    }

    fn connect(&self, port: u16, read_timeout: Option<Duration>) -> Result<Box<dyn Link>> {
        let connect_err = |source| Acq400Error::Connect { port, source };

        let addrs = (self.host.as_str(), port)
            .to_socket_addrs()
            .map_err(connect_err)?;

        // Try each resolved address in turn, keeping the last failure
        let mut last_err = io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses resolved for {}", self.host),
        );
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(read_timeout).map_err(connect_err)?;
                    stream.set_nodelay(true).map_err(connect_err)?;
                    debug!("Connected to {addr}");
                    return Ok(Box::new(stream));
                }
                Err(e) => last_err = e,
            }
        }

        Err(connect_err(last_err))
    }
}

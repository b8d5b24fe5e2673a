//! In-process imitation of an appliance's services, for running the client
//! with no hardware in the loop.
//!
//! Each port is registered as one of
//! * a key=value site service, answering one line per command line,
//! * a queue of byte streams, one consumed per connection, either scripted
//!   up front or fed live from another thread,
//! * a capture that records everything written to it.

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::debug;

use super::{Connector, Link};
use crate::{Acq400Error, Result};

/// Shared key=value table behind a mock site service.
pub type KnobTable = Arc<Mutex<BTreeMap<String, String>>>;

/// Shared record of bytes written to a mock capture port.
pub type Capture = Arc<Mutex<Vec<u8>>>;

enum PortService {
    Site(KnobTable),
    Streams(VecDeque<Receiver<Vec<u8>>>),
    Capture(Capture),
}

/// Connector to a scripted, in-process appliance.
#[derive(Clone)]
pub struct MockupConnector {
    host: String,
    ports: Arc<Mutex<BTreeMap<u16, PortService>>>,
    connections: Arc<Mutex<BTreeMap<u16, usize>>>,
}

impl MockupConnector {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_owned(),
            ports: Arc::new(Mutex::new(BTreeMap::new())),
            connections: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    fn ports(&self) -> MutexGuard<'_, BTreeMap<u16, PortService>> {
        self.ports.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve a key=value site service on `port`.
    pub fn add_site(&self, port: u16, knobs: &[(&str, &str)]) -> KnobTable {
        let table: KnobTable = Arc::new(Mutex::new(
            knobs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        self.ports()
            .insert(port, PortService::Site(Arc::clone(&table)));
        table
    }

    /// Queue a stream for the next connection to `port` that delivers
    /// `fragments` one read at a time and then closes.
    pub fn add_stream(&self, port: u16, fragments: Vec<Vec<u8>>) {
        let tx = self.add_live_stream(port);
        for fragment in fragments {
            let _ = tx.send(fragment);
        }
    }

    /// Queue a stream for the next connection to `port` that delivers
    /// whatever is sent on the returned handle. Dropping the handle closes
    /// the stream once it has drained.
    pub fn add_live_stream(&self, port: u16) -> Sender<Vec<u8>> {
        let (tx, rx) = unbounded();
        let mut ports = self.ports();
        match ports.get_mut(&port) {
            Some(PortService::Streams(queue)) => queue.push_back(rx),
            _ => {
                ports.insert(port, PortService::Streams(VecDeque::from([rx])));
            }
        }
        tx
    }

    /// Record everything written to `port`.
    pub fn add_capture(&self, port: u16) -> Capture {
        let capture: Capture = Arc::new(Mutex::new(Vec::new()));
        self.ports()
            .insert(port, PortService::Capture(Arc::clone(&capture)));
        capture
    }

    /// Number of connections opened to `port` so far.
    pub fn connections(&self, port: u16) -> usize {
        self.connections
            .lock()
            .map(|c| c.get(&port).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl Connector for MockupConnector {
    fn host(&self) -> &str {
        &self.host
    }

    fn connect(&self, port: u16, read_timeout: Option<Duration>) -> Result<Box<dyn Link>> {
        let refused = || Acq400Error::Connect {
            port,
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "nothing listening"),
        };

        let link = match self.ports().get_mut(&port) {
            Some(PortService::Site(table)) => MockupLink::Site {
                table: Arc::clone(table),
                line: Vec::new(),
                pending: VecDeque::new(),
            },
            Some(PortService::Streams(queue)) => MockupLink::Stream {
                rx: queue.pop_front().ok_or_else(refused)?,
                fragment: Vec::new(),
                pos: 0,
                read_timeout,
            },
            Some(PortService::Capture(capture)) => MockupLink::Capture(Arc::clone(capture)),
            None => return Err(refused()),
        };

        if let Ok(mut c) = self.connections.lock() {
            *c.entry(port).or_default() += 1;
        }
        debug!("Mockup {} accepted connection on port {port}", self.host);

        Ok(Box::new(link))
    }
}

enum MockupLink {
    Site {
        table: KnobTable,
        line: Vec<u8>,
        pending: VecDeque<u8>,
    },
    Stream {
        rx: Receiver<Vec<u8>>,
        fragment: Vec<u8>,
        pos: usize,
        read_timeout: Option<Duration>,
    },
    Capture(Capture),
}

/// Answer one site service command line.
fn answer(table: &KnobTable, command: &str) -> String {
    let mut table = table.lock().unwrap_or_else(|e| e.into_inner());
    match command.split_once('=') {
        Some((key, value)) => {
            table.insert(key.trim().to_owned(), value.trim().to_owned());
            String::new()
        }
        None => match table.get(command.trim()) {
            Some(value) => value.clone(),
            None => format!("ERROR: no such knob {}", command.trim()),
        },
    }
}

impl Read for MockupLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Site { pending, .. } => {
                let n = buf.len().min(pending.len());
                for (dst, src) in buf.iter_mut().zip(pending.drain(..n)) {
                    *dst = src;
                }
                Ok(n)
            }
            Self::Stream {
                rx,
                fragment,
                pos,
                read_timeout,
            } => {
                // Deliver at most the rest of the current fragment per read
                if *pos >= fragment.len() {
                    let next = match read_timeout {
                        Some(timeout) => match rx.recv_timeout(*timeout) {
                            Ok(next) => next,
                            Err(RecvTimeoutError::Timeout) => {
                                return Err(io::Error::new(io::ErrorKind::TimedOut, "idle"))
                            }
                            Err(RecvTimeoutError::Disconnected) => return Ok(0),
                        },
                        None => match rx.recv() {
                            Ok(next) => next,
                            Err(_) => return Ok(0),
                        },
                    };
                    *fragment = next;
                    *pos = 0;
                }
                let n = buf.len().min(fragment.len() - *pos);
                buf[..n].copy_from_slice(&fragment[*pos..*pos + n]);
                *pos += n;
                Ok(n)
            }
            Self::Capture(_) => Ok(0),
        }
    }
}

impl Write for MockupLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Site {
                table,
                line,
                pending,
            } => {
                for &b in buf {
                    if b == b'\n' {
                        let command = String::from_utf8_lossy(line).into_owned();
                        line.clear();
                        pending.extend(answer(table, &command).bytes());
                        pending.push_back(b'\n');
                    } else {
                        line.push(b);
                    }
                }
            }
            Self::Stream { .. } => {}
            Self::Capture(capture) => capture
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend_from_slice(buf),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

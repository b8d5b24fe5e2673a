//! Key=value configuration services, one per site.
//!
//! Each command is one line: `KEY` reads a knob, `KEY=VALUE` writes one.
//! The appliance answers every command with one line.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::str::FromStr;
use std::sync::Mutex;

use tracing::{debug, info};

use acq400_shared::{parse_site_list, SiteEntry};

use crate::context::PortMap;
use crate::socket::{Connector, Link};
use crate::{Acq400Error, Result};

/// Request/response client for one site's settings.
pub struct SiteClient {
    index: u32,
    port: u16,
    link: Mutex<BufReader<Box<dyn Link>>>,
}

impl std::fmt::Debug for SiteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteClient")
            .field("index", &self.index)
            .field("port", &self.port)
            .finish()
    }
}

impl SiteClient {
    pub fn connect(connector: &dyn Connector, index: u32, port: u16) -> Result<Self> {
        let link = connector.connect(port, None)?;
        Ok(Self {
            index,
            port,
            link: Mutex::new(BufReader::new(link)),
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send one command and return the response line without its terminator.
    pub fn sr(&self, command: &str) -> Result<String> {
        let mut link = self
            .link
            .lock()
            .map_err(|_| Acq400Error::Config(format!("site {} link lock poisoned", self.index)))?;

        let stream = link.get_mut();
        stream.write_all(command.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        let mut response = String::new();
        if link.read_line(&mut response)? == 0 {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("site {} closed while answering `{command}`", self.index),
            )
            .into());
        }
        let response = response.trim_end_matches(['\r', '\n']).to_owned();
        debug!("s{} {command} => {response}", self.index);

        if response.starts_with("ERROR") {
            return Err(Acq400Error::MalformedResponse {
                key: command.to_owned(),
                value: response,
            });
        }

        Ok(response)
    }

    /// Read a knob.
    pub fn get(&self, key: &str) -> Result<String> {
        self.sr(key)
    }

    /// Read a knob and parse it.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        value
            .trim()
            .parse()
            .map_err(|_| Acq400Error::MalformedResponse {
                key: key.to_owned(),
                value,
            })
    }

    /// Write a knob, returning the appliance's acknowledgement.
    pub fn set(&self, key: &str, value: impl Display) -> Result<String> {
        self.sr(&format!("{key}={value}"))
    }
}

/// Discovered sites by index. Site 0 is always present.
#[derive(Debug)]
pub struct SiteMap {
    sites: BTreeMap<u32, SiteClient>,
    entries: Vec<SiteEntry>,
}

impl SiteMap {
    /// Ask site 0 for `SITELIST` and connect to every listed site.
    pub fn discover(connector: &dyn Connector, ports: &PortMap) -> Result<Self> {
        let s0 = SiteClient::connect(connector, 0, ports.site0)?;
        let entries = parse_site_list(&s0.get("SITELIST")?)?;

        let mut sites = BTreeMap::new();
        sites.insert(0, s0);
        for entry in entries.iter() {
            let port = ports
                .site(entry.index)
                .ok_or_else(|| Acq400Error::NoSuchSite(format!("s{}", entry.index)))?;
            sites.insert(entry.index, SiteClient::connect(connector, entry.index, port)?);
        }
        info!(
            "{}: discovered {} module site(s): {:?}",
            connector.host(),
            entries.len(),
            entries.iter().map(|e| e.index).collect::<Vec<_>>()
        );

        Ok(Self { sites, entries })
    }

    /// Site 0, the appliance-wide service.
    pub fn s0(&self) -> &SiteClient {
        // Inserted unconditionally by `discover`
        &self.sites[&0]
    }

    pub fn get(&self, index: u32) -> Result<&SiteClient> {
        self.sites
            .get(&index)
            .ok_or_else(|| Acq400Error::NoSuchSite(format!("s{index}")))
    }

    /// Look up a site by its service name, `s0`, `s1`, ...
    pub fn by_name(&self, name: &str) -> Result<&SiteClient> {
        name.strip_prefix('s')
            .and_then(|n| n.parse::<u32>().ok())
            .and_then(|index| self.sites.get(&index))
            .ok_or_else(|| Acq400Error::NoSuchSite(name.to_owned()))
    }

    /// Site indices, including site 0.
    pub fn indices(&self) -> Vec<u32> {
        self.sites.keys().copied().collect()
    }

    /// `SITELIST` entries, excluding site 0.
    pub fn entries(&self) -> &[SiteEntry] {
        &self.entries
    }

    /// Number of module sites, excluding site 0.
    pub fn module_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::MockupConnector;

    fn mockup() -> MockupConnector {
        let mockup = MockupConnector::new("uut");
        mockup.add_site(4220, &[("SITELIST", "2,1=32,3=32"), ("NCHAN", "64")]);
        mockup.add_site(4221, &[("MODEL", "ACQ480")]);
        mockup.add_site(4223, &[("MODEL", "ACQ424")]);
        mockup
    }

    #[test]
    fn discovery_connects_each_listed_site() {
        let mockup = mockup();
        let sites = SiteMap::discover(&mockup, &PortMap::default()).unwrap();

        assert_eq!(sites.indices(), vec![0, 1, 3]);
        assert_eq!(sites.module_count(), 2);
        assert_eq!(sites.get(3).unwrap().get("MODEL").unwrap(), "ACQ424");
        assert_eq!(sites.by_name("s1").unwrap().port(), 4221);
        assert_eq!(sites.s0().get_parsed::<u32>("NCHAN").unwrap(), 64);
        assert_eq!(mockup.connections(4222), 0);
    }

    #[test]
    fn missing_sites_are_reported_by_name() {
        let sites = SiteMap::discover(&mockup(), &PortMap::default()).unwrap();
        for name in ["s2", "site1", "s", "x1"] {
            match sites.by_name(name) {
                Err(Acq400Error::NoSuchSite(n)) => assert_eq!(n, name),
                other => panic!("expected NoSuchSite for {name}, got {other:?}"),
            }
        }
        assert!(matches!(sites.get(9), Err(Acq400Error::NoSuchSite(_))));
    }

    #[test]
    fn set_then_get_and_bad_values() {
        let mockup = mockup();
        let s1 = SiteClient::connect(&mockup, 1, 4221).unwrap();
        assert_eq!(s1.set("trg", "1,1,1").unwrap(), "");
        assert_eq!(s1.get("trg").unwrap(), "1,1,1");
        assert!(matches!(
            s1.get_parsed::<u32>("MODEL"),
            Err(Acq400Error::MalformedResponse { .. })
        ));
        assert!(matches!(
            s1.get("nothing_here"),
            Err(Acq400Error::MalformedResponse { .. })
        ));
    }
}

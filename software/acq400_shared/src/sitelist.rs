//! Site discovery from the site 0 `SITELIST` knob.
//!
//! The value is a comma-separated list whose first field is a summary,
//! followed by one `index=description` entry per populated site,
//! e.g. `2,1=32,2=32`.

use serde::{Deserialize, Serialize};

/// One populated site.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SiteEntry {
    pub index: u32,
    pub description: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SiteListError {
    #[error("bad site index `{entry}` in SITELIST")]
    BadIndex { entry: String },

    #[error("site 0 listed as a module in SITELIST")]
    SiteZero,
}

/// Parse a `SITELIST` value into its site entries, skipping the summary field.
///
/// Empty entries (doubled or trailing commas) are ignored.
pub fn parse_site_list(value: &str) -> Result<Vec<SiteEntry>, SiteListError> {
    let mut sites = Vec::new();
    for entry in value.trim().split(',').skip(1) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (index, description) = entry.split_once('=').unwrap_or((entry, ""));
        let index: u32 = index.trim().parse().map_err(|_| SiteListError::BadIndex {
            entry: entry.to_owned(),
        })?;
        if index == 0 {
            return Err(SiteListError::SiteZero);
        }
        sites.push(SiteEntry {
            index,
            description: description.trim().to_owned(),
        });
    }

    Ok(sites)
}

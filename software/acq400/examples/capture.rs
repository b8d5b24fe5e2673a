//! Wait for one shot on a real appliance and upload its data.
//!
//! The appliance is named by `ACQ400_HOST` (default `10.12.132.22`);
//! settings can be loaded from a JSON file named by `ACQ400_CONFIG`.
//! Arm the appliance from elsewhere once this is waiting.

use std::path::PathBuf;

use acq400::*;
use tracing::{error, info};

fn main() {
    let mut ctx = match std::env::var_os("ACQ400_CONFIG") {
        Some(path) => DeviceCtx::from_json_file(&PathBuf::from(path)).unwrap(),
        None => DeviceCtx::default(),
    };
    if let Ok(host) = std::env::var("ACQ400_HOST") {
        ctx.host = host;
    } else if ctx.host == "localhost" {
        ctx.host = "10.12.132.22".into();
    }
    let _ = logging::init_logging(&ctx.op_dir, &ctx.op_name).unwrap();

    let mut uut = Acq400::new(ctx).unwrap();
    info!("MODEL {}", uut.model().unwrap());
    for entry in uut.sites().entries() {
        let model = uut.site(entry.index).and_then(|s| s.get("MODEL"));
        info!("SITE:s{} MODEL:{:?}", entry.index, model);
    }

    let outcome = uut.wait_armed().and_then(|_| uut.wait_stopped());
    if let Err(e) = outcome {
        error!("Shot failed: {e}");
        let _ = uut.shutdown();
        std::process::exit(1);
    }

    let data = uut.read_channels(ChannelSelection::All).unwrap();
    info!("Uploaded {} channel(s) of {} samples", data.len(), uut.samples());
    uut.shutdown().unwrap();
}

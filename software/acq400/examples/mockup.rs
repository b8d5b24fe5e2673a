//! Run a whole shot against an in-process imitation of an appliance.
//!
//! Demonstrated here:
//!   * Scripting appliance services with the mockup connector
//!   * Waiting for the armed and stopped transitions
//!   * Uploading every channel and saving it to disk
//!   * Running with no hardware in the loop

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use acq400::sink::CsvSink;
use acq400::socket::MockupConnector;
use acq400::*;
use tracing::{error, info};

const NCHAN: u32 = 4;
const PRE: u32 = 0;
const POST: u32 = 5000;

fn main() {
    let mut ctx = DeviceCtx::new("acq2106_mockup");
    ctx.op_name = "mockup_example".into();
    ctx.op_dir = "./software/acq400/examples".into();
    ctx.save_data = Some(ctx.op_dir.join("data"));
    let _ = logging::init_logging(&ctx.op_dir, &ctx.op_name).unwrap();

    // Site services
    let mockup = MockupConnector::new(&ctx.host);
    mockup.add_site(
        ctx.ports.site0,
        &[
            ("SITELIST", "1,1=4"),
            ("MODEL", "acq2106"),
            ("NCHAN", &NCHAN.to_string()),
            ("state", "0 0 0 0 0"),
        ],
    );
    mockup.add_site(ctx.ports.site0 + 1, &[("MODEL", "ACQ435ELF")]);

    // One sine wave per channel, ready for upload after the shot
    for ch in 1..=NCHAN {
        let samples = ChannelBuffer::I16(
            (0..POST)
                .map(|i| (10_000.0 * (i as f64 * 0.01 * ch as f64).sin()) as i16)
                .collect(),
        );
        mockup.add_stream(ctx.ports.channel(ch).unwrap(), vec![samples.to_le_bytes()]);
    }

    // The appliance arms, runs, and returns to idle
    let telemetry = mockup.add_live_stream(ctx.ports.telemetry);
    // Keep the link open after the shot so the monitor stays up until shutdown
    let _telemetry_open = telemetry.clone();
    let shot = thread::spawn(move || {
        for (state, elapsed) in [(0, 0), (1, 0), (2, 0), (3, 2500), (3, 5000), (0, POST)] {
            let record = format!("{state} {PRE} {POST} {elapsed} 0\n");
            if telemetry.send(record.into_bytes()).is_err() {
                return;
            }
            thread::sleep(Duration::from_millis(50));
        }
    });

    let mut uut = Acq400::with_connector(ctx.clone(), Arc::new(mockup)).unwrap();
    info!("MODEL {}", uut.model().unwrap());
    info!("Module count {}", uut.mod_count());
    uut.add_sink(Box::new(CsvSink::new(ctx.op_dir.join("data"))))
        .unwrap();

    let outcome = uut.wait_armed().and_then(|_| uut.wait_stopped());
    if let Err(e) = outcome {
        error!("Shot failed: {e}");
        let _ = uut.shutdown();
        std::process::exit(1);
    }

    info!("POST SAMPLES {}", uut.post_samples());
    let data = uut.read_channels(ChannelSelection::All).unwrap();
    for (i, ch) in data.iter().enumerate() {
        info!("CH{:02} {} samples, first {:?}", i + 1, ch.len(), ch.get(0));
    }

    uut.shutdown().unwrap();
    let _ = shot.join();
}

//! Whole-handle behavior against an in-process appliance.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Sender;

use acq400::sink::CsvSink;
use acq400::socket::MockupConnector;
use acq400::*;

const HOST: &str = "uut";

struct Appliance {
    mockup: MockupConnector,
    telemetry: Option<Sender<Vec<u8>>>,
}

impl Appliance {
    /// Two-site appliance with `nchan` channels, idle, with a live telemetry link.
    fn new(nchan: u32) -> Self {
        let mockup = MockupConnector::new(HOST);
        mockup.add_site(
            4220,
            &[
                ("SITELIST", "2,1=16,2=16"),
                ("MODEL", "acq2106"),
                ("NCHAN", &nchan.to_string()),
                ("state", "0 100 900 0 0"),
            ],
        );
        mockup.add_site(4221, &[("MODEL", "ACQ424ELF")]);
        mockup.add_site(4222, &[("MODEL", "ACQ424ELF")]);
        let telemetry = Some(mockup.add_live_stream(2235));
        Self { mockup, telemetry }
    }

    fn send(&self, records: &str) {
        if let Some(tx) = &self.telemetry {
            tx.send(records.as_bytes().to_vec()).unwrap();
        }
    }

    /// Queue channel data: sample i of channel ch is `ch * 1000 + i`.
    fn load_channel(&self, ch: u32, count: usize) -> ChannelBuffer {
        let data = ChannelBuffer::I16((0..count).map(|i| (ch * 1000) as i16 + i as i16).collect());
        let bytes = data.to_le_bytes();
        let (head, tail) = bytes.split_at(bytes.len() / 3);
        self.mockup
            .add_stream(53000 + ch as u16, vec![head.to_vec(), tail.to_vec()]);
        data
    }

    fn connect(&self, ctx: DeviceCtx) -> Acq400 {
        Acq400::with_connector(ctx, Arc::new(self.mockup.clone())).unwrap()
    }
}

fn ctx() -> DeviceCtx {
    let mut ctx = DeviceCtx::new(HOST);
    ctx.poll_interval_ms = 10;
    ctx.telemetry_read_timeout_ms = 10;
    ctx
}

#[test]
fn discovers_sites_and_seeds_status() {
    let appliance = Appliance::new(32);
    let uut = appliance.connect(ctx().with_monitor(false));

    assert_eq!(uut.mod_count(), 2);
    assert_eq!(uut.sites().indices(), vec![0, 1, 2]);
    assert_eq!(uut.model().unwrap(), "acq2106");
    assert_eq!(uut.nchan().unwrap(), 32);
    assert_eq!(uut.site_by_name("s2").unwrap().get("MODEL").unwrap(), "ACQ424ELF");
    assert!(matches!(uut.site_by_name("s5"), Err(Acq400Error::NoSuchSite(n)) if n == "s5"));
    assert!(matches!(uut.site(7), Err(Acq400Error::NoSuchSite(_))));

    // Seeded from site 0 with no telemetry at all
    assert_eq!(uut.status(), StatusVector::new(0, 100, 900, 0, 0));
    assert_eq!(uut.acq_state(), AcqState::Idle);
    assert_eq!(uut.samples(), 1000);
    assert!(!uut.is_monitoring());
    assert_eq!(appliance.mockup.connections(2235), 0);
}

#[test]
fn waits_need_a_monitor() {
    let appliance = Appliance::new(2);
    let uut = appliance.connect(ctx().with_monitor(false));
    assert!(matches!(uut.wait_armed(), Err(Acq400Error::NotMonitored)));
    assert!(matches!(
        uut.wait_stopped_timeout(Duration::from_millis(10)),
        Err(Acq400Error::NotMonitored)
    ));
}

#[test]
fn full_shot_then_upload() {
    let appliance = Appliance::new(2);
    let mut uut = appliance.connect(ctx());
    assert!(uut.is_monitoring());

    appliance.send("0 100 900 0 0\n1 100 900 0 0\n");
    uut.wait_armed().unwrap();
    assert_eq!(uut.acq_state(), AcqState::Arm);

    appliance.send("2 100 900 50 0\n3 100 900 700 0\n0 100 900 1000 0\n");
    uut.wait_stopped().unwrap();
    assert_eq!(uut.status(), StatusVector::new(0, 100, 900, 1000, 0));
    assert_eq!(uut.elapsed_samples(), 1000);

    let ch1 = appliance.load_channel(1, 1000);
    let ch2 = appliance.load_channel(2, 1000);
    let data = uut.read_channels(ChannelSelection::All).unwrap();
    assert_eq!(data, vec![ch1, ch2]);

    // A second wait blocks until the next capture
    assert!(!uut.wait_stopped_timeout(Duration::from_millis(50)).unwrap());

    uut.shutdown().unwrap();
    assert_eq!(uut.cancel_reason(), Some(CancelReason::Shutdown));
    assert!(!uut.is_monitoring());
    // Idempotent
    uut.shutdown().unwrap();
}

#[test]
fn sequencing_fault_cancels_the_handle() {
    let appliance = Appliance::new(2);
    let mut uut = appliance.connect(ctx());

    appliance.send("0 100 900 0 0\n2 100 900 10 0\n");
    match uut.wait_armed() {
        Err(Acq400Error::Cancelled(CancelReason::SequencingFault { from, to })) => {
            assert_eq!((from, to), (0, 2))
        }
        other => panic!("expected a sequencing fault, got {other:?}"),
    }
    assert!(uut.is_cancelled());
    // The faulting record was never published
    assert_eq!(uut.state(), 0);

    // Terminal for every later wait
    assert!(matches!(uut.wait_stopped(), Err(Acq400Error::Cancelled(_))));

    // Shutdown still works and keeps the original reason
    uut.shutdown().unwrap();
    assert!(matches!(
        uut.cancel_reason(),
        Some(CancelReason::SequencingFault { .. })
    ));
}

#[test]
fn telemetry_loss_cancels_the_handle() {
    let mut appliance = Appliance::new(2);
    let mut uut = appliance.connect(ctx());

    appliance.send("0 100 900 0 0\n");
    appliance.telemetry = None;

    assert!(matches!(
        uut.wait_stopped(),
        Err(Acq400Error::Cancelled(CancelReason::TelemetryLost(_)))
    ));
    uut.shutdown().unwrap();
}

#[test]
fn unreachable_telemetry_fails_construction() {
    let mockup = MockupConnector::new(HOST);
    mockup.add_site(4220, &[("SITELIST", "0"), ("state", "0 0 0 0 0")]);
    let result = Acq400::with_connector(ctx(), Arc::new(mockup));
    assert!(matches!(result, Err(Acq400Error::Connect { port: 2235, .. })));
}

#[test]
fn channels_are_read_in_requested_order() {
    let appliance = Appliance::new(8);
    let mut uut = appliance.connect(ctx().with_monitor(false));

    let ch5 = appliance.load_channel(5, 1000);
    let ch2 = appliance.load_channel(2, 1000);
    let data = uut.read_channels(vec![5_u32, 2]).unwrap();
    assert_eq!(data, vec![ch5, ch2]);

    let ch3 = appliance.load_channel(3, 1000);
    assert_eq!(uut.read_channels(3_u32).unwrap(), vec![ch3]);
    assert!(matches!(uut.read_chan(0), Err(Acq400Error::InvalidChannel(0))));
}

#[test]
fn short_upload_is_an_error() {
    let appliance = Appliance::new(1);
    let mut uut = appliance.connect(ctx().with_monitor(false));

    appliance
        .mockup
        .add_stream(53001, vec![vec![0_u8; 1500]]);
    match uut.read_chan(1) {
        Err(Acq400Error::ShortRead {
            channel,
            expected,
            received,
        }) => assert_eq!((channel, expected, received), (1, 2000, 1500)),
        other => panic!("expected a short read, got {other:?}"),
    }
}

#[test]
fn uploads_are_saved_to_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let raw_dir = dir.path().join("raw");
    let csv_dir = dir.path().join("csv");

    let appliance = Appliance::new(1);
    let mut uut = appliance.connect(
        ctx()
            .with_monitor(false)
            .with_save_data(Some(raw_dir.clone())),
    );
    uut.add_sink(Box::new(CsvSink::new(csv_dir.clone()))).unwrap();

    let ch1 = appliance.load_channel(1, 1000);
    uut.read_chan(1).unwrap();
    uut.shutdown().unwrap();

    assert_eq!(std::fs::read(raw_dir.join("uut_CH01")).unwrap(), ch1.to_le_bytes());
    let csv = std::fs::read_to_string(csv_dir.join("uut_CH01.csv")).unwrap();
    assert!(csv.starts_with("index,value\n0,1000\n1,1001\n"));
    assert_eq!(csv.lines().count(), 1001);
}

#[test]
fn segments_are_loaded_and_shown() {
    let appliance = Appliance::new(1);
    let uut = appliance.connect(ctx().with_monitor(false));

    let loaded = appliance.mockup.add_capture(4250);
    uut.load_segments(&["A=1,2,3", "B=4,5,6"]).unwrap();
    assert_eq!(loaded.lock().unwrap().as_slice(), b"A=1,2,3\nB=4,5,6\n");

    appliance
        .mockup
        .add_stream(4251, vec![b"A=1,2,3\n".to_vec(), b"B=4,5,6\n".to_vec()]);
    assert_eq!(uut.show_segments().unwrap(), "A=1,2,3\nB=4,5,6\n");
}

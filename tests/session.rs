//! Integration tests for session lifecycle and driver dispatch.

mod common;

use std::sync::{Arc, Mutex};

use ambit_hid::backends::virtual_hid::{LoopbackProtocol, VirtualDevice, VirtualTransport};
use ambit_hid::registry::FAMILY_AMBIT;
use ambit_hid::{
    close_session, AccessStatus, AmbitError, CommandId, DeviceInfo, DeviceStatus, Driver, Link,
    LogEntry, LogHeader, LogSink, Manager, Registry, Result, Version, SUUNTO_USB_VENDOR_ID,
};
use chrono::NaiveDate;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
    fail_init: bool,
}

impl Recorder {
    fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Driver for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn init(&self, link: &mut Link, param: u32) -> Result<()> {
        self.record(format!("init {param:#06x}"));
        if self.fail_init {
            return Err(AmbitError::Protocol("init refused".into()));
        }
        link.driver_data = Some(Box::new(param));
        Ok(())
    }

    fn deinit(&self, link: &mut Link) {
        self.record(format!("deinit {}", link.driver_data.is_some()));
    }

    fn lock_log(&self, link: &mut Link, lock: bool) -> Result<()> {
        self.record(format!("lock_log {lock}"));
        link.command(CommandId::LOCK_SET, &[u8::from(lock)]).map(drop)
    }

    fn status_get(&self, link: &mut Link) -> Result<DeviceStatus> {
        self.record("status_get");
        let reply = link.command(CommandId::STATUS, &[])?;
        Ok(DeviceStatus {
            charge: reply.get(1).copied().unwrap_or_default(),
        })
    }

    fn log_read(&self, _link: &mut Link, sink: &mut dyn LogSink) -> Result<usize> {
        let mut pushed = 0;
        for n in 0..3u16 {
            let header = LogHeader {
                activity_name: format!("move {n}"),
                ..LogHeader::default()
            };
            if sink.skip(&header) {
                continue;
            }
            sink.push(LogEntry::new(header));
            sink.progress(3, n + 1, ((n + 1) * 100 / 3) as u8);
            pushed += 1;
        }
        Ok(pushed)
    }
}

fn ambit2(path: &str) -> VirtualDevice {
    VirtualDevice::new(SUUNTO_USB_VENDOR_ID, 0x0019, path)
        .with_product_string("Ambit2")
        .with_identity("Duck", "1234567890", Version::new(1, 2, 3), Version::default())
        .with_reply(CommandId::LOCK_SET, vec![0])
        .with_reply(CommandId::STATUS, vec![0, 87])
}

fn manager(watch: &VirtualDevice, driver: Option<Arc<Recorder>>) -> Manager<VirtualTransport> {
    let mut registry = Registry::builtin();
    if let Some(driver) = driver {
        registry = registry.with_driver(FAMILY_AMBIT, driver);
    }
    Manager::new(
        VirtualTransport::new().with_device(watch.clone()),
        Arc::new(registry),
        Arc::new(LoopbackProtocol),
    )
}

fn first(mgr: &mut Manager<VirtualTransport>) -> DeviceInfo {
    mgr.enumerate().into_iter().next().expect("one device")
}

#[test]
fn test_open_sets_nonblocking_and_runs_init() {
    let watch = ambit2("virt:0");
    let recorder = Arc::new(Recorder::default());
    let mut mgr = manager(&watch, Some(Arc::clone(&recorder)));
    let info = first(&mut mgr);

    let session = mgr.open(&info).expect("open");

    assert!(session.has_handle());
    assert!(watch.is_nonblocking());
    assert_eq!(watch.open_handles(), 1);
    assert_eq!(session.device(), &info);
    assert_eq!(session.driver_name(), Some("recorder"));
    assert_eq!(recorder.calls(), vec!["init 0x0400"]);
}

#[test]
fn test_status_goes_through_driver_and_protocol() {
    let watch = ambit2("virt:0");
    let recorder = Arc::new(Recorder::default());
    let mut mgr = manager(&watch, Some(Arc::clone(&recorder)));
    let info = first(&mut mgr);
    let mut session = mgr.open(&info).expect("open");

    let status = session.status().expect("status");

    assert_eq!(status.charge, 87);
    assert_eq!(session.sequence_no(), 1);
    assert_eq!(watch.commands().last(), Some(&CommandId::STATUS));
}

#[test]
fn test_unsupported_operation_does_not_touch_handle() {
    let watch = ambit2("virt:0");
    let mut mgr = manager(&watch, Some(Arc::new(Recorder::default())));
    let info = first(&mut mgr);
    let mut session = mgr.open(&info).expect("open");
    let writes = watch.writes().len();

    let when = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("date");
    let err = session.date_time_set(&when).expect_err("unsupported");
    assert!(matches!(err, AmbitError::Unsupported("date_time_set")));
    assert!(err.is_unsupported());

    let err = session.gps_orbit_write(&[1, 2, 3]).expect_err("unsupported");
    assert!(matches!(err, AmbitError::Unsupported("gps_orbit_write")));
    assert!(session.personal_settings().is_err());
    assert!(session.gps_orbit_header_read().is_err());

    assert_eq!(watch.writes().len(), writes);
    assert_eq!(session.sequence_no(), 0);
}

#[test]
fn test_unsupported_operation_logs_warning() {
    let watch = ambit2("virt:0");
    let mut mgr = manager(&watch, Some(Arc::new(Recorder::default())));
    let info = first(&mut mgr);
    let mut session = mgr.open(&info).expect("open");
    let when = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("date");

    let (result, log) = common::with_captured_warnings(|| session.date_time_set(&when));

    assert!(result.is_err());
    assert!(log.contains("Driver does not support date_time_set"), "log: {log}");
}

#[test]
fn test_missing_driver_logs_warning() {
    let watch = ambit2("virt:0");
    let mut mgr = manager(&watch, None);
    let info = first(&mut mgr);
    let mut session = mgr.open(&info).expect("open");

    let (result, log) = common::with_captured_warnings(|| session.gps_orbit_header_read());

    assert!(result.is_err());
    assert!(log.contains("Driver does not support gps_orbit_header_read"), "log: {log}");
}

#[test]
fn test_session_without_driver_supports_nothing() {
    let watch = ambit2("virt:0");
    let mut mgr = manager(&watch, None);
    let info = first(&mut mgr);
    let mut session = mgr.open(&info).expect("open");
    let writes = watch.writes().len();

    assert_eq!(session.driver_name(), None);
    assert!(matches!(
        session.status(),
        Err(AmbitError::Unsupported("status_get"))
    ));
    assert!(matches!(
        session.sync_display_show(),
        Err(AmbitError::Unsupported("lock_log"))
    ));
    let mut sink: Vec<LogEntry> = Vec::new();
    assert!(session.log_read(&mut sink).is_err());
    assert!(sink.is_empty());

    session.close();
    assert_eq!(watch.writes().len(), writes);
    assert_eq!(watch.open_handles(), 0);
}

#[test]
fn test_close_runs_unlock_deinit_then_closes_handle() {
    let watch = ambit2("virt:0");
    let recorder = Arc::new(Recorder::default());
    let mut mgr = manager(&watch, Some(Arc::clone(&recorder)));
    let info = first(&mut mgr);
    let mut session = mgr.open(&info).expect("open");

    session.sync_display_show().expect("lock");
    session.close();

    assert_eq!(
        recorder.calls(),
        vec!["init 0x0400", "lock_log true", "lock_log false", "deinit true"]
    );
    assert_eq!(
        watch.commands(),
        vec![CommandId::DEVICE_INFO, CommandId::LOCK_SET, CommandId::LOCK_SET]
    );
    assert_eq!(watch.open_handles(), 0);
}

#[test]
fn test_drop_closes_once() {
    let watch = ambit2("virt:0");
    let recorder = Arc::new(Recorder::default());
    let mut mgr = manager(&watch, Some(Arc::clone(&recorder)));
    let info = first(&mut mgr);

    {
        let _session = mgr.open(&info).expect("open");
    }
    close_session(Some(mgr.open(&info).expect("open")));
    close_session(None);

    let deinits = recorder
        .calls()
        .iter()
        .filter(|c| c.starts_with("deinit"))
        .count();
    assert_eq!(deinits, 2);
    assert_eq!(watch.open_handles(), 0);
}

#[test]
fn test_open_rejects_unusable_descriptors_without_opening() {
    let watch = ambit2("virt:0");
    let recorder = Arc::new(Recorder::default());
    let mut mgr = manager(&watch, Some(Arc::clone(&recorder)));
    let info = first(&mut mgr);
    let opens = watch.opens();

    let no_path = DeviceInfo {
        path: String::new(),
        ..info.clone()
    };
    assert!(matches!(
        mgr.open(&no_path),
        Err(AmbitError::InvalidArgument(_))
    ));

    let unreachable = DeviceInfo {
        access_status: AccessStatus::Unreachable { code: 13 },
        ..info.clone()
    };
    assert!(matches!(
        mgr.open(&unreachable),
        Err(AmbitError::DeviceUnreachable { code: 13, .. })
    ));

    let unsupported = DeviceInfo {
        is_supported: false,
        ..info.clone()
    };
    assert!(matches!(
        mgr.open(&unsupported),
        Err(AmbitError::UnsupportedDevice { .. })
    ));

    let stale = DeviceInfo {
        fw_version: Version::new(1, 0, 0),
        ..info.clone()
    };
    assert!(matches!(
        mgr.open(&stale),
        Err(AmbitError::UnsupportedDevice { .. })
    ));

    assert_eq!(watch.opens(), opens);
    assert!(recorder.calls().is_empty());
}

#[test]
fn test_failed_init_releases_handle() {
    let watch = ambit2("virt:0");
    let recorder = Arc::new(Recorder::failing_init());
    let mut mgr = manager(&watch, Some(Arc::clone(&recorder)));
    let info = first(&mut mgr);

    let err = mgr.open(&info).expect_err("init fails");

    assert!(matches!(err, AmbitError::Protocol(_)));
    assert_eq!(watch.open_handles(), 0);
    assert_eq!(recorder.calls(), vec!["init 0x0400"]);
}

#[test]
fn test_vanished_device_gives_session_without_handle() {
    let watch = ambit2("virt:0");
    let recorder = Arc::new(Recorder::default());
    let mut mgr = manager(&watch, Some(Arc::clone(&recorder)));
    let info = first(&mut mgr);
    let _ = watch.clone().unopenable(None);

    let mut session = mgr.open(&info).expect("open");

    assert!(!session.has_handle());
    assert!(matches!(
        session.status(),
        Err(AmbitError::TransportUnavailable(_))
    ));
    session.close();
    assert_eq!(recorder.calls().last().map(String::as_str), Some("deinit true"));
}

#[test]
fn test_log_read_honours_skip() {
    struct SkipFirst(Vec<LogEntry>, Vec<u8>);

    impl LogSink for SkipFirst {
        fn skip(&mut self, header: &LogHeader) -> bool {
            header.activity_name == "move 0"
        }

        fn push(&mut self, entry: LogEntry) {
            self.0.push(entry);
        }

        fn progress(&mut self, _log_count: u16, _log_current: u16, percent: u8) {
            self.1.push(percent);
        }
    }

    let watch = ambit2("virt:0");
    let mut mgr = manager(&watch, Some(Arc::new(Recorder::default())));
    let info = first(&mut mgr);
    let mut session = mgr.open(&info).expect("open");

    let mut sink = SkipFirst(Vec::new(), Vec::new());
    let read = session.log_read(&mut sink).expect("log read");

    assert_eq!(read, 2);
    let names: Vec<&str> = sink.0.iter().map(|e| e.header.activity_name.as_str()).collect();
    assert_eq!(names, vec!["move 1", "move 2"]);
    assert_eq!(sink.1, vec![66, 100]);
}

#[test]
fn test_open_path_finds_enumerated_device() {
    let watch = ambit2("virt:7");
    let mut mgr = manager(&watch, Some(Arc::new(Recorder::default())));

    let session = mgr.open_path("virt:7").expect("open");
    assert_eq!(session.device().path, "virt:7");
    drop(session);

    assert!(matches!(
        mgr.open_path("virt:missing"),
        Err(AmbitError::DeviceNotFound(_))
    ));
    assert!(matches!(
        mgr.open_path(""),
        Err(AmbitError::InvalidArgument(_))
    ));
    assert_eq!(watch.open_handles(), 0);
}

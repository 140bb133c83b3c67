//! List every HID device the OS reports and mark the ones the registry knows.
//!
//! Usage: `cargo run --example diagnose [-- registry.toml]`

use ambit_hid::backends::hid::HidTransport;
use ambit_hid::backends::Transport;
use ambit_hid::wide::wcs_to_utf8;
use ambit_hid::{logger, Registry, RegistryConfig, PRODUCT_NAME_LENGTH, SERIAL_LENGTH};
use serde_json::json;

fn main() {
    logger::init("info");

    let mut registry = Registry::builtin();
    if let Some(path) = std::env::args().nth(1) {
        let config = RegistryConfig::load(&path).expect("load registry config");
        registry
            .extend_from_config(&config, |_| None)
            .expect("apply registry config");
    }

    let mut transport = HidTransport::new().expect("init hidapi");
    let records = transport.enumerate_raw().expect("list HID devices");
    println!("Discovered {} HID device(s)", records.len());

    for raw in &records {
        let known = registry.is_known(raw.vendor_id, raw.product_id);
        let name = raw
            .product_string
            .as_deref()
            .map(|s| wcs_to_utf8(s, PRODUCT_NAME_LENGTH))
            .unwrap_or_default();
        let serial = raw
            .serial_number
            .as_deref()
            .map(|s| wcs_to_utf8(s, SERIAL_LENGTH))
            .unwrap_or_default();
        let line = json!({
            "path": raw.path,
            "vid": format!("{:04x}", raw.vendor_id),
            "pid": format!("{:04x}", raw.product_id),
            "product": name,
            "serial": serial,
            "known": known,
            "access_error": transport.probe_access(&raw.path).err().map(|e| e.to_string()),
        });
        println!("{line}");
    }
}

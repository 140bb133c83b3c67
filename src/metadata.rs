//! Device descriptor.
//!
//! [`DeviceInfo`] is a self-contained, cloneable record of one discovered
//! watch, suitable for UI display, logging and persistence. The enumerator
//! builds it once and never changes it afterwards.
//!
//! # Conventions
//! - `path` is the OS path the transport opens. It is opaque and may change
//!   across ports and reconnects; treat it as diagnostic first, identity second.
//! - `model`, `serial` and the versions come from the firmware identity reply.
//!   They stay empty/zero when the device could not be identified.
//! - `name` is the OS product string until the capability registry supplies a
//!   canonical name.
//! - `vendor_id`/`product_id` plus `serial` are stable and useful for
//!   re-identification.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use ambit_hid::{backends::hid::HidTransport, Manager, Protocol, Registry};
//!
//! fn list(protocol: Arc<dyn Protocol>) -> ambit_hid::Result<()> {
//!     let transport = HidTransport::new()?;
//!     let mut mgr = Manager::new(transport, Arc::new(Registry::builtin()), protocol);
//!     for info in mgr.enumerate() {
//!         println!("{info}");
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::Version;

/// Error code recorded when the platform gives no specific one.
pub const UNKNOWN_ACCESS_ERROR: i32 = -1;

/// Whether the enumerator could reach the device at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessStatus {
    /// The device could be opened, or at least read/write access exists.
    #[default]
    Reachable,
    /// Opening failed; `code` is the platform error (errno on Unix).
    Unreachable { code: i32 },
}

impl AccessStatus {
    /// C-style status: `0` when reachable, the platform error code otherwise.
    pub fn code(&self) -> i32 {
        match self {
            AccessStatus::Reachable => 0,
            AccessStatus::Unreachable { code } => *code,
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, AccessStatus::Reachable)
    }

    pub(crate) fn from_io(err: &std::io::Error) -> Self {
        AccessStatus::Unreachable {
            code: err.raw_os_error().unwrap_or(UNKNOWN_ACCESS_ERROR),
        }
    }
}

/// One enumerated watch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// OS path of the HID device. Unique within one catalogue.
    pub path: String,

    /// USB Vendor ID.
    pub vendor_id: u16,

    /// USB Product ID.
    pub product_id: u16,

    /// Display name: canonical registry name, else the OS product string.
    pub name: String,

    /// Serial number as reported by the firmware.
    pub serial: String,

    /// Model code name as reported by the firmware (e.g. `"Duck"`).
    pub model: String,

    pub fw_version: Version,

    pub hw_version: Version,

    /// `true` only when the registry knows this model/firmware and supports it.
    pub is_supported: bool,

    pub access_status: AccessStatus,
}

impl DeviceInfo {
    /// `true` when a session can be opened from this descriptor.
    pub fn is_usable(&self) -> bool {
        self.is_supported && self.access_status.is_reachable()
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: '{}' (serial: {}, VID/PID: {:04x}/{:04x}, nick: {}, F/W: {}, H/W: {}, supported: {})",
            self.path,
            self.name,
            self.serial,
            self.vendor_id,
            self.product_id,
            self.model,
            self.fw_version,
            self.hw_version,
            if self.is_supported { "YES" } else { "NO" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_status_codes() {
        assert_eq!(AccessStatus::Reachable.code(), 0);
        assert_eq!(AccessStatus::Unreachable { code: 13 }.code(), 13);
        let err = std::io::Error::from_raw_os_error(2);
        assert_eq!(AccessStatus::from_io(&err), AccessStatus::Unreachable { code: 2 });
        let err = std::io::Error::new(std::io::ErrorKind::Other, "no code");
        assert_eq!(AccessStatus::from_io(&err).code(), UNKNOWN_ACCESS_ERROR);
    }

    #[test]
    fn display_summarises_identity() {
        let info = DeviceInfo {
            path: "/dev/hidraw2".into(),
            vendor_id: 0x1493,
            product_id: 0x0019,
            name: "Suunto Ambit2".into(),
            serial: "000111222".into(),
            model: "Duck".into(),
            fw_version: Version::new(2, 4, 89),
            hw_version: Version::new(4, 0, 0),
            is_supported: true,
            access_status: AccessStatus::Reachable,
        };
        assert_eq!(
            info.to_string(),
            "/dev/hidraw2: 'Suunto Ambit2' (serial: 000111222, VID/PID: 1493/0019, nick: Duck, F/W: 2.4.89, H/W: 4.0.0, supported: YES)"
        );
        assert!(info.is_usable());
    }

    #[test]
    fn serializes_to_json() {
        let info = DeviceInfo {
            path: "/dev/hidraw0".into(),
            access_status: AccessStatus::Unreachable { code: 13 },
            ..DeviceInfo::default()
        };
        let json = serde_json::to_value(&info).expect("serialize");
        assert_eq!(json["path"], "/dev/hidraw0");
        assert_eq!(json["access_status"]["Unreachable"]["code"], 13);
        assert_eq!(json["is_supported"], false);

        let back: DeviceInfo = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, info);
    }
}

//! Transport backends.
//!
//! The core talks to hardware through two small traits:
//! - [`Transport`] lists raw HID records and opens handles by system path;
//! - [`HidHandle`] is one open device. Closing a handle is dropping it.
//!
//! # Backends
//! - **`hid`** (feature, default): [`hid::HidTransport`] over `hidapi`.
//! - [`virtual_hid`]: in-memory devices with scripted replies, used by tests
//!   and for bring-up without hardware.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::wide::WideChar;

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;
pub mod virtual_hid;

/// One device record as reported by the OS, before any filtering.
///
/// Strings are kept as raw wide characters; converting them is the
/// enumerator's job.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDeviceInfo {
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_string: Option<Vec<WideChar>>,
    pub serial_number: Option<Vec<WideChar>>,
}

/// An open HID device.
pub trait HidHandle {
    /// Switch between blocking and non-blocking reads.
    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()>;

    /// Read one input report. Returns `0` when nothing is pending in
    /// non-blocking mode.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read one input report, waiting at most `timeout_ms` (`-1` blocks).
    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;

    /// Write one output report.
    fn write(&mut self, data: &[u8]) -> Result<usize>;
}

/// Source of raw device records and handles.
pub trait Transport {
    /// List every attached HID device.
    fn enumerate_raw(&mut self) -> Result<Vec<RawDeviceInfo>>;

    /// Open a device by system path.
    fn open(&self, path: &str) -> Result<Box<dyn HidHandle>>;

    /// Open the path for plain read/write access, bypassing the HID layer.
    ///
    /// Used only to explain why [`Transport::open`] failed; the error carries
    /// the platform error code.
    fn probe_access(&self, path: &str) -> std::io::Result<()> {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map(drop)
    }
}

//! `hidapi` transport.
//!
//! [`HidTransport`] owns one `hidapi::HidApi` context. Each enumeration
//! refreshes the device list so hot-plugged watches show up, and each open
//! goes through `HidApi::open_path` with the system path the enumerator saw.

use std::ffi::CString;

use hidapi::{DeviceInfo, HidApi, HidDevice, HidError};
use tracing::debug;

use crate::backends::{HidHandle, RawDeviceInfo, Transport};
use crate::error::{AmbitError, Result};
use crate::wide::{to_wide, WideChar};

pub struct HidTransport {
    api: HidApi,
}

impl HidTransport {
    /// Initialise the `hidapi` context.
    pub fn new() -> Result<Self> {
        let api = HidApi::new().map_err(hid_error)?;
        Ok(Self { api })
    }
}

impl Transport for HidTransport {
    fn enumerate_raw(&mut self) -> Result<Vec<RawDeviceInfo>> {
        self.api.refresh_devices().map_err(hid_error)?;
        Ok(self.api.device_list().map(raw_info).collect())
    }

    fn open(&self, path: &str) -> Result<Box<dyn HidHandle>> {
        let c_path =
            CString::new(path).map_err(|_| AmbitError::InvalidArgument("device path contains NUL"))?;
        let device = self.api.open_path(&c_path).map_err(hid_error)?;
        debug!(path, "opened HID device");
        Ok(Box::new(HidapiHandle { device }))
    }
}

/// An open `hidapi` device. Dropping it closes the OS handle.
struct HidapiHandle {
    device: HidDevice,
}

impl HidHandle for HidapiHandle {
    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        self.device.set_blocking_mode(!nonblocking).map_err(hid_error)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.device.read(buf).map_err(hid_error)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        self.device.read_timeout(buf, timeout_ms).map_err(hid_error)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.device.write(data).map_err(hid_error)
    }
}

fn hid_error(err: HidError) -> AmbitError {
    AmbitError::Hid(err.to_string())
}

/// Copy the fields the enumerator needs out of a `hidapi` record.
///
/// `hidapi` hands out a `&str` when the OS string decoded cleanly and the raw
/// `wchar_t` units otherwise; both end up as [`WideChar`] vectors so the
/// bounded converter sees exactly what the OS reported.
fn raw_info(info: &DeviceInfo) -> RawDeviceInfo {
    let product_string = match info.product_string() {
        Some(text) => Some(to_wide(text)),
        None => info
            .product_string_raw()
            .map(|raw| raw.iter().map(|&unit| unit as WideChar).collect()),
    };
    let serial_number = match info.serial_number() {
        Some(text) => Some(to_wide(text)),
        None => info
            .serial_number_raw()
            .map(|raw| raw.iter().map(|&unit| unit as WideChar).collect()),
    };

    RawDeviceInfo {
        path: info.path().to_string_lossy().into_owned(),
        vendor_id: info.vendor_id(),
        product_id: info.product_id(),
        product_string,
        serial_number,
    }
}

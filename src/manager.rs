//! Discovery and session entry points.
//!
//! [`Manager`] ties a [`Transport`] to the capability [`Registry`] and a
//! [`Protocol`]. [`Manager::enumerate`] scans the bus and identifies every
//! known watch; [`Manager::open`] and [`Manager::open_path`] turn a descriptor
//! into a [`Session`].
//!
//! The catalogue comes back in reverse discovery order. Do not rely on it
//! matching the order the OS reported devices in.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::backends::{RawDeviceInfo, Transport};
use crate::error::{AmbitError, Result};
use crate::identity::{IdentityProbe, PRODUCT_NAME_LENGTH, SERIAL_LENGTH};
use crate::metadata::{AccessStatus, DeviceInfo};
use crate::protocol::Protocol;
use crate::registry::Registry;
use crate::session::Session;
use crate::wide::wcs_to_utf8;

pub struct Manager<T: Transport> {
    transport: T,
    registry: Arc<Registry>,
    protocol: Arc<dyn Protocol>,
}

impl<T: Transport> Manager<T> {
    pub fn new(transport: T, registry: Arc<Registry>, protocol: Arc<dyn Protocol>) -> Self {
        Self {
            transport,
            registry,
            protocol,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Scan for watches and identify each one.
    ///
    /// Never fails: per-device problems are recorded in the descriptor and
    /// logged, and a failed scan yields an empty catalogue.
    pub fn enumerate(&mut self) -> Vec<DeviceInfo> {
        let raw = match self.transport.enumerate_raw() {
            Ok(raw) => raw,
            Err(err) => {
                error!(%err, "HID: device scan failed");
                Vec::new()
            }
        };
        if raw.is_empty() {
            warn!("HID: no USB HID devices found");
        }

        let mut catalogue = Vec::new();
        for record in &raw {
            if !self.registry.is_known(record.vendor_id, record.product_id) {
                debug!(
                    path = %record.path,
                    "ignoring {:04x}/{:04x}",
                    record.vendor_id,
                    record.product_id
                );
                continue;
            }
            let info = self.identify(record);
            info!(
                "{}: '{}' (serial: {}, VID/PID: {:04x}/{:04x}, nick: {}, F/W: {}, H/W: {}, supported: {})",
                info.path,
                info.name,
                info.serial,
                info.vendor_id,
                info.product_id,
                info.model,
                info.fw_version,
                info.hw_version,
                if info.is_supported { "YES" } else { "NO" }
            );
            catalogue.push(info);
        }
        catalogue.reverse();
        catalogue
    }

    fn identify(&self, record: &RawDeviceInfo) -> DeviceInfo {
        let os_name = record
            .product_string
            .as_deref()
            .map(|s| wcs_to_utf8(s, PRODUCT_NAME_LENGTH))
            .unwrap_or_default();
        let os_serial = record
            .serial_number
            .as_deref()
            .map(|s| wcs_to_utf8(s, SERIAL_LENGTH))
            .unwrap_or_default();

        let mut info = DeviceInfo {
            path: record.path.clone(),
            vendor_id: record.vendor_id,
            product_id: record.product_id,
            name: os_name.clone(),
            ..DeviceInfo::default()
        };

        debug!(path = %record.path, "opening for identification");
        match self.transport.open(&record.path) {
            Ok(handle) => {
                let mut probe = IdentityProbe::new(handle);
                match probe.query(self.protocol.as_ref()) {
                    Ok(identity) => {
                        info.model = identity.model;
                        info.serial = identity.serial;
                        info.fw_version = identity.fw_version;
                        info.hw_version = identity.hw_version;

                        if !os_serial.is_empty() && os_serial != info.serial {
                            info!(
                                "preferring F/W serial number over '{}' ('{}')",
                                os_serial, info.serial
                            );
                        }

                        match self.registry.find(
                            info.vendor_id,
                            info.product_id,
                            &info.model,
                            &info.fw_version,
                        ) {
                            Some(known) => {
                                info.is_supported = known.supported;
                                if os_name != known.name {
                                    info!(
                                        "preferring known device name over '{}' ('{}')",
                                        os_name, known.name
                                    );
                                }
                                info.name = known.name.clone();
                            }
                            None => {
                                debug!(model = %info.model, fw = %info.fw_version, "no registry entry");
                            }
                        }
                    }
                    Err(err) => {
                        error!(path = %record.path, %err, "cannot identify device");
                    }
                }
                probe.close();
            }
            Err(err) => {
                debug!(path = %record.path, %err, "HID open failed, checking raw access");
                match self.transport.probe_access(&record.path) {
                    Ok(()) => warn!(
                        "have read/write access to {} but cannot open HID device",
                        record.path
                    ),
                    Err(io) => {
                        info.access_status = AccessStatus::from_io(&io);
                        error!(path = %record.path, code = info.access_status.code(), "cannot open HID device: {io}");
                    }
                }
            }
        }
        info
    }

    /// Open a session on an enumerated watch.
    pub fn open(&self, device: &DeviceInfo) -> Result<Session> {
        Session::open(
            &self.transport,
            &self.registry,
            Arc::clone(&self.protocol),
            device,
        )
    }

    /// Enumerate, then open the watch at `path`.
    pub fn open_path(&mut self, path: &str) -> Result<Session> {
        if path.is_empty() {
            error!("cannot open session: empty path");
            return Err(AmbitError::InvalidArgument("device path"));
        }
        let catalogue = self.enumerate();
        match catalogue.iter().find(|info| info.path == path) {
            Some(info) => self.open(info),
            None => {
                error!(path, "no such device");
                Err(AmbitError::DeviceNotFound(path.to_string()))
            }
        }
    }
}

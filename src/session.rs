//! Open connection to one watch.
//!
//! A [`Session`] owns the transport handle, a copy of the descriptor it was
//! opened from, and the driver the registry resolved for it. Every
//! high-level operation goes through one dispatch path: if the driver
//! implements the hook it runs, otherwise the caller gets
//! [`AmbitError::Unsupported`] and a warning is logged.
//!
//! The handle may legitimately be missing (the watch was unplugged between
//! enumeration and open). That is not an error here; commands on such a
//! session fail in [`Link::command`].
//!
//! Closing runs in a fixed order: clear the log lock (best effort), driver
//! `deinit`, close the handle, release the descriptor copy. It happens once,
//! either through [`Session::close`] or when the session is dropped.

use std::any::Any;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};

use crate::backends::{HidHandle, Transport};
use crate::driver::{DeviceStatus, Driver, PersonalSettings};
use crate::error::{AmbitError, Result};
use crate::log_entry::LogSink;
use crate::metadata::{AccessStatus, DeviceInfo};
use crate::protocol::{CommandId, Protocol};
use crate::registry::Registry;

/// The part of a session a driver works with.
pub struct Link {
    handle: Option<Box<dyn HidHandle>>,
    sequence_no: u16,
    device: DeviceInfo,
    protocol: Arc<dyn Protocol>,
    /// Per-connection state owned by the driver. Cleared on close.
    pub driver_data: Option<Box<dyn Any + Send>>,
}

impl Link {
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub fn sequence_no(&self) -> u16 {
        self.sequence_no
    }

    /// Raw access to the handle, for drivers that bypass the protocol layer.
    pub fn handle_mut(&mut self) -> Option<&mut (dyn HidHandle + 'static)> {
        self.handle.as_deref_mut()
    }

    /// One protocol round trip over this connection.
    pub fn command(&mut self, command: CommandId, payload: &[u8]) -> Result<Vec<u8>> {
        let handle = self.handle.as_deref_mut().ok_or_else(|| {
            AmbitError::TransportUnavailable(format!("{} has no open handle", self.device.path))
        })?;
        self.protocol
            .command(handle, &mut self.sequence_no, command, payload)
    }
}

pub struct Session {
    link: Link,
    driver: Option<Arc<dyn Driver>>,
    closed: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.link.device)
            .field("has_handle", &self.link.has_handle())
            .field("driver", &self.driver.as_ref().map(|d| d.name()))
            .field("closed", &self.closed)
            .finish()
    }
}

impl Session {
    /// Open a session for an enumerated descriptor.
    ///
    /// All-or-nothing: on error no handle stays open and no driver hook has
    /// run except a failed `init`.
    pub(crate) fn open(
        transport: &dyn Transport,
        registry: &Registry,
        protocol: Arc<dyn Protocol>,
        device: &DeviceInfo,
    ) -> Result<Session> {
        if device.path.is_empty() {
            error!("cannot open session: descriptor has no path");
            return Err(AmbitError::InvalidArgument("device path"));
        }
        if let AccessStatus::Unreachable { code } = device.access_status {
            error!(path = %device.path, code, "cannot open session: device is not reachable");
            return Err(AmbitError::DeviceUnreachable {
                path: device.path.clone(),
                code,
            });
        }
        let unsupported = || AmbitError::UnsupportedDevice {
            vendor_id: device.vendor_id,
            product_id: device.product_id,
            model: device.model.clone(),
        };
        if !device.is_supported {
            error!(path = %device.path, model = %device.model, "cannot open session: device is not supported");
            return Err(unsupported());
        }
        let known = match registry.find(
            device.vendor_id,
            device.product_id,
            &device.model,
            &device.fw_version,
        ) {
            Some(known) if known.supported => known,
            _ => {
                error!(path = %device.path, model = %device.model, fw = %device.fw_version, "cannot open session: no supported registry entry");
                return Err(unsupported());
            }
        };

        let mut handle = match transport.open(&device.path) {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(path = %device.path, %err, "cannot open HID device; session has no handle");
                None
            }
        };
        if let Some(handle) = handle.as_mut() {
            if let Err(err) = handle.set_nonblocking(true) {
                warn!(path = %device.path, %err, "cannot set non-blocking mode");
            }
        }

        let mut link = Link {
            handle,
            sequence_no: 0,
            device: device.clone(),
            protocol,
            driver_data: None,
        };
        let driver = known.driver.clone();
        if let Some(driver) = &driver {
            if let Err(err) = driver.init(&mut link, known.driver_param) {
                error!(path = %device.path, driver = driver.name(), %err, "driver init failed");
                return Err(err);
            }
        }
        info!(path = %device.path, name = %device.name, driver = driver.as_ref().map(|d| d.name()), "session opened");

        Ok(Session {
            link,
            driver,
            closed: false,
        })
    }

    /// Descriptor copy this session was opened from.
    pub fn device(&self) -> &DeviceInfo {
        self.link.device()
    }

    pub fn has_handle(&self) -> bool {
        self.link.has_handle()
    }

    pub fn sequence_no(&self) -> u16 {
        self.link.sequence_no()
    }

    pub fn driver_name(&self) -> Option<&str> {
        self.driver.as_deref().map(|d| d.name())
    }

    /// Show the sync message on the watch and lock its log.
    pub fn sync_display_show(&mut self) -> Result<()> {
        self.dispatch("lock_log", |driver, link| driver.lock_log(link, true))
    }

    /// Clear the sync message and release the log lock.
    pub fn sync_display_clear(&mut self) -> Result<()> {
        self.dispatch("lock_log", |driver, link| driver.lock_log(link, false))
    }

    pub fn date_time_set(&mut self, date_time: &NaiveDateTime) -> Result<()> {
        self.dispatch("date_time_set", |driver, link| driver.date_time_set(link, date_time))
    }

    pub fn status(&mut self) -> Result<DeviceStatus> {
        self.dispatch("status_get", |driver, link| driver.status_get(link))
    }

    pub fn personal_settings(&mut self) -> Result<PersonalSettings> {
        self.dispatch("personal_settings_get", |driver, link| {
            driver.personal_settings_get(link)
        })
    }

    pub fn gps_orbit_header_read(&mut self) -> Result<[u8; 8]> {
        self.dispatch("gps_orbit_header_read", |driver, link| {
            driver.gps_orbit_header_read(link)
        })
    }

    pub fn gps_orbit_write(&mut self, data: &[u8]) -> Result<()> {
        self.dispatch("gps_orbit_write", |driver, link| driver.gps_orbit_write(link, data))
    }

    /// Read moves into `sink`; returns how many entries were pushed.
    pub fn log_read(&mut self, sink: &mut dyn LogSink) -> Result<usize> {
        self.dispatch("log_read", |driver, link| driver.log_read(link, sink))
    }

    /// Close the session now instead of at drop.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn dispatch<T>(
        &mut self,
        op: &'static str,
        call: impl FnOnce(&dyn Driver, &mut Link) -> Result<T>,
    ) -> Result<T> {
        let Some(driver) = self.driver.as_deref() else {
            warn!("Driver does not support {op}");
            return Err(AmbitError::Unsupported(op));
        };
        let result = call(driver, &mut self.link);
        match &result {
            Err(err) if err.is_unsupported() => warn!("Driver does not support {op}"),
            Err(err) => warn!(op, driver = driver.name(), %err, "operation failed"),
            Ok(_) => {}
        }
        result
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        info!(path = %self.link.device.path, "Closing");

        if let Some(driver) = self.driver.take() {
            // The watch may already be gone; a failed unlock is not worth reporting.
            if let Err(err) = driver.lock_log(&mut self.link, false) {
                debug!(%err, "log lock not cleared on close");
            }
            driver.deinit(&mut self.link);
        }
        self.link.driver_data = None;
        self.link.handle = None;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Close a session if there is one. `None` is a no-op.
pub fn close_session(session: Option<Session>) {
    if let Some(session) = session {
        session.close();
    }
}

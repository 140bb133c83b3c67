//! In-memory HID devices.
//!
//! A [`VirtualDevice`] answers commands from a reply table instead of real
//! hardware. Writes are recorded, reads return the reply queued for the last
//! command, and open/close activity is counted so callers can check exactly
//! what the core did with a handle. Clones of a `VirtualDevice` share state,
//! so a test keeps one clone for inspection and hands the other to a
//! [`VirtualTransport`].
//!
//! [`LoopbackProtocol`] is the matching framing: a little-endian command id,
//! the sequence number, then the payload. It exists to drive the core end to
//! end and makes no claim about what real watches speak.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backends::{HidHandle, RawDeviceInfo, Transport};
use crate::error::{AmbitError, Result};
use crate::identity::{Version, IDENTITY_REPLY_LENGTH, MODEL_NAME_LENGTH, SERIAL_LENGTH};
use crate::protocol::{CommandId, Protocol};
use crate::wide::{to_wide, WideChar};

/// Bytes preceding the payload in a loopback frame.
pub const FRAME_HEADER_LENGTH: usize = 6;

const MAX_REPLY_LENGTH: usize = 4096;

#[derive(Default)]
struct DeviceState {
    hid_open_fails: bool,
    access_error: Option<i32>,
    replies: HashMap<u32, Vec<u8>>,
    pending: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    opens: usize,
    closes: usize,
    nonblocking: bool,
}

/// A scripted device. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct VirtualDevice {
    info: RawDeviceInfo,
    state: Arc<Mutex<DeviceState>>,
}

impl VirtualDevice {
    pub fn new(vendor_id: u16, product_id: u16, path: impl Into<String>) -> Self {
        Self {
            info: RawDeviceInfo {
                path: path.into(),
                vendor_id,
                product_id,
                product_string: None,
                serial_number: None,
            },
            state: Arc::new(Mutex::new(DeviceState::default())),
        }
    }

    pub fn with_product_string(mut self, name: &str) -> Self {
        self.info.product_string = Some(to_wide(name));
        self
    }

    /// Report raw wide units as the OS product string, valid or not.
    pub fn with_raw_product_string(mut self, units: Vec<WideChar>) -> Self {
        self.info.product_string = Some(units);
        self
    }

    pub fn with_serial_number(mut self, serial: &str) -> Self {
        self.info.serial_number = Some(to_wide(serial));
        self
    }

    /// Answer `command` with `reply`.
    pub fn with_reply(self, command: CommandId, reply: Vec<u8>) -> Self {
        self.lock().replies.insert(command.0, reply);
        self
    }

    /// Answer the device-info command with a well-formed identity block.
    pub fn with_identity(self, model: &str, serial: &str, fw: Version, hw: Version) -> Self {
        self.with_reply(CommandId::DEVICE_INFO, identity_reply(model, serial, fw, hw))
    }

    /// Make HID opens fail. With `Some(code)` a raw read/write open fails too,
    /// with that platform error code; with `None` raw access succeeds.
    pub fn unopenable(self, access_error: Option<i32>) -> Self {
        {
            let mut state = self.lock();
            state.hid_open_fails = true;
            state.access_error = access_error;
        }
        self
    }

    pub fn info(&self) -> &RawDeviceInfo {
        &self.info
    }

    pub fn path(&self) -> &str {
        &self.info.path
    }

    /// Number of handles opened so far.
    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    /// Number of handles closed (dropped) so far.
    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    /// Handles currently open.
    pub fn open_handles(&self) -> usize {
        let state = self.lock();
        state.opens - state.closes
    }

    /// Every report written to this device, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Command ids of every loopback frame written, in order.
    pub fn commands(&self) -> Vec<CommandId> {
        self.lock()
            .writes
            .iter()
            .filter_map(|frame| frame_command(frame))
            .collect()
    }

    pub fn is_nonblocking(&self) -> bool {
        self.lock().nonblocking
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Build a device-info reply with the fixed identity layout.
pub fn identity_reply(model: &str, serial: &str, fw: Version, hw: Version) -> Vec<u8> {
    let mut out = Vec::with_capacity(IDENTITY_REPLY_LENGTH);
    out.extend(padded(model.as_bytes(), MODEL_NAME_LENGTH));
    out.extend(padded(serial.as_bytes(), SERIAL_LENGTH));
    out.extend_from_slice(&fw.0);
    out.extend_from_slice(&hw.0);
    out
}

fn padded(text: &[u8], width: usize) -> impl Iterator<Item = u8> + '_ {
    text.iter()
        .copied()
        .chain(std::iter::repeat(0))
        .take(width)
}

fn frame_command(frame: &[u8]) -> Option<CommandId> {
    let id = frame.get(..4)?;
    Some(CommandId(u32::from_le_bytes([id[0], id[1], id[2], id[3]])))
}

struct VirtualHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl VirtualHandle {
    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl HidHandle for VirtualHandle {
    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        self.lock().nonblocking = nonblocking;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock();
        let Some(reply) = state.pending.pop_front() else {
            return Ok(0);
        };
        let n = reply.len().min(buf.len());
        buf[..n].copy_from_slice(&reply[..n]);
        Ok(n)
    }

    fn read_timeout(&mut self, buf: &mut [u8], _timeout_ms: i32) -> Result<usize> {
        self.read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut state = self.lock();
        state.writes.push(data.to_vec());
        if let Some(command) = frame_command(data) {
            if let Some(reply) = state.replies.get(&command.0).cloned() {
                state.pending.push_back(reply);
            }
        }
        Ok(data.len())
    }
}

impl Drop for VirtualHandle {
    fn drop(&mut self) {
        self.lock().closes += 1;
    }
}

/// Transport over a fixed set of [`VirtualDevice`]s.
#[derive(Clone, Default)]
pub struct VirtualTransport {
    devices: Vec<VirtualDevice>,
    enumerate_fails: bool,
}

impl VirtualTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&mut self, device: VirtualDevice) {
        self.devices.push(device);
    }

    pub fn with_device(mut self, device: VirtualDevice) -> Self {
        self.add_device(device);
        self
    }

    /// Make [`Transport::enumerate_raw`] fail.
    pub fn failing_enumeration(mut self) -> Self {
        self.enumerate_fails = true;
        self
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn find(&self, path: &str) -> Option<&VirtualDevice> {
        self.devices.iter().find(|d| d.info.path == path)
    }
}

impl Transport for VirtualTransport {
    fn enumerate_raw(&mut self) -> Result<Vec<RawDeviceInfo>> {
        if self.enumerate_fails {
            return Err(AmbitError::Hid("enumeration failed".into()));
        }
        Ok(self.devices.iter().map(|d| d.info.clone()).collect())
    }

    fn open(&self, path: &str) -> Result<Box<dyn HidHandle>> {
        let device = self
            .find(path)
            .ok_or_else(|| AmbitError::DeviceNotFound(path.to_string()))?;
        let mut state = device.lock();
        if state.hid_open_fails {
            return Err(AmbitError::TransportUnavailable(format!("cannot open {path}")));
        }
        state.opens += 1;
        drop(state);
        Ok(Box::new(VirtualHandle {
            state: Arc::clone(&device.state),
        }))
    }

    fn probe_access(&self, path: &str) -> io::Result<()> {
        let device = self
            .find(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        match device.lock().access_error {
            Some(code) => Err(io::Error::from_raw_os_error(code)),
            None => Ok(()),
        }
    }
}

/// Frame layout: `command (u32 LE) | sequence (u16 LE) | payload`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoopbackProtocol;

impl Protocol for LoopbackProtocol {
    fn command(
        &self,
        handle: &mut dyn HidHandle,
        sequence_no: &mut u16,
        command: CommandId,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        let mut frame = Vec::with_capacity(FRAME_HEADER_LENGTH + payload.len());
        frame.extend_from_slice(&command.0.to_le_bytes());
        frame.extend_from_slice(&sequence_no.to_le_bytes());
        frame.extend_from_slice(payload);
        handle.write(&frame)?;
        *sequence_no = sequence_no.wrapping_add(1);

        let mut buf = vec![0u8; MAX_REPLY_LENGTH];
        let n = handle.read_timeout(&mut buf, 1000)?;
        if n == 0 {
            return Err(AmbitError::Protocol(format!(
                "no reply to command {:#06x}",
                command.0
            )));
        }
        buf.truncate(n);
        Ok(buf)
    }
}

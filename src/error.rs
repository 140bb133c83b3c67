//! Error type shared by the enumerator, sessions, drivers and transports.
//!
//! Failures that the core degrades around (a wide string that cannot be
//! converted, a device that cannot be identified during a scan) are logged and
//! never surface here. What does surface is:
//! - invalid caller input,
//! - operations the resolved driver does not implement,
//! - transport and protocol failures,
//! - configuration problems.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AmbitError {
    /// A required input was missing or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The resolved driver does not implement this operation.
    #[error("driver does not support {0}")]
    Unsupported(&'static str),

    /// The device is not in the capability registry, or is listed as unsupported.
    #[error("unsupported device (VID/PID: {vendor_id:04x}/{product_id:04x}, model: {model:?})")]
    UnsupportedDevice {
        vendor_id: u16,
        product_id: u16,
        model: String,
    },

    /// Enumeration recorded a platform error while classifying this device.
    #[error("device {path} is not reachable (os error {code})")]
    DeviceUnreachable { path: String, code: i32 },

    /// No enumerated device has this path.
    #[error("no supported device at {0}")]
    DeviceNotFound(String),

    /// The session has no open handle, or the transport refused to open one.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Error reported by the HID backend.
    #[error("HID error: {0}")]
    Hid(String),

    /// The protocol layer failed a command round trip.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A reply was too short for the fixed layout being decoded.
    #[error("short reply: expected {expected} bytes, got {actual}")]
    ShortReply { expected: usize, actual: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AmbitError {
    /// `true` when the failure means "this driver cannot do that" rather than
    /// "the device reported an error".
    pub fn is_unsupported(&self) -> bool {
        matches!(self, AmbitError::Unsupported(_))
    }
}

pub type Result<T> = std::result::Result<T, AmbitError>;

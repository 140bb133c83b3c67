//! Discovery, identification and session management for Suunto Ambit watches
//! over USB HID.
//!
//! The crate scans the HID bus, asks each known watch who it is, reconciles
//! the answer against a capability [`Registry`], and hands out [`Session`]s
//! that route every operation through the [`Driver`] serving that model.
//!
//! Wire framing and per-model drivers plug in through the [`Protocol`] and
//! [`Driver`] traits; [`backends::virtual_hid`] provides in-memory stand-ins.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ambit_hid::backends::virtual_hid::{LoopbackProtocol, VirtualTransport};
//! use ambit_hid::{Manager, Registry};
//!
//! let mut mgr = Manager::new(
//!     VirtualTransport::new(),
//!     Arc::new(Registry::builtin()),
//!     Arc::new(LoopbackProtocol),
//! );
//! for info in mgr.enumerate().iter().filter(|d| d.is_usable()) {
//!     let session = mgr.open(info)?;
//!     println!("{}", session.device());
//! }
//! # Ok::<(), ambit_hid::AmbitError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backends;
pub mod config;
pub mod driver;
pub mod error;
pub mod identity;
pub mod log_entry;
pub mod logger;
pub mod manager;
pub mod metadata;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod wide;

pub use config::{DeviceEntry, RegistryConfig};
pub use driver::{DeviceStatus, Driver, PersonalSettings};
pub use error::{AmbitError, Result};
pub use identity::{
    DeviceIdentity, Version, IDENTITY_REPLY_LENGTH, KOMPOSTI_VERSION, MODEL_NAME_LENGTH,
    PRODUCT_NAME_LENGTH, SERIAL_LENGTH, VERSION_STRING_LENGTH,
};
pub use log_entry::{release_entry, LogEntry, LogHeader, LogSample, LogSampleKind, LogSink};
pub use manager::Manager;
pub use metadata::{AccessStatus, DeviceInfo};
pub use protocol::{CommandId, Protocol};
pub use registry::{KnownDevice, Registry, SUUNTO_USB_VENDOR_ID};
pub use session::{close_session, Link, Session};

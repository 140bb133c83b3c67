//! Identity reply decoding.
//!
//! Every Ambit answers the device-info command with a fixed layout:
//!
//! | offset | width | field            |
//! |--------|-------|------------------|
//! | 0      | 16    | model name       |
//! | 16     | 16    | serial number    |
//! | 32     | 4     | firmware version |
//! | 36     | 4     | hardware version |
//!
//! The text fields are NUL padded and assumed to be ASCII. The hardware does
//! not guarantee that, so stray bytes are reported and replaced with `?`,
//! which keeps every field within its width.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backends::HidHandle;
use crate::error::{AmbitError, Result};
use crate::protocol::{CommandId, Protocol};

/// Width of the model (code name) field.
pub const MODEL_NAME_LENGTH: usize = 16;
/// Width of the serial number field.
pub const SERIAL_LENGTH: usize = 16;
/// Width of the display name field on a descriptor.
pub const PRODUCT_NAME_LENGTH: usize = 32;
/// Longest rendered version string: `255.255.65535`.
pub const VERSION_STRING_LENGTH: usize = 13;
/// Bytes consumed from an identity reply.
pub const IDENTITY_REPLY_LENGTH: usize = MODEL_NAME_LENGTH + SERIAL_LENGTH + 4 + 4;

/// Host software version sent along with the device-info command.
pub const KOMPOSTI_VERSION: [u8; 4] = [0x02, 0x00, 0x2d, 0x00];

/// Four raw version bytes: major, minor and a little-endian 16-bit build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(pub [u8; 4]);

impl Version {
    pub const fn new(major: u8, minor: u8, build: u16) -> Self {
        let [lo, hi] = build.to_le_bytes();
        Version([major, minor, lo, hi])
    }

    pub fn major(&self) -> u8 {
        self.0[0]
    }

    pub fn minor(&self) -> u8 {
        self.0[1]
    }

    pub fn build(&self) -> u16 {
        u16::from_le_bytes([self.0[2], self.0[3]])
    }

    /// Packed comparable form: `major << 24 | minor << 16 | build`.
    pub fn number(&self) -> u32 {
        (u32::from(self.major()) << 24) | (u32::from(self.minor()) << 16) | u32::from(self.build())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 4]
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.number().cmp(&other.number())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.build())
    }
}

impl FromStr for Version {
    type Err = AmbitError;

    /// Parse `"major.minor.build"`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AmbitError::Config(format!("invalid version string {s:?}"));
        let mut parts = s.trim().split('.');
        let (Some(major), Some(minor), Some(build), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        Ok(Version::new(
            major.parse().map_err(|_| invalid())?,
            minor.parse().map_err(|_| invalid())?,
            build.parse().map_err(|_| invalid())?,
        ))
    }
}

/// Identity as reported by the watch firmware.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub model: String,
    pub serial: String,
    pub fw_version: Version,
    pub hw_version: Version,
}

/// Decode a device-info reply.
///
/// Text fields are copied up to their first NUL (or the full field width).
/// Only a reply too short to hold every field is rejected.
pub fn decode(reply: &[u8]) -> Result<DeviceIdentity> {
    if reply.len() < IDENTITY_REPLY_LENGTH {
        return Err(AmbitError::ShortReply {
            expected: IDENTITY_REPLY_LENGTH,
            actual: reply.len(),
        });
    }
    let (model, rest) = reply.split_at(MODEL_NAME_LENGTH);
    let (serial, rest) = rest.split_at(SERIAL_LENGTH);
    let (fw, rest) = rest.split_at(4);
    let hw = rest.get(..4).unwrap_or_default();

    Ok(DeviceIdentity {
        model: text_field("model", model),
        serial: text_field("serial", serial),
        fw_version: Version(version_bytes(fw)),
        hw_version: Version(version_bytes(hw)),
    })
}

fn text_field(field: &str, raw: &[u8]) -> String {
    let raw = raw.split(|&b| b == 0).next().unwrap_or_default();
    raw.iter()
        .enumerate()
        .map(|(position, &byte)| {
            if byte.is_ascii() {
                char::from(byte)
            } else {
                warn!(field, position, byte, "non-ASCII byte in identity reply");
                '?'
            }
        })
        .collect()
}

fn version_bytes(raw: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    for (dst, src) in out.iter_mut().zip(raw) {
        *dst = *src;
    }
    out
}

/// Identification-only connection: a handle and a fresh sequence counter.
///
/// Used by the enumerator to ask a device who it is before any driver is
/// chosen. Dropping the probe closes the handle.
pub struct IdentityProbe {
    handle: Box<dyn HidHandle>,
    sequence_no: u16,
}

impl IdentityProbe {
    pub fn new(handle: Box<dyn HidHandle>) -> Self {
        Self {
            handle,
            sequence_no: 0,
        }
    }

    /// Run the device-info round trip and decode the reply.
    pub fn query(&mut self, protocol: &dyn Protocol) -> Result<DeviceIdentity> {
        info!("Reading device info");
        let reply = protocol
            .command(
                self.handle.as_mut(),
                &mut self.sequence_no,
                CommandId::DEVICE_INFO,
                &KOMPOSTI_VERSION,
            )
            .map_err(|err| {
                warn!(%err, "Failed to read device info");
                err
            })?;
        decode(&reply)
    }

    pub fn sequence_no(&self) -> u16 {
        self.sequence_no
    }

    /// Close the identification handle.
    pub fn close(self) {
        drop(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reply(model: &[u8], serial: &[u8], fw: [u8; 4], hw: [u8; 4]) -> Vec<u8> {
        let mut out = vec![0u8; IDENTITY_REPLY_LENGTH];
        out[..model.len()].copy_from_slice(model);
        out[MODEL_NAME_LENGTH..MODEL_NAME_LENGTH + serial.len()].copy_from_slice(serial);
        out[32..36].copy_from_slice(&fw);
        out[36..40].copy_from_slice(&hw);
        out
    }

    #[test]
    fn decodes_ambit2_reply() {
        let raw = reply(b"Ambit2", b"000111222", [1, 2, 3, 0], [4, 0, 0, 0]);
        let id = decode(&raw).expect("decode");
        assert_eq!(id.model, "Ambit2");
        assert_eq!(id.serial, "000111222");
        assert_eq!(id.fw_version.to_string(), "1.2.3");
        assert_eq!(id.hw_version.to_string(), "4.0.0");
    }

    #[test]
    fn full_width_fields_are_truncated_to_width() {
        let raw = reply(b"ABCDEFGHIJKLMNOP", b"0123456789abcdef", [0; 4], [0; 4]);
        let id = decode(&raw).expect("decode");
        assert_eq!(id.model, "ABCDEFGHIJKLMNOP");
        assert_eq!(id.serial, "0123456789abcdef");
    }

    #[test]
    fn non_ascii_bytes_become_placeholders() {
        let raw = reply(b"Duck\xe9", b"1", [0; 4], [0; 4]);
        let id = decode(&raw).expect("decode");
        assert_eq!(id.model, "Duck?");
    }

    #[test]
    fn non_ascii_fields_stay_within_width() {
        let mut raw = vec![0xffu8; MODEL_NAME_LENGTH + SERIAL_LENGTH];
        raw.extend_from_slice(&[1, 2, 3, 0, 4, 0, 0, 0]);
        let id = decode(&raw).expect("decode");
        assert_eq!(id.model.len(), MODEL_NAME_LENGTH);
        assert_eq!(id.serial.len(), SERIAL_LENGTH);
        assert!(id.model.chars().all(|c| c == '?'));
        assert_eq!(id.fw_version, Version::new(1, 2, 3));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut raw = reply(b"Emu", b"42", [2, 4, 89, 0], [1, 0, 0, 0]);
        raw.extend_from_slice(&[0xff; 24]);
        let id = decode(&raw).expect("decode");
        assert_eq!(id.model, "Emu");
        assert_eq!(id.fw_version, Version::new(2, 4, 89));
    }

    #[test]
    fn short_reply_is_rejected() {
        let err = decode(&[0u8; 39]).expect_err("too short");
        assert!(matches!(
            err,
            AmbitError::ShortReply {
                expected: 40,
                actual: 39
            }
        ));
    }

    #[test]
    fn version_build_is_little_endian() {
        let v = Version([255, 255, 0xff, 0xff]);
        assert_eq!(v.to_string(), "255.255.65535");
        assert_eq!(v.to_string().len(), VERSION_STRING_LENGTH);
        assert_eq!(Version([1, 9, 0x2c, 0x01]).build(), 300);
    }

    #[test]
    fn versions_order_by_packed_number() {
        assert!(Version::new(2, 0, 0) > Version::new(1, 9, 65535));
        assert!(Version::new(1, 2, 0) > Version::new(1, 1, 300));
        assert_eq!(Version::new(0, 2, 3).number(), 0x0002_0003);
    }

    #[test]
    fn version_parses_dotted_form() {
        assert_eq!("1.2.300".parse::<Version>().expect("parse"), Version::new(1, 2, 300));
        assert!("1.2".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
        assert!("256.0.0".parse::<Version>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_version_text_fits_and_parses_back(raw in any::<[u8; 4]>()) {
            let v = Version(raw);
            let text = v.to_string();
            prop_assert!(text.len() <= VERSION_STRING_LENGTH);
            prop_assert_eq!(text.parse::<Version>().map_err(|e| e.to_string()), Ok(v));
        }

        #[test]
        fn prop_version_order_is_major_minor_build(a in any::<[u8; 4]>(), b in any::<[u8; 4]>()) {
            let (va, vb) = (Version(a), Version(b));
            let key = |v: &Version| (v.major(), v.minor(), v.build());
            prop_assert_eq!(va.cmp(&vb), key(&va).cmp(&key(&vb)));
        }
    }
}

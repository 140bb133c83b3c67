//! Bounded wide-string → UTF-8 conversion.
//!
//! HID stacks report product and serial strings as `wchar_t` sequences: UTF-32
//! on Linux and macOS, UTF-16 on Windows. Descriptor fields are capped at a
//! fixed byte width, so conversion must produce the longest valid UTF-8 text
//! that fits, and must never hand back a half-encoded character.
//!
//! The result equals converting the whole string and, while the output is too
//! large, dropping one trailing wide character and retrying. An invalid or
//! incomplete sequence inside the part that fits yields an empty string; the
//! failure is logged and never propagated, since a garbled OS string must not
//! stop a device from being identified.

use tracing::{debug, error};

/// One OS wide-character unit, widened to 32 bits on every platform.
pub type WideChar = u32;

/// Widen a Rust string for transports that already hold decoded text.
pub fn to_wide(s: &str) -> Vec<WideChar> {
    s.chars().map(WideChar::from).collect()
}

/// Convert a (possibly NUL-terminated) wide string into at most `capacity`
/// bytes of UTF-8.
///
/// The returned `String` is owned by the caller, who typically copies it into
/// a descriptor field and keeps it for comparison against firmware values.
pub fn wcs_to_utf8(src: &[WideChar], capacity: usize) -> String {
    let units = match src.iter().position(|&unit| unit == 0) {
        Some(end) => src.get(..end).unwrap_or(src),
        None => src,
    };

    let mut out = String::with_capacity(capacity.min(units.len().saturating_mul(4)));
    let mut at = 0;
    while at < units.len() && out.len() < capacity {
        let (ch, consumed) = match decode_at(units, at) {
            Ok(decoded) => decoded,
            Err(unit) => {
                error!(
                    position = at,
                    unit,
                    "wide string conversion: invalid or incomplete sequence"
                );
                return String::new();
            }
        };
        if out.len() + ch.len_utf8() > capacity {
            break;
        }
        out.push(ch);
        at += consumed;
    }
    if at < units.len() {
        debug!(capacity, kept = at, total = units.len(), "wide string truncated to fit");
    }
    out
}

/// Decode the character starting at `at`, joining UTF-16 surrogate pairs.
/// Returns the offending unit on failure.
fn decode_at(units: &[WideChar], at: usize) -> Result<(char, usize), WideChar> {
    let unit = units.get(at).copied().ok_or(0u32)?;
    match unit {
        0xD800..=0xDBFF => match units.get(at + 1) {
            Some(&low @ 0xDC00..=0xDFFF) => {
                let scalar = 0x1_0000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                char::from_u32(scalar).map(|c| (c, 2)).ok_or(unit)
            }
            _ => Err(unit),
        },
        _ => char::from_u32(unit).map(|c| (c, 1)).ok_or(unit),
    }
}

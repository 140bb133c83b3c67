//! Command round-trip seam.
//!
//! Framing, chunking, checksums and retries belong to the protocol layer, which
//! the caller supplies. The core only needs "send this command, give me the
//! reply bytes" over an open handle, plus the per-connection sequence counter
//! the framing uses.

use crate::backends::HidHandle;
use crate::error::Result;

/// Numeric command identifier as understood by the watch.
///
/// The core sends only `DEVICE_INFO`; the rest are the known command numbers
/// for driver and protocol implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommandId(pub u32);

impl CommandId {
    pub const DEVICE_INFO: CommandId = CommandId(0x0000);
    pub const TIME: CommandId = CommandId(0x0300);
    pub const DATE: CommandId = CommandId(0x0302);
    pub const STATUS: CommandId = CommandId(0x0306);
    pub const PERSONAL_SETTINGS: CommandId = CommandId(0x0b00);
    pub const LOG_COUNT: CommandId = CommandId(0x0b06);
    pub const LOG_HEAD_FIRST: CommandId = CommandId(0x0b07);
    pub const LOG_HEAD_PEEK: CommandId = CommandId(0x0b08);
    pub const LOG_HEAD_STEP: CommandId = CommandId(0x0b0a);
    pub const LOG_HEAD: CommandId = CommandId(0x0b0b);
    pub const GPS_ORBIT_HEAD: CommandId = CommandId(0x0b15);
    pub const DATA_TAIL_LEN: CommandId = CommandId(0x0b16);
    pub const DATA_READ: CommandId = CommandId(0x0b17);
    pub const DATA_WRITE: CommandId = CommandId(0x0b18);
    pub const LOCK_CHECK: CommandId = CommandId(0x0b19);
    pub const LOCK_SET: CommandId = CommandId(0x0b1a);
    pub const WRITE_START: CommandId = CommandId(0x0b1b);
}

/// One request/reply exchange with the watch.
pub trait Protocol: Send + Sync {
    /// Send `command` with `payload` over `handle` and return the reply payload.
    ///
    /// Implementations advance `sequence_no` for every frame they send.
    fn command(
        &self,
        handle: &mut dyn HidHandle,
        sequence_no: &mut u16,
        command: CommandId,
        payload: &[u8],
    ) -> Result<Vec<u8>>;
}

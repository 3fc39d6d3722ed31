// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error kinds shared by the ASH, EZSP and Green Power layers.

use thiserror::Error;

/// Errors surfaced by the driver.
///
/// Recoverable link-layer errors (CRC mismatches, framing errors) never
/// reach this type: they are handled inside [`crate::ash`] by sending a
/// NAK and discarding the offending frame.
#[derive(Debug, Error)]
pub enum Error {
    /// The UART failed to accept a write, or wrote fewer bytes than asked.
    #[error("UART write failed or was short")]
    UartWrite,

    /// The underlying UART I/O failed.
    #[error("UART I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The RST/RSTACK handshake did not complete in time, or retransmit
    /// attempts for a DATA frame were exhausted.
    #[error("ASH reset handshake failed")]
    AshResetFailed,

    /// A response's `cmd_id` did not match the EZSP command awaiting
    /// acknowledgement.
    #[error("unexpected EZSP response cmd_id={0:#04x}, expected {1:#04x}")]
    UnexpectedEzspResponse(u8, u8),

    /// `cmd_id` does not name a command this crate knows about.
    #[error("unknown EZSP command id {0:#04x}")]
    UnknownEzspCommand(u8),

    /// `add_entry`/`register_gpd` on a full sink table.
    #[error("sink table is full")]
    SinkTableFull,

    /// A frame arrived during commissioning that doesn't fit the expected
    /// sequence; the sink state is left unchanged.
    #[error("protocol violation during commissioning")]
    ProtocolViolation,

    /// The dongle was asked to operate before `open` succeeded.
    #[error("dongle is not open")]
    NotOpen,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

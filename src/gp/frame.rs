// SPDX-License-Identifier: MIT OR Apache-2.0
//! Green Power frame data model, parsed from the body of an EZSP
//! `GPEP_INCOMING_MESSAGE_HANDLER` notification. The field offsets below
//! are a fixed-preamble layout this crate defines for that notification
//! body.

use crate::error::{Error, Result};

/// GPD frame security.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    None,
    ShortMic,
    FullMic,
    Encrypted,
}

impl From<u8> for SecurityLevel {
    fn from(value: u8) -> Self {
        match value {
            0 => SecurityLevel::None,
            1 => SecurityLevel::ShortMic,
            2 => SecurityLevel::FullMic,
            _ => SecurityLevel::Encrypted,
        }
    }
}

/// Commissioning command id: a GP frame with command 0xE0 carries the
/// GPD's identity and key.
pub const GPF_COMMISSIONING_CMD: u8 = 0xE0;
pub const GPF_DECOMMISSIONING_CMD: u8 = 0xE1;

const PREAMBLE_LEN: usize = 15;

/// A decoded GP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpFrame {
    pub source_id: u32,
    pub security_level: SecurityLevel,
    pub frame_counter: u32,
    pub command_id: u8,
    /// The GPD command payload (e.g. the commissioning record for
    /// `GPF_COMMISSIONING_CMD`); the SET_ENTRY/PROXY_PAIRING byte layouts
    /// index directly into this field.
    pub payload: Vec<u8>,
    pub link_quality: u8,
    pub sequence_number: u8,
}

impl GpFrame {
    /// Parses the body of `GPEP_INCOMING_MESSAGE_HANDLER` (status byte
    /// already stripped by the caller is NOT assumed: `raw[0]` is status).
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < PREAMBLE_LEN {
            return Err(Error::ProtocolViolation);
        }
        let link_quality = raw[1];
        let sequence_number = raw[2];
        let source_id = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        let security_level = SecurityLevel::from(raw[8]);
        let frame_counter = u32::from_le_bytes([raw[9], raw[10], raw[11], raw[12]]);
        let command_id = raw[13];
        let payload_len = raw[14] as usize;
        let payload = raw
            .get(PREAMBLE_LEN..PREAMBLE_LEN + payload_len)
            .ok_or(Error::ProtocolViolation)?
            .to_vec();

        Ok(Self {
            source_id,
            security_level,
            frame_counter,
            command_id,
            payload,
            link_quality,
            sequence_number,
        })
    }
}

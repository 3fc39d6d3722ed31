// SPDX-License-Identifier: MIT OR Apache-2.0
//! ASH frame kinds, modeled as a tagged sum rather than an open-ended
//! class hierarchy.

pub const RST_CONTROL: u8 = 0xC0;
pub const RST_ACK_CONTROL: u8 = 0xC1;
const ACK_PREFIX: u8 = 0x80;
const NAK_PREFIX: u8 = 0xA0;
const SEVEN_BIT_MASK: u8 = 0x07;

/// The literal RST byte sequence, sent verbatim with no framing applied.
pub const RST_FRAME: [u8; 5] = [0x1A, 0xC0, 0x38, 0xBC, 0x7E];

/// A decoded ASH frame, after unstuffing/CRC validation but before EZSP
/// randomization has been undone (the caller does that for `Data`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Host -> NCP reset request. The core never receives this.
    Rst,
    /// NCP -> host reset acknowledgement.
    RstAck,
    /// Acknowledges all frames up to (not including) `ack_num`.
    Ack { ack_num: u8 },
    /// Negative-acknowledges: the frame at `ack_num` (mod 8) was corrupt or
    /// out of sequence.
    Nak { ack_num: u8 },
    /// A numbered, payload-bearing frame.
    Data {
        frm_num: u8,
        ack_num: u8,
        retransmit: bool,
        /// Randomized INFO bytes exactly as they arrived on the wire
        /// (still including the 3-byte EZSP header); the caller
        /// de-randomizes.
        info: Vec<u8>,
    },
}

impl Frame {
    /// Builds the control byte for this frame. `Rst`/`RstAck` use their
    /// own fixed constants and are not expected to reach this path.
    #[must_use]
    pub fn control_byte(&self) -> u8 {
        match self {
            Frame::Rst => RST_CONTROL,
            Frame::RstAck => RST_ACK_CONTROL,
            Frame::Ack { ack_num } => ACK_PREFIX | (ack_num & SEVEN_BIT_MASK),
            Frame::Nak { ack_num } => NAK_PREFIX | (ack_num & SEVEN_BIT_MASK),
            Frame::Data {
                frm_num,
                ack_num,
                retransmit,
                ..
            } => {
                ((frm_num & SEVEN_BIT_MASK) << 4)
                    | (u8::from(*retransmit) << 3)
                    | (ack_num & SEVEN_BIT_MASK)
            }
        }
    }

    /// Parses a control byte plus its (still-randomized, for `Data`) INFO
    /// bytes into a `Frame`. `info` must already have had the CRC stripped.
    pub fn parse(control: u8, info: &[u8]) -> Option<Frame> {
        if control == RST_CONTROL {
            return Some(Frame::Rst);
        }
        if control == RST_ACK_CONTROL {
            return Some(Frame::RstAck);
        }
        if control & 0x80 == 0 {
            let frm_num = (control >> 4) & SEVEN_BIT_MASK;
            let retransmit = (control & 0x08) != 0;
            let ack_num = control & SEVEN_BIT_MASK;
            return Some(Frame::Data {
                frm_num,
                ack_num,
                retransmit,
                info: info.to_vec(),
            });
        }
        if control & 0xE0 == ACK_PREFIX {
            return Some(Frame::Ack {
                ack_num: control & SEVEN_BIT_MASK,
            });
        }
        if control & 0xE0 == NAK_PREFIX {
            return Some(Frame::Nak {
                ack_num: control & SEVEN_BIT_MASK,
            });
        }
        None
    }
}

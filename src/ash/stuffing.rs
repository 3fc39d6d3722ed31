// SPDX-License-Identifier: MIT OR Apache-2.0
//! Byte-stuffing and escaping.
//!
//! Applied to the control+info+CRC bytes of every frame before the 0x7E
//! terminator is appended. Five reserved bytes plus the escape byte itself
//! get a two-byte substitution; 0x7D toggles bit 5 of the following raw
//! byte on the way back out.

use tinyvec::ArrayVec;

pub const FLAG: u8 = 0x7E;
pub const ESCAPE: u8 = 0x7D;
const ESCAPE_XOR: u8 = 0x20;

/// Bytes that must be escaped on the wire.
fn needs_escape(byte: u8) -> bool {
    matches!(byte, 0x7E | 0x7D | 0x11 | 0x13 | 0x18 | 0x1A)
}

/// Escapes `input` into `out`, appending the 0x7E terminator. `out`'s
/// capacity must be large enough for the worst case (every byte escaped,
/// plus the terminator).
pub fn stuff<const N: usize>(input: &[u8], out: &mut ArrayVec<[u8; N]>) {
    out.clear();
    for &byte in input {
        if needs_escape(byte) {
            out.push(ESCAPE);
            out.push(byte ^ ESCAPE_XOR);
        } else {
            out.push(byte);
        }
    }
    out.push(FLAG);
}

/// Reverses [`stuff`]: consumes a raw (still-escaped) byte stream up to and
/// including the first 0x7E terminator, writing the unescaped bytes (without
/// the terminator) into `out`. Returns the number of raw bytes consumed
/// (including the terminator) on success.
pub fn unstuff<const N: usize>(input: &[u8], out: &mut ArrayVec<[u8; N]>) -> Option<usize> {
    out.clear();
    let mut escape_pending = false;
    for (i, &byte) in input.iter().enumerate() {
        if byte == FLAG {
            return Some(i + 1);
        }
        if escape_pending {
            out.push(byte ^ ESCAPE_XOR);
            escape_pending = false;
        } else if byte == ESCAPE {
            escape_pending = true;
        } else {
            out.push(byte);
        }
    }
    None
}

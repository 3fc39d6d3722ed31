// SPDX-License-Identifier: MIT OR Apache-2.0
//! DATA-frame payload randomization. ACK/NAK/RST/RSTACK are never
//! randomized. The PRBS is its own inverse: XOR-ing twice with the
//! same generated sequence reproduces the input, which is the only
//! property the ASH codec relies on (`randomize` is used for both encode
//! and decode).

/// Applies the ASH randomization sequence to `data` in place, starting the
/// generator at its seed value 0x42.
pub fn randomize(data: &mut [u8]) {
    let mut r: u8 = 0x42;
    for byte in data {
        *byte ^= r;
        r = if r & 1 != 0 { (r >> 1) ^ 0xB8 } else { r >> 1 };
    }
}

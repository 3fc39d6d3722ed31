// SPDX-License-Identifier: MIT OR Apache-2.0
//! CCITT-CRC16 as used to protect ASH control+info bytes: polynomial
//! 0x1021, initial value 0xFFFF, no reflection, no final XOR. This is
//! the algorithm the `crc` crate's catalog calls CRC-16/IBM-3740 (a.k.a.
//! CRC-16/CCITT-FALSE).

use crc::{Crc, CRC_16_IBM_3740};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Computes the CRC over `data` (control byte followed by INFO), returned
/// as the two big-endian bytes transmitted on the wire.
#[must_use]
pub fn compute(data: &[u8]) -> [u8; 2] {
    CRC16.checksum(data).to_be_bytes()
}

/// Validates that `data`'s trailing two bytes are its own correct CRC.
/// `data` must include the CRC bytes at its tail.
#[must_use]
pub fn verify(control_and_info: &[u8], crc_bytes: [u8; 2]) -> bool {
    compute(control_and_info) == crc_bytes
}

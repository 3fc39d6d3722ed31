// SPDX-License-Identifier: MIT OR Apache-2.0
//! Byte-layout builders for the GP sink-table SET_ENTRY and proxy-pairing
//! EZSP payloads, matching the `EZSP_GP_SINK_TABLE_GET_ENTRY`/
//! `EZSP_GP_SINK_TABLE_SET_ENTRY` response handling sequence.

/// Test-only GPD decryption key. Real deployments need a
/// key-derivation/provisioning interface; that's out of scope here.
pub const GPD_TEST_KEY: [u8; 16] = [
    0x59, 0x13, 0x29, 0x50, 0x28, 0x9D, 0x14, 0xFD, 0x73, 0xF9, 0xC3, 0x25, 0xD4, 0x57, 0xAB, 0xB5,
];

/// Builds an `EmberGpAddress`-shaped lookup key: `0x00`, `source_id` (LE),
/// `source_id` again (LE, the IEEE-address placeholder for short-address
/// mode), `0x00` (endpoint, unused).
fn gpd_address(source_id: u32) -> [u8; 10] {
    let id = source_id.to_le_bytes();
    [
        0x00, id[0], id[1], id[2], id[3], id[0], id[1], id[2], id[3], 0x00,
    ]
}

/// `GP_SINK_TABLE_FIND_OR_ALLOCATE_ENTRY` request payload.
#[must_use]
pub fn build_find_or_allocate_entry(source_id: u32) -> Vec<u8> {
    gpd_address(source_id).to_vec()
}

/// The sink-table SET_ENTRY struct, built from the stored commissioning
/// frame. `device_id` is `commissioning_payload[0]`;
/// `frame_counter` is `commissioning_payload[23..27]` (LE).
#[must_use]
pub fn build_set_entry_struct(source_id: u32, device_id: u8, frame_counter: [u8; 4]) -> Vec<u8> {
    let mut out = Vec::with_capacity(46);
    out.push(0x01); // internal status: active
    out.extend_from_slice(&[0xA8, 0x02]); // tunneling options
    out.extend_from_slice(&gpd_address(source_id));
    out.push(device_id);
    // Two 11-byte sink-list slots, each unused.
    for _ in 0..2 {
        out.push(0xFF);
        out.extend_from_slice(&[0u8; 10]);
    }
    let id = source_id.to_le_bytes();
    out.extend_from_slice(&id[..2]); // assigned alias: low 16 bits of source_id
    out.push(0x00); // groupcast radius
    out.push(0x12); // security options
    out.extend_from_slice(&frame_counter);
    out.extend_from_slice(&GPD_TEST_KEY);
    out
}

/// The `GP_PROXY_TABLE_PROCESS_GP_PAIRING` struct.
#[must_use]
pub fn build_proxy_pairing_struct(source_id: u32, frame_counter: [u8; 4]) -> Vec<u8> {
    let mut out = Vec::with_capacity(48);
    out.extend_from_slice(&[0xA8, 0xE5, 0x02, 0x00]); // options
    out.extend_from_slice(&gpd_address(source_id));
    out.push(0x01); // communication mode
    out.extend_from_slice(&[0xFF, 0xFF]); // sink network address
    let id = source_id.to_le_bytes();
    out.extend_from_slice(&id[..2]); // sink group ID: low 16 bits of source_id
    out.extend_from_slice(&[0xFF, 0xFF]); // assigned alias
    out.extend_from_slice(&[0u8; 8]); // sink IEEE address
    out.extend_from_slice(&GPD_TEST_KEY);
    out.extend_from_slice(&frame_counter);
    out.push(0x00); // forwarding radius
    out
}

/// A raw GPDF send via `EZSP_D_GP_SEND` that tells the NCP to drop
/// commissioning mode.
#[must_use]
pub fn build_close_commissioning_payload() -> Vec<u8> {
    let mut out = vec![0x00, 0x00]; // action (remove from queue), useCca
    out.extend_from_slice(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]); // broadcast GPD address
    out.push(0x00); // GPD command id
    out.push(0x01); // GP command payload length
    out.push(0x00); // GP command payload
    out.push(0x00); // handle
    out.push(0x00); // lifetime
    out
}

/// Same `EmberGpAddress` layout as `build_find_or_allocate_entry`.
#[must_use]
pub fn build_sink_table_lookup(source_id: u32) -> Vec<u8> {
    gpd_address(source_id).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_entry_places_source_id_and_frame_counter() {
        let bytes = build_set_entry_struct(0x0102_0304, 0x02, [0xAA, 0xBB, 0xCC, 0xDD]);
        // offset 3..7 is the short-address slot (after status + tunneling options + addr-mode byte).
        assert_eq!(&bytes[3..7], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(bytes[12], 0x02); // device id
        let frame_counter_offset = bytes.len() - 16 - 4;
        assert_eq!(
            &bytes[frame_counter_offset..frame_counter_offset + 4],
            &[0xAA, 0xBB, 0xCC, 0xDD]
        );
        assert_eq!(&bytes[bytes.len() - 16..], &GPD_TEST_KEY);
    }

    #[test]
    fn proxy_pairing_carries_the_same_frame_counter() {
        let bytes = build_proxy_pairing_struct(0x0102_0304, [0xAA, 0xBB, 0xCC, 0xDD]);
        let frame_counter_offset = bytes.len() - 1 - 4;
        assert_eq!(
            &bytes[frame_counter_offset..frame_counter_offset + 4],
            &[0xAA, 0xBB, 0xCC, 0xDD]
        );
        assert_eq!(*bytes.last().unwrap(), 0x00);
    }
}

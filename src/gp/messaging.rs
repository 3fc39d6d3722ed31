// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Zigbee messaging collaborator the GP sink needs for one thing: the
//! local "GP Proxy Commissioning Mode" unicast. General Zigbee cluster
//! helpers aren't part of this crate, so this stays a narrow interface
//! covering just what the sink actually consumes.

use crate::error::Result;

/// Fixed addressing for the GP Proxy Commissioning Mode message.
pub const GP_ENDPOINT: u8 = 242;
pub const GP_CLUSTER_ID: u16 = 0x0021;
pub const GP_PROXY_COMMISSIONING_MODE_CMD: u8 = 0x02;

/// The narrow Zigbee-messaging surface the GP sink depends on.
pub trait ZigbeeMessaging {
    /// Sends a unicast APS frame addressed `GP_ENDPOINT -> GP_ENDPOINT`
    /// on `GP_CLUSTER_ID`, command `GP_PROXY_COMMISSIONING_MODE_CMD`,
    /// carrying `options` as its sole payload byte.
    fn send_gp_proxy_commissioning_mode(&mut self, options: u8) -> Result<()>;
}

/// A recording double for tests and the `gp-sink-sim` demo, standing in for
/// a full Zigbee APS stack the way `LoopbackUart` stands in for a real
/// serial port.
#[derive(Default)]
pub struct RecordingZigbeeMessaging {
    pub sent_options: Vec<u8>,
}

impl RecordingZigbeeMessaging {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ZigbeeMessaging for RecordingZigbeeMessaging {
    fn send_gp_proxy_commissioning_mode(&mut self, options: u8) -> Result<()> {
        self.sent_options.push(options);
        Ok(())
    }
}

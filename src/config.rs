// SPDX-License-Identifier: MIT OR Apache-2.0
//! Driver-wide tunables.
//!
//! Bundling the retransmit timeout, connect timeout, retransmit ceiling,
//! and sink-table capacity into one `Default`-able struct keeps them
//! adjustable by a host application without code changes.

use std::time::Duration;

/// Tunable timing and capacity parameters for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// ASH retransmit timeout: how long to wait for an ACK before resending
    /// the outstanding DATA frame. Default 1600 ms.
    pub t_ack: Duration,

    /// How long to wait for the RST/RSTACK handshake, and for framing in
    /// general, before declaring the connection lost. Default 5000 ms.
    pub t_connect: Duration,

    /// Maximum number of retransmit attempts for a DATA frame before
    /// giving up and raising `AshResetFailed`. Default 3.
    pub max_retransmits: u8,

    /// Fixed capacity of the GP sink table. Must be at least 5.
    pub sink_table_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            t_ack: Duration::from_millis(1600),
            t_connect: Duration::from_millis(5000),
            max_retransmits: 3,
            sink_table_capacity: 8,
        }
    }
}

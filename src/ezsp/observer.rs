// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observer traits for the EZSP dongle: connection-state changes and
//! inbound EZSP traffic.

use crate::ezsp::command::EzspCommand;

/// Dongle connection-state events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DongleState {
    /// ASH has completed its RST/RSTACK handshake.
    Ready,
    /// ASH dropped the connection (`AshResetFailed` or explicit reset).
    Removed,
}

/// Implemented by anything that wants to be told about dongle connectivity
/// and inbound EZSP traffic.
pub trait DongleObserver {
    fn handle_dongle_state(&self, state: DongleState);
    fn handle_ezsp_rx(&self, cmd: EzspCommand, payload: &[u8]);
}

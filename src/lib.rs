// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host-side driver for Zigbee Green Power sink functionality over EZSP/ASH.
//!
//! Three layers, each owning the next:
//!
//! - [`ash`]: ASH framing over a raw UART byte stream (component C3).
//! - [`ezsp`]: EZSP command/response dispatch over ASH (component C4).
//! - [`gp`]: Green Power sink commissioning state machine (component C6).
//!
//! A caller wires a [`uart::UartPort`] into an [`ezsp::EzspDongle`], builds a
//! [`gp::GpSink`] on top of it, and drives both with its own event loop:
//! feed inbound bytes to `EzspDongle::handle_input`, call
//! `EzspDongle::poll` periodically, and issue commands through `GpSink`.
//! Nothing in this crate spawns threads or blocks; see [`timer`] for why.

pub mod ash;
pub mod config;
pub mod error;
pub mod ezsp;
pub mod gp;
pub mod observer;
pub mod timer;
pub mod uart;

pub use config::DriverConfig;
pub use error::{Error, Result};
pub use ezsp::EzspDongle;
pub use gp::GpSink;

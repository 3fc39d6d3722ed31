// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observer trait for inbound GP frames.

use crate::gp::frame::GpFrame;

pub trait GpObserver {
    fn handle_rx_gp_frame(&self, frame: &GpFrame);
}

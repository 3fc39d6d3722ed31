// SPDX-License-Identifier: MIT OR Apache-2.0
//! EZSP command identifiers: the minimum set the GP sink commissioning
//! sequence needs, plus GP send, sink-table lookup, and clear-all.

use crate::error::{Error, Result};
use strum_macros::EnumIter;

#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum EzspCommand {
    GpSinkTableInit = 0x70,
    GpepIncomingMessageHandler = 0xC5,
    GpSinkTableFindOrAllocateEntry = 0xC1,
    GpSinkTableGetEntry = 0xC2,
    GpSinkTableSetEntry = 0xC3,
    GpProxyTableProcessGpPairing = 0xC9,
    GpSinkTableLookup = 0x71,
    GpSinkTableClearAll = 0x72,
    /// Sends a raw GPDF, used to tell the NCP to drop commissioning mode.
    DGpSend = 0x33,
}

impl TryFrom<u8> for EzspCommand {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        use strum::IntoEnumIterator;
        EzspCommand::iter()
            .find(|c| *c as u8 == value)
            .ok_or(Error::UnknownEzspCommand(value))
    }
}

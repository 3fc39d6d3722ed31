// SPDX-License-Identifier: MIT OR Apache-2.0
//! Green Power sink commissioning state machine.
//!
//! Drives the commissioning sequence (find-or-allocate -> get-entry ->
//! set-entry -> proxy-pairing) off the dongle's EZSP response stream,
//! including a literal-index-0 write in `set_entry` that never uses the
//! index the find-or-allocate/get-entry round trip actually returned.

pub mod frame;
pub mod messaging;
pub mod observer;
pub mod sink_entry;
pub mod sink_table;

pub use frame::{GpFrame, SecurityLevel, GPF_COMMISSIONING_CMD, GPF_DECOMMISSIONING_CMD};
pub use messaging::ZigbeeMessaging;
pub use observer::GpObserver;
pub use sink_table::{SinkTable, INVALID_ENTRY};

use crate::config::DriverConfig;
use crate::error::Result;
use crate::ezsp::{DongleObserver, DongleState, EzspCommand, EzspDongle};
use crate::observer::ObserverSet;
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Sink lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    NotInit,
    Ready,
    /// No transition below ever produces this state; kept in the enum for
    /// completeness rather than as a state this sink can actually reach.
    Error,
    ComOpen,
    ComInProgress,
}

/// GP Proxy Commissioning Mode options byte: enter commissioning mode, exit
/// automatically on the first successful pairing.
const OPEN_COMMISSIONING_OPTIONS: u8 = 0x05;

/// GP sink. Interior mutability throughout so every public method,
/// including the [`DongleObserver`] impl, can take `&self` — the dongle
/// calls back into observers through a shared `Rc<dyn DongleObserver>`.
pub struct GpSink {
    dongle: Rc<RefCell<EzspDongle>>,
    zb_messaging: RefCell<Box<dyn ZigbeeMessaging>>,
    sink_table: RefCell<SinkTable>,
    state: Cell<SinkState>,
    gpf_comm_frame: RefCell<Option<GpFrame>>,
    observers: RefCell<ObserverSet<dyn GpObserver>>,
}

impl GpSink {
    /// Constructs a sink bound to `dongle` and self-registers as one of its
    /// observers.
    #[must_use]
    pub fn new(
        dongle: Rc<RefCell<EzspDongle>>,
        zb_messaging: Box<dyn ZigbeeMessaging>,
        config: DriverConfig,
    ) -> Rc<Self> {
        let sink = Rc::new(Self {
            dongle: dongle.clone(),
            zb_messaging: RefCell::new(zb_messaging),
            sink_table: RefCell::new(SinkTable::new(config.sink_table_capacity)),
            state: Cell::new(SinkState::NotInit),
            gpf_comm_frame: RefCell::new(None),
            observers: RefCell::new(ObserverSet::new()),
        });
        let as_observer: Rc<dyn DongleObserver> = sink.clone();
        dongle.borrow_mut().register_observer(as_observer);
        sink
    }

    #[must_use]
    pub fn state(&self) -> SinkState {
        self.state.get()
    }

    /// Initializes the sink table on the NCP, then transitions to `Ready`.
    pub fn init(&self) -> Result<()> {
        self.dongle
            .borrow_mut()
            .send_command(EzspCommand::GpSinkTableInit, vec![])?;
        self.state.set(SinkState::Ready);
        Ok(())
    }

    /// Opens a commissioning window: asks the Zigbee messaging collaborator
    /// to broadcast GP Proxy Commissioning Mode, then transitions to
    /// `ComOpen`.
    pub fn open_commissioning_session(&self) -> Result<()> {
        self.zb_messaging
            .borrow_mut()
            .send_gp_proxy_commissioning_mode(OPEN_COMMISSIONING_OPTIONS)?;
        self.state.set(SinkState::ComOpen);
        Ok(())
    }

    /// Tells the NCP to drop an open commissioning window via a raw GPDF
    /// send.
    pub fn close_commissioning_session(&self) -> Result<()> {
        self.dongle.borrow_mut().send_command(
            EzspCommand::DGpSend,
            sink_entry::build_close_commissioning_payload(),
        )?;
        self.state.set(SinkState::Ready);
        Ok(())
    }

    /// Registers a GPD locally, ahead of (or independent of) commissioning.
    pub fn register_gpd(&self, source_id: u32) -> u8 {
        self.sink_table.borrow_mut().add_entry(source_id)
    }

    pub fn sink_table_lookup(&self, source_id: u32) -> Result<()> {
        self.dongle.borrow_mut().send_command(
            EzspCommand::GpSinkTableLookup,
            sink_entry::build_sink_table_lookup(source_id),
        )
    }

    pub fn clear_all_tables(&self) -> Result<()> {
        self.sink_table.borrow_mut().clear();
        self.dongle
            .borrow_mut()
            .send_command(EzspCommand::GpSinkTableClearAll, vec![])
    }

    pub fn register_observer(&self, observer: Rc<dyn GpObserver>) -> bool {
        self.observers.borrow_mut().register(observer)
    }

    pub fn unregister_observer(&self, observer: &Rc<dyn GpObserver>) -> bool {
        self.observers.borrow_mut().unregister(observer)
    }

    fn handle_incoming_message(&self, payload: &[u8]) -> Result<()> {
        let gpf = GpFrame::parse(payload)?;

        if gpf.security_level == SecurityLevel::None {
            self.observers
                .borrow()
                .notify(|o| o.handle_rx_gp_frame(&gpf));

            if self.state.get() == SinkState::ComOpen && gpf.command_id == GPF_COMMISSIONING_CMD {
                self.dongle.borrow_mut().send_command(
                    EzspCommand::GpSinkTableFindOrAllocateEntry,
                    sink_entry::build_find_or_allocate_entry(gpf.source_id),
                )?;
                *self.gpf_comm_frame.borrow_mut() = Some(gpf);
                self.state.set(SinkState::ComInProgress);
            }
        } else if self.sink_table.borrow().contains(gpf.source_id) {
            self.observers
                .borrow()
                .notify(|o| o.handle_rx_gp_frame(&gpf));
        }
        Ok(())
    }

    fn handle_find_or_allocate_response(&self, payload: &[u8]) -> Result<()> {
        if self.state.get() != SinkState::ComInProgress {
            return Ok(());
        }
        let Some(&index) = payload.first() else {
            warn!("GP: find-or-allocate response carried no index byte");
            return Ok(());
        };
        self.dongle
            .borrow_mut()
            .send_command(EzspCommand::GpSinkTableGetEntry, vec![index])
    }

    fn handle_get_entry_response(&self) -> Result<()> {
        if self.state.get() != SinkState::ComInProgress {
            return Ok(());
        }
        let Some(frame) = self.gpf_comm_frame.borrow().clone() else {
            warn!("GP: get-entry response with no stored commissioning frame");
            return Ok(());
        };
        let device_id = *frame.payload.first().unwrap_or(&0);
        let frame_counter = frame
            .payload
            .get(23..27)
            .map_or([0u8; 4], |b| [b[0], b[1], b[2], b[3]]);
        let fields = sink_entry::build_set_entry_struct(frame.source_id, device_id, frame_counter);

        // Always written at index 0, regardless of the index returned by
        // the find-or-allocate/get-entry round trip.
        let mut request = vec![0u8];
        request.extend_from_slice(&fields);
        self.dongle
            .borrow_mut()
            .send_command(EzspCommand::GpSinkTableSetEntry, request)
    }

    fn handle_set_entry_response(&self) -> Result<()> {
        if self.state.get() != SinkState::ComInProgress {
            return Ok(());
        }
        let Some(frame) = self.gpf_comm_frame.borrow().clone() else {
            warn!("GP: set-entry response with no stored commissioning frame");
            return Ok(());
        };
        let frame_counter = frame
            .payload
            .get(23..27)
            .map_or([0u8; 4], |b| [b[0], b[1], b[2], b[3]]);
        let params = sink_entry::build_proxy_pairing_struct(frame.source_id, frame_counter);
        self.dongle
            .borrow_mut()
            .send_command(EzspCommand::GpProxyTableProcessGpPairing, params)
    }

    fn handle_proxy_pairing_response(&self) {
        if self.state.get() == SinkState::ComInProgress {
            *self.gpf_comm_frame.borrow_mut() = None;
            self.state.set(SinkState::Ready);
        }
    }
}

impl DongleObserver for GpSink {
    /// The sink doesn't react to dongle connect/disconnect on its own.
    fn handle_dongle_state(&self, _state: DongleState) {}

    fn handle_ezsp_rx(&self, cmd: EzspCommand, payload: &[u8]) {
        let outcome = match cmd {
            EzspCommand::GpSinkTableInit => {
                debug!("GP: sink table init acknowledged");
                Ok(())
            }
            EzspCommand::GpepIncomingMessageHandler => self.handle_incoming_message(payload),
            EzspCommand::GpSinkTableFindOrAllocateEntry => {
                self.handle_find_or_allocate_response(payload)
            }
            EzspCommand::GpSinkTableGetEntry => self.handle_get_entry_response(),
            EzspCommand::GpSinkTableSetEntry => self.handle_set_entry_response(),
            EzspCommand::GpProxyTableProcessGpPairing => {
                self.handle_proxy_pairing_response();
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = outcome {
            warn!("GP: error handling {cmd:?} response: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uart::LoopbackUart;

    fn commissioning_frame_wire(source_id: u32, device_id: u8, frame_counter: [u8; 4]) -> Vec<u8> {
        let mut payload = vec![device_id];
        payload.extend(std::iter::repeat(0u8).take(22));
        payload.extend_from_slice(&frame_counter);

        let mut raw = vec![0x00, 0x50, 0x01, 0x00];
        raw.extend_from_slice(&source_id.to_le_bytes());
        raw.push(0x00); // security: none
        raw.extend_from_slice(&[0, 0, 0, 0]);
        raw.push(GPF_COMMISSIONING_CMD);
        raw.push(payload.len() as u8);
        raw.extend_from_slice(&payload);
        raw
    }

    fn new_sink() -> Rc<GpSink> {
        let dongle = Rc::new(RefCell::new(EzspDongle::new(DriverConfig::default())));
        dongle
            .borrow_mut()
            .open(Box::new(LoopbackUart::new()))
            .unwrap();
        GpSink::new(
            dongle,
            Box::new(messaging::RecordingZigbeeMessaging::new()),
            DriverConfig::default(),
        )
    }

    #[test]
    fn init_transitions_to_ready() {
        let sink = new_sink();
        sink.init().unwrap();
        assert_eq!(sink.state(), SinkState::Ready);
    }

    #[test]
    fn open_commissioning_session_sends_the_fixed_options_byte() {
        let dongle = Rc::new(RefCell::new(EzspDongle::new(DriverConfig::default())));
        dongle
            .borrow_mut()
            .open(Box::new(LoopbackUart::new()))
            .unwrap();
        let zb = Rc::new(RefCell::new(messaging::RecordingZigbeeMessaging::new()));

        struct Proxy(Rc<RefCell<messaging::RecordingZigbeeMessaging>>);
        impl ZigbeeMessaging for Proxy {
            fn send_gp_proxy_commissioning_mode(&mut self, options: u8) -> Result<()> {
                self.0.borrow_mut().send_gp_proxy_commissioning_mode(options)
            }
        }

        let sink = GpSink::new(dongle, Box::new(Proxy(zb.clone())), DriverConfig::default());
        sink.open_commissioning_session().unwrap();
        assert_eq!(sink.state(), SinkState::ComOpen);
        assert_eq!(zb.borrow().sent_options, vec![0x05]);
    }

    #[test]
    fn commissioning_happy_path_drives_the_full_sequence() {
        let sink = new_sink();
        sink.init().unwrap();
        sink.open_commissioning_session().unwrap();

        let source_id = 0x0102_0304u32;
        let frame_counter = [0xAA, 0xBB, 0xCC, 0xDD];
        let wire = commissioning_frame_wire(source_id, 0x02, frame_counter);

        sink.handle_ezsp_rx(EzspCommand::GpepIncomingMessageHandler, &wire);
        assert_eq!(sink.state(), SinkState::ComInProgress);
        assert!(sink.gpf_comm_frame.borrow().is_some());

        sink.handle_ezsp_rx(EzspCommand::GpSinkTableFindOrAllocateEntry, &[0x00]);
        sink.handle_ezsp_rx(EzspCommand::GpSinkTableGetEntry, &[]);
        sink.handle_ezsp_rx(EzspCommand::GpSinkTableSetEntry, &[]);
        assert_eq!(sink.state(), SinkState::ComInProgress);

        sink.handle_ezsp_rx(EzspCommand::GpProxyTableProcessGpPairing, &[]);
        assert_eq!(sink.state(), SinkState::Ready);
        assert!(sink.gpf_comm_frame.borrow().is_none());
    }

    #[test]
    fn encrypted_frame_is_ignored_unless_the_source_is_registered() {
        let sink = new_sink();
        sink.init().unwrap();

        let mut raw = vec![0x00, 0x50, 0x01, 0x00];
        let source_id = 0x0506_0708u32;
        raw.extend_from_slice(&source_id.to_le_bytes());
        raw.push(0x03); // security: encrypted
        raw.extend_from_slice(&[0, 0, 0, 0]);
        raw.push(0x00); // arbitrary application command
        raw.push(0); // zero-length payload

        let calls = Rc::new(RefCell::new(0u32));
        struct Counter(Rc<RefCell<u32>>);
        impl GpObserver for Counter {
            fn handle_rx_gp_frame(&self, _frame: &GpFrame) {
                *self.0.borrow_mut() += 1;
            }
        }
        let observer: Rc<dyn GpObserver> = Rc::new(Counter(calls.clone()));
        sink.register_observer(observer);

        sink.handle_ezsp_rx(EzspCommand::GpepIncomingMessageHandler, &raw);
        assert_eq!(*calls.borrow(), 0);

        sink.register_gpd(source_id);
        sink.handle_ezsp_rx(EzspCommand::GpepIncomingMessageHandler, &raw);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn close_commissioning_session_returns_to_ready() {
        let sink = new_sink();
        sink.init().unwrap();
        sink.open_commissioning_session().unwrap();
        sink.close_commissioning_session().unwrap();
        assert_eq!(sink.state(), SinkState::Ready);
    }

    #[test]
    fn clear_all_tables_empties_the_local_table() {
        let sink = new_sink();
        sink.register_gpd(0x01);
        sink.clear_all_tables().unwrap();
        assert_eq!(sink.register_gpd(0x01), 0);
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! EZSP command dispatcher (component C4).
//!
//! Owns the ASH codec and the UART, and exposes `send_command`/`open` plus
//! observer registration for dongle-state and EZSP-rx events. Drives a
//! single-outstanding-command pump: nothing else is written to the UART
//! while a response is still awaited, and inbound responses are matched to
//! the awaited command purely by cmd_id.

pub mod command;
pub mod observer;

pub use command::EzspCommand;
pub use observer::{DongleObserver, DongleState};

use crate::ash::{AshCodec, AshEvent};
use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::observer::ObserverSet;
use crate::uart::{InputHandler, UartPort};
use log::{debug, warn};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

struct PendingCommand {
    cmd: EzspCommand,
    payload: Vec<u8>,
}

/// Owns the ASH codec and the UART handle for the lifetime of a session.
pub struct EzspDongle {
    ash: AshCodec,
    uart: Option<Box<dyn UartPort>>,
    sending_queue: VecDeque<PendingCommand>,
    wait_rsp: bool,
    seq: u8,
    observers: ObserverSet<dyn DongleObserver>,
}

impl EzspDongle {
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        Self {
            ash: AshCodec::new(config),
            uart: None,
            sending_queue: VecDeque::new(),
            wait_rsp: false,
            seq: 0,
            observers: ObserverSet::new(),
        }
    }

    /// Stores `uart`, writes an RST via ASH. Fails if the RST bytes could
    /// not be written atomically.
    pub fn open(&mut self, mut uart: Box<dyn UartPort>) -> Result<()> {
        let rst = self.ash.reset_ncp_frame();
        uart.write(&rst)?;
        self.uart = Some(uart);
        debug!("EZSP: dongle opened, RST sent");
        Ok(())
    }

    pub fn register_observer(&mut self, observer: Rc<dyn DongleObserver>) -> bool {
        self.observers.register(observer)
    }

    pub fn unregister_observer(&mut self, observer: &Rc<dyn DongleObserver>) -> bool {
        self.observers.unregister(observer)
    }

    /// Enqueues `(cmd, payload)` and attempts to send it immediately if no
    /// other command is outstanding.
    pub fn send_command(&mut self, cmd: EzspCommand, payload: Vec<u8>) -> Result<()> {
        self.sending_queue.push_back(PendingCommand { cmd, payload });
        self.pump()
    }

    fn pump(&mut self) -> Result<()> {
        if self.wait_rsp || self.sending_queue.is_empty() {
            return Ok(());
        }
        let Some(uart) = self.uart.as_mut() else {
            return Err(Error::NotOpen);
        };
        let head = self.sending_queue.front().expect("checked non-empty above");
        let mut info = Vec::with_capacity(1 + head.payload.len());
        info.push(head.cmd as u8);
        info.extend_from_slice(&head.payload);

        let bytes = self.ash.data_frame(self.seq, &info);
        self.seq = self.seq.wrapping_add(1);
        uart.write(&bytes)?;
        self.wait_rsp = true;
        Ok(())
    }

    /// Advances the ASH retransmit/connect timers. Must be polled
    /// periodically by the owning event loop.
    pub fn poll(&mut self, now: Instant) -> Result<()> {
        let poll = self.ash.poll(now);
        if let Some(retransmit) = poll.retransmit {
            if let Some(uart) = self.uart.as_mut() {
                uart.write(&retransmit)?;
            }
        }
        for event in poll.events {
            self.handle_ash_event(event);
        }
        Ok(())
    }

    fn handle_ash_event(&mut self, event: AshEvent) {
        // Only state changes propagate to dongle observers; ACK/NAK/
        // RESET_FAILED are link-layer detail the dongle does not surface
        // on their own.
        if let AshEvent::StateChange { connected } = event {
            let state = if connected {
                DongleState::Ready
            } else {
                DongleState::Removed
            };
            self.observers.notify(|o| o.handle_dongle_state(state));
        }
    }

    fn dispatch_inbound(&mut self, payload: Vec<u8>) -> Result<()> {
        if payload.len() < 3 {
            warn!("EZSP: inbound frame shorter than the 3-byte header");
            return Ok(());
        }
        let cmd_id = payload[2];
        let body = payload[3..].to_vec();

        let Ok(cmd) = EzspCommand::try_from(cmd_id) else {
            warn!("EZSP: unrecognised inbound cmd_id {cmd_id:#04x}");
            return Ok(());
        };

        self.observers.notify(|o| o.handle_ezsp_rx(cmd, &body));

        // Matches purely on cmd_id, so an unsolicited callback sharing the
        // cmd_id of the awaited response would also pop the queue here.
        if self.wait_rsp {
            let matches = self
                .sending_queue
                .front()
                .is_some_and(|head| head.cmd as u8 == cmd_id);
            if matches {
                self.sending_queue.pop_front();
                self.wait_rsp = false;
                self.pump()?;
            }
        }
        Ok(())
    }

    /// Feeds freshly-read UART bytes through ASH, ACKing and dispatching
    /// each complete frame.
    pub fn handle_input(&mut self, bytes: &[u8]) -> Result<()> {
        let mut buf = bytes.to_vec();
        while !buf.is_empty() {
            let outcome = self.ash.decode(&mut buf);
            if outcome.send_nak {
                let nak = self.ash.nak_frame();
                if let Some(uart) = self.uart.as_mut() {
                    uart.write(&nak)?;
                }
                continue;
            }
            let Some(payload) = outcome.payload else {
                continue;
            };
            let ack = self.ash.ack_frame();
            if let Some(uart) = self.uart.as_mut() {
                uart.write(&ack)?;
            }
            self.dispatch_inbound(payload)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.ash.is_connected()
    }
}

impl InputHandler for EzspDongle {
    fn handle_input(&mut self, bytes: &[u8]) {
        if let Err(err) = EzspDongle::handle_input(self, bytes) {
            warn!("EZSP: error handling inbound UART data: {err}");
        }
    }
}

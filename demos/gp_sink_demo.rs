// SPDX-License-Identifier: MIT OR Apache-2.0
//! Opens a real serial port to an EmberZNet NCP, brings up the ASH/EZSP
//! link, and drives a GP sink through an explicit poll loop. The driver
//! never blocks on its own, so this binary owns the loop.

use clap::Parser;
use log::{info, warn};
use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};
use zgp_sink::config::DriverConfig;
use zgp_sink::ezsp::EzspDongle;
use zgp_sink::gp::{messaging::RecordingZigbeeMessaging, GpObserver, GpSink};
use zgp_sink::uart::SerialUart;

#[derive(Parser, Debug)]
#[command(author, version, about = "ASH/EZSP Green Power sink driver")]
struct Args {
    /// Serial device the NCP is attached to, e.g. /dev/ttyUSB0.
    #[arg(short, long)]
    port: String,

    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// ASH retransmit timeout in milliseconds.
    #[arg(long, default_value_t = 1600)]
    t_ack_ms: u64,

    /// Fixed capacity of the GP sink table (must be >= 5).
    #[arg(long, default_value_t = 8)]
    sink_table_capacity: usize,

    /// Keep the commissioning window open for this many seconds after
    /// `init` succeeds.
    #[arg(long, default_value_t = 60)]
    commission_seconds: u64,
}

struct LoggingGpObserver;

impl GpObserver for LoggingGpObserver {
    fn handle_rx_gp_frame(&self, frame: &zgp_sink::gp::GpFrame) {
        info!(
            "GP frame from {:#010x}: cmd {:#04x}, {} byte payload",
            frame.source_id,
            frame.command_id,
            frame.payload.len()
        );
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let uart = match SerialUart::open(&args.port, args.baud) {
        Ok(uart) => uart,
        Err(err) => {
            warn!("failed to open {}: {err}", args.port);
            std::process::exit(1);
        }
    };
    let mut reader = uart
        .try_clone_reader()
        .expect("cloning the serial handle for reads should not fail");

    let config = DriverConfig {
        t_ack: Duration::from_millis(args.t_ack_ms),
        sink_table_capacity: args.sink_table_capacity,
        ..DriverConfig::default()
    };
    let dongle = Rc::new(RefCell::new(EzspDongle::new(config)));
    dongle
        .borrow_mut()
        .open(Box::new(uart))
        .expect("RST write should not fail on a freshly opened port");

    // No APS stack in this demo: the GP Proxy Commissioning Mode unicast is
    // only logged, not actually sent over the air.
    let sink = GpSink::new(
        dongle.clone(),
        Box::new(RecordingZigbeeMessaging::new()),
        config,
    );
    let observer: Rc<dyn GpObserver> = Rc::new(LoggingGpObserver);
    sink.register_observer(observer);

    let mut read_buf = [0u8; 256];
    loop {
        let n = reader
            .poll_read(&mut read_buf)
            .expect("reads should not fail on an open port");
        if n > 0 {
            dongle
                .borrow_mut()
                .handle_input(&read_buf[..n])
                .expect("inbound bytes should always be handleable");
        }

        dongle
            .borrow_mut()
            .poll(Instant::now())
            .expect("poll never fails on an open dongle");

        if dongle.borrow().is_connected() && sink.state() == zgp_sink::gp::SinkState::NotInit {
            sink.init().expect("init should not fail once connected");
            sink.open_commissioning_session()
                .expect("opening a commissioning session should not fail");
            info!(
                "commissioning window open for {}s",
                args.commission_seconds
            );
        }

        // SerialUart::open sets a short read timeout, so this poll loop
        // interleaves UART reads with ASH timer polling without blocking
        // for long.
        thread::sleep(Duration::from_millis(20));
    }
}

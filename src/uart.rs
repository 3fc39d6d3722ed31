// SPDX-License-Identifier: MIT OR Apache-2.0
//! UART port abstraction (component C2).
//!
//! The core treats the serial link purely as a byte-oriented duplex
//! channel: `write` is atomic per call (no torn writes visible to other
//! writers) and inbound bytes are pushed to a registered handler rather
//! than pulled, since the dongle never blocks waiting for input.
//! [`UartPort`] is the trait the core depends on; [`SerialUart`] is the
//! real backend over the `serialport` crate.

use crate::error::{Error, Result};
use std::io::Write as _;
use std::time::Duration;

/// Receives bytes pushed in from the UART, in arrival order.
pub trait InputHandler {
    fn handle_input(&mut self, bytes: &[u8]);
}

/// A byte-oriented duplex serial channel.
pub trait UartPort {
    /// Writes `buf` in its entirety or returns an error; never a partial
    /// write as seen by the caller.
    fn write(&mut self, buf: &[u8]) -> Result<()>;
}

/// Real UART backend wrapping a `serialport::SerialPort`.
pub struct SerialUart {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialUart {
    /// Opens `path` (e.g. `/dev/ttyUSB0`) at `baud_rate`, 8N1, with a short
    /// read timeout so the host loop can interleave timer polling with
    /// UART reads without blocking indefinitely.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(Duration::from_millis(50))
            .open()?;
        Ok(Self { port })
    }

    /// Reads whatever bytes are currently available (possibly zero) into
    /// `buf`-backed storage and returns them. Intended to be called from
    /// the host's event loop and fed to [`crate::ezsp::EzspDongle::handle_input`].
    pub fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        use std::io::Read;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Clones the underlying file descriptor into a read-only handle.
    ///
    /// [`crate::ezsp::EzspDongle::open`] takes ownership of a `SerialUart`
    /// for writes; the host loop still needs a way to pull inbound bytes,
    /// so it keeps this clone on the side and feeds what it reads into
    /// `EzspDongle::handle_input` itself.
    pub fn try_clone_reader(&self) -> Result<SerialReader> {
        let port = self.port.try_clone().map_err(|e| {
            Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        Ok(SerialReader { port })
    }
}

impl UartPort for SerialUart {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.port.write_all(buf).map_err(Error::Io)?;
        self.port.flush().map_err(Error::Io)?;
        Ok(())
    }
}

/// The read half of a cloned [`SerialUart`] handle.
pub struct SerialReader {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialReader {
    pub fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        use std::io::Read;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// An in-memory loopback/record UART used by tests and the `gp-sink-sim`
/// demo. Every byte written is appended to `written`; bytes queued via
/// [`LoopbackUart::feed`] are handed back verbatim from a would-be read.
#[derive(Default)]
pub struct LoopbackUart {
    pub written: Vec<u8>,
    fail_next_write: bool,
}

impl LoopbackUart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `write` call fail, to exercise `UartWrite` handling.
    pub fn fail_next_write(&mut self) {
        self.fail_next_write = true;
    }

    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }
}

impl UartPort for LoopbackUart {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.fail_next_write {
            self.fail_next_write = false;
            return Err(Error::UartWrite);
        }
        self.written.extend_from_slice(buf);
        Ok(())
    }
}

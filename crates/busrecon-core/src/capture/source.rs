//! Bus-facing byte sources
//!
//! The recorder consumes an abstract stream of bytes with per-byte arrival
//! timestamps. Anything can sit behind the [`BusSource`] trait: a live
//! RS-485 adapter, a replayed recording, or a test fixture. The transport
//! itself is an external concern.

use std::io::Read;
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::debug;

use super::{CaptureError, RawFrame};

/// A single received byte with its arrival timestamp in seconds.
///
/// Timestamps are monotonic and relative to an arbitrary epoch (usually
/// source open time); only differences between them are meaningful.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedByte {
    /// Arrival time in seconds
    pub timestamp: f64,
    /// The received byte
    pub byte: u8,
}

impl TimedByte {
    /// Convenience constructor
    pub fn new(timestamp: f64, byte: u8) -> Self {
        Self { timestamp, byte }
    }
}

/// One poll of a bus source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRead {
    /// Bytes arrived since the last poll, each with its own timestamp
    Bytes(Vec<TimedByte>),
    /// Nothing arrived; `now` lets the caller detect idle gaps on a live bus
    Idle {
        /// Current source time in seconds
        now: f64,
    },
    /// The source is exhausted (end of replayed file, closed port)
    Eof,
}

/// A byte stream with per-byte arrival timing.
///
/// Implementations block for at most a short poll interval per call so the
/// recorder can notice stop requests and idle gaps promptly.
pub trait BusSource {
    /// Poll the source for received bytes
    fn read_chunk(&mut self) -> Result<SourceRead, CaptureError>;
}

/// Transmit path, out of core scope.
///
/// External replay components implement this to accept the same frames the
/// core produces. Nothing in this crate writes to a live bus.
pub trait FrameSink {
    /// Queue one frame's bytes for transmission
    fn send(&mut self, frame: &RawFrame) -> Result<(), CaptureError>;
}

/// Replays a recorded sequence of timed bytes as a bus source.
///
/// Useful for re-segmenting old captures at a different gap threshold and
/// for tests. Bytes are delivered in chunks of `chunk_size` to exercise the
/// same paths a live source does.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    events: Vec<TimedByte>,
    pos: usize,
    chunk_size: usize,
}

impl ReplaySource {
    /// Replay the given timed bytes, delivering them all in one chunk
    pub fn new(events: Vec<TimedByte>) -> Self {
        let chunk_size = events.len().max(1);
        Self {
            events,
            pos: 0,
            chunk_size,
        }
    }

    /// Replay in fixed-size chunks
    pub fn with_chunk_size(events: Vec<TimedByte>, chunk_size: usize) -> Self {
        Self {
            events,
            pos: 0,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl BusSource for ReplaySource {
    fn read_chunk(&mut self) -> Result<SourceRead, CaptureError> {
        if self.pos >= self.events.len() {
            return Ok(SourceRead::Eof);
        }
        let end = (self.pos + self.chunk_size).min(self.events.len());
        let chunk = self.events[self.pos..end].to_vec();
        self.pos = end;
        Ok(SourceRead::Bytes(chunk))
    }
}

/// Default poll timeout for the live serial source
const SERIAL_POLL_MS: u64 = 20;

/// Live serial bus source.
///
/// Wraps a serial port opened 8N1 at the caller's baud rate. The handle is
/// scoped to this value: dropping the source closes the port, so there is
/// never an ambient open handle. Per-byte timestamps come from a monotonic
/// clock started at open time; bytes read in one chunk share a timestamp,
/// which is accurate to the poll interval and well below any useful gap
/// threshold.
pub struct SerialSource {
    port: Box<dyn SerialPort>,
    opened: Instant,
    port_name: String,
}

impl SerialSource {
    /// Open a serial port for capture (8 data bits, no parity, 1 stop bit)
    pub fn open(name: &str, baud_rate: u32) -> Result<Self, CaptureError> {
        let mut port = serialport::new(name, baud_rate)
            .timeout(Duration::from_millis(SERIAL_POLL_MS))
            .open()
            .map_err(|e| CaptureError::Source(format!("{}: {}", name, e)))?;

        port.set_data_bits(serialport::DataBits::Eight)
            .map_err(|e| CaptureError::Source(e.to_string()))?;
        port.set_parity(serialport::Parity::None)
            .map_err(|e| CaptureError::Source(e.to_string()))?;
        port.set_stop_bits(serialport::StopBits::One)
            .map_err(|e| CaptureError::Source(e.to_string()))?;
        port.set_flow_control(serialport::FlowControl::None)
            .map_err(|e| CaptureError::Source(e.to_string()))?;

        debug!(port = name, baud = baud_rate, "serial source opened");

        Ok(Self {
            port,
            opened: Instant::now(),
            port_name: name.to_string(),
        })
    }

    /// Wrap an already-configured port (for adapters the crate doesn't know)
    pub fn from_port(port: Box<dyn SerialPort>, name: &str) -> Self {
        Self {
            port,
            opened: Instant::now(),
            port_name: name.to_string(),
        }
    }

    /// The port name this source was opened on
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn now(&self) -> f64 {
        self.opened.elapsed().as_secs_f64()
    }
}

impl BusSource for SerialSource {
    fn read_chunk(&mut self) -> Result<SourceRead, CaptureError> {
        let available = self
            .port
            .bytes_to_read()
            .map_err(|e| CaptureError::Source(e.to_string()))?;

        if available == 0 {
            // Block for one poll interval waiting for a byte
            let mut one = [0u8; 1];
            return match self.port.read(&mut one) {
                Ok(0) => Ok(SourceRead::Eof),
                Ok(_) => {
                    let now = self.now();
                    Ok(SourceRead::Bytes(vec![TimedByte::new(now, one[0])]))
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    Ok(SourceRead::Idle { now: self.now() })
                }
                Err(e) => Err(CaptureError::Source(e.to_string())),
            };
        }

        let mut buf = vec![0u8; available as usize];
        let n = self
            .port
            .read(&mut buf)
            .map_err(|e| CaptureError::Source(e.to_string()))?;
        buf.truncate(n);

        let now = self.now();
        Ok(SourceRead::Bytes(
            buf.into_iter().map(|b| TimedByte::new(now, b)).collect(),
        ))
    }
}

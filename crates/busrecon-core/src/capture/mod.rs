//! Bus Traffic Capture
//!
//! Captures raw traffic from an undocumented serial bus, segments it into
//! frames using idle-gap timing, and persists the result in a streamable
//! binary container. The bus has no known framing markers, so a silence
//! longer than the configured gap threshold is the only frame delimiter.

pub mod container;
mod recorder;
pub mod source;

pub use container::{
    capture_filename, read_capture, read_capture_legacy, write_capture, CaptureReader,
    CaptureWriter,
};
pub use recorder::{
    CaptureRecorder, RecorderConfig, RecorderHandle, RecorderStats, RecordingOutcome, StopSignal,
    DEFAULT_GAP_THRESHOLD_MS,
};
pub use source::{BusSource, FrameSink, ReplaySource, SerialSource, SourceRead, TimedByte};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while capturing or persisting bus traffic
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("bus source failure: {0}")]
    Source(String),

    #[error("timestamp went backwards: {previous:.6}s -> {current:.6}s")]
    ClockWentBackwards {
        /// Timestamp of the previously observed byte or frame
        previous: f64,
        /// The violating timestamp
        current: f64,
    },

    #[error("not a capture container (bad magic)")]
    BadMagic,

    #[error("unsupported capture container version: {0}")]
    UnsupportedVersion(u8),

    #[error("truncated capture record at byte offset {0}")]
    TruncatedRecord(u64),

    #[error("capture record too large: {0} bytes")]
    OversizedRecord(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Largest frame payload the container will accept.
///
/// Real traffic on the buses this tool targets is a few hundred bytes per
/// frame at most; anything larger is a corrupt length field.
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

/// A contiguous run of bytes bounded by bus silence.
///
/// Immutable after sealing. The timestamp is the capture-relative time of
/// the first byte in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    timestamp: f64,
    bytes: Vec<u8>,
}

impl RawFrame {
    /// Seal a frame from its first-byte timestamp and payload
    pub fn new(timestamp: f64, bytes: Vec<u8>) -> Self {
        Self { timestamp, bytes }
    }

    /// Capture-relative timestamp of the first byte, in seconds
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// The raw bytes of the frame
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Frame length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the frame carries no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Render the frame as a hex string with the given separator
    pub fn to_hex(&self, separator: &str) -> String {
        self.bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

/// An ordered, append-only sequence of captured frames.
///
/// Insertion order is temporal order and is significant; pattern mining
/// relies on it. A capture exclusively owns its frames.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    frames: Vec<RawFrame>,
    started_at: Option<DateTime<Utc>>,
}

impl Capture {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty capture stamped with a wall-clock start time
    pub fn started_at(when: DateTime<Utc>) -> Self {
        Self {
            frames: Vec::new(),
            started_at: Some(when),
        }
    }

    /// Build a capture from already-sealed frames, enforcing timestamp order
    pub fn from_frames(frames: Vec<RawFrame>) -> Result<Self, CaptureError> {
        let mut capture = Self::new();
        for frame in frames {
            capture.push(frame)?;
        }
        Ok(capture)
    }

    /// Append a sealed frame.
    ///
    /// Timestamps must be monotonic non-decreasing across the capture; a
    /// violation is a data-integrity error, not something to clamp.
    pub fn push(&mut self, frame: RawFrame) -> Result<(), CaptureError> {
        if let Some(last) = self.frames.last() {
            if frame.timestamp() < last.timestamp() {
                return Err(CaptureError::ClockWentBackwards {
                    previous: last.timestamp(),
                    current: frame.timestamp(),
                });
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    /// The captured frames, in temporal order
    pub fn frames(&self) -> &[RawFrame] {
        &self.frames
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the capture holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total payload bytes across all frames
    pub fn total_bytes(&self) -> usize {
        self.frames.iter().map(|f| f.len()).sum()
    }

    /// Time span between the first and last frame, in seconds
    pub fn duration(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.timestamp() - first.timestamp(),
            _ => 0.0,
        }
    }

    /// Wall-clock time recording started, if known
    pub fn started_at_time(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Iterate over frames in temporal order
    pub fn iter(&self) -> std::slice::Iter<'_, RawFrame> {
        self.frames.iter()
    }
}

impl<'a> IntoIterator for &'a Capture {
    type Item = &'a RawFrame;
    type IntoIter = std::slice::Iter<'a, RawFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_hex() {
        let frame = RawFrame::new(0.0, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(frame.to_hex(" "), "de ad be ef");
        assert_eq!(frame.to_hex(""), "deadbeef");
    }

    #[test]
    fn test_capture_ordering_enforced() {
        let mut capture = Capture::new();
        capture.push(RawFrame::new(1.0, vec![1])).unwrap();
        capture.push(RawFrame::new(1.0, vec![2])).unwrap(); // equal is fine
        capture.push(RawFrame::new(2.5, vec![3])).unwrap();

        let err = capture.push(RawFrame::new(2.0, vec![4])).unwrap_err();
        assert!(matches!(err, CaptureError::ClockWentBackwards { .. }));
        // The violating frame was rejected, prior frames intact
        assert_eq!(capture.len(), 3);
    }

    #[test]
    fn test_capture_stats() {
        let capture = Capture::from_frames(vec![
            RawFrame::new(0.5, vec![1, 2, 3]),
            RawFrame::new(2.0, vec![4]),
        ])
        .unwrap();

        assert_eq!(capture.total_bytes(), 4);
        assert!((capture.duration() - 1.5).abs() < 1e-9);
    }
}

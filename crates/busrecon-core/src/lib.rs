//! # BusRecon Core Library
//!
//! Core functionality for the BusRecon serial-bus reverse-engineering toolkit.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Gap-based capture of raw bus traffic into timestamped frames
//! - A streamable binary capture container
//! - Physical-layer and baud-rate classification from signal traces
//! - Hypothesis-driven frame decoding with pluggable checksum candidates
//! - Statistical pattern mining over accumulated captures
//!
//! Nothing in this crate claims to *know* the protocol under study. Every
//! decode is a candidate, every checksum match is a ranked hypothesis, and
//! classifiers report `Undetermined` rather than guess.
//!
//! ## Example
//!
//! ```rust,ignore
//! use busrecon_core::capture::{CaptureRecorder, RecorderConfig, SerialSource};
//! use busrecon_core::decode::{FrameParser, LayoutHypothesis};
//!
//! let mut source = SerialSource::open("/dev/ttyUSB0", 19200)?;
//! let outcome = CaptureRecorder::new(RecorderConfig::default()).record(&mut source);
//! let parser = FrameParser::new(LayoutHypothesis::net485_guess());
//! for packet in parser.parse_capture(&outcome.capture) {
//!     println!("{}", packet.summary(&Default::default()));
//! }
//! ```

pub mod analysis;
pub mod capture;
pub mod decode;
pub mod names;
pub mod signal;
pub mod sim;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analysis::{AnalyzerConfig, ChecksumCandidate, PatternAnalyzer, PatternReport};
    pub use crate::capture::{
        BusSource, Capture, CaptureError, CaptureRecorder, RawFrame, RecorderConfig, RecorderHandle,
        TimedByte,
    };
    pub use crate::decode::{
        CandidatePacket, ChecksumId, ChecksumOutcome, FieldRole, FrameParser, LayoutHypothesis,
    };
    pub use crate::names::NameTable;
    pub use crate::signal::{
        BaudDetection, BaudDetector, Classification, PhysicalLayerKind, Sample, SignalClassifier,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

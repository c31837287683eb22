//! Frame Decoding
//!
//! Converts raw frames into structured candidate packets under explicitly
//! tentative field layouts, with pluggable checksum-hypothesis evaluation.
//! No layout here is authoritative and no checksum is assumed correct.

mod checksum;
mod layout;
mod packet;

pub use checksum::{trailer_value, ChecksumId, ChecksumOutcome};
pub use layout::{Endianness, FieldRole, FieldSpec, LayoutHypothesis};
pub use packet::{CandidatePacket, FieldValue, FrameParser};

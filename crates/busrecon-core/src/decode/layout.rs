//! Field layout hypotheses
//!
//! A layout is a guess at how a frame slices into fields. None of the
//! layouts here is "the" protocol: several hypotheses coexist, get applied
//! to the same capture, and are compared on the evidence. Layouts are plain
//! serde values so they can be saved, diffed, and exchanged as JSON.

use serde::{Deserialize, Serialize};

/// Semantic role a byte range is hypothesized to play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldRole {
    /// Destination device address
    DestAddr,
    /// Source device address
    SrcAddr,
    /// Message type / opcode
    MessageType,
    /// Sequence or transaction counter
    Sequence,
    /// Declared payload length
    PayloadLength,
    /// Header bytes with no assigned meaning yet
    HeaderExtra,
    /// Variable-length body between header and trailer
    Payload,
    /// Checksum trailer at the end of the frame
    Checksum,
}

impl FieldRole {
    /// Short label for reports
    pub fn label(&self) -> &'static str {
        match self {
            FieldRole::DestAddr => "dest",
            FieldRole::SrcAddr => "src",
            FieldRole::MessageType => "type",
            FieldRole::Sequence => "seq",
            FieldRole::PayloadLength => "len",
            FieldRole::HeaderExtra => "extra",
            FieldRole::Payload => "payload",
            FieldRole::Checksum => "checksum",
        }
    }
}

/// Byte order for multi-byte integer fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Endianness {
    /// Most significant byte first
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

/// One hypothesized header field: a byte range from the frame start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Hypothesized role
    pub role: FieldRole,
    /// Byte offset from the start of the frame
    pub offset: usize,
    /// Field length in bytes
    pub len: usize,
}

/// A candidate, unverified mapping from byte offsets to packet fields.
///
/// The payload spans `header_len..frame_len - trailer_len`; the checksum
/// trailer is the last `trailer_len` bytes. Fixed header fields are listed
/// explicitly. Nothing validates a hypothesis except the traffic itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutHypothesis {
    /// Name for reports ("net485-guess", "short-header", ...)
    pub name: String,
    /// Hypothesized header length in bytes
    pub header_len: usize,
    /// Hypothesized checksum trailer length in bytes (0 for none)
    pub trailer_len: usize,
    /// Byte order for integer field values
    pub endianness: Endianness,
    /// Fixed header fields
    pub fields: Vec<FieldSpec>,
}

impl LayoutHypothesis {
    /// Start an empty hypothesis
    pub fn new(name: impl Into<String>, header_len: usize, trailer_len: usize) -> Self {
        Self {
            name: name.into(),
            header_len,
            trailer_len,
            endianness: Endianness::Big,
            fields: Vec::new(),
        }
    }

    /// Builder-style field addition
    pub fn with_field(mut self, role: FieldRole, offset: usize, len: usize) -> Self {
        self.fields.push(FieldSpec { role, offset, len });
        self
    }

    /// Builder-style endianness selection
    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// The field spec for a role, if the hypothesis defines one
    pub fn field(&self, role: FieldRole) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.role == role)
    }

    /// Minimum frame length that satisfies every fixed range
    pub fn min_frame_len(&self) -> usize {
        let fields_end = self
            .fields
            .iter()
            .map(|f| f.offset + f.len)
            .max()
            .unwrap_or(0);
        fields_end.max(self.header_len) + self.trailer_len
    }

    /// The Net485-style starting guess inherited from early bus notes:
    /// 10-byte header (two 16-bit addresses, type, sequence, payload
    /// length, three unassigned bytes) and a 16-bit trailer.
    ///
    /// Unverified, like every other hypothesis. It exists because one has
    /// to start somewhere.
    pub fn net485_guess() -> Self {
        Self::new("net485-guess", 10, 2)
            .with_field(FieldRole::DestAddr, 0, 2)
            .with_field(FieldRole::SrcAddr, 2, 2)
            .with_field(FieldRole::MessageType, 4, 1)
            .with_field(FieldRole::Sequence, 5, 1)
            .with_field(FieldRole::PayloadLength, 6, 1)
            .with_field(FieldRole::HeaderExtra, 7, 3)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net485_guess_shape() {
        let layout = LayoutHypothesis::net485_guess();
        assert_eq!(layout.header_len, 10);
        assert_eq!(layout.trailer_len, 2);
        assert_eq!(layout.min_frame_len(), 12);
        assert_eq!(layout.field(FieldRole::SrcAddr).unwrap().offset, 2);
        assert!(layout.field(FieldRole::Payload).is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let layout = LayoutHypothesis::net485_guess();
        let json = layout.to_json().unwrap();
        let back = LayoutHypothesis::from_json(&json).unwrap();
        assert_eq!(layout, back);
    }
}

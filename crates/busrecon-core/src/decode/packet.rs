//! Hypothesis-driven frame parsing
//!
//! Applies a [`LayoutHypothesis`] to a [`RawFrame`] and produces a
//! [`CandidatePacket`]. Parsing is total: any byte length, including zero,
//! parses without error — field ranges the frame cannot satisfy are marked
//! truncated instead. A candidate packet never asserts ground truth about
//! the protocol.

use serde::{Deserialize, Serialize};

use crate::capture::{Capture, RawFrame};
use crate::names::NameTable;

use super::checksum::{ChecksumId, ChecksumOutcome};
use super::layout::{Endianness, FieldRole, LayoutHypothesis};

/// One decoded field: the sliced bytes plus a truncation marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    /// The role the layout assigns this range
    pub role: FieldRole,
    /// The bytes actually available in the frame for this range
    pub bytes: Vec<u8>,
    /// Whether the frame was too short to cover the full range
    pub truncated: bool,
}

impl FieldValue {
    /// Integer view of the field in the given byte order.
    ///
    /// `None` for truncated fields and for fields wider than 8 bytes.
    pub fn value(&self, endianness: Endianness) -> Option<u64> {
        if self.truncated || self.bytes.is_empty() || self.bytes.len() > 8 {
            return None;
        }
        Some(match endianness {
            Endianness::Big => self.bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64),
            Endianness::Little => self
                .bytes
                .iter()
                .rev()
                .fold(0u64, |acc, b| (acc << 8) | *b as u64),
        })
    }

    /// Hex rendering of the field bytes
    pub fn to_hex(&self) -> String {
        self.bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The result of applying one layout hypothesis to one frame.
///
/// A disposable, derived view: recompute it when the hypothesis changes.
/// The checksum outcome starts as `NotEvaluated` and only moves through an
/// explicit [`FrameParser::evaluate_checksums`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePacket {
    /// Capture-relative timestamp of the source frame
    pub timestamp: f64,
    /// The full raw frame bytes
    pub raw: Vec<u8>,
    /// Decoded fixed header fields, in layout order
    pub fields: Vec<FieldValue>,
    /// The hypothesized payload region
    pub payload: FieldValue,
    /// The hypothesized checksum trailer
    pub trailer: FieldValue,
    /// Checksum evaluation state
    pub checksum: ChecksumOutcome,
    /// Byte order inherited from the layout
    pub endianness: Endianness,
}

impl CandidatePacket {
    /// The decoded field for a role, if the layout defined one
    pub fn field(&self, role: FieldRole) -> Option<&FieldValue> {
        match role {
            FieldRole::Payload => Some(&self.payload),
            FieldRole::Checksum => Some(&self.trailer),
            _ => self.fields.iter().find(|f| f.role == role),
        }
    }

    /// Integer value of a role's field, when complete
    pub fn value(&self, role: FieldRole) -> Option<u64> {
        self.field(role).and_then(|f| f.value(self.endianness))
    }

    /// Header-plus-payload bytes a checksum would have covered.
    ///
    /// `None` when the frame is shorter than the trailer, in which case
    /// there is nothing meaningful to evaluate.
    pub fn body(&self) -> Option<&[u8]> {
        if self.trailer.truncated {
            return None;
        }
        Some(&self.raw[..self.raw.len() - self.trailer.bytes.len()])
    }

    /// Whether any field range overran the frame
    pub fn any_truncated(&self) -> bool {
        self.payload.truncated
            || self.trailer.truncated
            || self.fields.iter().any(|f| f.truncated)
    }

    /// Full frame as hex
    pub fn to_hex(&self, separator: &str) -> String {
        self.raw
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Payload as hex with a printable-ASCII gutter, scope-style
    pub fn format_payload(&self) -> String {
        if self.payload.bytes.is_empty() {
            return "(empty)".into();
        }
        let hex = self.payload.to_hex();
        let ascii: String = self
            .payload
            .bytes
            .iter()
            .map(|&b| {
                if (32..127).contains(&b) {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        format!("{}  |{}|", hex, ascii)
    }

    /// One-line header summary, resolving labels through the names table
    pub fn summary(&self, names: &NameTable) -> String {
        let mut parts = Vec::new();

        if let (Some(src), Some(dest)) =
            (self.value(FieldRole::SrcAddr), self.value(FieldRole::DestAddr))
        {
            let src_label = names
                .address_label(src)
                .map(|l| format!(" ({})", l))
                .unwrap_or_default();
            let dest_label = names
                .address_label(dest)
                .map(|l| format!(" ({})", l))
                .unwrap_or_default();
            parts.push(format!(
                "[{:04x}{} -> {:04x}{}]",
                src, src_label, dest, dest_label
            ));
        }
        if let Some(msg_type) = self.value(FieldRole::MessageType) {
            let label = names
                .message_type_label(msg_type)
                .map(|l| format!(" ({})", l))
                .unwrap_or_default();
            parts.push(format!("type:{:02x}{}", msg_type, label));
        }
        if let Some(seq) = self.value(FieldRole::Sequence) {
            parts.push(format!("seq:{:02x}", seq));
        }
        parts.push(format!("len:{}", self.raw.len()));
        if self.any_truncated() {
            parts.push("TRUNCATED".into());
        }
        match self.checksum {
            ChecksumOutcome::NotEvaluated => {}
            ChecksumOutcome::NoneMatched => parts.push("cksum:none-matched".into()),
            ChecksumOutcome::Matched(id) => parts.push(format!("cksum:{}", id.name())),
        }

        parts.join(" ")
    }
}

/// Applies one layout hypothesis to frames
#[derive(Debug, Clone)]
pub struct FrameParser {
    layout: LayoutHypothesis,
}

impl FrameParser {
    /// Parser for the given hypothesis
    pub fn new(layout: LayoutHypothesis) -> Self {
        Self { layout }
    }

    /// The hypothesis this parser applies
    pub fn layout(&self) -> &LayoutHypothesis {
        &self.layout
    }

    /// Parse one frame. Total: never fails, whatever the frame length.
    pub fn parse(&self, frame: &RawFrame) -> CandidatePacket {
        let raw = frame.bytes();
        let layout = &self.layout;

        let fields = layout
            .fields
            .iter()
            .map(|spec| slice_field(raw, spec.role, spec.offset, spec.offset + spec.len))
            .collect();

        // Payload spans header..len-trailer; a frame shorter than
        // header+trailer has a truncated (possibly empty) payload.
        let payload_end = raw.len().saturating_sub(layout.trailer_len);
        let payload = FieldValue {
            role: FieldRole::Payload,
            bytes: if payload_end > layout.header_len {
                raw[layout.header_len..payload_end].to_vec()
            } else {
                Vec::new()
            },
            truncated: raw.len() < layout.header_len + layout.trailer_len,
        };

        // Trailer anchors at the end of the frame
        let trailer = if raw.len() >= layout.trailer_len {
            FieldValue {
                role: FieldRole::Checksum,
                bytes: raw[raw.len() - layout.trailer_len..].to_vec(),
                truncated: false,
            }
        } else {
            FieldValue {
                role: FieldRole::Checksum,
                bytes: raw.to_vec(),
                truncated: true,
            }
        };

        CandidatePacket {
            timestamp: frame.timestamp(),
            raw: raw.to_vec(),
            fields,
            payload,
            trailer,
            checksum: ChecksumOutcome::NotEvaluated,
            endianness: layout.endianness,
        }
    }

    /// Parse every frame of a capture, in order
    pub fn parse_capture(&self, capture: &Capture) -> Vec<CandidatePacket> {
        capture.iter().map(|frame| self.parse(frame)).collect()
    }

    /// Whether one candidate function reproduces this packet's trailer
    pub fn evaluate(&self, packet: &CandidatePacket, id: ChecksumId) -> bool {
        match packet.body() {
            Some(body) => id.matches(body, &packet.trailer.bytes, packet.endianness),
            None => false,
        }
    }

    /// Try candidates in order and record the outcome on the packet.
    ///
    /// With no candidates, or with a trailer the frame cannot supply, the
    /// outcome stays `NotEvaluated` — absence of evidence is not a match
    /// and not a failure.
    pub fn evaluate_checksums(&self, packet: &mut CandidatePacket, candidates: &[ChecksumId]) {
        if candidates.is_empty() || packet.body().is_none() || self.layout.trailer_len == 0 {
            return;
        }
        for &id in candidates {
            if self.evaluate(packet, id) {
                packet.checksum = ChecksumOutcome::Matched(id);
                return;
            }
        }
        packet.checksum = ChecksumOutcome::NoneMatched;
    }
}

fn slice_field(raw: &[u8], role: FieldRole, start: usize, end: usize) -> FieldValue {
    let available_start = start.min(raw.len());
    let available_end = end.min(raw.len());
    FieldValue {
        role,
        bytes: raw[available_start..available_end].to_vec(),
        truncated: end > raw.len(),
    }
}

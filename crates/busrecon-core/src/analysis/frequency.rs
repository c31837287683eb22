//! Field-value frequency tables
//!
//! For each field role a layout defines, counts how often each value occurs
//! across a capture. Output order is deterministic: count descending, then
//! first-seen order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::decode::{CandidatePacket, FieldRole};

/// One value and its occurrence count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    /// The field bytes observed
    pub bytes: Vec<u8>,
    /// Integer view, when the field is a complete integer-sized range
    pub value: Option<u64>,
    /// Occurrences across the capture
    pub count: usize,
}

/// Frequency table for one field role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFrequency {
    /// The role this table covers
    pub role: FieldRole,
    /// Entries, count descending with first-seen tie-break
    pub entries: Vec<ValueCount>,
    /// Frames whose field was truncated and therefore not counted
    pub truncated: usize,
}

/// Source/destination pair tally, when the layout defines both address roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationCount {
    /// Source address value
    pub src: u64,
    /// Destination address value
    pub dest: u64,
    /// Frames seen for this pair
    pub count: usize,
}

/// Build the frequency table for one role over parsed packets
pub fn field_frequency(packets: &[CandidatePacket], role: FieldRole) -> FieldFrequency {
    let mut counts: HashMap<Vec<u8>, (usize, usize)> = HashMap::new(); // bytes -> (count, first_seen)
    let mut truncated = 0usize;
    let mut order = 0usize;

    for packet in packets {
        let Some(field) = packet.field(role) else {
            continue;
        };
        if field.truncated {
            truncated += 1;
            continue;
        }
        let entry = counts.entry(field.bytes.clone()).or_insert_with(|| {
            let slot = (0, order);
            order += 1;
            slot
        });
        entry.0 += 1;
    }

    let mut entries: Vec<(Vec<u8>, usize, usize)> = counts
        .into_iter()
        .map(|(bytes, (count, first_seen))| (bytes, count, first_seen))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let endianness = packets
        .first()
        .map(|p| p.endianness)
        .unwrap_or_default();

    FieldFrequency {
        role,
        entries: entries
            .into_iter()
            .map(|(bytes, count, _)| ValueCount {
                value: int_value(&bytes, endianness),
                bytes,
                count,
            })
            .collect(),
        truncated,
    }
}

/// Tally (src, dest) address pairs over parsed packets
pub fn conversations(packets: &[CandidatePacket]) -> Vec<ConversationCount> {
    let mut counts: HashMap<(u64, u64), (usize, usize)> = HashMap::new();
    let mut order = 0usize;

    for packet in packets {
        let (Some(src), Some(dest)) = (
            packet.value(FieldRole::SrcAddr),
            packet.value(FieldRole::DestAddr),
        ) else {
            continue;
        };
        let entry = counts.entry((src, dest)).or_insert_with(|| {
            let slot = (0, order);
            order += 1;
            slot
        });
        entry.0 += 1;
    }

    let mut pairs: Vec<((u64, u64), (usize, usize))> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

    pairs
        .into_iter()
        .map(|((src, dest), (count, _))| ConversationCount { src, dest, count })
        .collect()
}

fn int_value(bytes: &[u8], endianness: crate::decode::Endianness) -> Option<u64> {
    use crate::decode::Endianness;
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    Some(match endianness {
        Endianness::Big => bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64),
        Endianness::Little => bytes.iter().rev().fold(0u64, |acc, b| (acc << 8) | *b as u64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RawFrame;
    use crate::decode::{FrameParser, LayoutHypothesis};

    fn packets(frames: &[&[u8]]) -> Vec<CandidatePacket> {
        let parser = FrameParser::new(LayoutHypothesis::net485_guess());
        frames
            .iter()
            .enumerate()
            .map(|(i, bytes)| parser.parse(&RawFrame::new(i as f64, bytes.to_vec())))
            .collect()
    }

    fn frame_with_type(msg_type: u8) -> Vec<u8> {
        let mut bytes = vec![0x20, 0x01, 0x40, 0x01, msg_type, 0x00, 0x00, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&[0x00, 0x00]);
        bytes
    }

    #[test]
    fn test_counts_and_order() {
        let a = frame_with_type(0x05);
        let b = frame_with_type(0x07);
        let frames: Vec<&[u8]> = vec![&b, &a, &a, &b, &b];
        let table = field_frequency(&packets(&frames), FieldRole::MessageType);

        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.entries[0].value, Some(0x07));
        assert_eq!(table.entries[0].count, 3);
        assert_eq!(table.entries[1].value, Some(0x05));
    }

    #[test]
    fn test_tie_broken_by_first_seen() {
        let a = frame_with_type(0x05);
        let b = frame_with_type(0x07);
        let frames: Vec<&[u8]> = vec![&b, &a, &a, &b];
        let table = field_frequency(&packets(&frames), FieldRole::MessageType);

        // Equal counts: 0x07 appeared first
        assert_eq!(table.entries[0].value, Some(0x07));
        assert_eq!(table.entries[1].value, Some(0x05));
    }

    #[test]
    fn test_truncated_fields_counted_separately() {
        let a = frame_with_type(0x05);
        let short: &[u8] = &[0x20, 0x01];
        let frames: Vec<&[u8]> = vec![&a, short];
        let table = field_frequency(&packets(&frames), FieldRole::MessageType);

        assert_eq!(table.entries.len(), 1);
        assert_eq!(table.truncated, 1);
    }

    #[test]
    fn test_conversations() {
        let a = frame_with_type(0x01);
        let frames: Vec<&[u8]> = vec![&a, &a];
        let convs = conversations(&packets(&frames));
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].src, 0x4001);
        assert_eq!(convs[0].dest, 0x2001);
        assert_eq!(convs[0].count, 2);
    }
}

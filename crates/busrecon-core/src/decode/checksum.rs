//! Checksum candidate functions
//!
//! The real checksum algorithm of the bus is unknown. This module carries
//! a set of candidate functions and the machinery to test them against
//! observed trailers; nothing here ever promotes a candidate to "the"
//! checksum. A function that has not matched every evaluated frame is only
//! ever a ranked hypothesis.

use serde::{Deserialize, Serialize};

use super::layout::Endianness;

/// Identity of a checksum candidate function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChecksumId {
    /// Additive sum mod 256
    Sum8,
    /// Additive sum mod 65536
    Sum16,
    /// XOR of all bytes
    Xor8,
    /// Fletcher-16
    Fletcher16,
    /// CRC-8, polynomial 0x07, init 0 (SMBus)
    Crc8Smbus,
    /// CRC-16/CCITT-FALSE, polynomial 0x1021, init 0xFFFF
    Crc16Ccitt,
    /// CRC-16/ARC, reflected polynomial 0xA001, init 0
    Crc16Ibm,
    /// CRC-32 (IEEE)
    Crc32,
}

impl ChecksumId {
    /// Every candidate, in complexity order
    pub fn all() -> &'static [ChecksumId] {
        &[
            ChecksumId::Xor8,
            ChecksumId::Sum8,
            ChecksumId::Sum16,
            ChecksumId::Fletcher16,
            ChecksumId::Crc8Smbus,
            ChecksumId::Crc16Ccitt,
            ChecksumId::Crc16Ibm,
            ChecksumId::Crc32,
        ]
    }

    /// Width of the produced checksum in bytes
    pub fn width(self) -> usize {
        match self {
            ChecksumId::Sum8 | ChecksumId::Xor8 | ChecksumId::Crc8Smbus => 1,
            ChecksumId::Sum16
            | ChecksumId::Fletcher16
            | ChecksumId::Crc16Ccitt
            | ChecksumId::Crc16Ibm => 2,
            ChecksumId::Crc32 => 4,
        }
    }

    /// Rank for the simplest-hypothesis tie-break: lower is simpler
    pub fn complexity(self) -> u8 {
        match self {
            ChecksumId::Xor8 => 1,
            ChecksumId::Sum8 => 1,
            ChecksumId::Sum16 => 2,
            ChecksumId::Fletcher16 => 3,
            ChecksumId::Crc8Smbus => 4,
            ChecksumId::Crc16Ccitt => 5,
            ChecksumId::Crc16Ibm => 5,
            ChecksumId::Crc32 => 6,
        }
    }

    /// Stable ordering index for deterministic reports
    pub fn index(self) -> usize {
        Self::all().iter().position(|c| *c == self).unwrap_or(usize::MAX)
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            ChecksumId::Sum8 => "sum-8",
            ChecksumId::Sum16 => "sum-16",
            ChecksumId::Xor8 => "xor-8",
            ChecksumId::Fletcher16 => "fletcher-16",
            ChecksumId::Crc8Smbus => "crc-8/smbus",
            ChecksumId::Crc16Ccitt => "crc-16/ccitt-false",
            ChecksumId::Crc16Ibm => "crc-16/arc",
            ChecksumId::Crc32 => "crc-32",
        }
    }

    /// Compute the candidate over `data`, in the function's native width
    pub fn compute(self, data: &[u8]) -> u64 {
        match self {
            ChecksumId::Sum8 => data.iter().fold(0u64, |acc, b| acc.wrapping_add(*b as u64)) & 0xff,
            ChecksumId::Sum16 => {
                data.iter().fold(0u64, |acc, b| acc.wrapping_add(*b as u64)) & 0xffff
            }
            ChecksumId::Xor8 => data.iter().fold(0u64, |acc, b| acc ^ *b as u64),
            ChecksumId::Fletcher16 => fletcher16(data) as u64,
            ChecksumId::Crc8Smbus => crc8(data, 0x07, 0x00) as u64,
            ChecksumId::Crc16Ccitt => crc16_msb(data, 0x1021, 0xffff) as u64,
            ChecksumId::Crc16Ibm => crc16_lsb(data, 0xa001, 0x0000) as u64,
            ChecksumId::Crc32 => crc32fast::hash(data) as u64,
        }
    }

    /// Whether this candidate reproduces the observed trailer for the body.
    ///
    /// The trailer must be exactly this function's width; otherwise the
    /// function cannot have produced it and the candidate does not apply.
    pub fn matches(self, body: &[u8], trailer: &[u8], endianness: Endianness) -> bool {
        if trailer.len() != self.width() {
            return false;
        }
        self.compute(body) == trailer_value(trailer, endianness)
    }
}

/// Interpret trailer bytes as an integer in the layout's byte order
pub fn trailer_value(trailer: &[u8], endianness: Endianness) -> u64 {
    match endianness {
        Endianness::Big => trailer.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64),
        Endianness::Little => trailer
            .iter()
            .rev()
            .fold(0u64, |acc, b| (acc << 8) | *b as u64),
    }
}

fn fletcher16(data: &[u8]) -> u16 {
    let (mut sum1, mut sum2) = (0u32, 0u32);
    for &b in data {
        sum1 = (sum1 + b as u32) % 255;
        sum2 = (sum2 + sum1) % 255;
    }
    ((sum2 << 8) | sum1) as u16
}

fn crc8(data: &[u8], poly: u8, init: u8) -> u8 {
    let mut crc = init;
    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ poly
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn crc16_msb(data: &[u8], poly: u16, init: u16) -> u16 {
    let mut crc = init;
    for &b in data {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ poly
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn crc16_lsb(data: &[u8], poly: u16, init: u16) -> u16 {
    let mut crc = init;
    for &b in data {
        crc ^= b as u16;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ poly } else { crc >> 1 };
        }
    }
    crc
}

/// Outcome of checksum evaluation for one packet.
///
/// `NotEvaluated` is the construction-time state and must never be read as
/// "verified"; `Matched` only means the named function reproduced this one
/// frame's trailer, nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ChecksumOutcome {
    /// No checksum function has been applied yet
    #[default]
    NotEvaluated,
    /// Every candidate tried failed to reproduce the trailer
    NoneMatched,
    /// This function reproduced the trailer for this frame
    Matched(ChecksumId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        // "123456789" check values from the usual CRC catalogues
        let data = b"123456789";
        assert_eq!(ChecksumId::Crc16Ccitt.compute(data), 0x29b1);
        assert_eq!(ChecksumId::Crc16Ibm.compute(data), 0xbb3d);
        assert_eq!(ChecksumId::Crc8Smbus.compute(data), 0xf4);
        assert_eq!(ChecksumId::Crc32.compute(data), 0xcbf43926);
    }

    #[test]
    fn test_simple_sums() {
        let data = [0x01, 0x02, 0xff];
        assert_eq!(ChecksumId::Sum8.compute(&data), 0x02);
        assert_eq!(ChecksumId::Sum16.compute(&data), 0x0102);
        assert_eq!(ChecksumId::Xor8.compute(&data), 0xfc);
    }

    #[test]
    fn test_width_gates_matching() {
        let body = [0x10, 0x20];
        let sum = ChecksumId::Sum16.compute(&body);
        let trailer_be = [(sum >> 8) as u8, sum as u8];

        assert!(ChecksumId::Sum16.matches(&body, &trailer_be, Endianness::Big));
        // A 1-byte function can never have produced a 2-byte trailer
        assert!(!ChecksumId::Sum8.matches(&body, &trailer_be, Endianness::Big));
    }

    #[test]
    fn test_trailer_endianness() {
        assert_eq!(trailer_value(&[0x12, 0x34], Endianness::Big), 0x1234);
        assert_eq!(trailer_value(&[0x12, 0x34], Endianness::Little), 0x3412);
    }

    #[test]
    fn test_outcome_defaults_to_not_evaluated() {
        assert_eq!(ChecksumOutcome::default(), ChecksumOutcome::NotEvaluated);
    }
}

//! Systematic checksum-candidate search
//!
//! Evaluates every candidate function against every frame of a capture and
//! ranks the results. A candidate is only "consistent" when it reproduced
//! the trailer of *all* evaluated frames; everything else is reported with
//! its exact match ratio so nothing looks more authoritative than the
//! evidence supports.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capture::Capture;
use crate::decode::{ChecksumId, FrameParser, LayoutHypothesis};

/// One candidate function's tally against a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumCandidate {
    /// Which function was tested
    pub id: ChecksumId,
    /// Frames whose trailer the function reproduced
    pub matched: usize,
    /// Frames that could be evaluated (long enough for the trailer)
    pub evaluated: usize,
    /// True only when every evaluated frame matched and at least one did
    pub consistent: bool,
}

impl ChecksumCandidate {
    /// Exact match ratio; zero when nothing could be evaluated
    pub fn ratio(&self) -> f64 {
        if self.evaluated == 0 {
            0.0
        } else {
            self.matched as f64 / self.evaluated as f64
        }
    }
}

/// Evaluate candidate functions against every frame of a capture.
///
/// Only functions whose width equals the layout's trailer length apply; the
/// others could never have produced the trailer and are omitted. Results
/// are sorted by match ratio descending, then by function complexity
/// ascending — when two hypotheses explain the data equally well, prefer
/// the simpler one.
pub fn search_checksums(
    capture: &Capture,
    layout: &LayoutHypothesis,
    candidates: &[ChecksumId],
) -> Vec<ChecksumCandidate> {
    let parser = FrameParser::new(layout.clone());
    let packets = parser.parse_capture(capture);

    let applicable: Vec<ChecksumId> = candidates
        .iter()
        .copied()
        .filter(|id| id.width() == layout.trailer_len)
        .collect();
    if applicable.len() < candidates.len() {
        debug!(
            skipped = candidates.len() - applicable.len(),
            trailer_len = layout.trailer_len,
            "candidates with a different width than the trailer were skipped"
        );
    }

    let mut results: Vec<ChecksumCandidate> = applicable
        .into_iter()
        .map(|id| {
            let mut matched = 0usize;
            let mut evaluated = 0usize;
            for packet in &packets {
                if packet.body().is_none() {
                    continue; // too short to carry the hypothesized trailer
                }
                evaluated += 1;
                if parser.evaluate(packet, id) {
                    matched += 1;
                }
            }
            ChecksumCandidate {
                id,
                matched,
                evaluated,
                consistent: evaluated > 0 && matched == evaluated,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.ratio()
            .total_cmp(&a.ratio())
            .then(a.id.complexity().cmp(&b.id.complexity()))
            .then(a.id.index().cmp(&b.id.index()))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RawFrame;
    use crate::decode::LayoutHypothesis;

    /// Frame with a valid big-endian sum-16 trailer
    fn summed_frame(seed: u8) -> RawFrame {
        let mut bytes: Vec<u8> = (0..12).map(|i| i as u8 ^ seed).collect();
        let sum: u16 = bytes.iter().map(|&b| b as u16).sum();
        bytes.extend_from_slice(&sum.to_be_bytes());
        RawFrame::new(seed as f64, bytes)
    }

    fn summed_capture(n: u8) -> Capture {
        Capture::from_frames((0..n).map(summed_frame).collect()).unwrap()
    }

    #[test]
    fn test_consistent_candidate_ranked_first() {
        let capture = summed_capture(6);
        let layout = LayoutHypothesis::net485_guess();
        let results = search_checksums(&capture, &layout, ChecksumId::all());

        let top = &results[0];
        assert_eq!(top.id, ChecksumId::Sum16);
        assert!(top.consistent);
        assert_eq!(top.matched, 6);
        assert_eq!(top.evaluated, 6);

        // Every other candidate reports a ratio below 1
        for candidate in &results[1..] {
            assert!(candidate.ratio() < 1.0);
            assert!(!candidate.consistent);
        }
    }

    #[test]
    fn test_partial_match_reported_not_discarded() {
        let mut frames: Vec<RawFrame> = (0..4).map(summed_frame).collect();
        // Corrupt one trailer
        let mut bad = frames[3].bytes().to_vec();
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        frames[3] = RawFrame::new(frames[3].timestamp(), bad);

        let capture = Capture::from_frames(frames).unwrap();
        let results =
            search_checksums(&capture, &LayoutHypothesis::net485_guess(), &[ChecksumId::Sum16]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].matched, 3);
        assert_eq!(results[0].evaluated, 4);
        assert!(!results[0].consistent);
        assert!((results[0].ratio() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_width_mismatch_omitted() {
        let capture = summed_capture(3);
        let layout = LayoutHypothesis::net485_guess(); // 2-byte trailer
        let results = search_checksums(&capture, &layout, &[ChecksumId::Sum8, ChecksumId::Crc32]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_consistency_preserved_under_removal() {
        let full = summed_capture(8);
        let layout = LayoutHypothesis::net485_guess();

        let full_results = search_checksums(&full, &layout, &[ChecksumId::Sum16]);
        assert!(full_results[0].consistent);

        // Any subset of a consistent capture stays consistent
        let subset = Capture::from_frames(full.frames()[2..5].to_vec()).unwrap();
        let subset_results = search_checksums(&subset, &layout, &[ChecksumId::Sum16]);
        assert!(subset_results[0].consistent);
        assert_eq!(subset_results[0].ratio(), 1.0);
    }

    #[test]
    fn test_removing_failing_frames_never_lowers_ratio() {
        let mut frames: Vec<RawFrame> = (0..6).map(summed_frame).collect();
        let mut bad = frames[5].bytes().to_vec();
        bad[0] ^= 0xff;
        frames[5] = RawFrame::new(frames[5].timestamp(), bad);

        let layout = LayoutHypothesis::net485_guess();
        let with_bad = Capture::from_frames(frames.clone()).unwrap();
        let before = search_checksums(&with_bad, &layout, &[ChecksumId::Sum16])[0].ratio();

        frames.pop();
        let without_bad = Capture::from_frames(frames).unwrap();
        let after = search_checksums(&without_bad, &layout, &[ChecksumId::Sum16])[0].ratio();

        assert!(after >= before);
        assert_eq!(after, 1.0);
    }
}

//! Repeated-subsequence search
//!
//! Surfaces byte strings that recur across a capture — fixed preambles,
//! sync words, shared prefixes — which a layout hypothesis may be missing.
//! Frames are joined with unique boundary tokens so a match can never
//! spuriously span two frames, unless cross-frame matching is explicitly
//! enabled.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::capture::Capture;

/// A repeated byte string and how often it occurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedPattern {
    /// The recurring bytes
    pub bytes: Vec<u8>,
    /// Number of (possibly overlapping) occurrences
    pub occurrences: usize,
    /// Ranking score: length × occurrences
    pub score: usize,
}

/// Search parameters
#[derive(Debug, Clone, Copy)]
pub struct RepeatSearch {
    /// Shortest pattern worth reporting
    pub min_len: usize,
    /// Longest pattern tried
    pub max_len: usize,
    /// Minimum occurrences to count as repeated
    pub min_occurrences: usize,
    /// Report at most this many patterns
    pub top_k: usize,
    /// Allow matches to span frame boundaries
    pub cross_frame: bool,
}

impl Default for RepeatSearch {
    fn default() -> Self {
        Self {
            min_len: 2,
            max_len: 16,
            min_occurrences: 2,
            top_k: 20,
            cross_frame: false,
        }
    }
}

/// Token alphabet: bytes stay 0..=255, boundaries get values above that.
/// Each boundary token is unique, so no repeated window can contain one.
type Token = u32;

impl RepeatSearch {
    /// Find the top repeated byte strings across a capture's frames
    pub fn run(&self, capture: &Capture) -> Vec<RepeatedPattern> {
        let tokens = self.tokenize(capture);
        let mut found: Vec<RepeatedPattern> = Vec::new();

        for len in self.min_len..=self.max_len {
            if len > tokens.len() {
                break;
            }
            let mut windows: HashMap<&[Token], usize> = HashMap::new();
            for window in tokens.windows(len) {
                if window.iter().any(|t| *t > 0xff) {
                    continue; // contains a frame boundary
                }
                *windows.entry(window).or_insert(0) += 1;
            }

            for (window, count) in windows {
                if count >= self.min_occurrences {
                    found.push(RepeatedPattern {
                        bytes: window.iter().map(|t| *t as u8).collect(),
                        occurrences: count,
                        score: window.len() * count,
                    });
                }
            }
        }

        // A shorter pattern that only ever occurs inside a longer reported
        // one adds no information; drop it when the counts agree.
        found.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.bytes.len().cmp(&a.bytes.len()))
                .then(a.bytes.cmp(&b.bytes))
        });
        let mut kept: Vec<RepeatedPattern> = Vec::new();
        for pattern in found {
            let subsumed = kept.iter().any(|longer| {
                longer.occurrences == pattern.occurrences
                    && longer.bytes.len() > pattern.bytes.len()
                    && longer
                        .bytes
                        .windows(pattern.bytes.len())
                        .any(|w| w == pattern.bytes.as_slice())
            });
            if !subsumed {
                kept.push(pattern);
            }
            if kept.len() >= self.top_k {
                break;
            }
        }
        kept
    }

    fn tokenize(&self, capture: &Capture) -> Vec<Token> {
        let mut tokens = Vec::with_capacity(capture.total_bytes() + capture.len());
        let mut boundary: Token = 0x100;
        for (i, frame) in capture.iter().enumerate() {
            if i > 0 && !self.cross_frame {
                tokens.push(boundary);
                boundary += 1;
            }
            tokens.extend(frame.bytes().iter().map(|b| *b as Token));
        }
        tokens
    }
}

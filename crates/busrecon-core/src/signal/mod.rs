//! Signal-trace analysis
//!
//! Works on raw `(timestamp, level)` samples exported from an oscilloscope
//! or logic analyzer, upstream of any byte-level capture: edge extraction,
//! pulse-width statistics, baud-rate estimation, and physical-layer
//! classification. These run before a capture is configured — they tell you
//! *how* to listen to the bus.

mod baud;
mod classifier;
pub mod import;

pub use baud::{
    score_byte_quality, BaudDetection, BaudDetector, BaudEstimate, ByteQuality,
    STANDARD_BAUD_RATES,
};
pub use classifier::{
    mains_synchronization, Classification, ClassifierConfig, MainsSync, PhysicalLayerKind,
    SignalClassifier,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from signal-trace import
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("no parsable samples in input")]
    NoSamples,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single observation from a signal trace: time and level.
///
/// The level may be a voltage, a differential pair value, or a 0/1 logic
/// level; edge extraction only compares it against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Monotonic timestamp in seconds
    pub timestamp: f64,
    /// Signal level
    pub level: f64,
}

impl Sample {
    /// Convenience constructor
    pub fn new(timestamp: f64, level: f64) -> Self {
        Self { timestamp, level }
    }
}

/// Edge direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Level crossed the threshold upwards
    Rising,
    /// Level crossed the threshold downwards
    Falling,
}

/// A level transition detected in a sample trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Time of the transition in seconds
    pub at: f64,
    /// Transition direction
    pub kind: EdgeKind,
}

/// Find rising and falling edges by thresholding the sample levels.
///
/// The transition is timed at the first sample on the new side of the
/// threshold. Fewer than two samples yield no edges.
pub fn find_edges(samples: &[Sample], threshold: f64) -> Vec<Edge> {
    let mut edges = Vec::new();
    let Some(first) = samples.first() else {
        return edges;
    };

    let mut prev_high = first.level > threshold;
    for sample in &samples[1..] {
        let high = sample.level > threshold;
        if high != prev_high {
            edges.push(Edge {
                at: sample.timestamp,
                kind: if high {
                    EdgeKind::Rising
                } else {
                    EdgeKind::Falling
                },
            });
            prev_high = high;
        }
    }
    edges
}

/// Pulse-width statistics over consecutive edges, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseStats {
    /// Number of pulses (edge pairs)
    pub count: usize,
    /// Shortest pulse
    pub min: f64,
    /// Longest pulse
    pub max: f64,
    /// Mean pulse width
    pub mean: f64,
    /// Median pulse width
    pub median: f64,
}

impl PulseStats {
    /// Compute pulse widths between consecutive edges.
    ///
    /// Returns `None` for fewer than two edges.
    pub fn from_edges(edges: &[Edge]) -> Option<Self> {
        let widths = pulse_widths(edges);
        if widths.is_empty() {
            return None;
        }

        let mut sorted = widths.clone();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sorted.iter().sum::<f64>() / count as f64,
            median,
        })
    }
}

/// Intervals between consecutive edges, in seconds
pub fn pulse_widths(edges: &[Edge]) -> Vec<f64> {
    edges.windows(2).map(|pair| pair[1].at - pair[0].at).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_trace(half_period: f64, cycles: usize) -> Vec<Sample> {
        // Two samples per half cycle, toggling between 0 and 1
        let mut samples = Vec::new();
        let mut level = 0.0;
        for i in 0..(cycles * 2) {
            let t = i as f64 * half_period;
            samples.push(Sample::new(t, level));
            samples.push(Sample::new(t + half_period * 0.999, level));
            level = 1.0 - level;
        }
        samples
    }

    #[test]
    fn test_find_edges_alternates() {
        let samples = square_trace(0.001, 4);
        let edges = find_edges(&samples, 0.5);
        assert!(edges.len() >= 6);
        for pair in edges.windows(2) {
            assert_ne!(pair[0].kind, pair[1].kind);
        }
    }

    #[test]
    fn test_no_edges_on_flat_trace() {
        let samples: Vec<Sample> = (0..10).map(|i| Sample::new(i as f64, 0.2)).collect();
        assert!(find_edges(&samples, 0.5).is_empty());
    }

    #[test]
    fn test_pulse_stats() {
        let edges = vec![
            Edge { at: 0.0, kind: EdgeKind::Rising },
            Edge { at: 0.001, kind: EdgeKind::Falling },
            Edge { at: 0.002, kind: EdgeKind::Rising },
            Edge { at: 0.005, kind: EdgeKind::Falling },
        ];
        let stats = PulseStats::from_edges(&edges).unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.min - 0.001).abs() < 1e-9);
        assert!((stats.max - 0.003).abs() < 1e-9);
        assert!((stats.median - 0.001).abs() < 1e-9);
    }

    #[test]
    fn test_pulse_stats_requires_edges() {
        assert!(PulseStats::from_edges(&[]).is_none());
        let one = [Edge { at: 0.0, kind: EdgeKind::Rising }];
        assert!(PulseStats::from_edges(&one).is_none());
    }
}

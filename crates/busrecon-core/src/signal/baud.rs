//! Baud-rate detection from edge timing
//!
//! UART traffic at rate R produces inter-edge intervals that are integer
//! multiples of the bit period 1/R. The smallest interval cluster that
//! occurs frequently is therefore one bit time. The detector never guesses:
//! if no dominant cluster exists it reports `Undetermined` and the caller
//! must not fall back to a default rate.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{find_edges, pulse_widths, Edge, Sample};

/// The closed set of standard rates a detection is snapped to
pub const STANDARD_BAUD_RATES: [u32; 8] = [
    1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200,
];

/// A successful baud-rate estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaudEstimate {
    /// Nearest standard rate
    pub baud: u32,
    /// Raw measured rate before snapping, in bits per second
    pub raw_bits_per_sec: f64,
    /// Confidence in [0, 1], from cluster tightness and population share
    pub confidence: f64,
}

/// Outcome of a detection attempt.
///
/// `Undetermined` is a first-class result, not an error: it means the
/// evidence does not support any rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BaudDetection {
    /// A dominant bit-interval cluster was found
    Detected(BaudEstimate),
    /// No rate is supported by the evidence
    Undetermined {
        /// Why no rate could be established
        reason: String,
    },
}

impl BaudDetection {
    /// The estimate, if one was made
    pub fn estimate(&self) -> Option<&BaudEstimate> {
        match self {
            BaudDetection::Detected(e) => Some(e),
            BaudDetection::Undetermined { .. } => None,
        }
    }
}

/// Interval-histogram baud detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaudDetector {
    /// Minimum number of edges required to attempt detection
    pub min_edges: usize,
    /// Relative width of an interval cluster (fraction of the cluster mean)
    pub cluster_tolerance: f64,
    /// Minimum share of all intervals a cluster needs to count as dominant
    pub min_cluster_share: f64,
    /// Largest relative deviation allowed when snapping to a standard rate
    pub max_snap_deviation: f64,
    /// Estimates below this confidence are reported as undetermined
    pub min_confidence: f64,
}

impl Default for BaudDetector {
    fn default() -> Self {
        Self {
            min_edges: 16,
            cluster_tolerance: 0.25,
            min_cluster_share: 0.15,
            max_snap_deviation: 0.15,
            min_confidence: 0.25,
        }
    }
}

#[derive(Debug)]
struct Cluster {
    mean: f64,
    values: Vec<f64>,
}

impl BaudDetector {
    /// Detector with default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect the baud rate from a set of signal transitions
    pub fn detect(&self, edges: &[Edge]) -> BaudDetection {
        if edges.len() < self.min_edges {
            return BaudDetection::Undetermined {
                reason: format!(
                    "only {} transitions, need at least {}",
                    edges.len(),
                    self.min_edges
                ),
            };
        }

        let intervals = pulse_widths(edges);
        let clusters = self.cluster_intervals(&intervals);

        let needed = ((intervals.len() as f64 * self.min_cluster_share).ceil() as usize).max(4);
        let dominant = clusters
            .iter()
            .filter(|c| c.values.len() >= needed)
            .min_by(|a, b| a.mean.total_cmp(&b.mean));

        let Some(cluster) = dominant else {
            return BaudDetection::Undetermined {
                reason: "no dominant bit-interval cluster".into(),
            };
        };

        if cluster.mean <= 0.0 {
            return BaudDetection::Undetermined {
                reason: "degenerate zero-width intervals".into(),
            };
        }

        let raw = 1.0 / cluster.mean;
        let (baud, snap_deviation) = nearest_standard(raw);
        if snap_deviation > self.max_snap_deviation {
            return BaudDetection::Undetermined {
                reason: format!(
                    "measured {:.0} bit/s sits {:.0}% from the nearest standard rate",
                    raw,
                    snap_deviation * 100.0
                ),
            };
        }

        let confidence = self.confidence(cluster, intervals.len());
        if confidence < self.min_confidence {
            return BaudDetection::Undetermined {
                reason: format!(
                    "dominant interval cluster too loose (confidence {:.2})",
                    confidence
                ),
            };
        }
        debug!(
            baud,
            raw_bits_per_sec = raw,
            confidence,
            cluster_size = cluster.values.len(),
            "baud rate detected"
        );

        BaudDetection::Detected(BaudEstimate {
            baud,
            raw_bits_per_sec: raw,
            confidence,
        })
    }

    /// Extract edges from raw samples first, then detect
    pub fn detect_from_samples(&self, samples: &[Sample], threshold: f64) -> BaudDetection {
        self.detect(&find_edges(samples, threshold))
    }

    /// Greedy single-pass clustering over sorted intervals.
    ///
    /// Intervals are multiples of the bit period, so sorting separates the
    /// 1-bit cluster from the 2-bit, 3-bit, ... clusters naturally.
    fn cluster_intervals(&self, intervals: &[f64]) -> Vec<Cluster> {
        let mut sorted: Vec<f64> = intervals
            .iter()
            .copied()
            .filter(|w| *w > 0.0 && w.is_finite())
            .collect();
        sorted.sort_by(f64::total_cmp);

        let mut clusters: Vec<Cluster> = Vec::new();
        for value in sorted {
            match clusters.last_mut() {
                Some(cluster)
                    if (value - cluster.mean).abs() <= cluster.mean * self.cluster_tolerance =>
                {
                    cluster.values.push(value);
                    cluster.mean = cluster.values.iter().sum::<f64>() / cluster.values.len() as f64;
                }
                _ => clusters.push(Cluster {
                    mean: value,
                    values: vec![value],
                }),
            }
        }
        clusters
    }

    /// Tightness of the dominant cluster times its population share
    fn confidence(&self, cluster: &Cluster, total_intervals: usize) -> f64 {
        let n = cluster.values.len() as f64;
        let variance = cluster
            .values
            .iter()
            .map(|v| (v - cluster.mean).powi(2))
            .sum::<f64>()
            / n;
        let cv = variance.sqrt() / cluster.mean;

        let tightness = (1.0 - cv / self.cluster_tolerance).clamp(0.0, 1.0);
        let coverage = ((n / total_intervals as f64) * 2.0).min(1.0);
        tightness * coverage
    }
}

/// Nearest standard rate and the relative deviation from it
fn nearest_standard(raw: f64) -> (u32, f64) {
    let mut best = STANDARD_BAUD_RATES[0];
    let mut best_dev = f64::INFINITY;
    for &rate in &STANDARD_BAUD_RATES {
        let dev = (raw - rate as f64).abs() / rate as f64;
        if dev < best_dev {
            best = rate;
            best_dev = dev;
        }
    }
    (best, best_dev)
}

/// Byte-level plausibility evidence for an assumed rate.
///
/// A stream decoded at the wrong baud is mostly 0x00/0xFF framing garbage;
/// one decoded correctly tends to show structure. This is supporting
/// evidence for a human, never a classification by itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByteQuality {
    /// Aggregate plausibility score in 0..=100
    pub score: u8,
    /// Share of printable ASCII bytes
    pub printable_ratio: f64,
    /// Share of 0x00 and 0xFF bytes
    pub noise_ratio: f64,
    /// Whether a short-period byte repetition was found
    pub has_repetition: bool,
}

/// Score how plausible a decoded byte stream looks
pub fn score_byte_quality(data: &[u8]) -> ByteQuality {
    if data.is_empty() {
        return ByteQuality {
            score: 0,
            printable_ratio: 0.0,
            noise_ratio: 0.0,
            has_repetition: false,
        };
    }

    let printable = data.iter().filter(|b| (32..127).contains(*b)).count();
    let printable_ratio = printable as f64 / data.len() as f64;

    let noisy = data.iter().filter(|&&b| b == 0x00 || b == 0xff).count();
    let noise_ratio = noisy as f64 / data.len() as f64;

    // Common frame sizes on the buses this tool targets
    let mut has_repetition = false;
    'outer: for period in [10usize, 12, 14, 16] {
        if data.len() < period * 2 {
            continue;
        }
        for i in 0..=(data.len() - period * 2) {
            if data[i..i + period] == data[i + period..i + period * 2] {
                has_repetition = true;
                break 'outer;
            }
        }
    }

    let mut score: i32 = 50;
    if noise_ratio > 0.3 {
        score -= 30;
    }
    if printable_ratio > 0.05 && printable_ratio < 0.5 {
        score += 20;
    }
    if has_repetition {
        score += 30;
    }

    ByteQuality {
        score: score.clamp(0, 100) as u8,
        printable_ratio,
        noise_ratio,
        has_repetition,
    }
}

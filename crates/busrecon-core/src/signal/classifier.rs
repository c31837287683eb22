//! Physical-layer classification
//!
//! Distinguishes the two bus families seen in the field: a slow
//! AC-modulated pair whose transitions ride the mains half-cycle
//! (millisecond pulses, 50/60 Hz locked) and a fast differential pair
//! (microsecond pulses, free-running). Anything else is `Undetermined`,
//! which is an expected outcome for short or ambiguous traces.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{find_edges, PulseStats, Sample};

/// Physical-layer families the classifier can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhysicalLayerKind {
    /// Slow bus synchronized to the AC mains half-cycle
    SlowModulated,
    /// Fast free-running differential bus
    FastDifferential,
    /// The trace does not support either classification
    Undetermined,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Logic threshold applied to sample levels
    pub threshold: f64,
    /// Local mains frequency in Hz
    pub mains_hz: f64,
    /// Minimum number of transitions required for a verdict
    pub min_edges: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            mains_hz: 60.0,
            min_edges: 8,
        }
    }
}

/// Classification verdict with the evidence behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// The verdict
    pub kind: PhysicalLayerKind,
    /// Confidence in [0, 1]; zero when undetermined
    pub confidence: f64,
    /// Median pulse width in seconds, when enough edges were present
    pub dominant_pulse: Option<f64>,
    /// Whether edges were phase-locked to the mains half-cycle
    pub mains_locked: Option<bool>,
    /// Human-readable explanation of the verdict
    pub reason: String,
}

impl Classification {
    fn undetermined(reason: impl Into<String>) -> Self {
        Self {
            kind: PhysicalLayerKind::Undetermined,
            confidence: 0.0,
            dominant_pulse: None,
            mains_locked: None,
            reason: reason.into(),
        }
    }
}

/// Mains-synchronization evidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MainsSync {
    /// Whether edge phases cluster on the mains half-cycle
    pub locked: bool,
    /// Circular variance of edge phases in [0, 1]; small means locked
    pub phase_variance: f64,
}

/// Slow-bus pulse widths: mains half-cycles at 50/60 Hz, with margin
const SLOW_PULSE_RANGE: (f64, f64) = (0.002, 0.020);

/// Fast differential pulses are sub-millisecond
const FAST_PULSE_MAX: f64 = 0.001;

/// Circular variance below this counts as phase-locked
const MAINS_LOCK_VARIANCE: f64 = 0.1;

/// Classifies the physical layer of a sampled trace
#[derive(Debug, Clone, Default)]
pub struct SignalClassifier {
    config: ClassifierConfig,
}

impl SignalClassifier {
    /// Classifier with the given configuration
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify a trace.
    ///
    /// `Undetermined` is a valid result for insufficient or ambiguous
    /// input, not an error.
    pub fn classify(&self, samples: &[Sample]) -> Classification {
        let edges = find_edges(samples, self.config.threshold);
        if edges.len() < self.config.min_edges {
            return Classification::undetermined(format!(
                "only {} transitions, need at least {}",
                edges.len(),
                self.config.min_edges
            ));
        }

        let Some(stats) = PulseStats::from_edges(&edges) else {
            return Classification::undetermined("no measurable pulse widths");
        };
        let dominant = stats.median;

        let sync = mains_synchronization(samples, self.config.threshold, self.config.mains_hz);
        debug!(
            dominant_pulse_ms = dominant * 1000.0,
            phase_variance = sync.phase_variance,
            "classifying trace"
        );

        if dominant >= SLOW_PULSE_RANGE.0 && dominant <= SLOW_PULSE_RANGE.1 {
            if sync.locked {
                return Classification {
                    kind: PhysicalLayerKind::SlowModulated,
                    confidence: 0.9,
                    dominant_pulse: Some(dominant),
                    mains_locked: Some(true),
                    reason: format!(
                        "{:.2} ms pulses phase-locked to the {:.0} Hz half-cycle",
                        dominant * 1000.0,
                        self.config.mains_hz
                    ),
                };
            }
            return Classification {
                kind: PhysicalLayerKind::Undetermined,
                confidence: 0.0,
                dominant_pulse: Some(dominant),
                mains_locked: Some(false),
                reason: format!(
                    "{:.2} ms pulses but no mains correlation",
                    dominant * 1000.0
                ),
            };
        }

        if dominant < FAST_PULSE_MAX {
            if sync.locked {
                return Classification {
                    kind: PhysicalLayerKind::Undetermined,
                    confidence: 0.0,
                    dominant_pulse: Some(dominant),
                    mains_locked: Some(true),
                    reason: "sub-millisecond pulses but mains-locked phases".into(),
                };
            }
            // Confidence rises the further below a millisecond the pulses sit
            let confidence = if dominant < 1e-4 { 0.9 } else { 0.7 };
            return Classification {
                kind: PhysicalLayerKind::FastDifferential,
                confidence,
                dominant_pulse: Some(dominant),
                mains_locked: Some(false),
                reason: format!(
                    "{:.1} µs pulses, free-running",
                    dominant * 1e6
                ),
            };
        }

        Classification {
            kind: PhysicalLayerKind::Undetermined,
            confidence: 0.0,
            dominant_pulse: Some(dominant),
            mains_locked: Some(sync.locked),
            reason: format!(
                "{:.2} ms dominant pulse matches neither bus family",
                dominant * 1000.0
            ),
        }
    }
}

/// Check whether edge times are phase-locked to the mains half-cycle.
///
/// Each edge time is reduced to a phase within the half-period; the mean
/// resultant length of those phases on the unit circle measures how tightly
/// they cluster. Free-running edges spread uniformly and score near zero.
pub fn mains_synchronization(samples: &[Sample], threshold: f64, mains_hz: f64) -> MainsSync {
    let edges = find_edges(samples, threshold);
    if edges.len() < 2 || mains_hz <= 0.0 {
        return MainsSync {
            locked: false,
            phase_variance: 1.0,
        };
    }

    let half_period = 1.0 / (2.0 * mains_hz);

    // Lock can only be established across several half-cycles; a shorter
    // trace clusters trivially.
    let span = edges[edges.len() - 1].at - edges[0].at;
    if span < 2.0 * half_period {
        return MainsSync {
            locked: false,
            phase_variance: 1.0,
        };
    }

    let (mut sin_sum, mut cos_sum) = (0.0f64, 0.0f64);
    for edge in &edges {
        let phase = (edge.at % half_period) / half_period * std::f64::consts::TAU;
        sin_sum += phase.sin();
        cos_sum += phase.cos();
    }

    let n = edges.len() as f64;
    let resultant = (sin_sum * sin_sum + cos_sum * cos_sum).sqrt() / n;
    let phase_variance = 1.0 - resultant;

    MainsSync {
        locked: phase_variance < MAINS_LOCK_VARIANCE,
        phase_variance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Square wave toggling every `half_period` seconds
    fn square_wave(half_period: f64, toggles: usize) -> Vec<Sample> {
        let mut samples = Vec::new();
        let mut level = 0.0;
        for i in 0..toggles {
            let t = i as f64 * half_period;
            samples.push(Sample::new(t, level));
            samples.push(Sample::new(t + half_period * 0.5, level));
            level = 1.0 - level;
        }
        samples
    }

    #[test]
    fn test_mains_period_classifies_slow() {
        // 8.33 ms transitions: the 60 Hz half-cycle
        let samples = square_wave(0.00833, 40);
        let result = SignalClassifier::default().classify(&samples);
        assert_eq!(result.kind, PhysicalLayerKind::SlowModulated);
        assert_eq!(result.mains_locked, Some(true));
        assert!(result.confidence > 0.8);
    }

    #[test]
    fn test_microsecond_pulses_classify_fast() {
        let samples = square_wave(2e-6, 60);
        let result = SignalClassifier::default().classify(&samples);
        assert_eq!(result.kind, PhysicalLayerKind::FastDifferential);
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn test_short_trace_undetermined() {
        let samples = square_wave(0.00833, 3);
        let result = SignalClassifier::default().classify(&samples);
        assert_eq!(result.kind, PhysicalLayerKind::Undetermined);
    }

    #[test]
    fn test_intermediate_pulses_undetermined() {
        // 1.5 ms pulses fit neither family
        let samples = square_wave(0.0015, 40);
        let result = SignalClassifier::default().classify(&samples);
        assert_eq!(result.kind, PhysicalLayerKind::Undetermined);
    }

    #[test]
    fn test_mains_sync_rejects_fast_free_running() {
        // Long enough to span several mains half-cycles, so the phases
        // genuinely spread around the circle
        let samples = square_wave(2e-6, 10_000);
        let sync = mains_synchronization(&samples, 0.5, 60.0);
        assert!(!sync.locked, "variance {}", sync.phase_variance);
    }
}

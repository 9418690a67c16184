//! Tempo estimation from onset detection and interval histogram voting

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use tracing::debug;

/// Result of a successful tempo estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmEstimate {
    /// Detected tempo in beats per minute
    pub bpm: f32,
    /// Fraction of inter-onset intervals consistent with `bpm` (0.0 - 1.0)
    pub confidence: f32,
}

/// Offline tempo estimator for mono PCM buffers
///
/// Kick-focused: the signal is low-passed, reduced to an RMS envelope, and
/// the positive slope of that envelope is peak-picked into onsets. Onset
/// spacing then votes for a tempo.
#[derive(Debug, Clone)]
pub struct OnsetBpmEstimator {
    /// Only this much audio from the start of the buffer is analyzed
    max_analysis_secs: f32,
    /// Low-pass cutoff in Hz
    cutoff_hz: f32,
}

impl Default for OnsetBpmEstimator {
    fn default() -> Self {
        Self {
            max_analysis_secs: 30.0,
            cutoff_hz: 150.0,
        }
    }
}

impl OnsetBpmEstimator {
    /// Tempo range accepted by the histogram
    const MIN_BPM: i32 = 60;
    const MAX_BPM: i32 = 200;
    /// Inter-onset intervals outside this window are discarded (seconds)
    const MIN_INTERVAL: f32 = 0.3;
    const MAX_INTERVAL: f32 = 1.0;
    /// Beat divisions tried for each interval (beat, half beat, two beats)
    const DIVISIONS: [f32; 3] = [1.0, 2.0, 0.5];
    /// Minimum spacing between onsets (seconds)
    const MIN_ONSET_SPACING: f32 = 0.1;
    /// Tolerance when checking intervals against the detected beat (seconds)
    const MATCH_TOLERANCE: f32 = 0.05;
    /// Threshold = median + K * std of the onset-strength signal
    const THRESHOLD_K: f32 = 1.5;
    const MIN_ONSETS: usize = 4;
    const MIN_INTERVALS: usize = 3;

    /// Create an estimator with the default 30 s window and 150 Hz cutoff
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit analysis to the first `secs` seconds of each buffer
    pub fn with_max_analysis_secs(mut self, secs: f32) -> Self {
        self.max_analysis_secs = secs.max(1.0);
        self
    }

    /// Estimate tempo from mono samples.
    ///
    /// Returns `None` when the material is inconclusive (too few onsets or
    /// usable intervals); callers fall back to track metadata.
    pub fn estimate(&self, samples: &[f32], sample_rate: u32) -> Option<BpmEstimate> {
        if sample_rate < 100 || samples.is_empty() {
            return None;
        }

        let limit = (sample_rate as f32 * self.max_analysis_secs) as usize;
        let samples = &samples[..samples.len().min(limit)];

        let filtered = low_pass(samples, sample_rate, self.cutoff_hz);
        let hop = (sample_rate / 100) as usize;
        let envelope = rms_envelope(&filtered, hop);
        let onsets = self.detect_onsets(&envelope, hop, sample_rate);

        if onsets.len() < Self::MIN_ONSETS {
            debug!(onsets = onsets.len(), "too few onsets for tempo estimate");
            return None;
        }

        self.vote(&onsets, sample_rate)
    }

    /// Peak-pick the positive envelope slope. Returns onset positions in samples.
    fn detect_onsets(&self, envelope: &[f32], hop: usize, sample_rate: u32) -> Vec<usize> {
        if envelope.len() < 3 {
            return Vec::new();
        }

        let diff: Vec<f32> = envelope
            .windows(2)
            .map(|w| (w[1] - w[0]).max(0.0))
            .collect();

        let mut sorted = diff.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median = sorted[sorted.len() / 2];
        // Spread is measured around the median, not the mean
        let spread = (diff.iter().map(|v| (v - median).powi(2)).sum::<f32>()
            / diff.len() as f32)
            .sqrt();
        let threshold = median + Self::THRESHOLD_K * spread;

        let min_gap = ((sample_rate as f32 / hop as f32) * Self::MIN_ONSET_SPACING) as isize;
        let mut last_onset = -min_gap;
        let mut onsets = Vec::new();

        for i in 1..diff.len().saturating_sub(1) {
            if diff[i] > threshold
                && diff[i] > diff[i - 1]
                && diff[i] >= diff[i + 1]
                && i as isize - last_onset >= min_gap
            {
                onsets.push(i * hop);
                last_onset = i as isize;
            }
        }

        onsets
    }

    /// Histogram-vote a tempo from onset spacing
    fn vote(&self, onsets: &[usize], sample_rate: u32) -> Option<BpmEstimate> {
        let intervals: Vec<f32> = onsets
            .windows(2)
            .map(|w| (w[1] - w[0]) as f32 / sample_rate as f32)
            .filter(|i| (Self::MIN_INTERVAL..=Self::MAX_INTERVAL).contains(i))
            .collect();

        if intervals.len() < Self::MIN_INTERVALS {
            debug!(intervals = intervals.len(), "too few usable intervals");
            return None;
        }

        // Buckets keep first-seen order so ties go to the earliest vote
        let mut votes: Vec<(i32, u32)> = Vec::new();
        for &interval in &intervals {
            for division in Self::DIVISIONS {
                let bpm = (60.0 / (interval * division)).round() as i32;
                if (Self::MIN_BPM..=Self::MAX_BPM).contains(&bpm) {
                    bump(&mut votes, bpm);
                }
            }
        }

        let mut groups: Vec<(i32, u32)> = Vec::new();
        for &(bpm, count) in &votes {
            let group = ((bpm as f32 / 2.0).round() as i32) * 2;
            match groups.iter_mut().find(|(g, _)| *g == group) {
                Some((_, total)) => *total += count,
                None => groups.push((group, count)),
            }
        }

        let mut best: Option<(i32, u32)> = None;
        for &(group, count) in &groups {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((group, count));
            }
        }
        let (bpm, _) = best?;
        if bpm <= 0 {
            return None;
        }

        let expected = 60.0 / bpm as f32;
        let matching = intervals
            .iter()
            .filter(|&&interval| {
                Self::DIVISIONS
                    .iter()
                    .any(|m| (interval * m - expected).abs() < Self::MATCH_TOLERANCE)
            })
            .count();
        let confidence = (matching as f32 / intervals.len() as f32).min(1.0);

        Some(BpmEstimate {
            bpm: bpm as f32,
            confidence: (confidence * 100.0).round() / 100.0,
        })
    }
}

fn bump(votes: &mut Vec<(i32, u32)>, bpm: i32) {
    match votes.iter_mut().find(|(b, _)| *b == bpm) {
        Some((_, count)) => *count += 1,
        None => votes.push((bpm, 1)),
    }
}

/// One-pole low-pass filter
fn low_pass(samples: &[f32], sample_rate: u32, cutoff_hz: f32) -> Vec<f32> {
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let dt = 1.0 / sample_rate as f32;
    let alpha = dt / (rc + dt);

    let mut filtered = Vec::with_capacity(samples.len());
    let mut prev = match samples.first() {
        Some(&s) => s,
        None => return filtered,
    };
    filtered.push(prev);
    for &x in &samples[1..] {
        prev += alpha * (x - prev);
        filtered.push(prev);
    }
    filtered
}

/// RMS over windows of `2 * hop` samples, stepped by `hop`
fn rms_envelope(samples: &[f32], hop: usize) -> Vec<f32> {
    let window = hop * 2;
    if hop == 0 || samples.len() <= window {
        return Vec::new();
    }

    (0..samples.len() - window)
        .step_by(hop)
        .map(|start| {
            let sum: f32 = samples[start..start + window].iter().map(|s| s * s).sum();
            (sum / window as f32).sqrt()
        })
        .collect()
}

//! Per-segment energy curves and drop detection
//!
//! A track is split into 8-beat segments; each segment gets one energy value
//! in 0-100. Drops are segments where energy jumps sharply into a high level.

use serde::{Deserialize, Serialize};

/// Energy curve and drop points of a track
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyProfile {
    /// One value (0-100) per segment, in chronological order
    pub energy_map: Vec<f32>,
    /// Drop timestamps in seconds, ascending, each on a segment boundary
    pub drop_points: Vec<f64>,
}

impl EnergyProfile {
    /// Energy of the first segment
    pub fn first(&self) -> Option<f32> {
        self.energy_map.first().copied()
    }

    /// Energy of the last segment
    pub fn last(&self) -> Option<f32> {
        self.energy_map.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.energy_map.is_empty()
    }
}

/// Builds [`EnergyProfile`]s from decoded audio or from track metadata alone
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyProfiler;

impl EnergyProfiler {
    /// Beats per segment
    pub const BEATS_PER_SEGMENT: f64 = 8.0;
    /// Minimum rise over the previous segment for a drop
    const DROP_RISE: f32 = 25.0;
    /// Minimum level for a drop
    const DROP_LEVEL: f32 = 70.0;
    /// Headroom boost applied after normalization
    const BOOST: f32 = 1.2;
    /// Fallback tempo when metadata has none
    const FALLBACK_BPM: f64 = 120.0;

    pub fn new() -> Self {
        Self
    }

    /// Segment length in seconds for a tempo
    pub fn segment_length(bpm: f64) -> f64 {
        let bpm = if bpm > 0.0 { bpm } else { Self::FALLBACK_BPM };
        Self::BEATS_PER_SEGMENT / (bpm / 60.0)
    }

    /// Number of whole segments in a track (at least one for a non-empty track)
    pub fn segment_count(duration: f64, bpm: f64) -> usize {
        if duration <= 0.0 {
            return 0;
        }
        ((duration / Self::segment_length(bpm)).floor() as usize).max(1)
    }

    /// Profile decoded mono audio.
    ///
    /// Each segment scores `0.6 * rms + 0.4 * peak`; scores are normalized
    /// against the loudest segment, boosted by 1.2 and clamped to 100.
    pub fn analyze(&self, samples: &[f32], duration: f64, bpm: f64) -> EnergyProfile {
        let count = Self::segment_count(duration, bpm);
        if count == 0 || samples.is_empty() {
            return EnergyProfile::default();
        }

        let raw: Vec<f32> = (0..count)
            .map(|i| {
                let start = i * samples.len() / count;
                let end = ((i + 1) * samples.len() / count).max(start + 1).min(samples.len());
                let segment = &samples[start..end];

                let mut sum = 0.0f32;
                let mut peak = 0.0f32;
                for &s in segment {
                    sum += s * s;
                    peak = peak.max(s.abs());
                }
                let rms = (sum / segment.len() as f32).sqrt();
                0.6 * rms + 0.4 * peak
            })
            .collect();

        let max = raw.iter().cloned().fold(0.0f32, f32::max);
        let energy_map: Vec<f32> = raw
            .iter()
            .map(|v| {
                if max > 0.0 {
                    (v / max * 100.0 * Self::BOOST).min(100.0)
                } else {
                    0.0
                }
            })
            .collect();

        Self::with_drops(energy_map, duration)
    }

    /// Stylised stand-in curve for tracks with no decoded audio:
    /// intro, buildup, drop, breakdown, buildup, drop, outro.
    pub fn synthesize(&self, duration: f64, bpm: f64) -> EnergyProfile {
        let count = Self::segment_count(duration, bpm);
        let energy_map: Vec<f32> = (0..count)
            .map(|i| {
                let p = i as f32 / count as f32;
                match p {
                    p if p < 0.10 => ramp(p, 0.00, 0.10, 20.0, 35.0),
                    p if p < 0.25 => ramp(p, 0.10, 0.25, 35.0, 60.0),
                    p if p < 0.40 => 90.0,
                    p if p < 0.50 => 40.0,
                    p if p < 0.60 => ramp(p, 0.50, 0.60, 40.0, 65.0),
                    p if p < 0.85 => 95.0,
                    p => ramp(p, 0.85, 1.00, 50.0, 15.0),
                }
            })
            .collect();

        Self::with_drops(energy_map, duration)
    }

    /// Segment indices that qualify as drops
    pub fn detect_drops(energy_map: &[f32]) -> Vec<usize> {
        (1..energy_map.len())
            .filter(|&i| {
                energy_map[i] > energy_map[i - 1] + Self::DROP_RISE
                    && energy_map[i] > Self::DROP_LEVEL
            })
            .collect()
    }

    fn with_drops(energy_map: Vec<f32>, duration: f64) -> EnergyProfile {
        let segment = if energy_map.is_empty() {
            0.0
        } else {
            duration / energy_map.len() as f64
        };
        let drop_points = Self::detect_drops(&energy_map)
            .into_iter()
            .map(|i| i as f64 * segment)
            .collect();

        EnergyProfile {
            energy_map,
            drop_points,
        }
    }
}

fn ramp(p: f32, from: f32, to: f32, start: f32, end: f32) -> f32 {
    let t = ((p - from) / (to - from)).clamp(0.0, 1.0);
    start + (end - start) * t
}

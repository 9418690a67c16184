//! Track metadata as seen by the mixing engine

use automix_analysis::{CamelotKey, EnergyProfile};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An analyzed library track
///
/// Shared as `Arc<Track>`: the library owns it, channels and the scheduler
/// only hold references. Analysis produces a new value rather than
/// mutating an existing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Tempo in BPM (0 = unknown)
    pub bpm: f32,
    /// Length in seconds
    pub duration: f64,
    /// Harmonic key in Camelot notation
    pub key: CamelotKey,
    /// Energy curve and drop points, once profiled
    #[serde(default)]
    pub energy: Option<EnergyProfile>,
    #[serde(default)]
    pub intro_length: Option<f64>,
    #[serde(default)]
    pub outro_length: Option<f64>,
    /// Audio file backing the track, if any
    #[serde(default)]
    pub source: Option<PathBuf>,
}

impl Track {
    /// Intro/outro length assumed when metadata has none (seconds)
    pub const DEFAULT_EDGE_LENGTH: f64 = 16.0;

    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        bpm: f32,
        duration: f64,
        key: CamelotKey,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            bpm,
            duration,
            key,
            energy: None,
            intro_length: None,
            outro_length: None,
            source: None,
        }
    }

    pub fn with_energy(mut self, profile: EnergyProfile) -> Self {
        self.energy = Some(profile);
        self
    }

    pub fn with_intro_length(mut self, secs: f64) -> Self {
        self.intro_length = Some(secs);
        self
    }

    pub fn with_outro_length(mut self, secs: f64) -> Self {
        self.outro_length = Some(secs);
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn intro_length(&self) -> f64 {
        self.intro_length.unwrap_or(Self::DEFAULT_EDGE_LENGTH)
    }

    pub fn outro_length(&self) -> f64 {
        self.outro_length.unwrap_or(Self::DEFAULT_EDGE_LENGTH)
    }

    /// True once an energy profile with at least one segment exists
    pub fn is_analyzed(&self) -> bool {
        self.energy.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Energy of the opening segment
    pub fn intro_energy(&self) -> Option<f32> {
        self.energy.as_ref().and_then(EnergyProfile::first)
    }

    /// Energy of the closing segment
    pub fn outro_energy(&self) -> Option<f32> {
        self.energy.as_ref().and_then(EnergyProfile::last)
    }

    pub fn drop_points(&self) -> &[f64] {
        self.energy
            .as_ref()
            .map(|p| p.drop_points.as_slice())
            .unwrap_or(&[])
    }

    /// Relative tempo difference `|self - other| / self`.
    ///
    /// Infinite when this track has no tempo.
    pub fn tempo_deviation(&self, other: &Track) -> f32 {
        if self.bpm <= 0.0 {
            return f32::INFINITY;
        }
        (self.bpm - other.bpm).abs() / self.bpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(bpm: f32) -> Track {
        Track::new("1", "Title", "Artist", bpm, 200.0, "8A".parse().unwrap())
    }

    #[test]
    fn test_edge_lengths_default() {
        let t = track(128.0);
        assert_eq!(t.intro_length(), 16.0);
        assert_eq!(t.outro_length(), 16.0);
        assert_eq!(t.with_outro_length(32.0).outro_length(), 32.0);
    }

    #[test]
    fn test_energy_accessors() {
        let t = track(128.0);
        assert!(!t.is_analyzed());
        assert_eq!(t.intro_energy(), None);
        assert!(t.drop_points().is_empty());

        let t = t.with_energy(EnergyProfile {
            energy_map: vec![30.0, 90.0, 20.0],
            drop_points: vec![4.0],
        });
        assert!(t.is_analyzed());
        assert_eq!(t.intro_energy(), Some(30.0));
        assert_eq!(t.outro_energy(), Some(20.0));
        assert_eq!(t.drop_points(), &[4.0]);
    }

    #[test]
    fn test_empty_profile_is_not_analyzed() {
        let t = track(128.0).with_energy(EnergyProfile::default());
        assert!(!t.is_analyzed());
    }

    #[test]
    fn test_tempo_deviation() {
        assert!((track(100.0).tempo_deviation(&track(103.0)) - 0.03).abs() < 1e-6);
        assert!(track(0.0).tempo_deviation(&track(120.0)).is_infinite());
    }
}

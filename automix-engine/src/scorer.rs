//! Next-track selection
//!
//! Candidates earn points for harmonic adjacency, tempo proximity and
//! matching energy at the seam. A small random jitter breaks ties so the
//! same library does not always play in the same order.

use crate::settings::AutoMixSettings;
use crate::track::Track;
use rand::Rng;
use std::sync::Arc;

/// Energy assumed for a track with no profile
pub const DEFAULT_ENERGY: f32 = 50.0;

/// A picked candidate and its final score (jitter included)
#[derive(Debug, Clone)]
pub struct ScoredTrack {
    pub track: Arc<Track>,
    pub score: f32,
}

/// Scores candidate tracks against the one currently playing
#[derive(Debug, Clone, Copy)]
pub struct CompatibilityScorer {
    /// Upper bound (exclusive) of the random tie-break added to each score
    jitter: f32,
}

impl Default for CompatibilityScorer {
    fn default() -> Self {
        Self {
            jitter: Self::DEFAULT_JITTER,
        }
    }
}

impl CompatibilityScorer {
    pub const DEFAULT_JITTER: f32 = 10.0;

    const HARMONIC_BONUS: f32 = 50.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Scorer with no random tie-break; ties go to the earliest candidate
    pub fn without_jitter() -> Self {
        Self { jitter: 0.0 }
    }

    pub fn jitter(&self) -> f32 {
        self.jitter
    }

    /// Deterministic part of a candidate's score
    pub fn score(&self, current: &Track, candidate: &Track, settings: &AutoMixSettings) -> f32 {
        let mut score = 0.0;

        if settings.harmonic && current.key.is_adjacent(&candidate.key) {
            score += Self::HARMONIC_BONUS;
        }

        score += tempo_bonus(current.tempo_deviation(candidate));

        if settings.energy_match {
            let outro = current.outro_energy().unwrap_or(DEFAULT_ENERGY);
            let intro = candidate.intro_energy().unwrap_or(DEFAULT_ENERGY);
            score += energy_bonus((outro - intro).abs());
        }

        score
    }

    /// Highest-scoring candidate, or `None` for an empty pool
    pub fn pick<'a, I, R>(
        &self,
        current: &Track,
        candidates: I,
        settings: &AutoMixSettings,
        rng: &mut R,
    ) -> Option<ScoredTrack>
    where
        I: IntoIterator<Item = &'a Arc<Track>>,
        R: Rng + ?Sized,
    {
        let mut best: Option<ScoredTrack> = None;
        for candidate in candidates {
            let mut score = self.score(current, candidate, settings);
            if self.jitter > 0.0 {
                score += rng.gen_range(0.0..self.jitter);
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(ScoredTrack {
                    track: Arc::clone(candidate),
                    score,
                });
            }
        }
        best
    }
}

fn tempo_bonus(r: f32) -> f32 {
    match r {
        r if r <= 0.03 => 40.0,
        r if r <= 0.06 => 25.0,
        r if r <= 0.10 => 10.0,
        _ => 0.0,
    }
}

fn energy_bonus(diff: f32) -> f32 {
    match diff {
        d if d <= 15.0 => 20.0,
        d if d <= 30.0 => 10.0,
        _ => 0.0,
    }
}

//! Transition style selection for a track pair

use crate::scorer::DEFAULT_ENERGY;
use crate::settings::{AutoMixSettings, MixStyle};
use crate::track::Track;

/// Chooses how to move from the playing track into the queued one
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionPlanner;

impl TransitionPlanner {
    /// A drop must land this early in the incoming track (seconds)
    const DROP_WINDOW: f64 = 60.0;
    const DROP_INTRO_ENERGY: f32 = 60.0;
    const DROP_OUTRO_ENERGY: f32 = 50.0;
    const BEATMATCH_MAX_DEVIATION: f32 = 0.02;
    const CUT_MIN_DEVIATION: f32 = 0.08;
    const CUT_ENERGY_GAP: f32 = 40.0;

    /// Style for this pair: the configured one, or a chosen one under `auto`
    pub fn plan(settings: &AutoMixSettings, current: &Track, next: &Track) -> MixStyle {
        settings
            .transition_style
            .fixed()
            .unwrap_or_else(|| Self::choose(current, next))
    }

    /// Pick a style from tempo and energy; first matching rule wins
    pub fn choose(current: &Track, next: &Track) -> MixStyle {
        let outro = current.outro_energy().unwrap_or(DEFAULT_ENERGY);
        let intro = next.intro_energy().unwrap_or(DEFAULT_ENERGY);
        let r = current.tempo_deviation(next);

        let early_drop = next.drop_points().iter().any(|&t| t < Self::DROP_WINDOW);
        if early_drop && intro > Self::DROP_INTRO_ENERGY && outro > Self::DROP_OUTRO_ENERGY {
            return MixStyle::Drop;
        }
        if r <= Self::BEATMATCH_MAX_DEVIATION {
            return MixStyle::Beatmatch;
        }
        if r > Self::CUT_MIN_DEVIATION || (outro - intro).abs() > Self::CUT_ENERGY_GAP {
            return MixStyle::Cut;
        }
        MixStyle::Crossfade
    }
}

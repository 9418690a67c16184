//! AutoMix engine - hands-free transitions between two playback channels
//!
//! Picks the next track, chooses a transition style and ramps the
//! crossfader when the playing track reaches its outro.

mod channel;
mod driver;
mod mixer;
mod planner;
mod playback;
mod scheduler;
mod scorer;
mod settings;
mod track;

pub use channel::{ChannelId, MixSnapshot, PlaybackChannel};
pub use driver::{AnalysisService, AutoMixDriver, AutoMixEvent, AutoMixHandle, DriverCommand, TrackPool};
pub use mixer::{Crossfader, CrossfaderCurve};
pub use planner::TransitionPlanner;
pub use playback::{PlaybackService, SimulatedPlayback};
pub use scheduler::{
    AnalysisOutcome, AutoMixScheduler, AutoMixState, MixEffect, MixPhase, CLEAR_GRACE,
    DECISION_INTERVAL, RAMP_INTERVAL,
};
pub use scorer::{CompatibilityScorer, ScoredTrack, DEFAULT_ENERGY};
pub use settings::{AutoMixSettings, MixStyle, ParseStyleError, SettingsUpdate, TransitionStyle};
pub use track::Track;

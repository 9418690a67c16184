//! Auto-mix phase machine
//!
//! The scheduler never touches playback directly. Each callback takes a
//! freshly read [`MixSnapshot`] (or nothing, for timer ticks), replaces the
//! published [`AutoMixState`] wholesale and returns the [`MixEffect`]s the
//! driver must apply, in order.
//!
//! Phases always advance idle -> scanning -> waiting -> transitioning -> idle.
//! Leaving the cycle early is only ever a reset to idle.

use crate::channel::{ChannelId, MixSnapshot};
use crate::planner::TransitionPlanner;
use crate::scorer::CompatibilityScorer;
use crate::settings::{AutoMixSettings, MixStyle, SettingsUpdate};
use crate::track::Track;
use automix_analysis::EnergyProfiler;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Period of the decision tick
pub const DECISION_INTERVAL: Duration = Duration::from_millis(500);
/// Period of the crossfader ramp tick
pub const RAMP_INTERVAL: Duration = Duration::from_millis(100);
/// Delay between the end of a ramp and clearing the finished channel
pub const CLEAR_GRACE: Duration = Duration::from_millis(500);

const RAMP_TICKS_PER_SECOND: u32 = 10;

/// Scheduler phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixPhase {
    #[default]
    Idle,
    Scanning,
    Waiting,
    Transitioning,
}

/// Read-only status record published after every callback
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AutoMixState {
    pub phase: MixPhase,
    /// A candidate is being profiled
    pub is_analyzing: bool,
    /// Where the playing track will start handing over (seconds); smart sync only
    pub suggested_mix_point: Option<f64>,
    /// Ramp progress 0-100
    pub transition_progress: f32,
    /// The queued track is loaded and profiled
    pub next_track_ready: bool,
    /// Track waiting on the non-primary channel
    pub queued_track_id: Option<String>,
    pub selected_style: Option<MixStyle>,
}

/// Result of a background analysis request
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Ready(Arc<Track>),
    Failed { track_id: String, reason: String },
}

/// Side effect requested by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum MixEffect {
    /// Put a track on a channel at position 0, stopped
    Load { channel: ChannelId, track: Arc<Track> },
    Play(ChannelId),
    Pause(ChannelId),
    Seek { channel: ChannelId, position: f64 },
    SetCrossfader(f32),
    /// Clear a channel's track and position
    Unload(ChannelId),
    /// Profile a track off the tick thread
    Analyze(Arc<Track>),
    /// Hand a newly profiled track back to the library
    StoreTrack(Arc<Track>),
    StartRamp,
    StopRamp,
    StartGrace,
    CancelGrace,
}

#[derive(Debug, Clone, Copy)]
struct Ramp {
    from: f32,
    to: f32,
    step: u32,
    steps: u32,
}

#[derive(Debug)]
struct PendingAnalysis {
    track: Arc<Track>,
    /// Decision ticks spent waiting
    waited: u32,
    /// Set once the result has arrived
    ready: Option<Arc<Track>>,
}

/// Decides what to queue and when to hand over between the two channels
pub struct AutoMixScheduler {
    settings: AutoMixSettings,
    state: AutoMixState,
    scorer: CompatibilityScorer,
    profiler: EnergyProfiler,
    rng: StdRng,
    /// Channel being mixed out of, pinned from scanning until the reset
    primary: Option<ChannelId>,
    pending: Option<PendingAnalysis>,
    ramp: Option<Ramp>,
    grace_pending: bool,
    async_analysis: bool,
    analysis_timeout_ticks: u32,
}

impl AutoMixScheduler {
    /// Decision ticks to wait for background analysis (10 s)
    pub const DEFAULT_ANALYSIS_TIMEOUT_TICKS: u32 = 20;

    pub fn new(settings: AutoMixSettings) -> Self {
        Self {
            settings,
            state: AutoMixState::default(),
            scorer: CompatibilityScorer::default(),
            profiler: EnergyProfiler::new(),
            rng: StdRng::from_entropy(),
            primary: None,
            pending: None,
            ramp: None,
            grace_pending: false,
            async_analysis: false,
            analysis_timeout_ticks: Self::DEFAULT_ANALYSIS_TIMEOUT_TICKS,
        }
    }

    /// Reproducible candidate jitter
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_scorer(mut self, scorer: CompatibilityScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Send tracks with a source file to background analysis instead of
    /// profiling them inline
    pub fn with_async_analysis(mut self, enabled: bool) -> Self {
        self.async_analysis = enabled;
        self
    }

    pub fn with_analysis_timeout(mut self, ticks: u32) -> Self {
        self.analysis_timeout_ticks = ticks.max(1);
        self
    }

    pub fn state(&self) -> &AutoMixState {
        &self.state
    }

    pub fn settings(&self) -> &AutoMixSettings {
        &self.settings
    }

    pub fn primary(&self) -> Option<ChannelId> {
        self.primary
    }

    pub fn is_ramping(&self) -> bool {
        self.ramp.is_some()
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Vec<MixEffect> {
        self.update_settings(&SettingsUpdate::enabled(enabled))
    }

    /// Apply a partial settings change.
    ///
    /// Disabling stops any ramp and grace timer and returns to idle, leaving
    /// the crossfader where it is. A channel waiting out its grace period is
    /// cleared immediately. Enabling clears a stale ramp timer first.
    pub fn update_settings(&mut self, update: &SettingsUpdate) -> Vec<MixEffect> {
        let was_enabled = self.settings.enabled;
        self.settings.apply(update);

        match (was_enabled, self.settings.enabled) {
            (true, false) => {
                let mut effects = vec![MixEffect::StopRamp];
                if self.grace_pending {
                    // The finished channel is cleared now instead of after the grace
                    effects.push(MixEffect::CancelGrace);
                    effects.extend(self.primary.map(MixEffect::Unload));
                }
                info!(phase = ?self.state.phase, "Auto-mix disabled");
                self.reset();
                effects
            }
            (false, true) => {
                info!("Auto-mix enabled");
                vec![MixEffect::StopRamp]
            }
            _ => Vec::new(),
        }
    }

    /// Decision tick (every 500 ms)
    pub fn on_decision_tick(&mut self, snapshot: &MixSnapshot, pool: &[Arc<Track>]) -> Vec<MixEffect> {
        let mut effects = Vec::new();
        if !self.settings.enabled {
            return effects;
        }
        let Some(primary) = snapshot.primary() else {
            return effects;
        };

        match self.state.phase {
            MixPhase::Idle => self.scan(primary, snapshot, pool, &mut effects),
            MixPhase::Scanning => self.poll_analysis(snapshot, &mut effects),
            MixPhase::Waiting => self.check_mix_point(snapshot, &mut effects),
            MixPhase::Transitioning => {}
        }
        effects
    }

    /// Ramp tick (every 100 ms while transitioning)
    pub fn on_ramp_tick(&mut self) -> Vec<MixEffect> {
        let (Some(primary), Some(ramp)) = (self.primary, self.ramp.as_mut()) else {
            return vec![MixEffect::StopRamp];
        };

        ramp.step += 1;
        let t = ramp.step as f32 / ramp.steps as f32;
        let done = ramp.step >= ramp.steps;
        let value = if done {
            ramp.to
        } else {
            ramp.from + (ramp.to - ramp.from) * t
        };

        self.state = AutoMixState {
            transition_progress: (t * 100.0).min(100.0),
            ..self.state.clone()
        };

        let mut effects = vec![MixEffect::SetCrossfader(value)];
        if done {
            info!(channel = %primary, "Transition complete");
            self.ramp = None;
            self.grace_pending = true;
            effects.extend([
                MixEffect::Pause(primary),
                MixEffect::StopRamp,
                MixEffect::StartGrace,
            ]);
        }
        effects
    }

    /// Grace period after a finished ramp has elapsed
    pub fn on_grace_elapsed(&mut self) -> Vec<MixEffect> {
        if !self.grace_pending {
            return Vec::new();
        }
        let effects = self
            .primary
            .map(|channel| vec![MixEffect::Unload(channel)])
            .unwrap_or_default();
        self.reset();
        effects
    }

    /// Background analysis finished (or failed)
    pub fn on_analysis(&mut self, outcome: AnalysisOutcome) -> Vec<MixEffect> {
        match outcome {
            AnalysisOutcome::Ready(track) => {
                match self.pending.as_mut() {
                    Some(pending) if pending.track.id == track.id => {
                        debug!(track = %track.title, "Analysis ready");
                        pending.ready = Some(Arc::clone(&track));
                    }
                    _ => debug!(track = %track.title, "Analysis finished for a track no longer pending"),
                }
                vec![MixEffect::StoreTrack(track)]
            }
            AnalysisOutcome::Failed { track_id, reason } => {
                warn!(track_id = %track_id, reason = %reason, "Analysis failed, using stand-in energy curve");
                let profiler = self.profiler;
                match self.pending.as_mut() {
                    Some(pending) if pending.track.id == track_id => {
                        let profiled = synthesized(&profiler, &pending.track);
                        pending.ready = Some(Arc::clone(&profiled));
                        vec![MixEffect::StoreTrack(profiled)]
                    }
                    _ => Vec::new(),
                }
            }
        }
    }

    fn scan(
        &mut self,
        primary: ChannelId,
        snapshot: &MixSnapshot,
        pool: &[Arc<Track>],
        effects: &mut Vec<MixEffect>,
    ) {
        let Some(current) = snapshot.channel(primary).track.clone() else {
            return;
        };
        let incoming = snapshot.channel(primary.other());

        let mut finished = None;
        if let Some(cued) = incoming.track.clone() {
            // Both decks audible: the operator is mixing by hand
            if incoming.is_playing {
                return;
            }
            if incoming.position >= cued.duration {
                debug!(track = %cued.title, channel = %primary.other(), "Replacing finished track on the incoming channel");
                finished = Some(cued);
            } else {
                debug!(track = %cued.title, channel = %primary.other(), "Adopting track already on the incoming channel");
                self.state = AutoMixState {
                    phase: MixPhase::Scanning,
                    ..AutoMixState::default()
                };
                self.queue(primary, &current, cued, false, effects);
                return;
            }
        }

        self.state = AutoMixState {
            phase: MixPhase::Scanning,
            is_analyzing: true,
            ..AutoMixState::default()
        };

        let candidates = pool.iter().filter(|t| {
            t.id != current.id && finished.as_ref().map_or(true, |f| f.id != t.id)
        });
        let Some(pick) = self
            .scorer
            .pick(&current, candidates, &self.settings, &mut self.rng)
        else {
            info!(current = %current.title, "No candidate tracks");
            self.state = AutoMixState::default();
            return;
        };

        info!(next = %pick.track.title, score = pick.score, "Picked next track");
        let next = pick.track;
        if next.is_analyzed() {
            self.queue(primary, &current, next, true, effects);
        } else if self.async_analysis && next.source.is_some() {
            debug!(track = %next.title, "Requesting background analysis");
            effects.push(MixEffect::Analyze(Arc::clone(&next)));
            self.primary = Some(primary);
            self.pending = Some(PendingAnalysis {
                track: next,
                waited: 0,
                ready: None,
            });
        } else {
            let profiled = synthesized(&self.profiler, &next);
            effects.push(MixEffect::StoreTrack(Arc::clone(&profiled)));
            self.queue(primary, &current, profiled, true, effects);
        }
    }

    fn poll_analysis(&mut self, snapshot: &MixSnapshot, effects: &mut Vec<MixEffect>) {
        let (Some(primary), Some(mut pending)) = (self.primary, self.pending.take()) else {
            self.reset();
            return;
        };
        let Some(current) = snapshot.channel(primary).track.clone() else {
            self.reset();
            return;
        };
        let incoming = snapshot.channel(primary.other());
        if incoming
            .track
            .as_ref()
            .is_some_and(|cued| incoming.position < cued.duration)
        {
            debug!("Incoming channel loaded by hand while analyzing");
            self.reset();
            return;
        }

        let next = match pending.ready.take() {
            Some(track) => track,
            None => {
                pending.waited += 1;
                if pending.waited < self.analysis_timeout_ticks {
                    self.pending = Some(pending);
                    return;
                }
                warn!(track = %pending.track.title, "Analysis timed out, using stand-in energy curve");
                let profiled = synthesized(&self.profiler, &pending.track);
                effects.push(MixEffect::StoreTrack(Arc::clone(&profiled)));
                profiled
            }
        };
        self.queue(primary, &current, next, true, effects);
    }

    fn queue(
        &mut self,
        primary: ChannelId,
        current: &Track,
        next: Arc<Track>,
        load: bool,
        effects: &mut Vec<MixEffect>,
    ) {
        let incoming = primary.other();
        let style = TransitionPlanner::plan(&self.settings, current, &next);
        info!(next = %next.title, channel = %incoming, style = %style, "Queued next track");

        if load {
            effects.push(MixEffect::Load {
                channel: incoming,
                track: Arc::clone(&next),
            });
        }

        self.primary = Some(primary);
        self.pending = None;
        self.state = AutoMixState {
            phase: MixPhase::Waiting,
            is_analyzing: false,
            suggested_mix_point: self.settings.smart_sync.then(|| mix_point(current)),
            transition_progress: 0.0,
            next_track_ready: true,
            queued_track_id: Some(next.id.clone()),
            selected_style: Some(style),
        };
    }

    fn check_mix_point(&mut self, snapshot: &MixSnapshot, effects: &mut Vec<MixEffect>) {
        let Some(primary) = self.primary else {
            self.reset();
            return;
        };
        let incoming_id = primary.other();
        let outgoing = snapshot.channel(primary);
        let incoming = snapshot.channel(incoming_id);

        let (Some(current), Some(next)) = (&outgoing.track, &incoming.track) else {
            info!("Queued track no longer loaded");
            self.reset();
            return;
        };
        if self.state.queued_track_id.as_deref() != Some(next.id.as_str()) {
            info!(loaded = %next.title, "Incoming channel changed by hand");
            self.reset();
            return;
        }
        if incoming.is_playing {
            debug!("Incoming track started by hand");
            self.reset();
            return;
        }
        if !outgoing.is_playing {
            return;
        }

        let remaining = current.duration - outgoing.position;
        if remaining > current.outro_length() {
            return;
        }

        let steps = self
            .settings
            .transition_time_secs
            .saturating_mul(RAMP_TICKS_PER_SECOND)
            .max(1);
        self.ramp = Some(Ramp {
            from: snapshot.crossfader,
            to: incoming_id.crossfader_full(),
            step: 0,
            steps,
        });
        info!(
            from = %primary,
            to = %incoming_id,
            remaining,
            steps,
            style = ?self.state.selected_style,
            "Starting transition"
        );
        effects.extend([
            MixEffect::Seek {
                channel: incoming_id,
                position: 0.0,
            },
            MixEffect::Play(incoming_id),
            MixEffect::StartRamp,
        ]);
        self.state = AutoMixState {
            phase: MixPhase::Transitioning,
            transition_progress: 0.0,
            ..self.state.clone()
        };
    }

    fn reset(&mut self) {
        self.state = AutoMixState::default();
        self.primary = None;
        self.pending = None;
        self.ramp = None;
        self.grace_pending = false;
    }
}

/// Point in the playing track where the handover starts
fn mix_point(track: &Track) -> f64 {
    (track.duration - track.outro_length()).max(0.0)
}

fn synthesized(profiler: &EnergyProfiler, track: &Track) -> Arc<Track> {
    let profile = profiler.synthesize(track.duration, f64::from(track.bpm));
    Arc::new(track.clone().with_energy(profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PlaybackChannel;
    use crate::playback::{PlaybackService, SimulatedPlayback};
    use crate::settings::TransitionStyle;

    fn track(id: &str, bpm: f32, key: &str) -> Arc<Track> {
        Arc::new(Track::new(id, id, "Artist", bpm, 200.0, key.parse().unwrap()).with_outro_length(16.0))
    }

    fn enabled() -> AutoMixSettings {
        AutoMixSettings {
            enabled: true,
            transition_time_secs: 2,
            ..AutoMixSettings::default()
        }
    }

    fn scheduler(settings: AutoMixSettings) -> AutoMixScheduler {
        AutoMixScheduler::new(settings)
            .with_seed(7)
            .with_scorer(CompatibilityScorer::without_jitter())
    }

    /// Apply scheduler effects to a simulated player
    fn apply(player: &mut SimulatedPlayback, effects: &[MixEffect]) {
        for effect in effects {
            match effect {
                MixEffect::Load { channel, track } => {
                    player.load_track(*channel, Arc::clone(track));
                }
                MixEffect::Play(ch) => player.play(*ch),
                MixEffect::Pause(ch) => player.pause(*ch),
                MixEffect::Seek { channel, position } => player.seek(*channel, *position),
                MixEffect::SetCrossfader(v) => player.set_crossfader(*v),
                MixEffect::Unload(ch) => player.unload(*ch),
                _ => {}
            }
        }
    }

    /// One decision tick against the player's current state
    fn decide(s: &mut AutoMixScheduler, player: &mut SimulatedPlayback, pool: &[Arc<Track>]) {
        let effects = s.on_decision_tick(&player.snapshot(), pool);
        apply(player, &effects);
    }

    fn playing_a(current: Arc<Track>) -> SimulatedPlayback {
        let mut player = SimulatedPlayback::new();
        player.load_track(ChannelId::A, current);
        player.play(ChannelId::A);
        player
    }

    fn pool() -> Vec<Arc<Track>> {
        vec![
            track("current", 128.0, "8A"),
            track("clash", 90.0, "2B"),
            track("next", 128.0, "9A"),
        ]
    }

    #[test]
    fn test_full_cycle() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled());

        // Decision tick queues the best match on B
        let effects = s.on_decision_tick(&player.snapshot(), &pool);
        apply(&mut player, &effects);
        assert_eq!(s.state().phase, MixPhase::Waiting);
        assert_eq!(s.state().queued_track_id.as_deref(), Some("next"));
        assert!(s.state().next_track_ready);
        assert_eq!(player.loaded_track(ChannelId::B).unwrap().id, "next");
        assert!(!player.is_playing(ChannelId::B));
        assert_eq!(player.crossfader(), 50.0);
        assert_eq!(s.state().suggested_mix_point, Some(184.0));

        // Not yet at the mix point
        player.advance(180.0);
        let effects = s.on_decision_tick(&player.snapshot(), &pool);
        assert!(effects.is_empty());
        assert_eq!(s.state().phase, MixPhase::Waiting);

        // 15 s left: hand over
        player.advance(5.0);
        let effects = s.on_decision_tick(&player.snapshot(), &pool);
        apply(&mut player, &effects);
        assert_eq!(s.state().phase, MixPhase::Transitioning);
        assert!(effects.contains(&MixEffect::StartRamp));
        assert!(player.is_playing(ChannelId::B));
        assert_eq!(player.position(ChannelId::B), 0.0);

        // 2 s ramp = 20 fine ticks
        for i in 1..=20 {
            let effects = s.on_ramp_tick();
            apply(&mut player, &effects);
            if i < 20 {
                assert_eq!(s.state().phase, MixPhase::Transitioning);
            }
        }
        assert_eq!(player.crossfader(), 100.0);
        assert_eq!(s.state().transition_progress, 100.0);
        assert!(!player.is_playing(ChannelId::A));
        assert!(!s.is_ramping());

        let effects = s.on_grace_elapsed();
        apply(&mut player, &effects);
        assert_eq!(s.state(), &AutoMixState::default());
        assert!(player.loaded_track(ChannelId::A).is_none());
        assert_eq!(player.crossfader(), 100.0);
        assert!(player.is_playing(ChannelId::B));
    }

    #[test]
    fn test_ramp_is_linear() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled());

        decide(&mut s, &mut player, &pool);
        player.advance(190.0);
        decide(&mut s, &mut player, &pool);

        apply(&mut player, &s.on_ramp_tick());
        assert!((player.crossfader() - 52.5).abs() < 1e-4);
        assert!((s.state().transition_progress - 5.0).abs() < 1e-4);

        for _ in 0..9 {
            apply(&mut player, &s.on_ramp_tick());
        }
        assert!((player.crossfader() - 75.0).abs() < 1e-4);
    }

    #[test]
    fn test_ramp_toward_a_when_b_finishes() {
        let pool = pool();
        let mut player = SimulatedPlayback::new();
        player.load_track(ChannelId::B, Arc::clone(&pool[0]));
        player.play(ChannelId::B);
        player.set_crossfader(100.0);
        let mut s = scheduler(enabled());

        decide(&mut s, &mut player, &pool);
        assert_eq!(player.loaded_track(ChannelId::A).unwrap().id, "next");

        player.advance(190.0);
        decide(&mut s, &mut player, &pool);
        for _ in 0..20 {
            apply(&mut player, &s.on_ramp_tick());
        }
        assert_eq!(player.crossfader(), 0.0);
        apply(&mut player, &s.on_grace_elapsed());
        assert!(player.loaded_track(ChannelId::B).is_none());
    }

    #[test]
    fn test_nothing_playing_does_nothing() {
        let pool = pool();
        let mut s = scheduler(enabled());
        let effects = s.on_decision_tick(&MixSnapshot::default(), &pool);
        assert!(effects.is_empty());
        assert_eq!(s.state().phase, MixPhase::Idle);
    }

    #[test]
    fn test_disabled_does_nothing() {
        let pool = pool();
        let player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(AutoMixSettings::default());
        assert!(s.on_decision_tick(&player.snapshot(), &pool).is_empty());
        assert_eq!(s.state().phase, MixPhase::Idle);
    }

    #[test]
    fn test_empty_pool_stays_idle() {
        let only = vec![track("current", 128.0, "8A")];
        let player = playing_a(Arc::clone(&only[0]));
        let mut s = scheduler(enabled());

        let effects = s.on_decision_tick(&player.snapshot(), &only);
        assert!(effects.is_empty());
        assert_eq!(s.state().phase, MixPhase::Idle);
        assert!(!s.state().is_analyzing);
    }

    #[test]
    fn test_unanalyzed_pick_gets_profiled() {
        let pool = pool();
        let player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled());

        let effects = s.on_decision_tick(&player.snapshot(), &pool);
        let stored = effects
            .iter()
            .find_map(|e| match e {
                MixEffect::StoreTrack(t) => Some(Arc::clone(t)),
                _ => None,
            })
            .unwrap();
        assert_eq!(stored.id, "next");
        assert!(stored.is_analyzed());

        let loaded = effects
            .iter()
            .find_map(|e| match e {
                MixEffect::Load { track, .. } => Some(Arc::clone(track)),
                _ => None,
            })
            .unwrap();
        assert!(loaded.is_analyzed());
    }

    #[test]
    fn test_analyzed_pick_is_not_reprofiled() {
        let mut pool = pool();
        pool[2] = Arc::new((*pool[2]).clone().with_energy(EnergyProfiler::new().synthesize(200.0, 128.0)));
        let player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled());

        let effects = s.on_decision_tick(&player.snapshot(), &pool);
        assert!(!effects.iter().any(|e| matches!(e, MixEffect::StoreTrack(_))));
        assert!(matches!(effects.as_slice(), [MixEffect::Load { channel: ChannelId::B, .. }]));
    }

    #[test]
    fn test_adopts_track_cued_by_hand() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        player.load_track(ChannelId::B, Arc::clone(&pool[1]));
        let mut s = scheduler(enabled());

        let effects = s.on_decision_tick(&player.snapshot(), &pool);
        assert!(effects.is_empty());
        assert_eq!(s.state().phase, MixPhase::Waiting);
        assert_eq!(s.state().queued_track_id.as_deref(), Some("clash"));
    }

    #[test]
    fn test_both_playing_is_left_to_operator() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        player.load_track(ChannelId::B, Arc::clone(&pool[1]));
        player.play(ChannelId::B);
        player.set_crossfader(20.0);
        let mut s = scheduler(enabled());

        // A is primary but B is already audible: leave it to the operator
        let effects = s.on_decision_tick(&player.snapshot(), &pool);
        assert!(effects.is_empty());
        assert_eq!(s.state().phase, MixPhase::Idle);
    }

    #[test]
    fn test_swapped_incoming_track_resets() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled());
        decide(&mut s, &mut player, &pool);

        player.load_track(ChannelId::B, Arc::clone(&pool[1]));
        s.on_decision_tick(&player.snapshot(), &pool);
        assert_eq!(s.state().phase, MixPhase::Idle);
        assert_eq!(s.state().queued_track_id, None);
    }

    #[test]
    fn test_paused_primary_keeps_waiting() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled());
        decide(&mut s, &mut player, &pool);

        // Nothing plays while A is paused, so the tick is skipped
        player.advance(190.0);
        player.pause(ChannelId::A);
        assert!(s.on_decision_tick(&player.snapshot(), &pool).is_empty());
        assert_eq!(s.state().phase, MixPhase::Waiting);
    }

    #[test]
    fn test_disable_mid_transition_freezes_crossfader() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled());
        decide(&mut s, &mut player, &pool);
        player.advance(190.0);
        decide(&mut s, &mut player, &pool);
        for _ in 0..5 {
            apply(&mut player, &s.on_ramp_tick());
        }
        let frozen = player.crossfader();

        let effects = s.set_enabled(false);
        apply(&mut player, &effects);
        assert_eq!(effects, vec![MixEffect::StopRamp]);
        assert_eq!(player.crossfader(), frozen);
        assert_eq!(s.state().phase, MixPhase::Idle);
        assert_eq!(s.state().queued_track_id, None);
        assert_eq!(s.state().selected_style, None);
        assert!(!s.is_ramping());

        // A stray tick after disabling changes nothing
        let effects = s.on_ramp_tick();
        assert_eq!(effects, vec![MixEffect::StopRamp]);
    }

    #[test]
    fn test_disable_during_grace_cancels_it() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled());
        decide(&mut s, &mut player, &pool);
        player.advance(190.0);
        decide(&mut s, &mut player, &pool);
        for _ in 0..20 {
            apply(&mut player, &s.on_ramp_tick());
        }

        let effects = s.set_enabled(false);
        assert_eq!(
            effects,
            vec![
                MixEffect::StopRamp,
                MixEffect::CancelGrace,
                MixEffect::Unload(ChannelId::A)
            ]
        );
        apply(&mut player, &effects);
        assert!(s.on_grace_elapsed().is_empty());
        assert!(player.loaded_track(ChannelId::A).is_none());
        assert_eq!(player.crossfader(), 100.0);
    }

    #[test]
    fn test_reenable_after_grace_queues_fresh_track() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled());
        decide(&mut s, &mut player, &pool);
        player.advance(190.0);
        decide(&mut s, &mut player, &pool);
        for _ in 0..20 {
            apply(&mut player, &s.on_ramp_tick());
        }
        let effects = s.set_enabled(false);
        apply(&mut player, &effects);

        s.set_enabled(true);
        player.advance(1.0);
        decide(&mut s, &mut player, &pool);
        assert_eq!(s.primary(), Some(ChannelId::B));
        assert_eq!(s.state().phase, MixPhase::Waiting);
        assert_eq!(s.state().queued_track_id.as_deref(), Some("current"));
        assert_eq!(player.position(ChannelId::A), 0.0);
    }

    #[test]
    fn test_finished_incoming_track_is_replaced() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        player.load_track(ChannelId::B, Arc::clone(&pool[2]));
        player.seek(ChannelId::B, 200.0);
        let mut s = scheduler(enabled());

        decide(&mut s, &mut player, &pool);
        assert_eq!(s.state().phase, MixPhase::Waiting);
        assert_eq!(s.state().queued_track_id.as_deref(), Some("clash"));
        assert_eq!(player.loaded_track(ChannelId::B).unwrap().id, "clash");
        assert_eq!(player.position(ChannelId::B), 0.0);
    }

    #[test]
    fn test_huge_transition_time_saturates() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(AutoMixSettings {
            transition_time_secs: 500_000_000,
            ..enabled()
        });
        decide(&mut s, &mut player, &pool);
        player.advance(190.0);
        decide(&mut s, &mut player, &pool);
        assert_eq!(s.state().phase, MixPhase::Transitioning);

        let effects = s.on_ramp_tick();
        assert!(matches!(effects.as_slice(), [MixEffect::SetCrossfader(v)] if (*v - 50.0).abs() < 1e-3));
        assert!(s.is_ramping());
    }

    #[test]
    fn test_enable_clears_stale_ramp() {
        let mut s = scheduler(AutoMixSettings::default());
        assert_eq!(s.set_enabled(true), vec![MixEffect::StopRamp]);
        assert!(s.set_enabled(true).is_empty());
    }

    #[test]
    fn test_selected_style_follows_settings() {
        let pool = pool();
        let player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(AutoMixSettings {
            transition_style: TransitionStyle::Auto,
            ..enabled()
        });
        s.on_decision_tick(&player.snapshot(), &pool);
        // Same tempo and a quiet stand-in intro
        assert_eq!(s.state().selected_style, Some(MixStyle::Beatmatch));
    }

    #[test]
    fn test_smart_sync_off_hides_mix_point() {
        let pool = pool();
        let player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(AutoMixSettings {
            smart_sync: false,
            ..enabled()
        });
        s.on_decision_tick(&player.snapshot(), &pool);
        assert_eq!(s.state().phase, MixPhase::Waiting);
        assert_eq!(s.state().suggested_mix_point, None);
    }

    #[test]
    fn test_zero_transition_time_still_completes() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(AutoMixSettings {
            transition_time_secs: 0,
            ..enabled()
        });
        decide(&mut s, &mut player, &pool);
        player.advance(190.0);
        decide(&mut s, &mut player, &pool);

        let effects = s.on_ramp_tick();
        assert!(effects.contains(&MixEffect::StartGrace));
        assert_eq!(effects[0], MixEffect::SetCrossfader(100.0));
    }

    fn file_pool() -> Vec<Arc<Track>> {
        vec![
            track("current", 128.0, "8A"),
            Arc::new((*track("next", 128.0, "9A")).clone().with_source("/music/next.flac")),
        ]
    }

    #[test]
    fn test_async_analysis_waits_for_result() {
        let pool = file_pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled()).with_async_analysis(true);

        let effects = s.on_decision_tick(&player.snapshot(), &pool);
        assert!(matches!(effects.as_slice(), [MixEffect::Analyze(t)] if t.id == "next"));
        assert_eq!(s.state().phase, MixPhase::Scanning);
        assert!(s.state().is_analyzing);

        // Result not in yet
        assert!(s.on_decision_tick(&player.snapshot(), &pool).is_empty());
        assert_eq!(s.state().phase, MixPhase::Scanning);

        let analyzed = Arc::new(
            (*pool[1])
                .clone()
                .with_energy(EnergyProfiler::new().synthesize(200.0, 128.0)),
        );
        let effects = s.on_analysis(AnalysisOutcome::Ready(Arc::clone(&analyzed)));
        assert_eq!(effects, vec![MixEffect::StoreTrack(Arc::clone(&analyzed))]);
        assert_eq!(s.state().phase, MixPhase::Scanning);

        let effects = s.on_decision_tick(&player.snapshot(), &pool);
        apply(&mut player, &effects);
        assert_eq!(s.state().phase, MixPhase::Waiting);
        assert!(!s.state().is_analyzing);
        assert_eq!(player.loaded_track(ChannelId::B), Some(analyzed));
    }

    #[test]
    fn test_async_analysis_times_out() {
        let pool = file_pool();
        let player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled())
            .with_async_analysis(true)
            .with_analysis_timeout(3);

        s.on_decision_tick(&player.snapshot(), &pool);
        assert!(s.on_decision_tick(&player.snapshot(), &pool).is_empty());
        assert!(s.on_decision_tick(&player.snapshot(), &pool).is_empty());

        let effects = s.on_decision_tick(&player.snapshot(), &pool);
        assert!(effects.iter().any(|e| matches!(e, MixEffect::StoreTrack(_))));
        assert!(effects.iter().any(|e| matches!(e, MixEffect::Load { .. })));
        assert_eq!(s.state().phase, MixPhase::Waiting);
    }

    #[test]
    fn test_async_analysis_failure_falls_back() {
        let pool = file_pool();
        let player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled()).with_async_analysis(true);
        s.on_decision_tick(&player.snapshot(), &pool);

        let effects = s.on_analysis(AnalysisOutcome::Failed {
            track_id: "next".into(),
            reason: "unsupported format".into(),
        });
        assert!(matches!(effects.as_slice(), [MixEffect::StoreTrack(t)] if t.is_analyzed()));

        s.on_decision_tick(&player.snapshot(), &pool);
        assert_eq!(s.state().phase, MixPhase::Waiting);
    }

    #[test]
    fn test_stale_analysis_is_still_stored() {
        let mut s = scheduler(enabled());
        let t = track("other", 120.0, "1A");
        let effects = s.on_analysis(AnalysisOutcome::Ready(Arc::clone(&t)));
        assert_eq!(effects, vec![MixEffect::StoreTrack(t)]);
        assert_eq!(s.state().phase, MixPhase::Idle);
    }

    #[test]
    fn test_phase_order_never_skips() {
        let pool = pool();
        let mut player = playing_a(Arc::clone(&pool[0]));
        let mut s = scheduler(enabled());
        let mut seen = vec![s.state().phase];

        for _ in 0..600 {
            player.advance(0.5);
            decide(&mut s, &mut player, &pool);
            seen.push(s.state().phase);
            for _ in 0..5 {
                if s.is_ramping() {
                    apply(&mut player, &s.on_ramp_tick());
                    seen.push(s.state().phase);
                }
            }
            if s.state().phase == MixPhase::Transitioning && !s.is_ramping() {
                apply(&mut player, &s.on_grace_elapsed());
                seen.push(s.state().phase);
            }
        }

        seen.dedup();
        let order = [
            MixPhase::Idle,
            MixPhase::Waiting,
            MixPhase::Transitioning,
        ];
        for pair in seen.windows(2) {
            let from = order.iter().position(|p| *p == pair[0]).unwrap();
            let to = order.iter().position(|p| *p == pair[1]).unwrap();
            assert!(to == (from + 1) % order.len(), "{:?} -> {:?}", pair[0], pair[1]);
        }
        assert!(seen.len() > 3);
    }

    #[test]
    fn test_snapshot_primary_is_read_fresh() {
        let pool = pool();
        let mut s = scheduler(enabled());
        let snapshot = MixSnapshot {
            a: PlaybackChannel::default(),
            b: PlaybackChannel {
                track: Some(Arc::clone(&pool[0])),
                position: 0.0,
                is_playing: true,
            },
            crossfader: 100.0,
        };
        let effects = s.on_decision_tick(&snapshot, &pool);
        assert!(matches!(effects.last(), Some(MixEffect::Load { channel: ChannelId::A, .. })));
        assert_eq!(s.primary(), Some(ChannelId::B));
    }
}

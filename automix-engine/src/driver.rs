//! Timer loop around the scheduler
//!
//! The driver owns the tick timers, reads a fresh playback snapshot on every
//! decision tick and applies scheduler effects to the playback and library
//! collaborators. Commands and events travel over crossbeam channels.

use crate::channel::ChannelId;
use crate::playback::PlaybackService;
use crate::scheduler::{
    AnalysisOutcome, AutoMixScheduler, AutoMixState, MixEffect, CLEAR_GRACE, DECISION_INTERVAL,
    RAMP_INTERVAL,
};
use crate::settings::{MixStyle, SettingsUpdate};
use crate::track::Track;
use crossbeam_channel::{after, bounded, never, select, tick, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Source of candidate tracks
pub trait TrackPool: Send + Sync {
    /// Current pool, in library order
    fn tracks(&self) -> Vec<Arc<Track>>;

    /// Replace a track with its analyzed version. Unknown ids are ignored.
    fn store_analyzed(&self, track: Arc<Track>);
}

/// Background track analysis
pub trait AnalysisService: Send {
    /// Queue a track; the outcome arrives on [`AnalysisService::outcomes`]
    fn request(&self, track: Arc<Track>);

    fn outcomes(&self) -> Receiver<AnalysisOutcome>;
}

/// Commands sent to the driver
#[derive(Debug, Clone)]
pub enum DriverCommand {
    UpdateSettings(SettingsUpdate),
    Shutdown,
}

/// Events sent from the driver
#[derive(Debug, Clone)]
pub enum AutoMixEvent {
    /// Status changed
    StateUpdate(AutoMixState),
    TrackLoaded {
        channel: ChannelId,
        track_id: String,
        has_audio: bool,
    },
    TransitionStarted {
        to: ChannelId,
        style: Option<MixStyle>,
    },
    /// Outgoing channel cleared after a completed transition
    TransitionFinished { cleared: ChannelId },
}

/// Handle for controlling a running driver
pub struct AutoMixHandle {
    command_tx: Sender<DriverCommand>,
    event_rx: Receiver<AutoMixEvent>,
}

impl AutoMixHandle {
    pub fn send(&self, cmd: DriverCommand) {
        let _ = self.command_tx.try_send(cmd);
    }

    pub fn update_settings(&self, update: SettingsUpdate) {
        self.send(DriverCommand::UpdateSettings(update));
    }

    pub fn shutdown(&self) {
        self.send(DriverCommand::Shutdown);
    }

    pub fn events(&self) -> &Receiver<AutoMixEvent> {
        &self.event_rx
    }

    /// Next pending event, if any
    pub fn try_recv(&self) -> Option<AutoMixEvent> {
        self.event_rx.try_recv().ok()
    }
}

/// Runs an [`AutoMixScheduler`] against shared playback and library state
pub struct AutoMixDriver<P, L> {
    scheduler: AutoMixScheduler,
    playback: Arc<Mutex<P>>,
    library: Arc<L>,
    analysis: Option<Box<dyn AnalysisService>>,
    command_rx: Receiver<DriverCommand>,
    event_tx: Sender<AutoMixEvent>,
    /// Live only while a ramp runs; dropping it stops the ticks
    ramp_timer: Option<Receiver<Instant>>,
    grace_timer: Option<Receiver<Instant>>,
    published: AutoMixState,
}

impl<P: PlaybackService, L: TrackPool> AutoMixDriver<P, L> {
    pub fn new(
        scheduler: AutoMixScheduler,
        playback: Arc<Mutex<P>>,
        library: Arc<L>,
    ) -> (Self, AutoMixHandle) {
        let (command_tx, command_rx) = bounded(1024);
        let (event_tx, event_rx) = bounded(1024);
        let published = scheduler.state().clone();
        let driver = Self {
            scheduler,
            playback,
            library,
            analysis: None,
            command_rx,
            event_tx,
            ramp_timer: None,
            grace_timer: None,
            published,
        };
        (driver, AutoMixHandle { command_tx, event_rx })
    }

    /// Route analysis of file-backed tracks through a background service
    pub fn with_analysis(mut self, service: impl AnalysisService + 'static) -> Self {
        self.scheduler = self.scheduler.with_async_analysis(true);
        self.analysis = Some(Box::new(service));
        self
    }

    pub fn state(&self) -> &AutoMixState {
        self.scheduler.state()
    }

    pub fn is_ramp_active(&self) -> bool {
        self.ramp_timer.is_some()
    }

    pub fn is_grace_pending(&self) -> bool {
        self.grace_timer.is_some()
    }

    /// Block until shutdown, dispatching timer ticks, commands and analysis results
    pub fn run(mut self) {
        info!("Auto-mix driver started");
        let decision = tick(DECISION_INTERVAL);
        let commands = self.command_rx.clone();

        loop {
            let ramp = self.ramp_timer.clone().unwrap_or_else(never);
            let grace = self.grace_timer.clone().unwrap_or_else(never);
            let outcomes = self
                .analysis
                .as_ref()
                .map(|service| service.outcomes())
                .unwrap_or_else(never);

            select! {
                recv(commands) -> cmd => match cmd {
                    Ok(DriverCommand::UpdateSettings(update)) => self.update_settings(&update),
                    Ok(DriverCommand::Shutdown) | Err(_) => break,
                },
                recv(decision) -> _ => self.decision_tick(),
                recv(ramp) -> _ => self.ramp_tick(),
                recv(grace) -> _ => self.grace_elapsed(),
                recv(outcomes) -> outcome => match outcome {
                    Ok(outcome) => self.analysis_ready(outcome),
                    Err(_) => {
                        warn!("Analysis service disconnected");
                        self.analysis = None;
                    }
                },
            }
        }

        self.ramp_timer = None;
        self.grace_timer = None;
        info!("Auto-mix driver stopped");
    }

    pub fn update_settings(&mut self, update: &SettingsUpdate) {
        let effects = self.scheduler.update_settings(update);
        self.apply(effects);
    }

    /// One decision step against a freshly read snapshot
    pub fn decision_tick(&mut self) {
        let snapshot = self.playback.lock().snapshot();
        let pool = self.library.tracks();
        let effects = self.scheduler.on_decision_tick(&snapshot, &pool);
        self.apply(effects);
    }

    pub fn ramp_tick(&mut self) {
        let effects = self.scheduler.on_ramp_tick();
        self.apply(effects);
    }

    pub fn grace_elapsed(&mut self) {
        self.grace_timer = None;
        let effects = self.scheduler.on_grace_elapsed();
        self.apply(effects);
    }

    pub fn analysis_ready(&mut self, outcome: AnalysisOutcome) {
        let effects = self.scheduler.on_analysis(outcome);
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<MixEffect>) {
        for effect in effects {
            match effect {
                MixEffect::Load { channel, track } => {
                    let track_id = track.id.clone();
                    let has_audio = self.playback.lock().load_track(channel, track);
                    if !has_audio {
                        debug!(track_id = %track_id, channel = %channel, "No audio, mixing on metadata");
                    }
                    self.emit(AutoMixEvent::TrackLoaded {
                        channel,
                        track_id,
                        has_audio,
                    });
                }
                MixEffect::Play(channel) => self.playback.lock().play(channel),
                MixEffect::Pause(channel) => self.playback.lock().pause(channel),
                MixEffect::Seek { channel, position } => {
                    self.playback.lock().seek(channel, position)
                }
                MixEffect::SetCrossfader(value) => self.playback.lock().set_crossfader(value),
                MixEffect::Unload(channel) => {
                    self.playback.lock().unload(channel);
                    self.emit(AutoMixEvent::TransitionFinished { cleared: channel });
                }
                MixEffect::Analyze(track) => match &self.analysis {
                    Some(service) => service.request(track),
                    None => warn!(track = %track.title, "No analysis service"),
                },
                MixEffect::StoreTrack(track) => self.library.store_analyzed(track),
                MixEffect::StartRamp => {
                    self.ramp_timer = Some(tick(RAMP_INTERVAL));
                    if let Some(primary) = self.scheduler.primary() {
                        self.emit(AutoMixEvent::TransitionStarted {
                            to: primary.other(),
                            style: self.scheduler.state().selected_style,
                        });
                    }
                }
                MixEffect::StopRamp => self.ramp_timer = None,
                MixEffect::StartGrace => self.grace_timer = Some(after(CLEAR_GRACE)),
                MixEffect::CancelGrace => self.grace_timer = None,
            }
        }
        self.publish();
    }

    fn publish(&mut self) {
        if *self.scheduler.state() != self.published {
            self.published = self.scheduler.state().clone();
            self.emit(AutoMixEvent::StateUpdate(self.published.clone()));
        }
    }

    fn emit(&self, event: AutoMixEvent) {
        let _ = self.event_tx.try_send(event);
    }
}

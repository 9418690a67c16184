//! AutoMix - unattended DJ session runner
//!
//! Plays a demo crate (plus any `FILE=KEY` arguments) on two simulated decks
//! and lets the auto-mix driver pick tracks and crossfade between them.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use automix_analysis::CamelotKey;
use automix_engine::{
    AutoMixDriver, AutoMixEvent, AutoMixScheduler, AutoMixSettings, ChannelId, MixPhase,
    PlaybackService, SettingsUpdate, SimulatedPlayback, Track, TrackPool,
};
use automix_library::{AnalysisWorker, AudioLoader, Config, TrackLibrary};

/// How often the simulated decks advance
const FRAME: Duration = Duration::from_millis(50);

/// Stop after this many completed transitions
const SESSION_TRANSITIONS: usize = 3;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    if !Config::config_path().exists() {
        if let Err(e) = config.save() {
            warn!("Could not write default config: {}", e);
        }
    }

    let library = Arc::new(TrackLibrary::with_tracks(demo_tracks()?));
    let loader = AudioLoader::new();
    for arg in std::env::args().skip(1) {
        let (path, key) = parse_file_arg(&arg)?;
        library
            .import_file(&loader, &path, key)
            .with_context(|| format!("importing {}", path.display()))?;
    }

    let opener = library
        .tracks()
        .first()
        .cloned()
        .context("library is empty")?;

    let playback = Arc::new(Mutex::new(SimulatedPlayback::new()));
    {
        let mut p = playback.lock();
        for channel in ChannelId::ALL {
            p.set_rate(channel, config.playback_rate);
        }
        p.set_crossfader(ChannelId::A.crossfader_full());
        p.load_track(ChannelId::A, Arc::clone(&opener));
        p.play(ChannelId::A);
    }
    info!(
        title = %opener.title,
        artist = %opener.artist,
        tracks = library.len(),
        rate = config.playback_rate,
        "Session started"
    );

    // Start disabled; the first command switches it on
    let scheduler = AutoMixScheduler::new(AutoMixSettings {
        enabled: false,
        ..config.settings.clone()
    });
    let (driver, handle) = AutoMixDriver::new(scheduler, Arc::clone(&playback), Arc::clone(&library));
    let driver = driver.with_analysis(AnalysisWorker::spawn());
    let driver_thread = thread::spawn(move || driver.run());
    handle.update_settings(SettingsUpdate::enabled(true));

    let mut finished = 0;
    let mut phase = MixPhase::Idle;
    let mut last = Instant::now();
    loop {
        thread::sleep(FRAME);
        let now = Instant::now();
        playback.lock().advance(now.duration_since(last).as_secs_f64());
        last = now;

        while let Some(event) = handle.try_recv() {
            match event {
                AutoMixEvent::StateUpdate(state) => {
                    if state.phase != phase {
                        phase = state.phase;
                        info!(
                            phase = ?state.phase,
                            queued = ?state.queued_track_id,
                            style = ?state.selected_style,
                            mix_point = ?state.suggested_mix_point,
                            "Auto-mix state"
                        );
                    }
                }
                AutoMixEvent::TrackLoaded { channel, track_id, has_audio } => {
                    let title = library.get(&track_id).map(|t| t.title.clone()).unwrap_or(track_id);
                    info!(%channel, %title, has_audio, "Cued");
                }
                AutoMixEvent::TransitionStarted { to, style } => {
                    info!(%to, ?style, "Mixing in");
                }
                AutoMixEvent::TransitionFinished { cleared } => {
                    finished += 1;
                    let p = playback.lock();
                    let audible = p.audible();
                    info!(
                        %cleared,
                        %audible,
                        gain = p.gain(audible),
                        finished,
                        "Transition finished"
                    );
                }
            }
        }

        if finished >= SESSION_TRANSITIONS {
            break;
        }
        if playback.lock().snapshot().primary().is_none() {
            warn!("Nothing left playing");
            break;
        }
    }

    handle.shutdown();
    driver_thread
        .join()
        .map_err(|_| anyhow!("auto-mix driver panicked"))?;
    info!("Session ended");
    Ok(())
}

/// Parse `path/to/file.flac=8A`
fn parse_file_arg(arg: &str) -> anyhow::Result<(PathBuf, CamelotKey)> {
    let Some((path, key)) = arg.rsplit_once('=') else {
        bail!("expected FILE=KEY, got {:?}", arg);
    };
    let key = key
        .parse::<CamelotKey>()
        .with_context(|| format!("bad key in {:?}", arg))?;
    Ok((PathBuf::from(path), key))
}

fn demo_tracks() -> anyhow::Result<Vec<Track>> {
    let crate_list = [
        ("1", "Midnight Pulse", "Neon Dreams", 128.0, 245.0, "8A"),
        ("2", "Electric Horizon", "Synthwave Master", 124.0, 312.0, "11B"),
        ("3", "Deep Space Nine", "Bass Commander", 130.0, 278.0, "5A"),
        ("4", "Techno Revolution", "DJ Pulse", 132.0, 289.0, "2A"),
        ("5", "Sunset Boulevard", "Chill Vibes", 118.0, 234.0, "6B"),
        ("6", "Night Drive", "Retro Wave", 126.0, 267.0, "9A"),
        ("7", "Digital Dreams", "Cyber Funk", 122.0, 298.0, "4B"),
        ("8", "Underground Rhythm", "Deep House Collective", 124.0, 321.0, "7A"),
        ("9", "Stellar Voyage", "Cosmic DJ", 128.0, 276.0, "10B"),
        ("10", "Bass Drop City", "Heavy Beats", 140.0, 198.0, "1A"),
    ];

    crate_list
        .into_iter()
        .map(|(id, title, artist, bpm, duration, key)| {
            Ok(Track::new(id, title, artist, bpm, duration, key.parse()?))
        })
        .collect()
}

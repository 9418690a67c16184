//! Background track analysis
//!
//! Decodes a track's source file on a worker thread, fills in tempo (only
//! when metadata has none) and duration, and builds its energy profile.

use crate::loader::AudioLoader;
use automix_analysis::{BpmCache, ContentKey, EnergyProfiler};
use automix_engine::{AnalysisOutcome, AnalysisService, Track};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Analysis thread fed through a request channel
pub struct AnalysisWorker {
    request_tx: Option<Sender<Arc<Track>>>,
    outcome_rx: Receiver<AnalysisOutcome>,
    handle: Option<JoinHandle<()>>,
    cache: Arc<BpmCache>,
}

impl AnalysisWorker {
    pub fn spawn() -> Self {
        Self::with_cache(Arc::new(BpmCache::default()))
    }

    /// Spawn with a tempo cache shared across workers
    pub fn with_cache(cache: Arc<BpmCache>) -> Self {
        let (request_tx, request_rx) = unbounded::<Arc<Track>>();
        let (outcome_tx, outcome_rx) = unbounded();
        let thread_cache = Arc::clone(&cache);

        let handle = thread::spawn(move || {
            let loader = AudioLoader::new();
            let profiler = EnergyProfiler::new();
            for track in request_rx.iter() {
                let outcome = analyze(&loader, &thread_cache, &profiler, &track);
                if outcome_tx.send(outcome).is_err() {
                    break;
                }
            }
            debug!("Analysis worker exiting");
        });

        Self {
            request_tx: Some(request_tx),
            outcome_rx,
            handle: Some(handle),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<BpmCache> {
        &self.cache
    }
}

impl AnalysisService for AnalysisWorker {
    fn request(&self, track: Arc<Track>) {
        if let Some(tx) = &self.request_tx {
            if tx.send(track).is_err() {
                warn!("Analysis worker is gone");
            }
        }
    }

    fn outcomes(&self) -> Receiver<AnalysisOutcome> {
        self.outcome_rx.clone()
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Decode and profile one track
pub fn analyze(
    loader: &AudioLoader,
    cache: &BpmCache,
    profiler: &EnergyProfiler,
    track: &Track,
) -> AnalysisOutcome {
    let failed = |reason: String| AnalysisOutcome::Failed {
        track_id: track.id.clone(),
        reason,
    };

    let Some(path) = track.source.as_deref() else {
        return failed("no audio source".to_string());
    };
    let audio = match loader.load(path) {
        Ok(audio) => audio,
        Err(e) => return failed(e.to_string()),
    };

    let mut analyzed = track.clone();
    if analyzed.duration <= 0.0 {
        analyzed.duration = audio.duration_secs;
    }

    if analyzed.bpm <= 0.0 {
        let key = ContentKey::for_path(path)
            .unwrap_or_else(|| ContentKey::new(track.id.clone(), audio.samples.len() as u64));
        match cache.estimate(&key, &audio.samples, audio.sample_rate) {
            Some(estimate) => {
                debug!(track = %track.title, bpm = estimate.bpm, confidence = estimate.confidence, "Tempo estimated");
                analyzed.bpm = estimate.bpm;
            }
            None => debug!(track = %track.title, "Tempo inconclusive"),
        }
    }

    let profile = profiler.analyze(&audio.samples, analyzed.duration, f64::from(analyzed.bpm));
    info!(
        track = %analyzed.title,
        bpm = analyzed.bpm,
        segments = profile.energy_map.len(),
        drops = profile.drop_points.len(),
        "Track analyzed"
    );
    AnalysisOutcome::Ready(Arc::new(analyzed.with_energy(profile)))
}

//! In-memory cache of tempo estimates keyed by content identity
//!
//! Avoids re-running onset analysis for a file that was already measured.

use crate::bpm::{BpmEstimate, OnsetBpmEstimator};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Content identity of an audio source (file name + byte size)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub name: String,
    pub size: u64,
}

impl ContentKey {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Build a key from a file on disk. Returns `None` if the file can't be stat'ed.
    pub fn for_path(path: &Path) -> Option<Self> {
        let size = std::fs::metadata(path).ok()?.len();
        let name = path.file_name()?.to_string_lossy().into_owned();
        Some(Self { name, size })
    }
}

/// Thread-safe tempo cache wrapped around an [`OnsetBpmEstimator`]
///
/// Only conclusive estimates are stored; an inconclusive file is re-analyzed
/// on the next request.
#[derive(Debug, Default)]
pub struct BpmCache {
    estimator: OnsetBpmEstimator,
    entries: Mutex<HashMap<ContentKey, BpmEstimate>>,
}

impl BpmCache {
    pub fn new(estimator: OnsetBpmEstimator) -> Self {
        Self {
            estimator,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached estimate for `key`, if any
    pub fn get(&self, key: &ContentKey) -> Option<BpmEstimate> {
        self.entries.lock().get(key).copied()
    }

    /// Return the cached estimate or analyze `samples` and remember the result
    pub fn estimate(
        &self,
        key: &ContentKey,
        samples: &[f32],
        sample_rate: u32,
    ) -> Option<BpmEstimate> {
        if let Some(hit) = self.get(key) {
            debug!(name = %key.name, bpm = hit.bpm, "tempo cache hit");
            return Some(hit);
        }

        let estimate = self.estimator.estimate(samples, sample_rate)?;
        self.entries.lock().insert(key.clone(), estimate);
        Some(estimate)
    }

    /// Number of cached estimates
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

//! In-memory track pool shared between the app and the auto-mix driver

use crate::loader::{AudioLoader, LoadError};
use automix_analysis::CamelotKey;
use automix_engine::{Track, TrackPool};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from library edits
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Track not found: {0}")]
    NotFound(String),
    #[error("Duplicate track id: {0}")]
    Duplicate(String),
    #[error("Import failed: {0}")]
    Import(#[from] LoadError),
}

/// Ordered collection of tracks. Readers get cheap `Arc` clones.
#[derive(Debug, Default)]
pub struct TrackLibrary {
    tracks: RwLock<Vec<Arc<Track>>>,
}

impl TrackLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a library from tracks; later duplicates of an id are dropped
    pub fn with_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let library = Self::new();
        for track in tracks {
            if let Err(e) = library.add(track) {
                debug!("Skipping track: {}", e);
            }
        }
        library
    }

    pub fn add(&self, track: Track) -> Result<Arc<Track>, LibraryError> {
        let mut tracks = self.tracks.write();
        if tracks.iter().any(|t| t.id == track.id) {
            return Err(LibraryError::Duplicate(track.id));
        }
        let track = Arc::new(track);
        tracks.push(Arc::clone(&track));
        Ok(track)
    }

    /// Add an audio file, reading title, artist and duration from its tags.
    ///
    /// BPM is left unknown until analysis.
    pub fn import_file(
        &self,
        loader: &AudioLoader,
        path: &Path,
        key: CamelotKey,
    ) -> Result<Arc<Track>, LibraryError> {
        let info = loader.probe(path)?;
        let id = path.display().to_string();
        let track = Track::new(id, info.title, info.artist, 0.0, info.duration_secs, key)
            .with_source(path);
        let track = self.add(track)?;
        info!(title = %track.title, duration = track.duration, "Imported track");
        Ok(track)
    }

    /// Change title and/or artist
    pub fn edit(
        &self,
        id: &str,
        title: Option<String>,
        artist: Option<String>,
    ) -> Result<Arc<Track>, LibraryError> {
        let mut tracks = self.tracks.write();
        let slot = tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;

        let mut edited = (**slot).clone();
        if let Some(title) = title {
            edited.title = title;
        }
        if let Some(artist) = artist {
            edited.artist = artist;
        }
        *slot = Arc::new(edited);
        Ok(Arc::clone(slot))
    }

    pub fn remove(&self, id: &str) -> Result<Arc<Track>, LibraryError> {
        let mut tracks = self.tracks.write();
        let index = tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;
        Ok(tracks.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<Arc<Track>> {
        self.tracks.read().iter().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tracks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.read().is_empty()
    }
}

impl TrackPool for TrackLibrary {
    fn tracks(&self) -> Vec<Arc<Track>> {
        self.tracks.read().clone()
    }

    /// Keeps any title/artist edit made while the analysis ran
    fn store_analyzed(&self, track: Arc<Track>) {
        let mut tracks = self.tracks.write();
        let Some(slot) = tracks.iter_mut().find(|t| t.id == track.id) else {
            debug!(id = %track.id, "Analyzed track no longer in library");
            return;
        };
        let mut merged = (*track).clone();
        merged.title = slot.title.clone();
        merged.artist = slot.artist.clone();
        *slot = Arc::new(merged);
    }
}

//! Track library for AutoMix - pool, decoding, background analysis and config

mod config;
mod library;
mod loader;
mod worker;

pub use config::Config;
pub use library::{LibraryError, TrackLibrary};
pub use loader::{AudioLoader, DecodedAudio, LoadError, TrackInfo};
pub use worker::{analyze, AnalysisWorker};

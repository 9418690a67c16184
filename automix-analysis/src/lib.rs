//! Audio analysis for AutoMix
//!
//! Provides onset-based tempo estimation, per-segment energy profiling
//! and Camelot key handling for harmonic mixing.

mod bpm;
mod cache;
mod camelot;
mod energy;

pub use bpm::{BpmEstimate, OnsetBpmEstimator};
pub use cache::{BpmCache, ContentKey};
pub use camelot::{adjacent, CamelotKey, KeyParseError};
pub use energy::{EnergyProfile, EnergyProfiler};

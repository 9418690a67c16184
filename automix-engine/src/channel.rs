//! Playback channel identities and point-in-time snapshots

use crate::track::Track;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One of the two playback channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelId {
    A,
    B,
}

impl ChannelId {
    pub const ALL: [ChannelId; 2] = [ChannelId::A, ChannelId::B];

    pub fn other(self) -> Self {
        match self {
            ChannelId::A => ChannelId::B,
            ChannelId::B => ChannelId::A,
        }
    }

    /// Crossfader value that fully favors this channel
    pub fn crossfader_full(self) -> f32 {
        match self {
            ChannelId::A => 0.0,
            ChannelId::B => 100.0,
        }
    }

    pub fn index(self) -> usize {
        match self {
            ChannelId::A => 0,
            ChannelId::B => 1,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::A => f.write_str("A"),
            ChannelId::B => f.write_str("B"),
        }
    }
}

/// Snapshot of one channel
#[derive(Debug, Clone, Default)]
pub struct PlaybackChannel {
    pub track: Option<Arc<Track>>,
    /// Seconds into the loaded track
    pub position: f64,
    pub is_playing: bool,
}

impl PlaybackChannel {
    /// Seconds left in the loaded track
    pub fn time_remaining(&self) -> Option<f64> {
        self.track.as_ref().map(|t| t.duration - self.position)
    }
}

/// Snapshot of both channels and the crossfader, read fresh for every decision
#[derive(Debug, Clone, Default)]
pub struct MixSnapshot {
    pub a: PlaybackChannel,
    pub b: PlaybackChannel,
    /// 0 = full A, 100 = full B
    pub crossfader: f32,
}

impl MixSnapshot {
    pub fn channel(&self, id: ChannelId) -> &PlaybackChannel {
        match id {
            ChannelId::A => &self.a,
            ChannelId::B => &self.b,
        }
    }

    /// The channel that is about to finish.
    ///
    /// The only playing channel when one plays; with both playing, the one
    /// the crossfader favors; `None` when nothing plays.
    pub fn primary(&self) -> Option<ChannelId> {
        match (self.a.is_playing, self.b.is_playing) {
            (true, false) => Some(ChannelId::A),
            (false, true) => Some(ChannelId::B),
            (true, true) if self.crossfader < 50.0 => Some(ChannelId::A),
            (true, true) => Some(ChannelId::B),
            (false, false) => None,
        }
    }
}

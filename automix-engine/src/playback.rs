//! Two-channel playback abstraction and a clock-driven simulation of it

use crate::channel::{ChannelId, MixSnapshot, PlaybackChannel};
use crate::mixer::Crossfader;
use crate::track::Track;
use std::sync::Arc;

/// Operations the scheduler needs from a two-channel player
pub trait PlaybackService {
    /// Put `track` on `channel`, stopped at position 0.
    ///
    /// Returns `false` when no audio could be prepared. The channel still
    /// holds the track so mixing can continue on metadata alone.
    fn load_track(&mut self, channel: ChannelId, track: Arc<Track>) -> bool;

    fn play(&mut self, channel: ChannelId);

    fn pause(&mut self, channel: ChannelId);

    /// Jump to `position` seconds
    fn seek(&mut self, channel: ChannelId, position: f64);

    /// Crossfader 0-100 (0 = full A)
    fn set_crossfader(&mut self, value: f32);

    fn crossfader(&self) -> f32;

    fn position(&self, channel: ChannelId) -> f64;

    fn is_playing(&self, channel: ChannelId) -> bool;

    fn loaded_track(&self, channel: ChannelId) -> Option<Arc<Track>>;

    /// Stop and clear the channel
    fn unload(&mut self, channel: ChannelId);

    /// Fresh view of one channel
    fn channel(&self, channel: ChannelId) -> PlaybackChannel {
        PlaybackChannel {
            track: self.loaded_track(channel),
            position: self.position(channel),
            is_playing: self.is_playing(channel),
        }
    }

    /// Fresh view of both channels and the crossfader
    fn snapshot(&self) -> MixSnapshot {
        MixSnapshot {
            a: self.channel(ChannelId::A),
            b: self.channel(ChannelId::B),
            crossfader: self.crossfader(),
        }
    }
}

#[derive(Debug, Clone)]
struct SimDeck {
    track: Option<Arc<Track>>,
    position: f64,
    playing: bool,
    rate: f64,
}

impl Default for SimDeck {
    fn default() -> Self {
        Self {
            track: None,
            position: 0.0,
            playing: false,
            rate: 1.0,
        }
    }
}

/// Player with no audio output; positions advance only when told to.
///
/// Tracks with a source file count as having audio. A deck that reaches
/// the end of its track stops there.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPlayback {
    decks: [SimDeck; 2],
    crossfader: Crossfader,
}

impl SimulatedPlayback {
    pub const MIN_RATE: f64 = 0.25;
    pub const MAX_RATE: f64 = 4.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Playback speed multiplier for a channel
    pub fn set_rate(&mut self, channel: ChannelId, rate: f64) {
        self.decks[channel.index()].rate = rate.clamp(Self::MIN_RATE, Self::MAX_RATE);
    }

    pub fn rate(&self, channel: ChannelId) -> f64 {
        self.decks[channel.index()].rate
    }

    /// Audible gain of a channel at the current crossfader position
    pub fn gain(&self, channel: ChannelId) -> f32 {
        self.crossfader.gain(channel)
    }

    /// Channel the crossfader leans toward
    pub fn audible(&self) -> ChannelId {
        self.crossfader.favors()
    }

    /// Move every playing deck forward by `secs` of wall time
    pub fn advance(&mut self, secs: f64) {
        for deck in &mut self.decks {
            let Some(track) = &deck.track else {
                continue;
            };
            if !deck.playing {
                continue;
            }
            deck.position += secs * deck.rate;
            if deck.position >= track.duration {
                deck.position = track.duration.max(0.0);
                deck.playing = false;
            }
        }
    }
}

impl PlaybackService for SimulatedPlayback {
    fn load_track(&mut self, channel: ChannelId, track: Arc<Track>) -> bool {
        let has_audio = track.source.is_some();
        let deck = &mut self.decks[channel.index()];
        deck.track = Some(track);
        deck.position = 0.0;
        deck.playing = false;
        has_audio
    }

    fn play(&mut self, channel: ChannelId) {
        let deck = &mut self.decks[channel.index()];
        if deck.track.is_some() {
            deck.playing = true;
        }
    }

    fn pause(&mut self, channel: ChannelId) {
        self.decks[channel.index()].playing = false;
    }

    fn seek(&mut self, channel: ChannelId, position: f64) {
        let deck = &mut self.decks[channel.index()];
        let end = deck.track.as_ref().map_or(0.0, |t| t.duration.max(0.0));
        deck.position = position.clamp(0.0, end);
    }

    fn set_crossfader(&mut self, value: f32) {
        self.crossfader.set(value);
    }

    fn crossfader(&self) -> f32 {
        self.crossfader.value()
    }

    fn position(&self, channel: ChannelId) -> f64 {
        self.decks[channel.index()].position
    }

    fn is_playing(&self, channel: ChannelId) -> bool {
        self.decks[channel.index()].playing
    }

    fn loaded_track(&self, channel: ChannelId) -> Option<Arc<Track>> {
        self.decks[channel.index()].track.clone()
    }

    fn unload(&mut self, channel: ChannelId) {
        let rate = self.decks[channel.index()].rate;
        self.decks[channel.index()] = SimDeck {
            rate,
            ..SimDeck::default()
        };
    }
}

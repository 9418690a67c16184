//! Crossfader position and per-channel gain curves

use crate::channel::ChannelId;
use std::f32::consts::FRAC_PI_2;

/// Crossfader curve type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossfaderCurve {
    /// Linear crossfade
    Linear,
    /// Equal power (cos/sin), constant loudness through the middle
    #[default]
    EqualPower,
    /// Sharp cut at the edges
    Cut,
}

/// Crossfader on a 0-100 scale (0 = full A, 50 = center, 100 = full B)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossfader {
    value: f32,
    curve: CrossfaderCurve,
}

impl Default for Crossfader {
    fn default() -> Self {
        Self {
            value: Self::CENTER,
            curve: CrossfaderCurve::default(),
        }
    }
}

impl Crossfader {
    pub const MIN: f32 = 0.0;
    pub const CENTER: f32 = 50.0;
    pub const MAX: f32 = 100.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Set position, clamped to 0-100
    pub fn set(&mut self, value: f32) {
        self.value = value.clamp(Self::MIN, Self::MAX);
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set_curve(&mut self, curve: CrossfaderCurve) {
        self.curve = curve;
    }

    pub fn curve(&self) -> CrossfaderCurve {
        self.curve
    }

    /// Channel the fader leans toward; center counts as B
    pub fn favors(&self) -> ChannelId {
        if self.value < Self::CENTER {
            ChannelId::A
        } else {
            ChannelId::B
        }
    }

    /// Output gain for a channel at the current position
    pub fn gain(&self, channel: ChannelId) -> f32 {
        let t = self.value / Self::MAX;
        match channel {
            ChannelId::A => self.gain_a_for(t),
            ChannelId::B => self.gain_b_for(t),
        }
    }

    fn gain_a_for(&self, t: f32) -> f32 {
        match self.curve {
            CrossfaderCurve::Linear => 1.0 - t,
            CrossfaderCurve::EqualPower => (t * FRAC_PI_2).cos(),
            CrossfaderCurve::Cut => {
                if t < 0.95 {
                    1.0
                } else {
                    (1.0 - t) * 20.0
                }
            }
        }
    }

    fn gain_b_for(&self, t: f32) -> f32 {
        match self.curve {
            CrossfaderCurve::Linear => t,
            CrossfaderCurve::EqualPower => (t * FRAC_PI_2).sin(),
            CrossfaderCurve::Cut => {
                if t > 0.05 {
                    1.0
                } else {
                    t * 20.0
                }
            }
        }
    }
}

//! Auto-mix settings and transition styles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Requested transition style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionStyle {
    /// Let the planner decide per track pair
    Auto,
    #[default]
    Crossfade,
    Beatmatch,
    Drop,
    Cut,
}

/// Concrete style chosen for a transition (never `Auto`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixStyle {
    Crossfade,
    Beatmatch,
    Drop,
    Cut,
}

impl TransitionStyle {
    pub const ALL: [TransitionStyle; 5] = [
        TransitionStyle::Auto,
        TransitionStyle::Crossfade,
        TransitionStyle::Beatmatch,
        TransitionStyle::Drop,
        TransitionStyle::Cut,
    ];

    /// The fixed style this setting forces, or `None` for `Auto`
    pub fn fixed(self) -> Option<MixStyle> {
        match self {
            TransitionStyle::Auto => None,
            TransitionStyle::Crossfade => Some(MixStyle::Crossfade),
            TransitionStyle::Beatmatch => Some(MixStyle::Beatmatch),
            TransitionStyle::Drop => Some(MixStyle::Drop),
            TransitionStyle::Cut => Some(MixStyle::Cut),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransitionStyle::Auto => "auto",
            TransitionStyle::Crossfade => "crossfade",
            TransitionStyle::Beatmatch => "beatmatch",
            TransitionStyle::Drop => "drop",
            TransitionStyle::Cut => "cut",
        }
    }
}

impl From<MixStyle> for TransitionStyle {
    fn from(style: MixStyle) -> Self {
        match style {
            MixStyle::Crossfade => TransitionStyle::Crossfade,
            MixStyle::Beatmatch => TransitionStyle::Beatmatch,
            MixStyle::Drop => TransitionStyle::Drop,
            MixStyle::Cut => TransitionStyle::Cut,
        }
    }
}

impl fmt::Display for TransitionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for MixStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(TransitionStyle::from(*self).as_str())
    }
}

/// Unknown transition style name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown transition style: {0:?}")]
pub struct ParseStyleError(pub String);

impl FromStr for TransitionStyle {
    type Err = ParseStyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        TransitionStyle::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStyleError(s.to_string()))
    }
}

/// User-facing auto-mix settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoMixSettings {
    pub enabled: bool,
    /// Crossfade ramp length in seconds
    pub transition_time_secs: u32,
    pub transition_style: TransitionStyle,
    /// Report the planned mix point of the playing track
    pub smart_sync: bool,
    /// Reward candidates whose intro energy matches the current outro
    pub energy_match: bool,
    /// Reward Camelot-adjacent candidates
    pub harmonic: bool,
}

impl Default for AutoMixSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            transition_time_secs: 16,
            transition_style: TransitionStyle::Crossfade,
            smart_sync: true,
            energy_match: true,
            harmonic: true,
        }
    }
}

/// Partial settings change; `None` fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub enabled: Option<bool>,
    pub transition_time_secs: Option<u32>,
    pub transition_style: Option<TransitionStyle>,
    pub smart_sync: Option<bool>,
    pub energy_match: Option<bool>,
    pub harmonic: Option<bool>,
}

impl SettingsUpdate {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    pub fn style(style: TransitionStyle) -> Self {
        Self {
            transition_style: Some(style),
            ..Self::default()
        }
    }
}

impl AutoMixSettings {
    /// Apply a partial update in place
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(v) = update.enabled {
            self.enabled = v;
        }
        if let Some(v) = update.transition_time_secs {
            self.transition_time_secs = v;
        }
        if let Some(v) = update.transition_style {
            self.transition_style = v;
        }
        if let Some(v) = update.smart_sync {
            self.smart_sync = v;
        }
        if let Some(v) = update.energy_match {
            self.energy_match = v;
        }
        if let Some(v) = update.harmonic {
            self.harmonic = v;
        }
    }
}

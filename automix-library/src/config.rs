//! Settings persistence for AutoMix
//!
//! Plain key=value lines; unknown keys and bad values are skipped.

use automix_engine::{AutoMixSettings, SettingsUpdate};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub settings: AutoMixSettings,
    /// Playback speed of the simulated decks (1.0 = real time)
    pub playback_rate: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: AutoMixSettings::default(),
            playback_rate: 1.0,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be read.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path()).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn save(&self) -> io::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    /// Default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("automix")
            .join("config.txt")
    }

    fn parse(content: &str) -> Self {
        let mut config = Self::default();
        let mut update = SettingsUpdate::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            let ok = match key {
                "enabled" => parse_into(value, &mut update.enabled),
                "transition_time" => parse_into(value, &mut update.transition_time_secs),
                "transition_style" => parse_into(value, &mut update.transition_style),
                "smart_sync" => parse_into(value, &mut update.smart_sync),
                "energy_match" => parse_into(value, &mut update.energy_match),
                "harmonic" => parse_into(value, &mut update.harmonic),
                "playback_rate" => match value.parse::<f64>() {
                    Ok(rate) if rate > 0.0 => {
                        config.playback_rate = rate;
                        true
                    }
                    _ => false,
                },
                _ => true, // Ignore unknown keys
            };
            if !ok {
                warn!(key, value, "Ignoring invalid config value");
            }
        }

        config.settings.apply(&update);
        config
    }

    fn serialize(&self) -> String {
        let s = &self.settings;
        [
            "# AutoMix Configuration".to_string(),
            format!("enabled={}", s.enabled),
            format!("transition_time={}", s.transition_time_secs),
            format!("transition_style={}", s.transition_style),
            format!("smart_sync={}", s.smart_sync),
            format!("energy_match={}", s.energy_match),
            format!("harmonic={}", s.harmonic),
            format!("playback_rate={}", self.playback_rate),
        ]
        .join("\n")
    }
}

fn parse_into<T: std::str::FromStr>(value: &str, slot: &mut Option<T>) -> bool {
    match value.parse() {
        Ok(v) => {
            *slot = Some(v);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automix_engine::TransitionStyle;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty() {
        assert_eq!(Config::parse(""), Config::default());
    }

    #[test]
    fn test_parse_values() {
        let config = Config::parse(
            "enabled=true\ntransition_time=8\ntransition_style=auto\nharmonic=false\nplayback_rate=4",
        );
        assert!(config.settings.enabled);
        assert_eq!(config.settings.transition_time_secs, 8);
        assert_eq!(config.settings.transition_style, TransitionStyle::Auto);
        assert!(!config.settings.harmonic);
        assert!(config.settings.energy_match);
        assert_eq!(config.playback_rate, 4.0);
    }

    #[test]
    fn test_parse_with_comments_and_junk() {
        let content = "# Comment\ntransition_time=abc\nno equals sign\ncolor=blue\nsmart_sync=false";
        let config = Config::parse(content);
        assert_eq!(config.settings.transition_time_secs, 16);
        assert!(!config.settings.smart_sync);
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        assert_eq!(Config::parse("playback_rate=0").playback_rate, 1.0);
        assert_eq!(Config::parse("playback_rate=-2").playback_rate, 1.0);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut config = Config::default();
        config.settings.transition_style = TransitionStyle::Beatmatch;
        config.settings.transition_time_secs = 24;
        config.playback_rate = 2.5;

        assert_eq!(Config::parse(&config.serialize()), config);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.txt");
        let mut config = Config::default();
        config.settings.enabled = true;

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load_from(&dir.path().join("absent.txt")).is_err());
    }
}

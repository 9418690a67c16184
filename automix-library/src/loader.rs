//! Audio file decoding for analysis

use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Errors that can occur while reading an audio file
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Tags and length read without decoding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    /// Seconds; 0 when the container does not say
    pub duration_secs: f64,
    pub sample_rate: u32,
}

/// Mono PCM ready for analysis
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Channel-averaged samples in -1.0..1.0
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub duration_secs: f64,
}

/// Symphonia-backed decoder producing mono analysis buffers
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioLoader;

impl AudioLoader {
    pub fn new() -> Self {
        Self
    }

    /// Read tags and duration without decoding audio
    pub fn probe(&self, path: &Path) -> Result<TrackInfo, LoadError> {
        let mut format = open(path)?;
        let (_, params) = audio_track(format.as_ref())?;
        let sample_rate = params.sample_rate.unwrap_or(44100);
        let duration_secs = params
            .n_frames
            .map(|frames| frames as f64 / sample_rate as f64)
            .unwrap_or(0.0);

        let (title, artist) = read_tags(format.as_mut(), path);
        Ok(TrackInfo {
            title,
            artist,
            duration_secs,
            sample_rate,
        })
    }

    /// Decode the whole file, downmixed to mono
    pub fn load(&self, path: &Path) -> Result<DecodedAudio, LoadError> {
        let mut format = open(path)?;
        let (track_id, params) = audio_track(format.as_ref())?;
        let mut sample_rate = params.sample_rate.unwrap_or(44100);

        let mut decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                // Corrupt packets are skipped
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            sample_rate = spec.rate;
            let channels = spec.channels.count().max(1);
            let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buf.copy_interleaved_ref(decoded);
            samples.extend(downmix(buf.samples(), channels));
        }

        let duration_secs = samples.len() as f64 / sample_rate as f64;
        Ok(DecodedAudio {
            samples,
            sample_rate,
            duration_secs,
        })
    }
}

fn open(path: &Path) -> Result<Box<dyn FormatReader>, LoadError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| LoadError::Decode(e.to_string()))?;
    Ok(probed.format)
}

/// Id and codec parameters of the first audio track
fn audio_track(format: &dyn FormatReader) -> Result<(u32, CodecParameters), LoadError> {
    format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| (t.id, t.codec_params.clone()))
        .ok_or(LoadError::NoAudioTrack)
}

/// Title and artist tags, falling back to the file stem and "Unknown"
fn read_tags(format: &mut dyn FormatReader, path: &Path) -> (String, String) {
    let mut title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown")
        .to_string();
    let mut artist = "Unknown".to_string();

    if let Some(meta) = format.metadata().current() {
        for tag in meta.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => title = tag.value.to_string(),
                Some(StandardTagKey::Artist) => artist = tag.value.to_string(),
                _ => {}
            }
        }
    }
    (title, artist)
}

fn downmix(interleaved: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    interleaved
        .chunks(channels)
        .map(move |frame| frame.iter().sum::<f32>() / frame.len() as f32)
}

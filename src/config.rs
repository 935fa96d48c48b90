//! Player configuration
//!
//! Sizing for the decode scratch buffer and the output line, plus the timing
//! knobs of the streaming loop. Deserializable so hosts can keep it alongside
//! their own settings.

use crate::{PlayerError, Result};
use serde::{Deserialize, Serialize};

/// Default sample rate (44.1 kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default decode chunk, in 16-bit samples (4096 stereo frames)
pub const DEFAULT_CHUNK_SAMPLES: usize = 8192;

/// Default length of a scheduled fade-out, in seconds
pub const DEFAULT_FADE_LENGTH_SECS: f32 = 6.0;

/// Back-off between stalled sink writes in microseconds
pub const WRITE_BACKOFF_MICROS: u64 = 100;

/// How long a sink may accept nothing before streaming fails, in milliseconds
pub const MAX_STALL_MILLIS: u64 = 2000;

/// Configuration for a [`Player`](crate::Player)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Requested output sample rate in Hz. Decoders may coerce it.
    pub sample_rate: u32,

    /// Samples produced per decode call (interleaved, so frames = samples / 2)
    pub chunk_samples: usize,

    /// Output line buffer, in frames. The sink is opened with four times
    /// this many frames worth of bytes.
    pub sink_buffer_frames: usize,

    /// Length of the fade once it starts, in seconds
    pub fade_length_seconds: f32,

    /// Sleep between writes that made no progress, in microseconds
    pub write_backoff_micros: u64,

    /// Wall time a sink may keep accepting zero bytes before the loop gives
    /// up, in milliseconds. Counted from the first write that made no progress.
    pub max_stall_millis: u64,
}

impl PlayerConfig {
    /// Small buffers, lower pause latency
    /// Chunk = 2048 samples ≈ 23ms @ 44.1kHz stereo
    pub fn low_latency(sample_rate: u32) -> Self {
        PlayerConfig {
            sample_rate,
            chunk_samples: 2048,
            sink_buffer_frames: 1024,
            ..Self::default()
        }
    }

    /// Large buffers, fewer underruns on busy machines
    /// Chunk = 8192 samples ≈ 93ms @ 44.1kHz stereo
    pub fn stable(sample_rate: u32) -> Self {
        PlayerConfig {
            sample_rate,
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
            sink_buffer_frames: 8192,
            ..Self::default()
        }
    }

    /// Set the requested sample rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the decode chunk size in samples
    pub fn with_chunk_samples(mut self, chunk_samples: usize) -> Self {
        self.chunk_samples = chunk_samples;
        self
    }

    /// Set the fade length in seconds
    pub fn with_fade_length(mut self, seconds: f32) -> Self {
        self.fade_length_seconds = seconds;
        self
    }

    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(text)
            .map_err(|e| PlayerError::Config(format!("invalid player config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values can drive a stereo 16-bit stream.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PlayerError::Config("sample_rate must be greater than 0".into()));
        }
        if self.chunk_samples < 2 || self.chunk_samples % 2 != 0 {
            return Err(PlayerError::Config(format!(
                "chunk_samples must be a positive even number, got {}",
                self.chunk_samples
            )));
        }
        if self.sink_buffer_frames == 0 {
            return Err(PlayerError::Config(
                "sink_buffer_frames must be greater than 0".into(),
            ));
        }
        if !self.fade_length_seconds.is_finite() || self.fade_length_seconds < 0.0 {
            return Err(PlayerError::Config(format!(
                "fade_length_seconds must be finite and non-negative, got {}",
                self.fade_length_seconds
            )));
        }
        if self.max_stall_millis == 0 {
            return Err(PlayerError::Config(
                "max_stall_millis must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Latency of one decode chunk in milliseconds
    pub fn chunk_latency_ms(&self) -> f32 {
        let frames = self.chunk_samples as f32 / 2.0;
        (frames / self.sample_rate as f32) * 1000.0
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            sample_rate: DEFAULT_SAMPLE_RATE,
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
            sink_buffer_frames: 8192,
            fade_length_seconds: DEFAULT_FADE_LENGTH_SECS,
            write_backoff_micros: WRITE_BACKOFF_MICROS,
            max_stall_millis: MAX_STALL_MILLIS,
        }
    }
}

//! WAV file output
//!
//! Renders the stream to a 16-bit PCM WAV file instead of a device. Writes are
//! never partial; gain is applied in software with clipping.

use super::{db_to_amplitude, AudioFormat, AudioSink, SinkProvider};
use crate::{PlayerError, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Opens [`WavSink`]s writing to a fixed path (truncated on each open)
#[derive(Debug, Clone)]
pub struct WavOutput {
    path: PathBuf,
}

impl WavOutput {
    /// Write to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WavOutput { path: path.into() }
    }

    /// Target file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SinkProvider for WavOutput {
    fn open(&self, format: AudioFormat, _buffer_bytes: usize) -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(WavSink::create(&self.path, format)?))
    }
}

/// Audio sink writing a WAV file
pub struct WavSink {
    format: AudioFormat,
    writer: Option<WavWriter<BufWriter<File>>>,
    amplitude: f32,
    frames_written: u64,
}

impl WavSink {
    /// Create (or truncate) the file at `path`
    pub fn create(path: &Path, format: AudioFormat) -> Result<Self> {
        if format.bits_per_sample != 16 {
            return Err(PlayerError::Device(format!(
                "WAV output supports 16-bit samples only, got {}",
                format.bits_per_sample
            )));
        }

        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec).map_err(|e| {
            PlayerError::Device(format!("Failed to create WAV file '{}': {e}", path.display()))
        })?;

        debug!(path = %path.display(), sample_rate = format.sample_rate, "Opened WAV output");
        Ok(WavSink {
            format,
            writer: Some(writer),
            amplitude: 1.0,
            frames_written: 0,
        })
    }

    /// Whole frames written so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl AudioSink for WavSink {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PlayerError::Device("write to closed WAV sink".into()))?;

        let whole = bytes.len() - bytes.len() % self.format.sample_bytes();
        for sample in self.format.decode_samples(&bytes[..whole]) {
            let scaled = (f32::from(sample) * self.amplitude)
                .round()
                .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
            writer
                .write_sample(scaled)
                .map_err(|e| PlayerError::Device(format!("WAV write failed: {e}")))?;
        }

        self.frames_written += (whole / self.format.frame_bytes()) as u64;
        Ok(whole)
    }

    fn set_gain(&mut self, decibels: f32) -> Result<()> {
        self.amplitude = db_to_amplitude(decibels);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| PlayerError::Device(format!("WAV flush failed: {e}")))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Nothing is queued; samples go straight to the file
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| PlayerError::Device(format!("WAV finalize failed: {e}")))?;
            debug!(frames = self.frames_written, "Closed WAV output");
        }
        Ok(())
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

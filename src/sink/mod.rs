//! Audio output
//!
//! An [`AudioSink`] is an open PCM output line: it accepts raw bytes in its
//! [`AudioFormat`], may accept fewer bytes than offered, and exposes a gain
//! control in decibels. A [`SinkProvider`] opens sinks; the playback engine
//! asks it for a new one whenever the output format changes.
//!
//! Implementations shipped with the crate:
//! - `RodioOutput` (feature `streaming`): system audio device via rodio
//! - `WavOutput` (feature `export-wav`): 16-bit WAV file via hound

pub mod ring_buffer;
#[cfg(feature = "streaming")]
pub mod rodio_output;
#[cfg(feature = "export-wav")]
pub mod wav;

pub use ring_buffer::RingBuffer;

use crate::Result;

/// PCM layout of an output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Frames per second
    pub sample_rate: u32,
    /// Interleaved channels per frame
    pub channels: u16,
    /// Bits per sample (always 16 for decoder output)
    pub bits_per_sample: u16,
    /// Byte order of each sample
    pub big_endian: bool,
}

impl AudioFormat {
    /// Signed 16-bit interleaved stereo, little-endian
    pub fn pcm16_stereo(sample_rate: u32) -> Self {
        AudioFormat {
            sample_rate,
            channels: 2,
            bits_per_sample: 16,
            big_endian: false,
        }
    }

    /// Bytes per sample
    pub fn sample_bytes(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Bytes per frame (all channels)
    pub fn frame_bytes(&self) -> usize {
        self.sample_bytes() * usize::from(self.channels)
    }

    /// Append `samples` to `out` in this format's byte order
    pub fn encode_samples(&self, samples: &[i16], out: &mut Vec<u8>) {
        out.reserve(samples.len() * 2);
        for &sample in samples {
            let bytes = if self.big_endian {
                sample.to_be_bytes()
            } else {
                sample.to_le_bytes()
            };
            out.extend_from_slice(&bytes);
        }
    }

    /// Decode whole samples from `bytes`; a trailing odd byte is ignored.
    pub fn decode_samples<'a>(&self, bytes: &'a [u8]) -> impl Iterator<Item = i16> + 'a {
        let big_endian = self.big_endian;
        bytes.chunks_exact(2).map(move |pair| {
            let pair = [pair[0], pair[1]];
            if big_endian {
                i16::from_be_bytes(pair)
            } else {
                i16::from_le_bytes(pair)
            }
        })
    }
}

/// Open audio output line
pub trait AudioSink: Send {
    /// Format this sink was opened with
    fn format(&self) -> AudioFormat;

    /// Queue PCM bytes for playback.
    ///
    /// May block for a bounded time while the device drains. Returns the
    /// number of bytes accepted, which can be less than `bytes.len()`
    /// (including zero); the caller retries the remainder.
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Set output gain in decibels (0.0 = unity)
    fn set_gain(&mut self, decibels: f32) -> Result<()>;

    /// Start (or resume) consuming queued audio
    fn start(&mut self) -> Result<()>;

    /// Stop consuming audio; queued data is kept
    fn stop(&mut self) -> Result<()>;

    /// Discard queued audio that has not been played yet
    fn flush(&mut self) -> Result<()>;

    /// Release the device. The sink is not used afterwards.
    fn close(&mut self) -> Result<()>;
}

/// Opens audio sinks
pub trait SinkProvider: Send + Sync {
    /// Open a sink for `format` with roughly `buffer_bytes` of buffering
    fn open(&self, format: AudioFormat, buffer_bytes: usize) -> Result<Box<dyn AudioSink>>;
}

impl<P: SinkProvider + ?Sized> SinkProvider for std::sync::Arc<P> {
    fn open(&self, format: AudioFormat, buffer_bytes: usize) -> Result<Box<dyn AudioSink>> {
        (**self).open(format, buffer_bytes)
    }
}

/// Convert a linear volume factor (1.0 = unity) to decibels.
///
/// Zero maps to negative infinity (silence).
pub fn volume_to_db(volume: f64) -> f32 {
    (20.0 * volume.log10()) as f32
}

/// Convert decibels back to a linear amplitude factor.
pub fn db_to_amplitude(decibels: f32) -> f32 {
    10f32.powf(decibels / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_volume_to_db() {
        assert_relative_eq!(volume_to_db(1.0), 0.0);
        assert_relative_eq!(volume_to_db(2.0), 6.0206, epsilon = 1e-3);
        assert_relative_eq!(volume_to_db(0.5), -6.0206, epsilon = 1e-3);
        assert_eq!(volume_to_db(0.0), f32::NEG_INFINITY);
    }

    #[test]
    fn test_db_round_trip() {
        for volume in [0.1f64, 0.75, 1.0, 3.0] {
            let amplitude = db_to_amplitude(volume_to_db(volume));
            assert_relative_eq!(amplitude, volume as f32, epsilon = 1e-5);
        }
        assert_eq!(db_to_amplitude(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_frame_bytes() {
        let format = AudioFormat::pcm16_stereo(44_100);
        assert_eq!(format.sample_bytes(), 2);
        assert_eq!(format.frame_bytes(), 4);
    }

    #[test]
    fn test_byte_order() {
        let samples = [0x0102i16, -2];
        let mut little = Vec::new();
        AudioFormat::pcm16_stereo(44_100).encode_samples(&samples, &mut little);
        assert_eq!(little, [0x02, 0x01, 0xFE, 0xFF]);

        let big_format = AudioFormat {
            big_endian: true,
            ..AudioFormat::pcm16_stereo(44_100)
        };
        let mut big = Vec::new();
        big_format.encode_samples(&samples, &mut big);
        assert_eq!(big, [0x01, 0x02, 0xFF, 0xFE]);

        let decoded: Vec<i16> = big_format.decode_samples(&big).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_decode_ignores_trailing_byte() {
        let format = AudioFormat::pcm16_stereo(44_100);
        let decoded: Vec<i16> = format.decode_samples(&[1, 0, 9]).collect();
        assert_eq!(decoded, [1]);
    }
}

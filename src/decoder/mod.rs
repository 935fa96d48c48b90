//! Decoder abstraction
//!
//! Chip emulation lives outside this crate. Each supported format is backed by
//! a [`Decoder`] implementation registered in a [`DecoderFactory`]; the
//! streaming engine only ever talks to the trait.
//!
//! # Lifecycle
//!
//! ```text
//! new ─▶ set_sample_rate ─▶ load ─▶ start_track ─▶ play … ─▶ track_ended
//!                                       ▲                        │
//!                                       └────────────────────────┘
//! ```

pub mod factory;
pub mod format;

pub use factory::{DecoderConstructor, DecoderFactory};
pub use format::{DecoderKind, FormatKey};

use crate::Result;

/// Format-specific music emulator producing interleaved 16-bit stereo PCM.
///
/// Implementations are driven from the streaming thread and from the
/// controlling thread, never at the same time.
pub trait Decoder: Send {
    /// Request an output sample rate. Returns the rate that will actually be
    /// produced, which may differ if the emulator only supports fixed rates.
    fn set_sample_rate(&mut self, requested: u32) -> u32;

    /// Ingest the whole file body.
    ///
    /// Returns [`PlayerError::Format`](crate::PlayerError::Format) for
    /// malformed data.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Number of tracks in the loaded file
    fn track_count(&self) -> usize;

    /// Select a track (0-based) and restart playback from its beginning.
    fn start_track(&mut self, index: usize) -> Result<()>;

    /// Schedule a fade to silence starting `start_seconds` into the current
    /// track and lasting `length_seconds`.
    fn set_fade(&mut self, start_seconds: f32, length_seconds: f32);

    /// Currently selected track
    fn current_track(&self) -> usize;

    /// Seconds played since the last [`start_track`](Decoder::start_track)
    fn current_time(&self) -> f32;

    /// True once the current track has produced its last sample
    fn track_ended(&self) -> bool;

    /// Fill `out` with interleaved stereo samples.
    ///
    /// Returns the number of samples written (not frames). Zero means no more
    /// audio is available for the current track.
    fn play(&mut self, out: &mut [i16]) -> usize;
}

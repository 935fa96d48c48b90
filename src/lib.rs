//! Chiptune file player
//!
//! Plays video game music files (VGM/VGZ, GBS, NSF, SPC) by handing them to
//! format-specific emulators and streaming the PCM they produce to an audio
//! output. The emulators themselves are supplied by the host through the
//! [`Decoder`] trait; this crate owns everything around them.
//!
//! # Features
//! - Local files, HTTP URLs and entries inside ZIP archives
//! - Transparent GZIP decompression (`.vgz`, `*.gz`)
//! - Single-entry archive cache, so tracks of one collection share a download
//! - Background streaming thread with synchronous pause/resume
//! - Fade-out scheduling and volume in decibels
//!
//! # Crate feature flags
//! - `export-wav` (default): render to a WAV file (`sink::wav`, enables `hound`)
//! - `streaming` (opt-in): system audio output (`sink::rodio_output`, enables `rodio`)
//! - `remote` (opt-in): HTTP(S) loading (`source::remote`, enables `reqwest`)
//!
//! # Quick start
//! ```no_run
//! # #[cfg(feature = "export-wav")]
//! # {
//! use gme_player::{DecoderFactory, DecoderKind, Player, WavOutput};
//! use std::sync::Arc;
//!
//! # fn spc_decoder() -> Box<dyn gme_player::Decoder> { unimplemented!() }
//! let factory = DecoderFactory::new().register(DecoderKind::Spc, spc_decoder);
//! let mut player = Player::with_defaults(factory, Arc::new(WavOutput::new("out.wav")));
//!
//! player.load_str("soundtracks/game.zip#01 title.spc").unwrap();
//! player.set_volume(0.8).unwrap();
//! player.play(0, Some(90.0)).unwrap();
//! # }
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod locator;
pub mod player;
pub mod sink;
pub mod source;

pub use cache::ArchiveCache;
pub use config::PlayerConfig;
pub use decoder::{Decoder, DecoderFactory, DecoderKind, FormatKey};
pub use engine::{IdleHook, PlaybackEngine, PlaybackState};
pub use error::{PlayerError, Result};
pub use locator::{Locator, Origin};
pub use player::Player;
pub use sink::{AudioFormat, AudioSink, SinkProvider};
pub use source::{ByteSource, DefaultByteSource};

#[cfg(feature = "streaming")]
pub use sink::rodio_output::{RodioOutput, RodioSink};
#[cfg(feature = "export-wav")]
pub use sink::wav::{WavOutput, WavSink};

//! Player
//!
//! Public control surface. Resolves a [`Locator`] to bytes (through the
//! [`ByteSource`] and a one-entry [`ArchiveCache`]), picks a decoder by file
//! name, and hands it to the [`PlaybackEngine`].
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "export-wav")]
//! # {
//! use gme_player::{DecoderFactory, Player, WavOutput};
//! use std::sync::Arc;
//!
//! # fn factory() -> DecoderFactory { DecoderFactory::new() }
//! let mut player = Player::with_defaults(factory(), Arc::new(WavOutput::new("out.wav")));
//! player.load_str("music/collection.zip#stage1.spc").unwrap();
//! player.play(0, Some(120.0)).unwrap();
//! # }
//! ```

use crate::cache::ArchiveCache;
use crate::config::PlayerConfig;
use crate::decoder::{DecoderFactory, FormatKey};
use crate::engine::{PlaybackEngine, PlaybackState};
use crate::locator::Locator;
use crate::sink::SinkProvider;
use crate::source::archive::is_gzip;
use crate::source::{ByteSource, DefaultByteSource};
use crate::{PlayerError, Result};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Loads and plays one chiptune file at a time
pub struct Player {
    config: PlayerConfig,
    source: Arc<dyn ByteSource>,
    factory: DecoderFactory,
    engine: PlaybackEngine,
    archive_cache: ArchiveCache,
    loaded: Option<Locator>,
}

impl Player {
    /// Create a player. Fails if `config` does not validate.
    pub fn new(
        config: PlayerConfig,
        source: Arc<dyn ByteSource>,
        factory: DecoderFactory,
        output: Arc<dyn SinkProvider>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, source, factory, output))
    }

    /// Default configuration and [`DefaultByteSource`]
    pub fn with_defaults(factory: DecoderFactory, output: Arc<dyn SinkProvider>) -> Self {
        Self::build(
            PlayerConfig::default(),
            Arc::new(DefaultByteSource::new()),
            factory,
            output,
        )
    }

    fn build(
        config: PlayerConfig,
        source: Arc<dyn ByteSource>,
        factory: DecoderFactory,
        output: Arc<dyn SinkProvider>,
    ) -> Self {
        Player {
            engine: PlaybackEngine::new(config, output),
            config,
            source,
            factory,
            archive_cache: ArchiveCache::new(),
            loaded: None,
        }
    }

    /// Load a file and bind its decoder.
    ///
    /// Playback is paused first. Loading the locator that is already loaded
    /// does nothing else. On failure the previously loaded file stays bound.
    pub fn load(&mut self, locator: &Locator) -> Result<()> {
        self.engine.pause();

        if self.loaded.as_ref() == Some(locator) {
            debug!(%locator, "Already loaded");
            return Ok(());
        }

        let name = locator.file_name();
        let key = FormatKey::detect(&name)?;

        let mut data = self.fetch(locator)?;
        if key.compressed {
            data = self.decompress(data, &name)?;
        }

        let mut decoder = self.factory.create(key.kind)?;
        let sample_rate = decoder.set_sample_rate(self.config.sample_rate);
        decoder.load(&data)?;
        self.engine.bind(decoder, sample_rate)?;

        info!(
            %locator,
            format = %key.kind,
            bytes = data.len(),
            sample_rate,
            "Loaded file"
        );
        self.loaded = Some(locator.clone());
        Ok(())
    }

    /// Parse `locator` (see [`Locator::parse`]) and load it
    pub fn load_str(&mut self, locator: &str) -> Result<()> {
        self.load(&Locator::parse(locator))
    }

    /// Start `track` from the beginning.
    ///
    /// With `fade_seconds`, the track fades out over the configured fade
    /// length starting that many seconds in.
    pub fn play(&mut self, track: usize, fade_seconds: Option<f32>) -> Result<()> {
        if !self.engine.is_bound() {
            return Err(PlayerError::NotLoaded);
        }

        self.engine.pause();
        self.engine.flush()?;

        let fade_length = self.config.fade_length_seconds;
        self.engine
            .with_decoder(|decoder| -> Result<()> {
                let count = decoder.track_count();
                if track >= count {
                    return Err(PlayerError::Config(format!(
                        "track {track} out of range (file has {count})"
                    )));
                }
                decoder.start_track(track)?;
                if let Some(start) = fade_seconds {
                    decoder.set_fade(start, fade_length);
                }
                Ok(())
            })
            .ok_or(PlayerError::NotLoaded)??;

        debug!(track, ?fade_seconds, "Starting track");
        self.engine.play()
    }

    /// Load `locator` and play its first track
    pub fn play_file(&mut self, locator: &str) -> Result<()> {
        self.load_str(locator)?;
        self.play(0, None)
    }

    /// Load `locator` and play its first track with a fade
    pub fn play_file_with_fade(&mut self, locator: &str, fade_seconds: f32) -> Result<()> {
        self.load_str(locator)?;
        self.play(0, Some(fade_seconds))
    }

    /// Pause; returns once the streaming thread has stopped writing
    pub fn pause(&mut self) {
        self.engine.pause();
    }

    /// Continue the current track where it was paused
    pub fn resume(&mut self) -> Result<()> {
        self.engine.play()
    }

    /// Pause and release the audio sink. The file stays loaded.
    pub fn stop(&mut self) -> Result<()> {
        self.engine.stop()
    }

    /// Stop and forget the loaded file and the cached archive
    pub fn close(&mut self) -> Result<()> {
        self.loaded = None;
        self.archive_cache.clear();
        self.engine.unbind()
    }

    /// Set the linear volume (1.0 = unity)
    pub fn set_volume(&mut self, volume: f64) -> Result<()> {
        self.engine.set_volume(volume)
    }

    /// Current linear volume
    pub fn volume(&self) -> f64 {
        self.engine.volume()
    }

    /// Tracks in the loaded file, 0 if nothing is loaded
    pub fn track_count(&self) -> usize {
        self.engine
            .with_decoder(|decoder| decoder.track_count())
            .unwrap_or(0)
    }

    /// Selected track, 0 if nothing is loaded
    pub fn current_track(&self) -> usize {
        self.engine
            .with_decoder(|decoder| decoder.current_track())
            .unwrap_or(0)
    }

    /// Seconds into the selected track
    pub fn current_time(&self) -> f32 {
        self.engine
            .with_decoder(|decoder| decoder.current_time())
            .unwrap_or(0.0)
    }

    /// Playback state, or the error that stopped streaming (reported once)
    pub fn state(&mut self) -> Result<PlaybackState> {
        self.engine.state()
    }

    /// Run `hook` after every chunk written to the sink
    pub fn set_idle_hook(&mut self, hook: impl FnMut() + Send + 'static) {
        self.engine.set_idle_hook(Box::new(hook));
    }

    /// Locator of the loaded file
    pub fn loaded_locator(&self) -> Option<&Locator> {
        self.loaded.as_ref()
    }

    /// Rate the loaded decoder produces
    pub fn sample_rate(&self) -> u32 {
        self.engine.sample_rate()
    }

    /// Active configuration
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    fn fetch(&mut self, locator: &Locator) -> Result<Vec<u8>> {
        let source = &self.source;
        match locator {
            Locator::File(origin) => source.read_all(source.open(origin)?),
            Locator::ArchiveEntry { archive, entry } => {
                let bytes = self.archive_cache.get_or_fetch(archive, || {
                    debug!(%archive, "Fetching archive");
                    source.read_all(source.open(archive)?)
                })?;
                source.read_all(source.open_archive_entry(bytes, entry)?)
            }
        }
    }

    fn decompress(&self, data: Vec<u8>, name: &str) -> Result<Vec<u8>> {
        // Some .vgz files in the wild are stored uncompressed
        if !is_gzip(&data) {
            warn!(name, "Expected GZIP data, using body as-is");
            return Ok(data);
        }
        let stream = self.source.open_decompressed(Box::new(Cursor::new(data)))?;
        self.source.read_all(stream)
    }
}

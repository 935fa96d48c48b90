//! Playback engine
//!
//! Owns the bound decoder, the open audio sink and the streaming thread.
//!
//! The controller and the streaming thread share one running flag:
//! - `play()` sets it and spawns the thread
//! - the thread clears it when the track ends or a write fails
//! - `pause()` clears it and joins the thread before returning, so no decoder
//!   or sink call ever overlaps with the controller's own calls
//!
//! The sink is opened lazily on `play()` and survives `pause()`. It is only
//! closed by `stop()` or when a decoder with a different sample rate is bound.

mod stream;

pub use stream::IdleHook;

use crate::config::PlayerConfig;
use crate::decoder::Decoder;
use crate::sink::{volume_to_db, AudioFormat, SinkProvider};
use crate::{PlayerError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use stream::{LoopExit, LoopReport, SharedDecoder, SharedSink, StreamLoop};
use tracing::{debug, info, warn};

/// Playback state as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No sink open
    Stopped,
    /// Sink open, streaming thread idle
    Paused,
    /// Streaming thread running
    Playing,
    /// Streaming stopped because the track ended
    Finished,
}

/// Streaming driver over a boxed [`Decoder`]
pub struct PlaybackEngine {
    config: PlayerConfig,
    output: Arc<dyn SinkProvider>,
    decoder: SharedDecoder,
    sink: SharedSink,
    sample_rate: u32,
    volume: f64,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<LoopReport>>,
    idle_hook: Option<IdleHook>,
    stream_error: Option<PlayerError>,
    finished: bool,
}

impl PlaybackEngine {
    /// Create an engine with nothing bound. Sinks are opened through `output`.
    pub fn new(config: PlayerConfig, output: Arc<dyn SinkProvider>) -> Self {
        PlaybackEngine {
            sample_rate: config.sample_rate,
            config,
            output,
            decoder: Arc::new(Mutex::new(None)),
            sink: Arc::new(Mutex::new(None)),
            volume: 1.0,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            idle_hook: None,
            stream_error: None,
            finished: false,
        }
    }

    /// Replace the decoder.
    ///
    /// Pauses first. An open sink is kept when `sample_rate` matches the
    /// current rate and closed otherwise; the next `play()` reopens it.
    pub fn bind(&mut self, decoder: Box<dyn Decoder>, sample_rate: u32) -> Result<()> {
        self.pause();

        if sample_rate != self.sample_rate {
            self.close_sink()?;
        }

        *self.decoder.lock() = Some(decoder);
        self.sample_rate = sample_rate;
        self.finished = false;
        debug!(sample_rate, "Bound decoder");
        Ok(())
    }

    /// Stop playback and drop the decoder
    pub fn unbind(&mut self) -> Result<()> {
        let result = self.stop();
        *self.decoder.lock() = None;
        self.finished = false;
        result
    }

    /// True when a decoder is bound
    pub fn is_bound(&self) -> bool {
        self.decoder.lock().is_some()
    }

    /// Start (or resume) streaming. No-op while already running.
    pub fn play(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.reap();

        if !self.is_bound() {
            return Err(PlayerError::NotLoaded);
        }
        self.ensure_sink()?;

        let stream_loop = StreamLoop {
            decoder: Arc::clone(&self.decoder),
            sink: Arc::clone(&self.sink),
            running: Arc::clone(&self.running),
            idle_hook: self.idle_hook.take(),
            chunk_samples: self.config.chunk_samples,
            write_backoff: Duration::from_micros(self.config.write_backoff_micros),
            max_stall: Duration::from_millis(self.config.max_stall_millis),
        };

        self.finished = false;
        self.running.store(true, Ordering::Release);
        let spawned = std::thread::Builder::new()
            .name("gme-stream".into())
            .spawn(move || stream_loop.run());

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                debug!(sample_rate = self.sample_rate, "Streaming started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(PlayerError::Io(e))
            }
        }
    }

    /// Stop streaming and wait for the streaming thread to exit.
    ///
    /// The chunk in flight is written completely first. The sink stays open.
    pub fn pause(&mut self) {
        self.running.store(false, Ordering::Release);
        self.reap();
    }

    /// Pause and release the sink
    pub fn stop(&mut self) -> Result<()> {
        self.pause();
        self.close_sink()
    }

    /// Discard audio queued in the sink but not yet played
    pub fn flush(&mut self) -> Result<()> {
        match self.sink.lock().as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }

    /// Set the linear volume (1.0 = unity), applied at once if a sink is open
    pub fn set_volume(&mut self, volume: f64) -> Result<()> {
        if !volume.is_finite() || volume < 0.0 {
            return Err(PlayerError::Config(format!(
                "volume must be finite and non-negative, got {volume}"
            )));
        }

        self.volume = volume;
        if let Some(sink) = self.sink.lock().as_mut() {
            sink.set_gain(volume_to_db(volume))?;
        }
        Ok(())
    }

    /// Current linear volume
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Sample rate of the bound decoder
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// True while a sink is open
    pub fn has_sink(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Install a callback run after each flushed chunk.
    ///
    /// Takes effect on the next `play()` if streaming is already running.
    pub fn set_idle_hook(&mut self, hook: IdleHook) {
        self.idle_hook = Some(hook);
    }

    /// Run `f` against the bound decoder. Returns `None` when nothing is bound.
    ///
    /// Waits for the decode step in progress, if any.
    pub fn with_decoder<R>(&self, f: impl FnOnce(&mut dyn Decoder) -> R) -> Option<R> {
        let mut guard = self.decoder.lock();
        guard.as_mut().map(|decoder| f(&mut **decoder))
    }

    /// Current state. An error that ended the streaming loop is returned
    /// once, after which the state is reported normally.
    pub fn state(&mut self) -> Result<PlaybackState> {
        if self.is_running() {
            return Ok(PlaybackState::Playing);
        }
        self.reap();

        if let Some(err) = self.stream_error.take() {
            return Err(err);
        }
        if self.finished {
            return Ok(PlaybackState::Finished);
        }
        if self.has_sink() {
            Ok(PlaybackState::Paused)
        } else {
            Ok(PlaybackState::Stopped)
        }
    }

    /// Running flag set and the streaming thread still alive
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && !self.worker.as_ref().is_some_and(JoinHandle::is_finished)
    }

    fn ensure_sink(&mut self) -> Result<()> {
        let mut guard = self.sink.lock();
        if guard.is_some() {
            return Ok(());
        }

        let format = AudioFormat::pcm16_stereo(self.sample_rate);
        let buffer_bytes = self.config.sink_buffer_frames * format.frame_bytes() * 4;
        let mut sink = self.output.open(format, buffer_bytes)?;
        sink.set_gain(volume_to_db(self.volume))?;

        info!(
            sample_rate = format.sample_rate,
            buffer_bytes,
            volume = self.volume,
            "Opened audio sink"
        );
        *guard = Some(sink);
        Ok(())
    }

    fn close_sink(&mut self) -> Result<()> {
        let sink = self.sink.lock().take();
        if let Some(mut sink) = sink {
            sink.close()?;
            debug!("Closed audio sink");
        }
        Ok(())
    }

    /// Join a streaming thread that has exited or been told to exit
    fn reap(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };

        match handle.join() {
            Ok(report) => {
                if self.idle_hook.is_none() {
                    self.idle_hook = report.idle_hook;
                }
                match report.exit {
                    Ok(LoopExit::Paused) => debug!("Streaming paused"),
                    Ok(LoopExit::TrackEnded) => {
                        debug!("Track ended");
                        self.finished = true;
                    }
                    Err(e) => {
                        warn!(error = %e, "Streaming stopped on error");
                        self.stream_error = Some(e);
                    }
                }
            }
            Err(_) => {
                warn!("Streaming thread panicked");
                self.running.store(false, Ordering::Release);
                self.stream_error = Some("streaming thread panicked".into());
            }
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Failed to close audio sink on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::AudioSink;
    use std::sync::atomic::AtomicUsize;

    /// Decoder that emits `remaining` chunks of a constant sample
    struct Countdown {
        remaining: usize,
    }

    impl Decoder for Countdown {
        fn set_sample_rate(&mut self, requested: u32) -> u32 {
            requested
        }
        fn load(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }
        fn track_count(&self) -> usize {
            1
        }
        fn start_track(&mut self, _index: usize) -> Result<()> {
            Ok(())
        }
        fn set_fade(&mut self, _start_seconds: f32, _length_seconds: f32) {}
        fn current_track(&self) -> usize {
            0
        }
        fn current_time(&self) -> f32 {
            0.0
        }
        fn track_ended(&self) -> bool {
            self.remaining == 0
        }
        fn play(&mut self, out: &mut [i16]) -> usize {
            if self.remaining == 0 {
                return 0;
            }
            self.remaining -= 1;
            out.fill(7);
            out.len()
        }
    }

    /// Decoder whose first decode call panics
    struct Exploding;

    impl Decoder for Exploding {
        fn set_sample_rate(&mut self, requested: u32) -> u32 {
            requested
        }
        fn load(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }
        fn track_count(&self) -> usize {
            1
        }
        fn start_track(&mut self, _index: usize) -> Result<()> {
            Ok(())
        }
        fn set_fade(&mut self, _start_seconds: f32, _length_seconds: f32) {}
        fn current_track(&self) -> usize {
            0
        }
        fn current_time(&self) -> f32 {
            0.0
        }
        fn track_ended(&self) -> bool {
            false
        }
        fn play(&mut self, _out: &mut [i16]) -> usize {
            panic!("emulator fault");
        }
    }

    #[derive(Default)]
    struct Tally {
        opened: AtomicUsize,
        bytes: AtomicUsize,
    }

    struct TallySink {
        format: AudioFormat,
        tally: Arc<Tally>,
    }

    impl AudioSink for TallySink {
        fn format(&self) -> AudioFormat {
            self.format
        }
        fn write(&mut self, bytes: &[u8]) -> Result<usize> {
            self.tally.bytes.fetch_add(bytes.len(), Ordering::SeqCst);
            Ok(bytes.len())
        }
        fn set_gain(&mut self, _decibels: f32) -> Result<()> {
            Ok(())
        }
        fn start(&mut self) -> Result<()> {
            Ok(())
        }
        fn stop(&mut self) -> Result<()> {
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct TallyOutput(Arc<Tally>);

    impl SinkProvider for TallyOutput {
        fn open(&self, format: AudioFormat, _buffer_bytes: usize) -> Result<Box<dyn AudioSink>> {
            self.0.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(TallySink {
                format,
                tally: Arc::clone(&self.0),
            }))
        }
    }

    fn engine() -> (PlaybackEngine, Arc<Tally>) {
        let tally = Arc::new(Tally::default());
        let config = PlayerConfig::default().with_chunk_samples(64);
        let engine = PlaybackEngine::new(config, Arc::new(TallyOutput(Arc::clone(&tally))));
        (engine, tally)
    }

    fn wait_until_idle(engine: &mut PlaybackEngine) -> PlaybackState {
        for _ in 0..500 {
            let state = engine.state().unwrap();
            if state != PlaybackState::Playing {
                return state;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("streaming did not finish");
    }

    #[test]
    fn test_play_without_decoder() {
        let (mut engine, _) = engine();
        assert!(matches!(engine.play(), Err(PlayerError::NotLoaded)));
        assert_eq!(engine.state().unwrap(), PlaybackState::Stopped);
    }

    #[test]
    fn test_streams_until_track_ends() {
        let (mut engine, tally) = engine();
        engine
            .bind(Box::new(Countdown { remaining: 3 }), 44_100)
            .unwrap();
        engine.play().unwrap();

        assert_eq!(wait_until_idle(&mut engine), PlaybackState::Finished);
        assert_eq!(tally.bytes.load(Ordering::SeqCst), 3 * 64 * 2);
        assert!(engine.has_sink());
    }

    #[test]
    fn test_stop_releases_sink() {
        let (mut engine, tally) = engine();
        engine
            .bind(Box::new(Countdown { remaining: 1 }), 44_100)
            .unwrap();
        engine.play().unwrap();
        wait_until_idle(&mut engine);

        engine.stop().unwrap();
        assert!(!engine.has_sink());
        assert_eq!(engine.state().unwrap(), PlaybackState::Stopped);
        assert_eq!(tally.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decoder_panic_surfaces_as_error() {
        let (mut engine, _) = engine();
        engine.bind(Box::new(Exploding), 44_100).unwrap();
        engine.play().unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let err = loop {
            match engine.state() {
                Ok(PlaybackState::Playing) => {
                    assert!(std::time::Instant::now() < deadline, "stuck in Playing");
                    std::thread::sleep(Duration::from_millis(2));
                }
                Ok(state) => panic!("unexpected state {state:?}"),
                Err(e) => break e,
            }
        };

        assert!(matches!(err, PlayerError::Other(ref m) if m.contains("emulator fault")));
        // Reported once, then the loop reads as paused with the sink kept
        assert_eq!(engine.state().unwrap(), PlaybackState::Paused);
        assert!(engine.has_sink());
    }

    #[test]
    fn test_rejects_negative_volume() {
        let (mut engine, _) = engine();
        assert!(matches!(engine.set_volume(-1.0), Err(PlayerError::Config(_))));
        assert!(engine.set_volume(f64::NAN).is_err());
        engine.set_volume(0.5).unwrap();
        assert_eq!(engine.volume(), 0.5);
    }

    #[test]
    fn test_idle_hook_runs_per_chunk() {
        let (mut engine, _) = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        engine.set_idle_hook(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        engine
            .bind(Box::new(Countdown { remaining: 4 }), 44_100)
            .unwrap();
        engine.play().unwrap();
        wait_until_idle(&mut engine);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        // Hook is handed back after the thread exits and reused
        engine
            .bind(Box::new(Countdown { remaining: 2 }), 44_100)
            .unwrap();
        engine.play().unwrap();
        wait_until_idle(&mut engine);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }
}

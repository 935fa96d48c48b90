#![allow(dead_code)]

use gme_player::source::ByteStream;
use gme_player::{
    AudioFormat, AudioSink, ByteSource, Decoder, DecoderFactory, DecoderKind, DefaultByteSource,
    Player, PlayerConfig, PlayerError, PlaybackState, Result, SinkProvider,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct DecoderLog {
    pub created: Vec<DecoderKind>,
    pub requested_rates: Vec<u32>,
    pub loaded: Vec<Vec<u8>>,
    pub started: Vec<usize>,
    pub fades: Vec<(f32, f32)>,
    pub chunks_decoded: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct DecoderProfile {
    /// Fixed rate reported by SPC decoders (the SPC700 DSP runs at 32 kHz)
    pub spc_rate: Option<u32>,
    pub tracks: usize,
    /// Chunks per track; `None` plays forever
    pub chunks: Option<usize>,
}

impl Default for DecoderProfile {
    fn default() -> Self {
        DecoderProfile {
            spc_rate: None,
            tracks: 3,
            chunks: None,
        }
    }
}

/// Decoder that fills every chunk with its sequence number
pub struct FakeDecoder {
    log: Arc<Mutex<DecoderLog>>,
    kind: DecoderKind,
    profile: DecoderProfile,
    sample_rate: u32,
    track: usize,
    remaining: Option<usize>,
    frames: u64,
}

impl FakeDecoder {
    pub fn new(log: Arc<Mutex<DecoderLog>>, kind: DecoderKind, profile: DecoderProfile) -> Self {
        FakeDecoder {
            log,
            kind,
            profile,
            sample_rate: 0,
            track: 0,
            remaining: profile.chunks,
            frames: 0,
        }
    }
}

impl Decoder for FakeDecoder {
    fn set_sample_rate(&mut self, requested: u32) -> u32 {
        self.log.lock().requested_rates.push(requested);
        self.sample_rate = match (self.kind, self.profile.spc_rate) {
            (DecoderKind::Spc, Some(rate)) => rate,
            _ => requested,
        };
        self.sample_rate
    }

    fn load(&mut self, data: &[u8]) -> Result<()> {
        if data.starts_with(b"BAD") {
            return Err(PlayerError::Format("corrupt header".into()));
        }
        self.log.lock().loaded.push(data.to_vec());
        Ok(())
    }

    fn track_count(&self) -> usize {
        self.profile.tracks
    }

    fn start_track(&mut self, index: usize) -> Result<()> {
        self.log.lock().started.push(index);
        self.track = index;
        self.remaining = self.profile.chunks;
        self.frames = 0;
        Ok(())
    }

    fn set_fade(&mut self, start_seconds: f32, length_seconds: f32) {
        self.log.lock().fades.push((start_seconds, length_seconds));
    }

    fn current_track(&self) -> usize {
        self.track
    }

    fn current_time(&self) -> f32 {
        self.frames as f32 / self.sample_rate.max(1) as f32
    }

    fn track_ended(&self) -> bool {
        self.remaining == Some(0)
    }

    fn play(&mut self, out: &mut [i16]) -> usize {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return 0;
            }
            *remaining -= 1;
        }

        let mut log = self.log.lock();
        out.fill(log.chunks_decoded as i16);
        log.chunks_decoded += 1;
        self.frames += (out.len() / 2) as u64;
        out.len()
    }
}

pub fn fake_factory(log: &Arc<Mutex<DecoderLog>>, profile: DecoderProfile) -> DecoderFactory {
    let log = Arc::clone(log);
    DecoderFactory::new().register_all(move |kind| {
        log.lock().created.push(kind);
        Box::new(FakeDecoder::new(Arc::clone(&log), kind, profile)) as Box<dyn Decoder>
    })
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Open { sample_rate: u32, buffer_bytes: usize },
    Gain(f32),
    Start,
    Stop,
    Flush,
    Close,
    Write(WriteCall),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub offered: usize,
    pub accepted: usize,
    /// First sample of the offered bytes
    pub first_sample: Option<i16>,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Accept(usize),
    Fail,
}

#[derive(Debug, Default)]
pub struct SinkLog {
    pub events: Vec<SinkEvent>,
    /// Consumed one per write; an empty script accepts everything
    pub script: VecDeque<Reply>,
    pub write_delay: Duration,
    /// Accept nothing once the script runs out, like a device that stopped pulling
    pub stalled: bool,
}

impl SinkLog {
    pub fn writes(&self) -> Vec<WriteCall> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Write(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn opens(&self) -> Vec<(u32, usize)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Open {
                    sample_rate,
                    buffer_bytes,
                } => Some((*sample_rate, *buffer_bytes)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &SinkEvent) -> usize {
        self.events.iter().filter(|event| *event == wanted).count()
    }

    pub fn position(&self, wanted: &SinkEvent) -> Option<usize> {
        self.events.iter().position(|event| event == wanted)
    }
}

pub struct RecordingSink {
    format: AudioFormat,
    log: Arc<Mutex<SinkLog>>,
}

impl AudioSink for RecordingSink {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let delay = self.log.lock().write_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut log = self.log.lock();
        let accepted = match log.script.pop_front() {
            Some(Reply::Accept(n)) => n.min(bytes.len()),
            Some(Reply::Fail) => return Err(PlayerError::Device("device unplugged".into())),
            None if log.stalled => 0,
            None => bytes.len(),
        };
        let first_sample = self.format.decode_samples(bytes).next();
        log.events.push(SinkEvent::Write(WriteCall {
            offered: bytes.len(),
            accepted,
            first_sample,
            at: Instant::now(),
        }));
        Ok(accepted)
    }

    fn set_gain(&mut self, decibels: f32) -> Result<()> {
        self.log.lock().events.push(SinkEvent::Gain(decibels));
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.log.lock().events.push(SinkEvent::Start);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.lock().events.push(SinkEvent::Stop);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.log.lock().events.push(SinkEvent::Flush);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().events.push(SinkEvent::Close);
        Ok(())
    }
}

pub struct RecordingOutput {
    pub log: Arc<Mutex<SinkLog>>,
}

impl SinkProvider for RecordingOutput {
    fn open(&self, format: AudioFormat, buffer_bytes: usize) -> Result<Box<dyn AudioSink>> {
        self.log.lock().events.push(SinkEvent::Open {
            sample_rate: format.sample_rate,
            buffer_bytes,
        });
        Ok(Box::new(RecordingSink {
            format,
            log: Arc::clone(&self.log),
        }))
    }
}

// ---------------------------------------------------------------------------
// Byte source
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SourceCounts {
    pub local: AtomicUsize,
    pub remote: AtomicUsize,
    pub entries: AtomicUsize,
    pub decompressed: AtomicUsize,
}

impl SourceCounts {
    pub fn local(&self) -> usize {
        self.local.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }

    pub fn decompressed(&self) -> usize {
        self.decompressed.load(Ordering::SeqCst)
    }
}

/// Default source that counts calls
pub struct CountingSource {
    inner: DefaultByteSource,
    pub counts: Arc<SourceCounts>,
}

impl ByteSource for CountingSource {
    fn open_local(&self, path: &Path) -> Result<ByteStream> {
        self.counts.local.fetch_add(1, Ordering::SeqCst);
        self.inner.open_local(path)
    }

    fn open_remote(&self, url: &str) -> Result<ByteStream> {
        self.counts.remote.fetch_add(1, Ordering::SeqCst);
        self.inner.open_remote(url)
    }

    fn open_archive_entry(&self, archive: Arc<[u8]>, entry: &str) -> Result<ByteStream> {
        self.counts.entries.fetch_add(1, Ordering::SeqCst);
        self.inner.open_archive_entry(archive, entry)
    }

    fn open_decompressed(&self, stream: ByteStream) -> Result<ByteStream> {
        self.counts.decompressed.fetch_add(1, Ordering::SeqCst);
        self.inner.open_decompressed(stream)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub const CHUNK_SAMPLES: usize = 64;
pub const CHUNK_BYTES: usize = CHUNK_SAMPLES * 2;

pub struct Harness {
    pub player: Player,
    pub decoder: Arc<Mutex<DecoderLog>>,
    pub sink: Arc<Mutex<SinkLog>>,
    pub counts: Arc<SourceCounts>,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(profile: DecoderProfile) -> Self {
        Self::with_config(profile, test_config())
    }

    pub fn with_config(profile: DecoderProfile, config: PlayerConfig) -> Self {
        let decoder = Arc::new(Mutex::new(DecoderLog::default()));
        let sink = Arc::new(Mutex::new(SinkLog::default()));
        let counts = Arc::new(SourceCounts::default());
        let source = CountingSource {
            inner: DefaultByteSource::new(),
            counts: Arc::clone(&counts),
        };

        let player = Player::new(
            config,
            Arc::new(source),
            fake_factory(&decoder, profile),
            Arc::new(RecordingOutput {
                log: Arc::clone(&sink),
            }),
        )
        .expect("valid config");

        Harness {
            player,
            decoder,
            sink,
            counts,
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    /// Write `data` to a file in the fixture directory
    pub fn file(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, data).expect("write fixture");
        path
    }

    /// Write a ZIP archive with the given entries
    pub fn zip(&self, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = self.dir.path().join(name);
        let file = std::fs::File::create(&path).expect("create zip");
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (entry, data) in entries {
            writer.start_file(*entry, options).expect("start entry");
            writer.write_all(data).expect("write entry");
        }
        writer.finish().expect("finish zip");
        path
    }

    /// Poll until the player leaves `Playing`
    pub fn wait_idle(&mut self) -> Result<PlaybackState> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let state = self.player.state()?;
            if state != PlaybackState::Playing {
                return Ok(state);
            }
            assert!(Instant::now() < deadline, "streaming did not stop");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Poll until at least `count` writes were recorded
    pub fn wait_writes(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.sink.lock().writes().len() < count {
            assert!(Instant::now() < deadline, "sink never saw {count} writes");
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

pub fn test_config() -> PlayerConfig {
    PlayerConfig {
        chunk_samples: CHUNK_SAMPLES,
        sink_buffer_frames: 256,
        write_backoff_micros: 10,
        max_stall_millis: 200,
        ..PlayerConfig::default()
    }
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).expect("gzip");
    encoder.finish().expect("gzip finish")
}

//! System audio output using rodio
//!
//! Samples written to a [`RodioSink`] land in a [`RingBuffer`] that a rodio
//! source drains on the device thread. rodio's `OutputStream` cannot leave
//! the thread that created it, so each sink keeps a small keep-alive thread
//! that owns the stream until the sink is closed.

use super::{db_to_amplitude, AudioFormat, AudioSink, RingBuffer, SinkProvider};
use crate::{PlayerError, Result};
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long `write` waits for room in the ring before reporting a short write
const WRITE_WAIT: Duration = Duration::from_millis(50);

/// Poll interval while the ring is full
const WRITE_POLL: Duration = Duration::from_micros(500);

/// Samples pulled from the ring per lock
const SOURCE_BATCH: usize = 1024;

/// Names of the output devices on the default host
pub fn output_device_names() -> Result<Vec<String>> {
    let host = rodio::cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| PlayerError::Device(format!("Failed to enumerate output devices: {e}")))?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

/// Opens [`RodioSink`]s on the default or a named output device
#[derive(Debug, Clone, Default)]
pub struct RodioOutput {
    device_name: Option<String>,
}

impl RodioOutput {
    /// Use the system default output device
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the output device with this exact name
    pub fn with_device(name: impl Into<String>) -> Self {
        RodioOutput {
            device_name: Some(name.into()),
        }
    }
}

impl SinkProvider for RodioOutput {
    fn open(&self, format: AudioFormat, buffer_bytes: usize) -> Result<Box<dyn AudioSink>> {
        let sink = RodioSink::open(self.device_name.clone(), format, buffer_bytes)?;
        Ok(Box::new(sink))
    }
}

/// rodio source draining the ring buffer
struct RingSource {
    ring: Arc<RingBuffer<i16>>,
    format: AudioFormat,
    finished: Arc<AtomicBool>,
    batch: Vec<i16>,
    batch_pos: usize,
}

impl Source for RingSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.format.channels
    }

    fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for RingSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.finished.load(Ordering::Acquire) {
            return None;
        }

        if self.batch_pos >= self.batch.len() {
            let read = self.ring.read(&mut self.batch);
            // Underrun: play silence to keep the stream alive
            self.batch[read..].fill(0);
            self.batch_pos = 0;
        }

        let sample = self.batch[self.batch_pos];
        self.batch_pos += 1;
        Some(sample)
    }
}

/// Owns the rodio `OutputStream` on its own thread
struct StreamKeeper {
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Audio sink playing through rodio
pub struct RodioSink {
    format: AudioFormat,
    ring: Arc<RingBuffer<i16>>,
    sink: Sink,
    finished: Arc<AtomicBool>,
    keeper: Option<StreamKeeper>,
    scratch: Vec<i16>,
}

impl RodioSink {
    /// Open the device and attach a paused source
    pub fn open(
        device_name: Option<String>,
        format: AudioFormat,
        buffer_bytes: usize,
    ) -> Result<Self> {
        if format.bits_per_sample != 16 {
            return Err(PlayerError::Device(format!(
                "Unsupported sample size: {} bits",
                format.bits_per_sample
            )));
        }

        let ring = Arc::new(RingBuffer::new(buffer_bytes / format.sample_bytes())?);
        let finished = Arc::new(AtomicBool::new(false));

        let (ready_tx, ready_rx) = mpsc::channel::<Result<Sink>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("gme-output".into())
            .spawn(move || {
                let (stream, stream_handle) = match open_stream(device_name.as_deref()) {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let sink = Sink::try_new(&stream_handle)
                    .map_err(|e| PlayerError::Device(format!("Failed to create audio sink: {e}")));
                if ready_tx.send(sink).is_err() {
                    return;
                }
                // Keep the stream alive until the sink is closed or dropped
                let _ = shutdown_rx.recv();
                drop(stream);
            })?;

        let sink = ready_rx
            .recv()
            .map_err(|_| PlayerError::Device("Audio output thread exited during setup".into()))
            .and_then(|sink| sink);
        let sink = match sink {
            Ok(sink) => sink,
            Err(e) => {
                let _ = handle.join();
                return Err(e);
            }
        };

        sink.pause();
        sink.append(RingSource {
            ring: Arc::clone(&ring),
            format,
            finished: Arc::clone(&finished),
            batch: vec![0; SOURCE_BATCH],
            batch_pos: SOURCE_BATCH,
        });

        debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            ring_samples = ring.capacity(),
            "Opened rodio output"
        );

        Ok(RodioSink {
            format,
            ring,
            sink,
            finished,
            keeper: Some(StreamKeeper {
                shutdown: shutdown_tx,
                handle,
            }),
            scratch: Vec::new(),
        })
    }

    /// Fill level of the internal ring (0.0 to 1.0)
    pub fn fill_percentage(&self) -> f32 {
        self.ring.fill_percentage()
    }
}

fn open_stream(device_name: Option<&str>) -> Result<(OutputStream, OutputStreamHandle)> {
    match device_name {
        None => OutputStream::try_default()
            .map_err(|e| PlayerError::Device(format!("Failed to create audio stream: {e}"))),
        Some(name) => {
            let host = rodio::cpal::default_host();
            let device = host
                .output_devices()
                .map_err(|e| PlayerError::Device(format!("Failed to enumerate devices: {e}")))?
                .find(|device| device.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| PlayerError::Device(format!("No output device named '{name}'")))?;
            OutputStream::try_from_device(&device)
                .map_err(|e| PlayerError::Device(format!("Failed to open '{name}': {e}")))
        }
    }
}

impl AudioSink for RodioSink {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if self.keeper.is_none() {
            return Err(PlayerError::Device("write to closed audio sink".into()));
        }

        self.scratch.clear();
        self.scratch.extend(self.format.decode_samples(bytes));

        let deadline = Instant::now() + WRITE_WAIT;
        loop {
            let written = self.ring.write(&self.scratch);
            if written > 0 || Instant::now() >= deadline {
                return Ok(written * self.format.sample_bytes());
            }
            std::thread::sleep(WRITE_POLL);
        }
    }

    fn set_gain(&mut self, decibels: f32) -> Result<()> {
        self.sink.set_volume(db_to_amplitude(decibels));
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.sink.play();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.sink.pause();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.ring.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(keeper) = self.keeper.take() else {
            return Ok(());
        };
        self.finished.store(true, Ordering::Release);
        self.sink.stop();

        let _ = keeper.shutdown.send(());
        if keeper.handle.join().is_err() {
            warn!("Audio output thread panicked during shutdown");
        }
        debug!("Closed rodio output");
        Ok(())
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

//! Streaming loop
//!
//! Runs on a dedicated thread: decode one chunk, push it to the sink until
//! every byte is accepted, run the idle hook, repeat. The running flag is
//! checked between chunks only, so a pause takes effect after the current
//! chunk has been fully written.

use crate::decoder::Decoder;
use crate::sink::AudioSink;
use crate::{PlayerError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Callback run after each chunk has been flushed to the sink
pub type IdleHook = Box<dyn FnMut() + Send>;

pub(crate) type SharedDecoder = Arc<Mutex<Option<Box<dyn Decoder>>>>;
pub(crate) type SharedSink = Arc<Mutex<Option<Box<dyn AudioSink>>>>;

/// Why the loop returned normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopExit {
    /// Running flag was cleared
    Paused,
    /// Decoder reported the end of the track
    TrackEnded,
}

/// Handed back to the engine when the thread is joined
pub(crate) struct LoopReport {
    pub idle_hook: Option<IdleHook>,
    pub exit: Result<LoopExit>,
}

pub(crate) struct StreamLoop {
    pub decoder: SharedDecoder,
    pub sink: SharedSink,
    pub running: Arc<AtomicBool>,
    pub idle_hook: Option<IdleHook>,
    pub chunk_samples: usize,
    pub write_backoff: Duration,
    pub max_stall: Duration,
}

impl StreamLoop {
    /// Thread body. Always leaves the running flag cleared and the sink stopped,
    /// including when the decoder panics.
    pub fn run(mut self) -> LoopReport {
        let exit = panic::catch_unwind(AssertUnwindSafe(|| self.stream()))
            .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())));

        self.running.store(false, Ordering::Release);
        if let Some(sink) = self.sink.lock().as_mut() {
            if let Err(e) = sink.stop() {
                warn!(error = %e, "Failed to stop audio sink after streaming");
            }
        }

        LoopReport {
            idle_hook: self.idle_hook.take(),
            exit,
        }
    }

    fn stream(&mut self) -> Result<LoopExit> {
        let format = self.with_sink(|sink| Ok(sink.format()))?;
        self.with_sink(|sink| sink.start())?;

        let mut pcm = vec![0i16; self.chunk_samples];
        let mut chunk = Vec::with_capacity(self.chunk_samples * format.sample_bytes());

        while self.running.load(Ordering::Acquire) {
            let produced = {
                let mut guard = self.decoder.lock();
                let decoder = guard.as_mut().ok_or(PlayerError::NotLoaded)?;
                if decoder.track_ended() {
                    return Ok(LoopExit::TrackEnded);
                }
                decoder.play(&mut pcm).min(pcm.len())
            };
            if produced == 0 {
                return Ok(LoopExit::TrackEnded);
            }

            chunk.clear();
            format.encode_samples(&pcm[..produced], &mut chunk);
            self.flush_chunk(&chunk)?;

            if let Some(hook) = self.idle_hook.as_mut() {
                hook();
            }
        }

        Ok(LoopExit::Paused)
    }

    /// Write `chunk` completely, offering only the unwritten tail each time.
    ///
    /// A sink that keeps accepting nothing for `max_stall` of wall time fails
    /// the chunk, however long each individual write blocks.
    fn flush_chunk(&self, chunk: &[u8]) -> Result<()> {
        let mut offset = 0;
        let mut stalled_since: Option<Instant> = None;

        while offset < chunk.len() {
            let written = self.with_sink(|sink| sink.write(&chunk[offset..]))?;
            if written == 0 {
                let since = *stalled_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= self.max_stall {
                    return Err(PlayerError::Device(format!(
                        "audio sink accepted no data for {} ms",
                        self.max_stall.as_millis()
                    )));
                }
                std::thread::sleep(self.write_backoff);
                continue;
            }

            stalled_since = None;
            offset += written.min(chunk.len() - offset);
            if offset < chunk.len() {
                trace!(offset, remaining = chunk.len() - offset, "Partial sink write");
            }
        }
        Ok(())
    }

    /// Lock the sink for one call. The lock is never held across calls so
    /// the controller can adjust gain between partial writes.
    fn with_sink<R>(&self, f: impl FnOnce(&mut dyn AudioSink) -> Result<R>) -> Result<R> {
        let mut guard = self.sink.lock();
        let sink = guard
            .as_mut()
            .ok_or_else(|| PlayerError::Device("audio sink is not open".into()))?;
        f(&mut **sink)
    }
}

fn panic_error(payload: &(dyn std::any::Any + Send)) -> PlayerError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match message {
        Some(message) => format!("streaming thread panicked: {message}").into(),
        None => "streaming thread panicked".into(),
    }
}

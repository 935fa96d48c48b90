//! Ring buffer between the streaming thread and an audio callback
//!
//! One producer (the sink's `write`) and one consumer (the device callback).
//! Storage is fixed at construction, so memory stays bounded no matter how
//! long a track plays. Positions are atomics so either side can query fill
//! level without taking the storage lock.

use crate::{PlayerError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Largest ring accepted, in bytes of storage
const MAX_RING_BYTES: usize = 64 * 1024 * 1024;

/// Fixed-capacity single-producer single-consumer sample queue
#[derive(Debug)]
pub struct RingBuffer<T> {
    storage: Mutex<Vec<T>>,
    /// Total samples ever written
    write_pos: AtomicUsize,
    /// Total samples ever read
    read_pos: AtomicUsize,
    /// Power of two, so `pos & mask == pos % capacity`
    capacity: usize,
    mask: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a ring holding at least `requested` samples.
    ///
    /// Capacity is rounded up to a power of two. One slot is kept free to tell
    /// full from empty, so usable space is `capacity - 1`.
    pub fn new(requested: usize) -> Result<Self> {
        if requested == 0 {
            return Err(PlayerError::Config(
                "Ring buffer capacity must be greater than 0".into(),
            ));
        }

        let capacity = requested.next_power_of_two();
        let max_capacity = MAX_RING_BYTES / std::mem::size_of::<T>().max(1);
        if capacity > max_capacity {
            return Err(PlayerError::Config(format!(
                "Ring buffer capacity {capacity} exceeds maximum {max_capacity}"
            )));
        }

        Ok(RingBuffer {
            storage: Mutex::new(vec![T::default(); capacity]),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            capacity,
            mask: capacity - 1,
        })
    }

    /// Total slots (one of which always stays free)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples waiting to be read
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Samples that can be written without overwriting unread data
    pub fn available_write(&self) -> usize {
        self.capacity - 1 - self.available_read()
    }

    /// Copy as many samples as fit. Returns the number written.
    pub fn write(&self, samples: &[T]) -> usize {
        let mut storage = self.storage.lock();

        // Space is computed under the lock so a concurrent clear() can't race it
        let write_pos = self.write_pos.load(Ordering::Acquire);
        let to_write = samples.len().min(self.available_write());
        if to_write == 0 {
            return 0;
        }

        let start = write_pos & self.mask;
        let first = to_write.min(self.capacity - start);
        storage[start..start + first].copy_from_slice(&samples[..first]);
        storage[..to_write - first].copy_from_slice(&samples[first..to_write]);
        drop(storage);

        self.write_pos
            .store(write_pos.wrapping_add(to_write), Ordering::Release);
        to_write
    }

    /// Copy up to `dest.len()` samples out. Returns the number read.
    pub fn read(&self, dest: &mut [T]) -> usize {
        let storage = self.storage.lock();

        let read_pos = self.read_pos.load(Ordering::Acquire);
        let to_read = dest.len().min(self.available_read());
        if to_read == 0 {
            return 0;
        }

        let start = read_pos & self.mask;
        let first = to_read.min(self.capacity - start);
        dest[..first].copy_from_slice(&storage[start..start + first]);
        dest[first..to_read].copy_from_slice(&storage[..to_read - first]);
        drop(storage);

        self.read_pos
            .store(read_pos.wrapping_add(to_read), Ordering::Release);
        to_read
    }

    /// Discard everything not yet read
    pub fn clear(&self) {
        let _storage = self.storage.lock();
        let write_pos = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write_pos, Ordering::Release);
    }

    /// True when nothing is waiting to be read
    pub fn is_empty(&self) -> bool {
        self.available_read() == 0
    }

    /// Fill level (0.0 to 1.0)
    pub fn fill_percentage(&self) -> f32 {
        self.available_read() as f32 / self.capacity as f32
    }
}

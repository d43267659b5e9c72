//! Bounded pixel update queue
//!
//! Single-producer (network loop) / single-consumer (render loop) FIFO of
//! individual cell writes. Storage is a fixed `QUEUE_SLOTS` channel; the
//! usable capacity is set per session by [`PixelQueue::open`] and is zero
//! while the queue is closed, so nothing can be enqueued outside a session.
//!
//! Enqueue never blocks. When the queue is full the update is dropped and
//! counted.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_timeout, Duration};
use heapless::Vec;
use livepixel_protocol::PixelUpdate;
use portable_atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::session::SessionError;

/// Backing storage slots (maximum configurable capacity)
pub const QUEUE_SLOTS: usize = 4096;

/// Bounded FIFO of pixel updates
pub struct PixelQueue<M: RawMutex, const N: usize = QUEUE_SLOTS> {
    channel: Channel<M, PixelUpdate, N>,
    /// Usable capacity; 0 when closed
    limit: AtomicUsize,
    dropped: AtomicU32,
}

impl<M: RawMutex, const N: usize> Default for PixelQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, const N: usize> PixelQueue<M, N> {
    /// Create a closed queue
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            limit: AtomicUsize::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Start a session with `capacity` usable slots
    ///
    /// Discards anything left from a previous session and resets the drop
    /// counter.
    pub fn open(&self, capacity: usize) -> Result<(), SessionError> {
        if capacity == 0 || capacity > N {
            return Err(SessionError::QueueUnavailable);
        }

        self.channel.clear();
        self.dropped.store(0, Ordering::Relaxed);
        self.limit.store(capacity, Ordering::Release);
        Ok(())
    }

    /// Stop accepting updates and discard pending ones
    pub fn close(&self) {
        self.limit.store(0, Ordering::Release);
        self.channel.clear();
    }

    pub fn is_open(&self) -> bool {
        self.limit.load(Ordering::Acquire) > 0
    }

    /// Usable capacity of the current session (0 when closed)
    pub fn capacity(&self) -> usize {
        self.limit.load(Ordering::Acquire)
    }

    /// Number of pending updates
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Updates dropped because the queue was full or closed
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Enqueue without waiting
    ///
    /// Returns false (and counts a drop) if the queue is full or closed.
    pub fn try_enqueue(&self, update: PixelUpdate) -> bool {
        if self.channel.len() >= self.capacity() || self.channel.try_send(update).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Take up to `max` pending updates without waiting
    ///
    /// Never returns more than the batch capacity `B`.
    pub fn try_dequeue_batch<const B: usize>(&self, max: usize) -> Vec<PixelUpdate, B> {
        let mut batch = Vec::new();
        let max = max.min(B);

        while batch.len() < max {
            match self.channel.try_receive() {
                Ok(update) => {
                    // Cannot fail, len < max <= B
                    let _ = batch.push(update);
                }
                Err(_) => break,
            }
        }

        batch
    }

    /// Wait up to `timeout` for one update
    pub async fn dequeue_timeout(&self, timeout: Duration) -> Option<PixelUpdate> {
        with_timeout(timeout, self.channel.receive()).await.ok()
    }
}

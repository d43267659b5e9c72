//! Pipeline counters

use portable_atomic::{AtomicU32, Ordering};

/// Counters updated by both loops, read at session stop
#[derive(Debug, Default)]
pub struct PipelineStats {
    messages: AtomicU32,
    enqueued: AtomicU32,
    dropped: AtomicU32,
    out_of_bounds: AtomicU32,
    malformed: AtomicU32,
    direct_draws: AtomicU32,
    full_frames: AtomicU32,
    truncated: AtomicU32,
    rendered: AtomicU32,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsSnapshot {
    /// Text messages received
    pub messages: u32,
    /// Updates accepted by the queue
    pub enqueued: u32,
    /// Updates dropped because the queue was full
    pub dropped: u32,
    /// Triples outside the canvas
    pub out_of_bounds: u32,
    /// Unparseable messages and triples
    pub malformed: u32,
    /// Batches drawn by the network loop, bypassing the queue
    pub direct_draws: u32,
    /// `full,` frames drawn
    pub full_frames: u32,
    /// Batches cut at capacity
    pub truncated: u32,
    /// Updates drawn by the render loop
    pub rendered: u32,
}

fn add(counter: &AtomicU32, n: u32) {
    if n > 0 {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

impl PipelineStats {
    pub const fn new() -> Self {
        Self {
            messages: AtomicU32::new(0),
            enqueued: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            out_of_bounds: AtomicU32::new(0),
            malformed: AtomicU32::new(0),
            direct_draws: AtomicU32::new(0),
            full_frames: AtomicU32::new(0),
            truncated: AtomicU32::new(0),
            rendered: AtomicU32::new(0),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.messages,
            &self.enqueued,
            &self.dropped,
            &self.out_of_bounds,
            &self.malformed,
            &self.direct_draws,
            &self.full_frames,
            &self.truncated,
            &self.rendered,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn record_message(&self) {
        add(&self.messages, 1);
    }

    pub fn record_enqueued(&self, accepted: u32, dropped: u32) {
        add(&self.enqueued, accepted);
        add(&self.dropped, dropped);
    }

    pub fn record_rejected(&self, out_of_bounds: u32, malformed: u32) {
        add(&self.out_of_bounds, out_of_bounds);
        add(&self.malformed, malformed);
    }

    pub fn record_direct_draw(&self) {
        add(&self.direct_draws, 1);
    }

    pub fn record_full_frame(&self) {
        add(&self.full_frames, 1);
    }

    pub fn record_truncated(&self) {
        add(&self.truncated, 1);
    }

    pub fn record_rendered(&self, updates: u32) {
        add(&self.rendered, updates);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            out_of_bounds: self.out_of_bounds.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            direct_draws: self.direct_draws.load(Ordering::Relaxed),
            full_frames: self.full_frames.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            rendered: self.rendered.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_reset() {
        let stats = PipelineStats::new();
        stats.record_message();
        stats.record_enqueued(3, 1);
        stats.record_rejected(2, 0);
        stats.record_direct_draw();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages, 1);
        assert_eq!(snapshot.enqueued, 3);
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.out_of_bounds, 2);
        assert_eq!(snapshot.direct_draws, 1);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}

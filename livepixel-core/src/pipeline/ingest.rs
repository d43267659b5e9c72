//! Message dispatch on the network side

use embassy_sync::blocking_mutex::raw::RawMutex;
use livepixel_protocol::{Batch, Message, MessageParser, ParseError, PixelUpdate};

use super::stats::PipelineStats;
use crate::queue::PixelQueue;
use crate::render::Canvas;
use crate::traits::PixelDisplay;

/// What happened to one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Applied {
    /// Updates handed to the render loop
    Queued { accepted: u16, dropped: u16 },
    /// Batch drawn immediately, bypassing the queue
    Drawn { pixels: u16 },
    /// Whole canvas replaced
    FullFrame,
    /// Canvas reset to background
    Cleared,
    /// Recognized but not acted on (`batch;`)
    Ignored,
    /// Dropped
    Rejected(ParseError),
}

/// Parses messages and routes them to the queue or the canvas
pub struct Ingest<'a, M: RawMutex, D, const Q: usize> {
    parser: MessageParser,
    queue: &'a PixelQueue<M, Q>,
    canvas: Canvas<'a, M, D>,
    stats: &'a PipelineStats,
    direct_draw_threshold: usize,
}

impl<'a, M: RawMutex, D: PixelDisplay, const Q: usize> Ingest<'a, M, D, Q> {
    /// Batches with more than `direct_draw_threshold` pixels are drawn
    /// directly instead of queued
    pub fn new(
        queue: &'a PixelQueue<M, Q>,
        canvas: Canvas<'a, M, D>,
        stats: &'a PipelineStats,
        direct_draw_threshold: usize,
    ) -> Self {
        Self {
            parser: MessageParser::new(canvas.geometry().dim()),
            queue,
            canvas,
            stats,
            direct_draw_threshold,
        }
    }

    /// Handle one text message
    pub async fn apply(&self, text: &str) -> Applied {
        self.stats.record_message();

        let message = match self.parser.parse(text) {
            Ok(message) => message,
            Err(e) => {
                match e {
                    ParseError::OutOfBounds => self.stats.record_rejected(1, 0),
                    _ => self.stats.record_rejected(0, 1),
                }
                debug!("dropped message: {}", e);
                return Applied::Rejected(e);
            }
        };

        match message {
            Message::FullFrame(frame) => {
                if frame.provided() < frame.dim().area() {
                    debug!(
                        "short frame: {} of {} cells",
                        frame.provided(),
                        frame.dim().area()
                    );
                }
                if let Err(e) = self.canvas.draw_full_frame(&frame).await {
                    warn!("full frame draw failed: {}", e);
                }
                self.stats.record_full_frame();
                Applied::FullFrame
            }
            Message::Chunk {
                index,
                total,
                declared,
                pixels,
            } => {
                trace!("chunk {}/{}", index + 1, total);
                self.check_declared(declared, &pixels);
                self.apply_batch(&pixels).await
            }
            Message::Compressed { declared, pixels } => {
                self.check_declared(declared, &pixels);
                self.apply_batch(&pixels).await
            }
            Message::Clear => {
                if let Err(e) = self.canvas.clear().await {
                    warn!("canvas clear failed: {}", e);
                }
                Applied::Cleared
            }
            Message::LegacyBatch => Applied::Ignored,
            Message::Pixel(update) => self.enqueue(&[update]),
        }
    }

    /// The announced count is advisory; a mismatch is only logged
    fn check_declared(&self, declared: u16, batch: &Batch) {
        let seen = batch.len() as u16
            + batch.malformed()
            + batch.out_of_bounds()
            + batch.overflow();
        if seen != declared {
            debug!("batch announced {} pixels, carried {}", declared, seen);
        }
    }

    async fn apply_batch(&self, batch: &Batch) -> Applied {
        self.stats
            .record_rejected(batch.out_of_bounds() as u32, batch.malformed() as u32);

        if batch.overflow() > 0 {
            self.stats.record_truncated();
            warn!(
                "batch truncated at {} pixels, {} dropped",
                batch.capacity(),
                batch.overflow()
            );
        }

        if batch.len() > self.direct_draw_threshold {
            if let Err(e) = self.canvas.draw_updates(batch.as_slice()).await {
                warn!("direct draw failed: {}", e);
            }
            self.stats.record_direct_draw();
            return Applied::Drawn {
                pixels: batch.len() as u16,
            };
        }

        self.enqueue(batch.as_slice())
    }

    fn enqueue(&self, updates: &[PixelUpdate]) -> Applied {
        let mut accepted = 0u16;
        let mut dropped = 0u16;

        for &update in updates {
            if self.queue.try_enqueue(update) {
                accepted += 1;
            } else {
                dropped += 1;
            }
        }

        self.stats.record_enqueued(accepted as u32, dropped as u32);
        if dropped > 0 {
            warn!(
                "queue full, dropped {} updates ({} total)",
                dropped,
                self.queue.dropped()
            );
        }

        Applied::Queued { accepted, dropped }
    }
}

//! Render loop: drain the queue, coalesce, draw

use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant};
use heapless::Vec;
use livepixel_protocol::PixelUpdate;

use crate::render::Canvas;
use crate::session::SessionShared;
use crate::traits::{DisplayError, PixelDisplay};

/// Largest number of updates drained per pass
pub const MAX_RENDER_BATCH: usize = 64;

/// How long to wait for a single update when the queue is empty
pub const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Consumer side of the pipeline
pub struct RenderLoop<'a, M: RawMutex, D, const Q: usize> {
    shared: &'a SessionShared<M, Q>,
    canvas: Canvas<'a, M, D>,
    batch_size: usize,
    yield_interval: Duration,
}

impl<'a, M: RawMutex, D: PixelDisplay, const Q: usize> RenderLoop<'a, M, D, Q> {
    pub fn new(
        shared: &'a SessionShared<M, Q>,
        canvas: Canvas<'a, M, D>,
        batch_size: usize,
        yield_interval: Duration,
    ) -> Self {
        Self {
            shared,
            canvas,
            batch_size: batch_size.clamp(1, MAX_RENDER_BATCH),
            yield_interval,
        }
    }

    /// One drain pass
    ///
    /// Draws whatever is pending (up to the batch size). If nothing is,
    /// waits up to [`IDLE_WAIT`] for one update and draws it. Returns the
    /// number of updates drawn.
    pub async fn drain_once(&self) -> Result<usize, DisplayError> {
        let queue = &self.shared.queue;
        let batch: Vec<PixelUpdate, MAX_RENDER_BATCH> = queue.try_dequeue_batch(self.batch_size);

        let drawn = if !batch.is_empty() {
            self.canvas.draw_updates(&batch).await?;
            batch.len()
        } else if let Some(update) = queue.dequeue_timeout(IDLE_WAIT).await {
            self.canvas.draw_updates(&[update]).await?;
            1
        } else {
            0
        };

        self.shared.stats.record_rendered(drawn as u32);
        Ok(drawn)
    }

    /// Run until the session is cancelled
    pub async fn run(self) {
        info!("render loop started");
        let mut last_yield = Instant::now();

        while !self.shared.is_cancelled() {
            if let Err(e) = self.drain_once().await {
                warn!("render draw failed: {}", e);
            }

            // Busy draining never awaits; give other tasks a turn
            if last_yield.elapsed() >= self.yield_interval {
                yield_now().await;
                last_yield = Instant::now();
            }
        }

        info!("render loop stopped");
        self.shared.render_exited();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::CanvasGeometry;
    use crate::traits::display::mock::RecordingDisplay;
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::mutex::Mutex;
    use livepixel_protocol::{CanvasDim, Color565};

    type Cs = CriticalSectionRawMutex;

    fn render_loop<'a>(
        shared: &'a SessionShared<Cs, 256>,
        display: &'a Mutex<Cs, RecordingDisplay>,
        batch_size: usize,
    ) -> RenderLoop<'a, Cs, RecordingDisplay, 256> {
        let canvas = Canvas::new(
            display,
            CanvasGeometry::new(CanvasDim::D32, 128),
            Color565::WHITE,
        );
        RenderLoop::new(shared, canvas, batch_size, Duration::from_millis(50))
    }

    #[test]
    fn test_drain_coalesces_pending_updates() {
        let shared: SessionShared<Cs, 256> = SessionShared::new();
        let display = Mutex::new(RecordingDisplay::new());
        shared.queue.open(64).unwrap();
        for x in 0..3 {
            shared.queue.try_enqueue(PixelUpdate::new(x, 0, Color565::RED));
        }

        let drawn = block_on(render_loop(&shared, &display, 32).drain_once()).unwrap();

        assert_eq!(drawn, 3);
        let guard = block_on(display.lock());
        assert_eq!(guard.rects.len(), 1);
        assert_eq!(guard.rects[0].width, 12);
    }

    #[test]
    fn test_drain_respects_batch_size() {
        let shared: SessionShared<Cs, 256> = SessionShared::new();
        let display = Mutex::new(RecordingDisplay::new());
        shared.queue.open(64).unwrap();
        for x in 0..10 {
            shared.queue.try_enqueue(PixelUpdate::new(x, 3, Color565::BLUE));
        }

        let render = render_loop(&shared, &display, 4);
        assert_eq!(block_on(render.drain_once()), Ok(4));
        assert_eq!(shared.queue.len(), 6);
        assert_eq!(block_on(render.drain_once()), Ok(4));
        assert_eq!(block_on(render.drain_once()), Ok(2));
        assert_eq!(shared.stats.snapshot().rendered, 10);
    }

    #[test]
    fn test_idle_drain_times_out() {
        let shared: SessionShared<Cs, 256> = SessionShared::new();
        let display = Mutex::new(RecordingDisplay::new());
        shared.queue.open(64).unwrap();

        assert_eq!(block_on(render_loop(&shared, &display, 32).drain_once()), Ok(0));
        assert!(block_on(display.lock()).rects.is_empty());
    }

    #[test]
    fn test_run_exits_when_cancelled() {
        let shared: SessionShared<Cs, 256> = SessionShared::new();
        let display = Mutex::new(RecordingDisplay::new());
        shared.queue.open(64).unwrap();
        shared.queue.try_enqueue(PixelUpdate::new(1, 1, Color565::GREEN));
        shared.cancel();

        block_on(render_loop(&shared, &display, 32).run());
        assert!(shared.render_done_signaled());
    }

    #[test]
    fn test_run_yields_while_queue_stays_full() {
        let shared: SessionShared<Cs, 256> = SessionShared::new();
        let mut slow = RecordingDisplay::new();
        slow.draw_delay = Some(std::time::Duration::from_micros(200));
        let display = Mutex::new(slow);
        shared.queue.open(256).unwrap();

        let canvas = Canvas::new(
            &display,
            CanvasGeometry::new(CanvasDim::D32, 128),
            Color565::WHITE,
        );
        let render = RenderLoop::new(&shared, canvas, MAX_RENDER_BATCH, Duration::from_millis(2));

        // Refills the queue every time it gets a turn, so the render loop
        // never runs dry and only gives up the executor by yielding
        let feeder = async {
            let mut turns = 0;
            let mut shortest_queue = usize::MAX;
            let mut longest_gap = Duration::from_ticks(0);
            let mut last = Instant::now();

            while turns < 8 {
                for i in 0..256u16 {
                    let color = if i % 2 == 0 { Color565::RED } else { Color565::BLUE };
                    let update = PixelUpdate::new((i % 32) as u8, (i / 32) as u8, color);
                    if !shared.queue.try_enqueue(update) {
                        break;
                    }
                }
                yield_now().await;

                let now = Instant::now();
                longest_gap = longest_gap.max(now - last);
                last = now;
                shortest_queue = shortest_queue.min(shared.queue.len());
                turns += 1;
            }

            shared.cancel();
            (shortest_queue, longest_gap)
        };

        let ((shortest_queue, longest_gap), ()) = block_on(join(feeder, render.run()));

        assert!(shortest_queue > 0);
        // One 64-update pass at 200 us per draw, plus slack
        assert!(longest_gap < Duration::from_millis(100));
        assert!(shared.stats.snapshot().rendered >= 8 * MAX_RENDER_BATCH as u32);
        assert!(shared.render_done_signaled());
    }
}

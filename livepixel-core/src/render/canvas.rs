//! Logical canvas mapped onto the physical display

use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use livepixel_protocol::{CanvasDim, Color565, FullFrame, PixelUpdate};

use super::coalesce::{Coalescer, Run};
use crate::traits::{DisplayError, PixelDisplay};

/// Placement of the canvas on the panel
///
/// The canvas is a square at the panel origin. Each cell is `cell_px`
/// physical pixels wide and tall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanvasGeometry {
    dim: CanvasDim,
    cell_px: u16,
}

impl CanvasGeometry {
    /// Fit a `dim` canvas into a `size_px` square (at least 1 px per cell)
    pub const fn new(dim: CanvasDim, size_px: u16) -> Self {
        let cell_px = size_px / dim.cells();
        Self {
            dim,
            cell_px: if cell_px == 0 { 1 } else { cell_px },
        }
    }

    pub const fn dim(&self) -> CanvasDim {
        self.dim
    }

    /// Physical pixels per cell side
    pub const fn cell_px(&self) -> u16 {
        self.cell_px
    }

    /// Physical side length actually covered by cells
    pub const fn size_px(&self) -> u16 {
        self.cell_px * self.dim.cells()
    }

    /// Physical rectangle `(x, y, width, height)` covered by a run
    pub fn run_rect(&self, run: &Run) -> (u16, u16, u16, u16) {
        (
            run.x as u16 * self.cell_px,
            run.y as u16 * self.cell_px,
            run.width as u16 * self.cell_px,
            self.cell_px,
        )
    }
}

/// Drawing handle shared by the network and render loops
///
/// Every draw takes the display lock for the duration of one call, so the
/// two loops never interleave inside a batch.
pub struct Canvas<'a, M: RawMutex, D> {
    display: &'a Mutex<M, D>,
    geometry: CanvasGeometry,
    background: Color565,
}

impl<M: RawMutex, D> Clone for Canvas<'_, M, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex, D> Copy for Canvas<'_, M, D> {}

impl<'a, M: RawMutex, D: PixelDisplay> Canvas<'a, M, D> {
    pub const fn new(
        display: &'a Mutex<M, D>,
        geometry: CanvasGeometry,
        background: Color565,
    ) -> Self {
        Self {
            display,
            geometry,
            background,
        }
    }

    pub const fn geometry(&self) -> CanvasGeometry {
        self.geometry
    }

    pub const fn background(&self) -> Color565 {
        self.background
    }

    /// Fill the canvas area with the background color
    pub async fn clear(&self) -> Result<(), DisplayError> {
        let size = self.geometry.size_px();
        let mut display = self.display.lock().await;
        display.fill_rect(0, 0, size, size, self.background)
    }

    /// Draw updates in order, merging horizontal runs
    ///
    /// Returns the number of `fill_rect` calls issued.
    pub async fn draw_updates(&self, updates: &[PixelUpdate]) -> Result<usize, DisplayError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut display = self.display.lock().await;
        let mut coalescer = Coalescer::new();
        let mut draws = 0;

        for &update in updates {
            if let Some(run) = coalescer.push(update) {
                self.fill_run(&mut *display, &run)?;
                draws += 1;
            }
        }
        if let Some(run) = coalescer.finish() {
            self.fill_run(&mut *display, &run)?;
            draws += 1;
        }

        Ok(draws)
    }

    /// Replace every cell with the frame contents
    ///
    /// Each row is drawn under its own display lock, with a yield in between
    /// so a 64×64 frame does not starve the radio and render tasks.
    /// Returns the number of `fill_rect` calls issued.
    pub async fn draw_full_frame(&self, frame: &FullFrame<'_>) -> Result<usize, DisplayError> {
        let cells = self.geometry.dim.cells() as usize;
        let mut colors = frame.colors();
        let mut draws = 0;

        for y in 0..cells {
            {
                let mut display = self.display.lock().await;
                let mut coalescer = Coalescer::new();

                for (x, color) in colors.by_ref().take(cells).enumerate() {
                    if let Some(run) = coalescer.push(PixelUpdate::new(x as u8, y as u8, color)) {
                        self.fill_run(&mut *display, &run)?;
                        draws += 1;
                    }
                }
                if let Some(run) = coalescer.finish() {
                    self.fill_run(&mut *display, &run)?;
                    draws += 1;
                }
            }
            yield_now().await;
        }

        Ok(draws)
    }

    fn fill_run(&self, display: &mut D, run: &Run) -> Result<(), DisplayError> {
        let (x, y, width, height) = self.geometry.run_rect(run);
        display.fill_rect(x, y, width, height, run.color)
    }
}

//! Full-canvas raster carried by `full,` messages
//!
//! The payload is a flat, row-major list of hex colors. It is decoded lazily
//! so a 64×64 frame never needs an 8 KiB buffer.

use crate::pixel::{CanvasDim, Color565};

/// A complete canvas image borrowed from the message text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullFrame<'a> {
    body: &'a str,
    dim: CanvasDim,
}

impl<'a> FullFrame<'a> {
    /// Wrap the comma-separated color list that follows the `full,` tag
    pub const fn new(body: &'a str, dim: CanvasDim) -> Self {
        Self { body, dim }
    }

    /// Canvas dimension this frame fills
    pub const fn dim(&self) -> CanvasDim {
        self.dim
    }

    /// Number of color values present in the message, capped at the canvas area
    pub fn provided(&self) -> usize {
        if self.body.is_empty() {
            return 0;
        }
        self.body.split(',').take(self.dim.area()).count()
    }

    /// Every cell color in row-major order
    ///
    /// Always yields exactly `dim.area()` colors. Cells past the end of the
    /// message are zero-filled, values past the canvas area are ignored, and
    /// a value that is not valid hex renders as black so that later values
    /// keep their position.
    pub fn colors(&self) -> impl Iterator<Item = Color565> + 'a {
        let area = self.dim.area();
        let values = if self.body.is_empty() { None } else { Some(self.body) };

        values
            .into_iter()
            .flat_map(|body| body.split(','))
            .take(area)
            .map(|value| Color565::from_hex(value).unwrap_or(Color565::BLACK))
            .chain(core::iter::repeat(Color565::BLACK))
            .take(area)
    }
}

//! Horizontal run-length coalescing

use livepixel_protocol::{Color565, PixelUpdate};

/// Horizontal span of same-colored cells on one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Run {
    /// First cell column
    pub x: u8,
    /// Cell row
    pub y: u8,
    /// Number of cells
    pub width: u8,
    pub color: Color565,
}

impl Run {
    /// A one-cell run
    pub const fn single(update: PixelUpdate) -> Self {
        Self {
            x: update.x,
            y: update.y,
            width: 1,
            color: update.color,
        }
    }

    /// Check whether `update` continues this run to the right
    pub fn extends_with(&self, update: &PixelUpdate) -> bool {
        update.y == self.y
            && update.color == self.color
            && update.x as u16 == self.x as u16 + self.width as u16
    }
}

/// Merges a stream of updates into runs
///
/// Runs are emitted in input order, so a later write to the same cell is
/// drawn after the earlier one.
#[derive(Debug, Clone, Default)]
pub struct Coalescer {
    current: Option<Run>,
}

impl Coalescer {
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// Add the next update, returning the run it closed (if any)
    pub fn push(&mut self, update: PixelUpdate) -> Option<Run> {
        if let Some(run) = self.current.as_mut() {
            if run.extends_with(&update) && run.width < u8::MAX {
                run.width += 1;
                return None;
            }
        }
        self.current.replace(Run::single(update))
    }

    /// Flush the open run
    pub fn finish(&mut self) -> Option<Run> {
        self.current.take()
    }
}

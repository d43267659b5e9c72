//! Canvas rendering
//!
//! Pixel updates are merged into horizontal runs before drawing so a row of
//! same-colored cells costs one `fill_rect` instead of one per cell.

pub mod canvas;
pub mod coalesce;

pub use canvas::{Canvas, CanvasGeometry};
pub use coalesce::{Coalescer, Run};

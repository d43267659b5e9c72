//! Network and render loops
//!
//! ```text
//! transport ──► NetworkLoop ──► Ingest ──┬─► PixelQueue ──► RenderLoop ──► Canvas
//!                    │                   └─► Canvas (large batches, full frames, clear)
//!                    └─► Supervisor (reconnect)
//! ```

pub mod ingest;
pub mod network;
pub mod render;
pub mod stats;

pub use ingest::{Applied, Ingest};
pub use network::NetworkLoop;
pub use render::{RenderLoop, IDLE_WAIT, MAX_RENDER_BATCH};
pub use stats::{PipelineStats, StatsSnapshot};

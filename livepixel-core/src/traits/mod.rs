//! Hardware and collaborator abstraction traits
//!
//! These traits define the interface between the pipeline logic and the
//! board-specific display, network transport and status UI.

pub mod display;
pub mod status;
pub mod transport;

pub use display::{DisplayError, DisplayExt, PixelDisplay};
pub use status::{SessionStatus, StatusSink};
pub use transport::{Transport, TransportEvent};

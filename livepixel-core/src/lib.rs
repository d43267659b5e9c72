//! Board-agnostic core logic for the live pixel firmware
//!
//! This crate contains everything between the WebSocket transport and the
//! display driver that does not depend on specific hardware:
//!
//! - Bounded pixel update queue
//! - Run-length render coalescer and canvas geometry
//! - Connection supervisor with reconnect backoff
//! - Network and render loops
//! - Session start/stop with rollback
//! - Configuration types and the `livepixel.toml` parser

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod config;
pub mod connection;
pub mod pipeline;
pub mod queue;
pub mod render;
pub mod session;
pub mod traits;

pub use connection::{ConnectionFlags, ConnectionState, Decision, Supervisor};
pub use pipeline::{Applied, Ingest, NetworkLoop, PipelineStats, RenderLoop, StatsSnapshot};
pub use queue::{PixelQueue, QUEUE_SLOTS};
pub use render::{Canvas, CanvasGeometry, Coalescer, Run};
pub use session::{
    Session, SessionError, SessionHost, SessionShared, SpawnContext, SpawnRejected,
};

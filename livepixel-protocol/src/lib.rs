//! Live Pixel Wire Protocol
//!
//! This crate defines the text protocol a pixel server streams to the
//! device over a WebSocket, plus the small WebSocket client codec needed to
//! carry it. Everything is `no_std`, allocation-free and host-testable.
//!
//! # Message Overview
//!
//! Messages are UTF-8 text. The first matching tag wins:
//! ```text
//! full,<hex>,<hex>,...                   row-major raster of the whole canvas
//! chunk;<idx>;<total>;<count>;x,y,hex;...  one chunk of a split batch
//! compressed;<count>;x,y,hex;...         legacy batch without indexing
//! batch;...                              legacy, ignored
//! -1,-1,<anything>                       clear to background
//! <x>,<y>,<hex>                          single pixel
//! ```
//!
//! Colors are RGB565 in hex. Malformed triples inside a batch are dropped
//! without affecting the rest of the batch.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod endpoint;
pub mod message;
pub mod pixel;
pub mod raster;
pub mod websocket;

pub use endpoint::{Endpoint, EndpointError};
pub use message::{Message, MessageParser, ParseError};
pub use pixel::{Batch, CanvasDim, Color565, PixelUpdate, MAX_BATCH_PIXELS};
pub use raster::FullFrame;
pub use websocket::{Completed, FrameDecoder, WsError};

//! Network side of the board: WebSocket transport over embassy-net

pub mod transport;

pub use transport::{WsBuffers, WsTransport, WsTransportError};

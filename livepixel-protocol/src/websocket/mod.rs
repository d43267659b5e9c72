//! Minimal WebSocket client: upgrade handshake and frame codec

pub mod frame;
pub mod handshake;

pub use frame::{
    encode_client_frame, Completed, FrameDecoder, Opcode, WsError, MAX_CONTROL_PAYLOAD,
    MAX_HEADER_LEN, MAX_MESSAGE_LEN,
};
pub use handshake::{encode_key, write_request, HandshakeStatus, ResponseReader, KEY_LEN};

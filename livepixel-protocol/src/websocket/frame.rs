//! WebSocket frame encoding and decoding (client side, RFC 6455)
//!
//! Frame format:
//! ```text
//! ┌─────────────┬───────────────┬──────────────┬──────────┬─────────┐
//! │ FIN|OPCODE  │ MASK|LEN7     │ EXT LEN      │ MASK KEY │ PAYLOAD │
//! │ 1B          │ 1B            │ 0, 2 or 8B   │ 0 or 4B  │ LEN B   │
//! └─────────────┴───────────────┴──────────────┴──────────┴─────────┘
//! ```
//!
//! Server frames must be unmasked; client frames must be masked.
//! Fragmented text messages are reassembled into a bounded buffer.

use heapless::Vec;

use crate::pixel::CanvasDim;

/// Largest text message the decoder reassembles
///
/// Sized for a 64×64 `full,` frame: the 5-byte tag plus one value of up to
/// four hex digits and a comma per cell.
pub const MAX_MESSAGE_LEN: usize = "full,".len() + CanvasDim::D64.area() * 5;

/// Control frame payloads are limited to 125 bytes by the protocol
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Largest encoded client frame header (2 + 8 ext len + 4 mask)
pub const MAX_HEADER_LEN: usize = 14;

/// Frame opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    /// Parse an opcode from the low nibble of the first header byte
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x0F {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Convert to the wire nibble
    pub fn bits(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }

    /// Returns true for close/ping/pong
    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

/// Errors that can occur during frame decoding or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WsError {
    /// Reserved or unknown opcode
    InvalidOpcode,
    /// Server sent a masked frame, fragmented control frame, or stray continuation
    ProtocolViolation,
    /// Control payload longer than 125 bytes
    ControlTooLarge,
    /// Reassembled message exceeded the buffer and was skipped
    MessageTooLarge,
    /// Text payload is not UTF-8
    InvalidUtf8,
    /// Buffer too small for encoding
    BufferTooSmall,
    /// Handshake response was not `101 Switching Protocols`
    HandshakeRejected,
    /// Handshake response header did not fit the buffer
    HandshakeTooLarge,
}

/// A frame or message completed by the decoder
///
/// Payloads are read back through [`FrameDecoder::text`] and
/// [`FrameDecoder::control_payload`] until the next byte is fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completed {
    /// A full text message is available
    Text,
    /// A binary message was received and discarded
    Binary,
    /// Ping with payload, must be answered with a pong
    Ping,
    /// Pong received
    Pong,
    /// Peer closed, with optional status code
    Close(Option<u16>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Waiting for FIN/opcode byte
    WaitingForHeader,
    /// Got opcode, waiting for MASK/LEN7
    WaitingForLength,
    /// Reading 2 or 8 extended length bytes
    ReadingExtendedLength { remaining: u8 },
    /// Reading payload bytes
    ReadingPayload,
}

/// Incremental decoder for server-to-client frames
#[derive(Debug, Clone)]
pub struct FrameDecoder<const N: usize = MAX_MESSAGE_LEN> {
    state: DecodeState,
    fin: bool,
    opcode: Opcode,
    payload_len: u64,
    received: u64,
    /// Opcode of the data message being reassembled, if any
    message: Option<Opcode>,
    /// Current message overflowed the buffer; drop bytes until it ends
    skipping: bool,
    buffer: Vec<u8, N>,
    control: Vec<u8, MAX_CONTROL_PAYLOAD>,
}

impl<const N: usize> Default for FrameDecoder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameDecoder<N> {
    /// Create a new decoder
    pub const fn new() -> Self {
        Self {
            state: DecodeState::WaitingForHeader,
            fin: false,
            opcode: Opcode::Continuation,
            payload_len: 0,
            received: 0,
            message: None,
            skipping: false,
            buffer: Vec::new(),
            control: Vec::new(),
        }
    }

    /// Reset the decoder state, dropping any partial message
    pub fn reset(&mut self) {
        self.state = DecodeState::WaitingForHeader;
        self.fin = false;
        self.opcode = Opcode::Continuation;
        self.payload_len = 0;
        self.received = 0;
        self.message = None;
        self.skipping = false;
        self.buffer.clear();
        self.control.clear();
    }

    /// Feed a single byte to the decoder
    ///
    /// Returns `Ok(Some(_))` when a message or control frame completes,
    /// `Ok(None)` when more bytes are needed, or `Err` on a protocol error.
    /// The decoder resets itself after an error.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Completed>, WsError> {
        let result = self.step(byte);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn step(&mut self, byte: u8) -> Result<Option<Completed>, WsError> {
        match self.state {
            DecodeState::WaitingForHeader => {
                // RSV bits are not negotiated, they must be zero
                if byte & 0x70 != 0 {
                    return Err(WsError::ProtocolViolation);
                }
                self.fin = byte & 0x80 != 0;
                self.opcode = Opcode::from_bits(byte).ok_or(WsError::InvalidOpcode)?;

                if self.opcode.is_control() {
                    if !self.fin {
                        return Err(WsError::ProtocolViolation);
                    }
                    self.control.clear();
                } else {
                    self.begin_data_frame()?;
                }

                self.state = DecodeState::WaitingForLength;
                Ok(None)
            }
            DecodeState::WaitingForLength => {
                if byte & 0x80 != 0 {
                    return Err(WsError::ProtocolViolation);
                }
                self.received = 0;
                match byte & 0x7F {
                    126 => {
                        self.payload_len = 0;
                        self.state = DecodeState::ReadingExtendedLength { remaining: 2 };
                        Ok(None)
                    }
                    127 => {
                        self.payload_len = 0;
                        self.state = DecodeState::ReadingExtendedLength { remaining: 8 };
                        Ok(None)
                    }
                    len => {
                        self.payload_len = len as u64;
                        self.after_length()
                    }
                }
            }
            DecodeState::ReadingExtendedLength { remaining } => {
                self.payload_len = (self.payload_len << 8) | byte as u64;
                if remaining > 1 {
                    self.state = DecodeState::ReadingExtendedLength {
                        remaining: remaining - 1,
                    };
                    return Ok(None);
                }
                self.after_length()
            }
            DecodeState::ReadingPayload => {
                self.received += 1;

                if self.opcode.is_control() {
                    // Length was checked against the capacity in after_length()
                    let _ = self.control.push(byte);
                } else if !self.skipping && self.buffer.push(byte).is_err() {
                    self.skipping = true;
                    self.buffer.clear();
                }

                if self.received == self.payload_len {
                    return self.finish_frame();
                }
                Ok(None)
            }
        }
    }

    fn begin_data_frame(&mut self) -> Result<(), WsError> {
        match (self.opcode, self.message) {
            (Opcode::Continuation, None) => Err(WsError::ProtocolViolation),
            (Opcode::Continuation, Some(_)) => Ok(()),
            (_, Some(_)) => Err(WsError::ProtocolViolation),
            (opcode, None) => {
                self.message = Some(opcode);
                self.skipping = false;
                self.buffer.clear();
                Ok(())
            }
        }
    }

    fn after_length(&mut self) -> Result<Option<Completed>, WsError> {
        if self.opcode.is_control() && self.payload_len > MAX_CONTROL_PAYLOAD as u64 {
            return Err(WsError::ControlTooLarge);
        }

        if self.payload_len == 0 {
            return self.finish_frame();
        }

        self.state = DecodeState::ReadingPayload;
        Ok(None)
    }

    fn finish_frame(&mut self) -> Result<Option<Completed>, WsError> {
        self.state = DecodeState::WaitingForHeader;

        let completed = match self.opcode {
            Opcode::Ping => Completed::Ping,
            Opcode::Pong => Completed::Pong,
            Opcode::Close => {
                let code = match self.control.as_slice() {
                    [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
                    _ => None,
                };
                Completed::Close(code)
            }
            Opcode::Text | Opcode::Binary | Opcode::Continuation => {
                if !self.fin {
                    return Ok(None);
                }

                let kind = self.message.take();
                if self.skipping {
                    self.skipping = false;
                    self.buffer.clear();
                    return Err(WsError::MessageTooLarge);
                }

                match kind {
                    Some(Opcode::Text) => {
                        if core::str::from_utf8(&self.buffer).is_err() {
                            self.buffer.clear();
                            return Err(WsError::InvalidUtf8);
                        }
                        Completed::Text
                    }
                    _ => {
                        self.buffer.clear();
                        Completed::Binary
                    }
                }
            }
        };

        Ok(Some(completed))
    }

    /// Text of the last completed message
    ///
    /// Valid after `feed` returned [`Completed::Text`]; empty otherwise.
    pub fn text(&self) -> &str {
        if self.message.is_some() {
            return "";
        }
        core::str::from_utf8(&self.buffer).unwrap_or("")
    }

    /// Payload of the last completed control frame
    pub fn control_payload(&self) -> &[u8] {
        &self.control
    }

    /// True while a fragmented message is being reassembled
    pub fn in_message(&self) -> bool {
        self.message.is_some()
    }
}

/// Encode a masked client frame into `buffer`
///
/// Returns the number of bytes written.
pub fn encode_client_frame(
    opcode: Opcode,
    payload: &[u8],
    mask: [u8; 4],
    buffer: &mut [u8],
) -> Result<usize, WsError> {
    if opcode.is_control() && payload.len() > MAX_CONTROL_PAYLOAD {
        return Err(WsError::ControlTooLarge);
    }

    let ext_len = match payload.len() {
        0..=125 => 0,
        126..=0xFFFF => 2,
        _ => 8,
    };
    let header_len = 2 + ext_len + 4;
    let frame_len = header_len + payload.len();
    if buffer.len() < frame_len {
        return Err(WsError::BufferTooSmall);
    }

    buffer[0] = 0x80 | opcode.bits();
    match ext_len {
        0 => buffer[1] = 0x80 | payload.len() as u8,
        2 => {
            buffer[1] = 0x80 | 126;
            buffer[2..4].copy_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        _ => {
            buffer[1] = 0x80 | 127;
            buffer[2..10].copy_from_slice(&(payload.len() as u64).to_be_bytes());
        }
    }

    let mask_start = 2 + ext_len;
    buffer[mask_start..mask_start + 4].copy_from_slice(&mask);

    for (i, &byte) in payload.iter().enumerate() {
        buffer[header_len + i] = byte ^ mask[i % 4];
    }

    Ok(frame_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an unmasked server frame
    fn server_frame(first: u8, payload: &[u8]) -> heapless::Vec<u8, 512> {
        let mut frame = heapless::Vec::new();
        frame.push(first).unwrap();
        if payload.len() < 126 {
            frame.push(payload.len() as u8).unwrap();
        } else {
            frame.push(126).unwrap();
            frame
                .extend_from_slice(&(payload.len() as u16).to_be_bytes())
                .unwrap();
        }
        frame.extend_from_slice(payload).unwrap();
        frame
    }

    fn feed_all<const N: usize>(
        decoder: &mut FrameDecoder<N>,
        bytes: &[u8],
    ) -> Result<Option<Completed>, WsError> {
        let mut last = None;
        for &byte in bytes {
            if let Some(done) = decoder.feed(byte)? {
                last = Some(done);
            }
        }
        Ok(last)
    }

    #[test]
    fn test_text_frame() {
        let mut decoder: FrameDecoder<256> = FrameDecoder::new();
        let frame = server_frame(0x81, b"3,4,F800");

        assert_eq!(feed_all(&mut decoder, &frame), Ok(Some(Completed::Text)));
        assert_eq!(decoder.text(), "3,4,F800");
    }

    #[test]
    fn test_extended_length() {
        let mut decoder: FrameDecoder<512> = FrameDecoder::new();
        let payload = [b'a'; 300];
        let frame = server_frame(0x81, &payload);

        assert_eq!(feed_all(&mut decoder, &frame), Ok(Some(Completed::Text)));
        assert_eq!(decoder.text().len(), 300);
    }

    #[test]
    fn test_fragmented_text_with_interleaved_ping() {
        let mut decoder: FrameDecoder<256> = FrameDecoder::new();

        assert_eq!(feed_all(&mut decoder, &server_frame(0x01, b"full,")), Ok(None));
        assert!(decoder.in_message());

        assert_eq!(
            feed_all(&mut decoder, &server_frame(0x89, b"hi")),
            Ok(Some(Completed::Ping))
        );
        assert_eq!(decoder.control_payload(), b"hi");

        assert_eq!(
            feed_all(&mut decoder, &server_frame(0x80, b"ffff")),
            Ok(Some(Completed::Text))
        );
        assert_eq!(decoder.text(), "full,ffff");
    }

    #[test]
    fn test_close_with_code() {
        let mut decoder: FrameDecoder<64> = FrameDecoder::new();
        let frame = server_frame(0x88, &[0x03, 0xE8]);
        assert_eq!(
            feed_all(&mut decoder, &frame),
            Ok(Some(Completed::Close(Some(1000))))
        );

        let empty = server_frame(0x88, &[]);
        assert_eq!(feed_all(&mut decoder, &empty), Ok(Some(Completed::Close(None))));
    }

    #[test]
    fn test_masked_server_frame_rejected() {
        let mut decoder: FrameDecoder<64> = FrameDecoder::new();
        assert_eq!(decoder.feed(0x81), Ok(None));
        assert_eq!(decoder.feed(0x85), Err(WsError::ProtocolViolation));
    }

    #[test]
    fn test_stray_continuation_rejected() {
        let mut decoder: FrameDecoder<64> = FrameDecoder::new();
        assert_eq!(decoder.feed(0x80), Err(WsError::ProtocolViolation));
    }

    #[test]
    fn test_oversized_message_skipped_then_resyncs() {
        let mut decoder: FrameDecoder<8> = FrameDecoder::new();
        let big = server_frame(0x81, b"0123456789abcdef");

        assert_eq!(feed_all(&mut decoder, &big), Err(WsError::MessageTooLarge));

        let next = server_frame(0x81, b"1,1,0");
        assert_eq!(feed_all(&mut decoder, &next), Ok(Some(Completed::Text)));
        assert_eq!(decoder.text(), "1,1,0");
    }

    #[test]
    fn test_largest_full_frame_fits() {
        let mut payload = std::vec::Vec::from(&b"full,"[..]);
        for i in 0..CanvasDim::D64.area() {
            if i > 0 {
                payload.push(b',');
            }
            payload.extend_from_slice(b"ffff");
        }
        assert_eq!(payload.len(), 20484);

        let mut frame = std::vec![0x81, 126];
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        frame.extend_from_slice(&payload);

        let mut decoder: FrameDecoder = FrameDecoder::new();
        assert_eq!(feed_all(&mut decoder, &frame), Ok(Some(Completed::Text)));
        assert_eq!(decoder.text().len(), payload.len());
        assert!(decoder.text().ends_with(",ffff"));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut decoder: FrameDecoder<64> = FrameDecoder::new();
        let frame = server_frame(0x81, &[0xFF, 0xFE]);
        assert_eq!(feed_all(&mut decoder, &frame), Err(WsError::InvalidUtf8));
    }

    #[test]
    fn test_binary_discarded() {
        let mut decoder: FrameDecoder<64> = FrameDecoder::new();
        let frame = server_frame(0x82, &[1, 2, 3]);
        assert_eq!(feed_all(&mut decoder, &frame), Ok(Some(Completed::Binary)));
        assert_eq!(decoder.text(), "");
    }

    #[test]
    fn test_encode_masked_pong() {
        let mut buffer = [0u8; 32];
        let mask = [0x11, 0x22, 0x33, 0x44];
        let len = encode_client_frame(Opcode::Pong, b"hi", mask, &mut buffer).unwrap();

        assert_eq!(len, 8);
        assert_eq!(buffer[0], 0x8A);
        assert_eq!(buffer[1], 0x82);
        assert_eq!(&buffer[2..6], &mask);
        assert_eq!(buffer[6], b'h' ^ 0x11);
        assert_eq!(buffer[7], b'i' ^ 0x22);
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut buffer = [0u8; 4];
        assert_eq!(
            encode_client_frame(Opcode::Close, &[0x03, 0xE8], [0; 4], &mut buffer),
            Err(WsError::BufferTooSmall)
        );
    }
}

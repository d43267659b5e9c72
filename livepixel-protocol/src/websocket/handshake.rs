//! HTTP upgrade handshake for the WebSocket client
//!
//! The client sends a `GET` with a random 16-byte key and waits for a
//! `101 Switching Protocols` response. `Sec-WebSocket-Accept` is not
//! verified: checking it needs SHA-1 and the server is on the local network.

use core::fmt::Write;

use heapless::{String, Vec};

use super::frame::WsError;
use crate::endpoint::Endpoint;

/// Length of a base64-encoded 16-byte key
pub const KEY_LEN: usize = 24;

/// Largest response header accepted before the handshake fails
pub const MAX_RESPONSE_HEADER: usize = 512;

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Encode a random nonce as a `Sec-WebSocket-Key` value
pub fn encode_key(nonce: &[u8; 16]) -> String<KEY_LEN> {
    let mut key = String::new();

    for chunk in nonce.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        for i in 0..4 {
            let ch = if i <= chunk.len() {
                BASE64_ALPHABET[((triple >> (18 - 6 * i)) & 0x3F) as usize] as char
            } else {
                '='
            };
            // 16 bytes always encode to exactly KEY_LEN characters
            let _ = key.push(ch);
        }
    }

    key
}

/// Write the upgrade request for `endpoint` into `out`
pub fn write_request<const N: usize>(
    endpoint: &Endpoint,
    key: &str,
    out: &mut String<N>,
) -> Result<(), WsError> {
    out.clear();
    write!(
        out,
        "GET {} HTTP/1.1\r\n\
         Host: {}:{}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n",
        endpoint.path(),
        endpoint.host(),
        endpoint.port(),
        key
    )
    .map_err(|_| WsError::BufferTooSmall)
}

/// Progress of the response reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeStatus {
    /// Header not complete yet
    Pending,
    /// Upgrade accepted; bytes past `consumed` in the last chunk are frame data
    Accepted { consumed: usize },
}

/// Accumulates the server's response header until the blank line
#[derive(Debug, Default)]
pub struct ResponseReader {
    header: Vec<u8, MAX_RESPONSE_HEADER>,
}

impl ResponseReader {
    pub const fn new() -> Self {
        Self { header: Vec::new() }
    }

    /// Feed bytes read from the socket
    pub fn feed(&mut self, bytes: &[u8]) -> Result<HandshakeStatus, WsError> {
        for (i, &byte) in bytes.iter().enumerate() {
            self.header
                .push(byte)
                .map_err(|_| WsError::HandshakeTooLarge)?;

            if self.header.ends_with(b"\r\n\r\n") {
                return self.check_status(i + 1);
            }
        }
        Ok(HandshakeStatus::Pending)
    }

    fn check_status(&self, consumed: usize) -> Result<HandshakeStatus, WsError> {
        let status_line = self
            .header
            .split(|&b| b == b'\r')
            .next()
            .unwrap_or_default();

        let mut parts = status_line.split(|&b| b == b' ');
        let version = parts.next().unwrap_or_default();
        let code = parts.next().unwrap_or_default();

        if version.starts_with(b"HTTP/1.") && code == b"101" {
            Ok(HandshakeStatus::Accepted { consumed })
        } else {
            Err(WsError::HandshakeRejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key_rfc_sample() {
        // RFC 6455 section 1.3
        let nonce = *b"the sample nonce";
        assert_eq!(encode_key(&nonce).as_str(), "dGhlIHNhbXBsZSBub25jZQ==");
    }

    #[test]
    fn test_write_request() {
        let endpoint = Endpoint::parse("ws://192.168.1.20:8080/live").unwrap();
        let mut out: String<256> = String::new();
        write_request(&endpoint, "dGhlIHNhbXBsZSBub25jZQ==", &mut out).unwrap();

        assert!(out.starts_with("GET /live HTTP/1.1\r\n"));
        assert!(out.contains("Host: 192.168.1.20:8080\r\n"));
        assert!(out.contains("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n"));
        assert!(out.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_write_request_buffer_too_small() {
        let endpoint = Endpoint::parse("ws://example.local/").unwrap();
        let mut out: String<16> = String::new();
        assert_eq!(
            write_request(&endpoint, "key", &mut out),
            Err(WsError::BufferTooSmall)
        );
    }

    #[test]
    fn test_response_accepted_with_leftover() {
        let mut reader = ResponseReader::new();
        assert_eq!(
            reader.feed(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n"),
            Ok(HandshakeStatus::Pending)
        );

        let tail = b"Connection: Upgrade\r\n\r\n\x81\x03a,b";
        let status = reader.feed(tail).unwrap();
        let HandshakeStatus::Accepted { consumed } = status else {
            panic!("expected accepted, got {:?}", status);
        };
        assert_eq!(&tail[consumed..], b"\x81\x03a,b");
    }

    #[test]
    fn test_response_rejected() {
        let mut reader = ResponseReader::new();
        assert_eq!(
            reader.feed(b"HTTP/1.1 404 Not Found\r\n\r\n"),
            Err(WsError::HandshakeRejected)
        );
    }

    #[test]
    fn test_response_too_large() {
        let mut reader = ResponseReader::new();
        let junk = [b'a'; MAX_RESPONSE_HEADER + 1];
        assert_eq!(reader.feed(&junk), Err(WsError::HandshakeTooLarge));
    }
}

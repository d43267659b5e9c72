//! WebSocket client over an embassy-net TCP socket
//!
//! One socket is created at boot and reused for every connection. Frames are
//! decoded byte by byte as they come off the socket; pings are answered
//! inline and a close frame ends the connection.

use defmt::*;
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::{ConnectError, TcpSocket};
use embassy_net::{IpAddress, Stack};
use embassy_rp::clocks::RoscRng;
use embassy_time::{with_deadline, with_timeout, Duration, Instant};
use embedded_io_async::Write;
use heapless::{String, Vec};
use rand_core::RngCore;

use livepixel_core::traits::{Transport, TransportEvent};
use livepixel_protocol::websocket::{
    encode_client_frame, encode_key, write_request, Completed, FrameDecoder, HandshakeStatus,
    Opcode, ResponseReader, WsError, MAX_CONTROL_PAYLOAD, MAX_HEADER_LEN,
};
use livepixel_protocol::Endpoint;

/// TCP receive window
pub const SOCKET_RX_LEN: usize = 4096;

/// TCP send buffer (upgrade request and control frames only)
pub const SOCKET_TX_LEN: usize = 1024;

/// Bytes pulled off the socket per read
const READ_CHUNK: usize = 512;

/// Connect plus upgrade must finish within this
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket is dropped if the server goes quiet for this long
const KEEPALIVE: Duration = Duration::from_secs(30);

/// Grace period for the close handshake
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Normal closure status code
const CLOSE_NORMAL: u16 = 1000;

/// Transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum WsTransportError {
    /// No network link or no DHCP lease
    LinkDown,
    /// Host name did not resolve
    Dns,
    /// TCP connect failed
    Connect(ConnectError),
    /// Socket read/write failed or the peer went away
    Io,
    /// Server refused the upgrade
    Handshake(WsError),
    /// Connect or upgrade took too long
    Timeout,
}

/// Statically allocated buffers for the transport
pub struct WsBuffers {
    socket_rx: [u8; SOCKET_RX_LEN],
    socket_tx: [u8; SOCKET_TX_LEN],
    read: [u8; READ_CHUNK],
    decoder: FrameDecoder,
}

impl WsBuffers {
    pub const fn new() -> Self {
        Self {
            socket_rx: [0; SOCKET_RX_LEN],
            socket_tx: [0; SOCKET_TX_LEN],
            read: [0; READ_CHUNK],
            decoder: FrameDecoder::new(),
        }
    }
}

/// What a decoded frame asks the poll loop to do
enum Step {
    Continue,
    Message,
    Closed,
}

/// WebSocket client transport for the live pixel session
pub struct WsTransport {
    stack: Stack<'static>,
    socket: TcpSocket<'static>,
    read: &'static mut [u8; READ_CHUNK],
    decoder: &'static mut FrameDecoder,
    /// Unprocessed bytes in `read`
    pending: core::ops::Range<usize>,
    rng: RoscRng,
    connected: bool,
}

impl WsTransport {
    pub fn new(stack: Stack<'static>, buffers: &'static mut WsBuffers) -> Self {
        let WsBuffers {
            socket_rx,
            socket_tx,
            read,
            decoder,
        } = buffers;

        let mut socket = TcpSocket::new(stack, socket_rx, socket_tx);
        socket.set_keep_alive(Some(Duration::from_secs(10)));

        Self {
            stack,
            socket,
            read,
            decoder,
            pending: 0..0,
            rng: RoscRng,
            connected: false,
        }
    }

    async fn resolve(&self, endpoint: &Endpoint) -> Result<IpAddress, WsTransportError> {
        if let Some([a, b, c, d]) = endpoint.ipv4() {
            return Ok(IpAddress::v4(a, b, c, d));
        }

        let addrs = self
            .stack
            .dns_query(endpoint.host(), DnsQueryType::A)
            .await
            .map_err(|_| WsTransportError::Dns)?;
        addrs.first().copied().ok_or(WsTransportError::Dns)
    }

    async fn open(&mut self, endpoint: &Endpoint) -> Result<(), WsTransportError> {
        let addr = self.resolve(endpoint).await?;

        self.socket.set_timeout(Some(KEEPALIVE));
        self.socket
            .connect((addr, endpoint.port()))
            .await
            .map_err(WsTransportError::Connect)?;

        self.handshake(endpoint).await
    }

    /// Send the upgrade request and wait for `101`
    async fn handshake(&mut self, endpoint: &Endpoint) -> Result<(), WsTransportError> {
        let mut nonce = [0u8; 16];
        self.rng.fill_bytes(&mut nonce);
        let key = encode_key(&nonce);

        let mut request: String<512> = String::new();
        write_request(endpoint, &key, &mut request).map_err(WsTransportError::Handshake)?;
        self.socket
            .write_all(request.as_bytes())
            .await
            .map_err(|_| WsTransportError::Io)?;
        self.socket.flush().await.map_err(|_| WsTransportError::Io)?;

        let mut reader = ResponseReader::new();
        loop {
            let n = self
                .socket
                .read(&mut self.read[..])
                .await
                .map_err(|_| WsTransportError::Io)?;
            if n == 0 {
                return Err(WsTransportError::Io);
            }

            match reader
                .feed(&self.read[..n])
                .map_err(WsTransportError::Handshake)?
            {
                HandshakeStatus::Pending => {}
                HandshakeStatus::Accepted { consumed } => {
                    // Frame bytes that arrived with the response header
                    self.pending = consumed..n;
                    return Ok(());
                }
            }
        }
    }

    /// Write one masked frame
    async fn send_frame(&mut self, opcode: Opcode, payload: &[u8]) -> Result<(), WsTransportError> {
        let mut mask = [0u8; 4];
        self.rng.fill_bytes(&mut mask);

        let mut frame = [0u8; MAX_HEADER_LEN + MAX_CONTROL_PAYLOAD];
        let len = encode_client_frame(opcode, payload, mask, &mut frame)
            .map_err(WsTransportError::Handshake)?;

        self.socket
            .write_all(&frame[..len])
            .await
            .map_err(|_| WsTransportError::Io)?;
        self.socket.flush().await.map_err(|_| WsTransportError::Io)
    }

    /// Feed buffered bytes to the decoder until something completes
    async fn drain_pending(&mut self) -> Step {
        while self.pending.start < self.pending.end {
            let byte = self.read[self.pending.start];
            self.pending.start += 1;

            match self.decoder.feed(byte) {
                Ok(None) => {}
                Ok(Some(Completed::Text)) => return Step::Message,
                Ok(Some(Completed::Binary)) => {
                    debug!("binary message ignored");
                }
                Ok(Some(Completed::Ping)) => {
                    let payload: Vec<u8, MAX_CONTROL_PAYLOAD> =
                        Vec::from_slice(self.decoder.control_payload()).unwrap_or_default();
                    if self.send_frame(Opcode::Pong, &payload).await.is_err() {
                        warn!("pong failed");
                        return Step::Closed;
                    }
                }
                Ok(Some(Completed::Pong)) => {}
                Ok(Some(Completed::Close(code))) => {
                    info!("server closed connection, code {}", code);
                    let _ = self
                        .send_frame(Opcode::Close, &CLOSE_NORMAL.to_be_bytes())
                        .await;
                    return Step::Closed;
                }
                Err(WsError::MessageTooLarge) => {
                    warn!("oversized message skipped");
                }
                Err(e) => {
                    warn!("websocket protocol error: {}", e);
                    return Step::Closed;
                }
            }
        }
        Step::Continue
    }

    fn drop_connection(&mut self) {
        self.socket.abort();
        self.connected = false;
        self.pending = 0..0;
        self.decoder.reset();
    }
}

impl Transport for WsTransport {
    type Error = WsTransportError;

    fn link_up(&self) -> bool {
        self.stack.is_link_up()
    }

    fn local_ip(&self) -> Option<[u8; 4]> {
        self.stack
            .config_v4()
            .map(|config| config.address.address().octets())
    }

    async fn connect(&mut self, endpoint: &Endpoint) -> Result<(), WsTransportError> {
        if self.connected {
            self.close().await;
        } else {
            self.drop_connection();
            // Wait for the abort to go out so the socket is reusable
            let _ = with_timeout(CLOSE_TIMEOUT, self.socket.flush()).await;
        }

        if !self.stack.is_link_up() || self.stack.config_v4().is_none() {
            return Err(WsTransportError::LinkDown);
        }

        info!(
            "connecting to ws://{}:{}{}",
            endpoint.host(),
            endpoint.port(),
            endpoint.path()
        );

        match with_timeout(CONNECT_TIMEOUT, self.open(endpoint)).await {
            Ok(Ok(())) => {
                self.connected = true;
                info!("websocket connected");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("websocket connect failed: {}", e);
                self.drop_connection();
                Err(e)
            }
            Err(_) => {
                warn!("websocket connect timed out");
                self.drop_connection();
                Err(WsTransportError::Timeout)
            }
        }
    }

    async fn poll(&mut self, timeout: Duration) -> TransportEvent<'_> {
        if !self.connected {
            return TransportEvent::Closed;
        }

        let deadline = Instant::now() + timeout;
        loop {
            match self.drain_pending().await {
                Step::Message => break,
                Step::Closed => {
                    self.drop_connection();
                    return TransportEvent::Closed;
                }
                Step::Continue => {}
            }

            match with_deadline(deadline, self.socket.read(&mut self.read[..])).await {
                Err(_) => return TransportEvent::Idle,
                Ok(Ok(0)) => {
                    info!("socket closed by peer");
                    self.drop_connection();
                    return TransportEvent::Closed;
                }
                Ok(Ok(n)) => self.pending = 0..n,
                Ok(Err(e)) => {
                    warn!("socket read failed: {}", e);
                    self.drop_connection();
                    return TransportEvent::Closed;
                }
            }
        }

        TransportEvent::Message(self.decoder.text())
    }

    async fn close(&mut self) {
        if !self.connected {
            return;
        }

        let _ = with_timeout(
            CLOSE_TIMEOUT,
            self.send_frame(Opcode::Close, &CLOSE_NORMAL.to_be_bytes()),
        )
        .await;
        self.socket.close();
        let _ = with_timeout(CLOSE_TIMEOUT, self.socket.flush()).await;
        self.drop_connection();
        info!("websocket closed");
    }
}

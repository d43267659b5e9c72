//! Connection supervisor
//!
//! State transitions:
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -> Connecting ...
//!                     |
//!                     +-> Disconnected (attempt failed)
//! ```
//!
//! At most one attempt is made per reconnect interval. Attempts are skipped
//! while the link is down, and the UI hears about the outage once.
//! Timestamps are wrapping milliseconds supplied by the caller so the policy
//! can be tested without a clock.

use embassy_sync::blocking_mutex::raw::RawMutex;
use livepixel_protocol::Endpoint;
use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::render::Canvas;
use crate::traits::{PixelDisplay, StatusSink, Transport};

/// Connection state, written only by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// What the network loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decision {
    /// Connected: poll the transport
    Poll,
    /// Make a connection attempt now
    Attempt,
    /// Too soon since the last attempt
    Wait { remaining_ms: u32 },
    /// Link is down; `first` is true once per outage
    LinkDown { first: bool },
}

/// Connection flags shared between the supervisor and observers
#[derive(Debug)]
pub struct ConnectionFlags {
    state: AtomicU8,
    last_attempt_ms: AtomicU32,
    attempted: AtomicBool,
    link_down_reported: AtomicBool,
}

impl Default for ConnectionFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionFlags {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            last_attempt_ms: AtomicU32::new(0),
            attempted: AtomicBool::new(false),
            link_down_reported: AtomicBool::new(false),
        }
    }

    /// Forget everything from a previous session
    pub fn reset(&self) {
        self.set_state(ConnectionState::Disconnected);
        self.last_attempt_ms.store(0, Ordering::Relaxed);
        self.attempted.store(false, Ordering::Relaxed);
        self.link_down_reported.store(false, Ordering::Relaxed);
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn record_attempt(&self, now_ms: u32) {
        self.last_attempt_ms.store(now_ms, Ordering::Relaxed);
        self.attempted.store(true, Ordering::Relaxed);
    }

    /// Reconnect policy
    pub fn decide(&self, now_ms: u32, link_up: bool, interval_ms: u32) -> Decision {
        if self.is_connected() {
            return Decision::Poll;
        }

        if !link_up {
            let first = !self.link_down_reported.swap(true, Ordering::AcqRel);
            return Decision::LinkDown { first };
        }
        self.link_down_reported.store(false, Ordering::Relaxed);

        if self.attempted.load(Ordering::Relaxed) {
            let elapsed = now_ms.wrapping_sub(self.last_attempt_ms.load(Ordering::Relaxed));
            if elapsed < interval_ms {
                return Decision::Wait {
                    remaining_ms: interval_ms - elapsed,
                };
            }
        }

        Decision::Attempt
    }
}

/// Owns the transport and drives connection state
pub struct Supervisor<'a, M: RawMutex, D, T, S> {
    flags: &'a ConnectionFlags,
    transport: T,
    status: S,
    canvas: Canvas<'a, M, D>,
    endpoint: Endpoint,
    interval_ms: u32,
}

impl<'a, M, D, T, S> Supervisor<'a, M, D, T, S>
where
    M: RawMutex,
    D: PixelDisplay,
    T: Transport,
    S: StatusSink,
{
    pub fn new(
        flags: &'a ConnectionFlags,
        transport: T,
        status: S,
        canvas: Canvas<'a, M, D>,
        endpoint: Endpoint,
        interval_ms: u32,
    ) -> Self {
        Self {
            flags,
            transport,
            status,
            canvas,
            endpoint,
            interval_ms,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.flags.state()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back once the session is over
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Evaluate the reconnect policy at `now_ms`
    pub fn decide(&self, now_ms: u32) -> Decision {
        self.flags
            .decide(now_ms, self.transport.link_up(), self.interval_ms)
    }

    /// Apply the policy: attempt a connection or report link-down
    pub async fn service(&mut self, now_ms: u32) -> Decision {
        let decision = self.decide(now_ms);
        match decision {
            Decision::Attempt => {
                self.attempt(now_ms).await;
            }
            Decision::LinkDown { first: true } => {
                warn!("link down, skipping connection attempts");
                self.status.on_link_down();
            }
            Decision::Poll | Decision::Wait { .. } | Decision::LinkDown { first: false } => {}
        }
        decision
    }

    /// One connection attempt, regardless of the interval
    ///
    /// Returns true if the connection opened.
    pub async fn attempt(&mut self, now_ms: u32) -> bool {
        self.flags.record_attempt(now_ms);
        self.flags.set_state(ConnectionState::Connecting);

        let ip = self.transport.local_ip();
        self.status.on_connecting(ip);
        info!("connecting to server");

        match self.transport.connect(&self.endpoint).await {
            Ok(()) => {
                self.flags.set_state(ConnectionState::Connected);
                if let Err(e) = self.canvas.clear().await {
                    warn!("canvas clear failed: {}", e);
                }
                self.status.on_connected(ip);
                info!("connected");
                true
            }
            Err(_) => {
                self.flags.set_state(ConnectionState::Disconnected);
                self.status.on_connect_failed();
                warn!("connection failed, retrying in {} ms", self.interval_ms);
                false
            }
        }
    }

    /// The transport reported the peer closed
    pub fn handle_closed(&mut self) {
        if self.flags.is_connected() {
            self.flags.set_state(ConnectionState::Disconnected);
            self.status.on_disconnected();
            info!("disconnected");
        }
    }

    /// Close the connection for session teardown
    pub async fn close(&mut self) {
        self.transport.close().await;
        self.flags.set_state(ConnectionState::Disconnected);
    }

    /// Close and tell the UI the connection it saw is gone
    pub async fn shutdown(&mut self) {
        let was_connected = self.flags.is_connected();
        self.close().await;
        if was_connected {
            self.status.on_disconnected();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::CanvasGeometry;
    use crate::traits::display::mock::RecordingDisplay;
    use crate::traits::status::mock::RecordingStatus;
    use crate::traits::transport::mock::ScriptedTransport;
    use crate::traits::SessionStatus;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::mutex::Mutex;
    use livepixel_protocol::{CanvasDim, Color565};

    const INTERVAL: u32 = 5000;

    type Cs = CriticalSectionRawMutex;
    type TestSupervisor<'a> =
        Supervisor<'a, Cs, RecordingDisplay, ScriptedTransport, &'a RecordingStatus>;

    #[test]
    fn test_first_attempt_is_immediate() {
        let flags = ConnectionFlags::new();
        assert_eq!(flags.decide(0, true, INTERVAL), Decision::Attempt);
    }

    #[test]
    fn test_retry_respects_interval() {
        let flags = ConnectionFlags::new();
        flags.record_attempt(1_000);

        assert_eq!(
            flags.decide(2_000, true, INTERVAL),
            Decision::Wait { remaining_ms: 4_000 }
        );
        assert_eq!(flags.decide(6_000, true, INTERVAL), Decision::Attempt);

        flags.record_attempt(6_000);
        assert!(matches!(
            flags.decide(7_000, true, INTERVAL),
            Decision::Wait { .. }
        ));
        assert_eq!(flags.decide(11_500, true, INTERVAL), Decision::Attempt);
    }

    #[test]
    fn test_interval_survives_clock_wrap() {
        let flags = ConnectionFlags::new();
        flags.record_attempt(u32::MAX - 1_000);

        assert!(matches!(
            flags.decide(1_000, true, INTERVAL),
            Decision::Wait { .. }
        ));
        assert_eq!(flags.decide(4_000, true, INTERVAL), Decision::Attempt);
    }

    #[test]
    fn test_link_down_reported_once_per_outage() {
        let flags = ConnectionFlags::new();

        assert_eq!(
            flags.decide(0, false, INTERVAL),
            Decision::LinkDown { first: true }
        );
        assert_eq!(
            flags.decide(100, false, INTERVAL),
            Decision::LinkDown { first: false }
        );

        assert_eq!(flags.decide(200, true, INTERVAL), Decision::Attempt);
        assert_eq!(
            flags.decide(300, false, INTERVAL),
            Decision::LinkDown { first: true }
        );
    }

    #[test]
    fn test_connected_polls() {
        let flags = ConnectionFlags::new();
        flags.set_state(ConnectionState::Connected);
        assert_eq!(flags.decide(0, false, INTERVAL), Decision::Poll);

        flags.reset();
        assert_eq!(flags.state(), ConnectionState::Disconnected);
    }

    fn with_supervisor(
        transport: ScriptedTransport,
        f: impl FnOnce(&mut TestSupervisor<'_>, &RecordingStatus, &Mutex<Cs, RecordingDisplay>),
    ) {
        let flags = ConnectionFlags::new();
        let status = RecordingStatus::new();
        let display = Mutex::new(RecordingDisplay::new());
        let canvas = Canvas::new(
            &display,
            CanvasGeometry::new(CanvasDim::D32, 128),
            Color565::WHITE,
        );
        let endpoint = Endpoint::parse("ws://10.0.0.1:8080/ws").unwrap();
        let mut supervisor =
            Supervisor::new(&flags, transport, &status, canvas, endpoint, INTERVAL);
        f(&mut supervisor, &status, &display);
    }

    #[test]
    fn test_successful_attempt_clears_canvas() {
        with_supervisor(ScriptedTransport::new(), |supervisor, status, display| {
            assert!(block_on(supervisor.attempt(0)));
            assert_eq!(supervisor.state(), ConnectionState::Connected);

            let ip = Some([10, 0, 0, 7]);
            assert_eq!(
                status.events().as_slice(),
                &[
                    SessionStatus::Connecting { ip },
                    SessionStatus::Connected { ip }
                ]
            );
            let rect = block_on(display.lock()).rects[0];
            assert_eq!((rect.width, rect.color), (128, Color565::WHITE));
        });
    }

    #[test]
    fn test_failed_attempts_back_off() {
        let mut transport = ScriptedTransport::new();
        transport.accept = false;

        with_supervisor(transport, |supervisor, status, _| {
            assert_eq!(block_on(supervisor.service(0)), Decision::Attempt);
            assert_eq!(supervisor.state(), ConnectionState::Disconnected);

            // Second failure inside the interval: no new attempt
            assert!(matches!(
                block_on(supervisor.service(1_000)),
                Decision::Wait { .. }
            ));
            assert_eq!(supervisor.transport_mut().connects, 1);

            assert_eq!(block_on(supervisor.service(5_000)), Decision::Attempt);
            assert_eq!(supervisor.transport_mut().connects, 2);
            assert_eq!(status.count(SessionStatus::ConnectFailed), 2);
        });
    }

    #[test]
    fn test_link_down_notifies_once() {
        let mut transport = ScriptedTransport::new();
        transport.link = false;

        with_supervisor(transport, |supervisor, status, _| {
            block_on(supervisor.service(0));
            block_on(supervisor.service(100));
            block_on(supervisor.service(200));

            assert_eq!(status.count(SessionStatus::LinkDown), 1);
            assert_eq!(supervisor.transport_mut().connects, 0);
        });
    }

    #[test]
    fn test_closed_notifies_disconnected() {
        with_supervisor(ScriptedTransport::new(), |supervisor, status, _| {
            block_on(supervisor.attempt(0));
            supervisor.handle_closed();
            supervisor.handle_closed();

            assert_eq!(supervisor.state(), ConnectionState::Disconnected);
            assert_eq!(status.count(SessionStatus::Disconnected), 1);
        });
    }
}

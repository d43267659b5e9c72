//! Network loop: poll the transport, dispatch messages, reconnect

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant, Timer};

use super::ingest::Ingest;
use crate::connection::{ConnectionState, Supervisor};
use crate::session::SessionShared;
use crate::traits::{PixelDisplay, StatusSink, Transport, TransportEvent};

/// Producer side of the pipeline
pub struct NetworkLoop<'a, M: RawMutex, D, T, S, const Q: usize> {
    shared: &'a SessionShared<M, Q>,
    supervisor: Supervisor<'a, M, D, T, S>,
    ingest: Ingest<'a, M, D, Q>,
    poll_interval: Duration,
}

/// Wrapping millisecond clock fed to the reconnect policy
pub(crate) fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

impl<'a, M, D, T, S, const Q: usize> NetworkLoop<'a, M, D, T, S, Q>
where
    M: RawMutex,
    D: PixelDisplay,
    T: Transport,
    S: StatusSink,
{
    pub fn new(
        shared: &'a SessionShared<M, Q>,
        supervisor: Supervisor<'a, M, D, T, S>,
        ingest: Ingest<'a, M, D, Q>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            shared,
            supervisor,
            ingest,
            poll_interval,
        }
    }

    pub fn supervisor(&mut self) -> &mut Supervisor<'a, M, D, T, S> {
        &mut self.supervisor
    }

    /// One iteration: poll while connected, otherwise service reconnects
    ///
    /// Every await in here is bounded by the poll interval.
    pub async fn step(&mut self) {
        if self.supervisor.state() == ConnectionState::Connected {
            let closed = match self.supervisor.transport_mut().poll(self.poll_interval).await {
                TransportEvent::Message(text) => {
                    self.ingest.apply(text).await;
                    false
                }
                TransportEvent::Idle => false,
                TransportEvent::Closed => true,
            };

            if closed {
                self.supervisor.handle_closed();
            }
        } else {
            self.supervisor.service(now_ms()).await;
            Timer::after(self.poll_interval).await;
        }
    }

    /// Tear down a loop that was never spawned
    ///
    /// Closes whatever connection the first attempt opened and returns the
    /// transport.
    pub async fn discard(mut self) -> T {
        self.supervisor.shutdown().await;
        self.supervisor.into_transport()
    }

    /// Run until the session is cancelled, then close the connection
    ///
    /// Returns the transport so it can be reused by the next session.
    pub async fn run(mut self) -> T {
        info!("network loop started");

        while !self.shared.is_cancelled() {
            self.step().await;
        }

        self.supervisor.close().await;
        info!("network loop stopped");
        self.shared.network_exited();
        self.supervisor.into_transport()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Canvas, CanvasGeometry};
    use crate::traits::display::mock::RecordingDisplay;
    use crate::traits::status::mock::RecordingStatus;
    use crate::traits::transport::mock::ScriptedTransport;
    use crate::traits::SessionStatus;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::mutex::Mutex;
    use livepixel_protocol::{CanvasDim, Color565, Endpoint};

    type Cs = CriticalSectionRawMutex;

    fn network_loop<'a>(
        shared: &'a SessionShared<Cs, 256>,
        display: &'a Mutex<Cs, RecordingDisplay>,
        status: &'a RecordingStatus,
        transport: ScriptedTransport,
    ) -> NetworkLoop<'a, Cs, RecordingDisplay, ScriptedTransport, &'a RecordingStatus, 256> {
        let canvas = Canvas::new(
            display,
            CanvasGeometry::new(CanvasDim::D32, 128),
            Color565::WHITE,
        );
        let supervisor = Supervisor::new(
            &shared.connection,
            transport,
            status,
            canvas,
            Endpoint::parse("ws://10.0.0.1/").unwrap(),
            5_000,
        );
        let ingest = Ingest::new(&shared.queue, canvas, &shared.stats, 50);
        NetworkLoop::new(shared, supervisor, ingest, Duration::from_millis(10))
    }

    #[test]
    fn test_connects_then_dispatches_messages() {
        let shared: SessionShared<Cs, 256> = SessionShared::new();
        let display = Mutex::new(RecordingDisplay::new());
        let status = RecordingStatus::new();
        shared.queue.open(64).unwrap();

        let mut transport = ScriptedTransport::new();
        transport.push_message("1,1,F800");
        transport.push_message("2,1,F800");

        let mut net = network_loop(&shared, &display, &status, transport);
        block_on(net.step());
        assert!(shared.connection.is_connected());

        block_on(net.step());
        block_on(net.step());
        assert_eq!(shared.queue.len(), 2);
        assert_eq!(shared.stats.snapshot().messages, 2);
    }

    #[test]
    fn test_close_marks_disconnected() {
        let shared: SessionShared<Cs, 256> = SessionShared::new();
        let display = Mutex::new(RecordingDisplay::new());
        let status = RecordingStatus::new();
        shared.queue.open(64).unwrap();

        let mut transport = ScriptedTransport::new();
        transport.push_close();

        let mut net = network_loop(&shared, &display, &status, transport);
        block_on(net.step());
        block_on(net.step());

        assert_eq!(shared.connection.state(), ConnectionState::Disconnected);
        assert_eq!(status.count(SessionStatus::Disconnected), 1);

        // Reconnect waits for the interval since the last attempt
        block_on(net.step());
        assert_eq!(net.supervisor().transport_mut().connects, 1);
    }

    #[test]
    fn test_run_closes_transport_on_cancel() {
        let shared: SessionShared<Cs, 256> = SessionShared::new();
        let display = Mutex::new(RecordingDisplay::new());
        let status = RecordingStatus::new();
        shared.queue.open(64).unwrap();

        let mut net = network_loop(&shared, &display, &status, ScriptedTransport::new());
        block_on(net.step());
        assert!(shared.connection.is_connected());

        shared.cancel();
        let transport = block_on(net.run());

        assert_eq!(transport.closes, 1);
        assert!(shared.network_done_signaled());
        assert_eq!(shared.connection.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_discard_closes_open_connection() {
        let shared: SessionShared<Cs, 256> = SessionShared::new();
        let display = Mutex::new(RecordingDisplay::new());
        let status = RecordingStatus::new();

        let mut net = network_loop(&shared, &display, &status, ScriptedTransport::new());
        block_on(net.step());
        assert!(shared.connection.is_connected());

        let transport = block_on(net.discard());

        assert_eq!(transport.closes, 1);
        assert_eq!(shared.connection.state(), ConnectionState::Disconnected);
        assert_eq!(status.count(SessionStatus::Disconnected), 1);
        assert!(!shared.network_done_signaled());
    }
}

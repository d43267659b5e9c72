//! Session lifecycle
//!
//! A session is one run of the live pixel mode. [`Session::start`] opens the
//! queue, makes the first connection attempt and spawns the network and
//! render loops through a [`SessionHost`]. [`Session::stop`] cancels both
//! loops, waits for each to acknowledge, then closes the queue.
//!
//! All state shared between the loops lives in one [`SessionShared`] block
//! that the firmware places in a `static`.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::Duration;
use portable_atomic::{AtomicBool, Ordering};

use crate::config::SessionConfig;
use crate::connection::{ConnectionFlags, Supervisor};
use crate::pipeline::network::now_ms;
use crate::pipeline::{Ingest, NetworkLoop, PipelineStats, RenderLoop};
use crate::queue::{PixelQueue, QUEUE_SLOTS};
use crate::render::{Canvas, CanvasGeometry};
use crate::traits::{PixelDisplay, StatusSink, Transport};

/// Which loop failed to spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpawnContext {
    Network,
    Render,
}

/// Session start errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    /// Network link is down; the user has to exit
    LinkDown,
    /// A session is already running
    AlreadyRunning,
    /// Queue capacity is zero or larger than the backing storage
    QueueUnavailable,
    /// The host has no transport to hand out
    TransportUnavailable,
    /// A loop could not be spawned; everything was rolled back
    SpawnFailed(SpawnContext),
}

/// Returned by a host that could not spawn a loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpawnRejected;

/// State shared by the session and both loops
pub struct SessionShared<M: RawMutex, const Q: usize = QUEUE_SLOTS> {
    pub queue: PixelQueue<M, Q>,
    pub connection: ConnectionFlags,
    pub stats: PipelineStats,
    cancel: AtomicBool,
    network_done: Signal<M, ()>,
    render_done: Signal<M, ()>,
}

impl<M: RawMutex, const Q: usize> Default for SessionShared<M, Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, const Q: usize> SessionShared<M, Q> {
    pub const fn new() -> Self {
        Self {
            queue: PixelQueue::new(),
            connection: ConnectionFlags::new(),
            stats: PipelineStats::new(),
            cancel: AtomicBool::new(false),
            network_done: Signal::new(),
            render_done: Signal::new(),
        }
    }

    /// Checked by both loops at the top of every iteration
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub(crate) fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub(crate) fn network_exited(&self) {
        self.network_done.signal(());
    }

    pub(crate) fn render_exited(&self) {
        self.render_done.signal(());
    }

    #[cfg(test)]
    pub(crate) fn network_done_signaled(&self) -> bool {
        self.network_done.signaled()
    }

    #[cfg(test)]
    pub(crate) fn render_done_signaled(&self) -> bool {
        self.render_done.signaled()
    }

    /// Reset everything for a new session
    fn arm(&self) {
        self.cancel.store(false, Ordering::Release);
        self.network_done.reset();
        self.render_done.reset();
        self.connection.reset();
        self.stats.reset();
    }
}

/// Board glue the session needs to start its loops
///
/// The host owns the display, the status UI and the transport between
/// sessions. `spawn_*` must run the loop to completion on its own task; the
/// network loop hands the transport back when it returns.
pub trait SessionHost<'a, M: RawMutex + 'a, const Q: usize> {
    type Display: PixelDisplay + 'a;
    type Transport: Transport;
    type Status: StatusSink;

    fn display(&self) -> &'a Mutex<M, Self::Display>;

    fn status(&self) -> Self::Status;

    fn link_up(&self) -> bool;

    /// Hand out the transport for one session
    fn take_transport(&mut self) -> Option<Self::Transport>;

    /// Spawn the network loop, or hand it back untouched if that fails
    fn spawn_network(
        &mut self,
        task: NetworkLoop<'a, M, Self::Display, Self::Transport, Self::Status, Q>,
    ) -> Result<(), NetworkLoop<'a, M, Self::Display, Self::Transport, Self::Status, Q>>;

    /// Take back the transport of a loop that never ran
    fn return_transport(&mut self, transport: Self::Transport);

    fn spawn_render(
        &mut self,
        task: RenderLoop<'a, M, Self::Display, Q>,
    ) -> Result<(), SpawnRejected>;
}

/// Start/stop controller for the live pixel mode
pub struct Session<'a, M: RawMutex, const Q: usize = QUEUE_SLOTS> {
    shared: &'a SessionShared<M, Q>,
    running: bool,
}

impl<'a, M: RawMutex + 'a, const Q: usize> Session<'a, M, Q> {
    pub const fn new(shared: &'a SessionShared<M, Q>) -> Self {
        Self {
            shared,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start a session
    ///
    /// On error nothing is left running and the queue is closed. A failed
    /// first connection attempt is not an error: the network loop retries.
    pub async fn start<H>(
        &mut self,
        host: &mut H,
        config: &SessionConfig,
    ) -> Result<(), SessionError>
    where
        H: SessionHost<'a, M, Q>,
    {
        if self.running {
            return Err(SessionError::AlreadyRunning);
        }

        let shared = self.shared;
        let status = host.status();

        if !host.link_up() {
            warn!("session start refused, link down");
            status.on_link_down();
            return Err(SessionError::LinkDown);
        }

        shared.arm();
        shared.queue.open(config.pipeline.queue_capacity)?;

        let Some(transport) = host.take_transport() else {
            shared.queue.close();
            return Err(SessionError::TransportUnavailable);
        };

        let canvas = Canvas::new(
            host.display(),
            CanvasGeometry::new(config.canvas.dim, config.canvas.size_px),
            config.canvas.background,
        );

        let mut supervisor = Supervisor::new(
            &shared.connection,
            transport,
            status,
            canvas,
            config.endpoint.clone(),
            config.pipeline.reconnect_interval_ms,
        );
        supervisor.attempt(now_ms()).await;

        let ingest = Ingest::new(
            &shared.queue,
            canvas,
            &shared.stats,
            config.pipeline.direct_draw_threshold,
        );
        let network = NetworkLoop::new(
            shared,
            supervisor,
            ingest,
            Duration::from_millis(config.pipeline.poll_interval_ms as u64),
        );
        let render = RenderLoop::new(
            shared,
            canvas,
            config.pipeline.render_batch,
            Duration::from_millis(config.pipeline.yield_interval_ms as u64),
        );

        if let Err(network) = host.spawn_network(network) {
            warn!("network loop spawn failed, closing connection");
            host.return_transport(network.discard().await);
            shared.connection.reset();
            shared.queue.close();
            return Err(SessionError::SpawnFailed(SpawnContext::Network));
        }

        if host.spawn_render(render).is_err() {
            warn!("render loop spawn failed, stopping network loop");
            shared.cancel();
            shared.network_done.wait().await;
            shared.queue.close();
            return Err(SessionError::SpawnFailed(SpawnContext::Render));
        }

        self.running = true;
        info!(
            "session started, queue capacity {}",
            config.pipeline.queue_capacity
        );
        Ok(())
    }

    /// Stop the session
    ///
    /// Closes the connection, waits for both loops to exit, then releases
    /// the queue. Returns false if no session was running.
    pub async fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }

        let shared = self.shared;
        shared.cancel();
        shared.network_done.wait().await;
        shared.render_done.wait().await;
        shared.queue.close();
        self.running = false;

        let stats = shared.stats.snapshot();
        info!("session stopped: {}", stats);
        true
    }
}

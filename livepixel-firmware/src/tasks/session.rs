//! Live pixel session tasks
//!
//! The session's network and render loops each run on their own task. The
//! network task puts the transport back into the [`TransportSlot`] when the
//! loop returns so the next session can reuse the socket.
//!
//! The network loop reaches its task through a [`NetworkHandoff`] so a failed
//! spawn can give it back to the session.

use core::cell::RefCell;

use defmt::*;
use embassy_executor::Spawner;
use embassy_net::Stack;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;

use livepixel_core::pipeline::{NetworkLoop, RenderLoop};
use livepixel_core::{SessionHost, SpawnRejected, QUEUE_SLOTS};

use crate::channels::{Cs, UiStatus};
use crate::display::{Panel, SharedPanel};
use crate::net::WsTransport;

/// Holds the transport while no session is running
pub type TransportSlot = BlockingMutex<NoopRawMutex, RefCell<Option<WsTransport>>>;

type Network = NetworkLoop<'static, Cs, Panel, WsTransport, UiStatus, QUEUE_SLOTS>;
type Render = RenderLoop<'static, Cs, Panel, QUEUE_SLOTS>;

/// Carries the network loop from [`BoardHost`] to [`network_task`]
pub type NetworkHandoff = BlockingMutex<NoopRawMutex, RefCell<Option<Network>>>;

/// Network loop task
#[embassy_executor::task]
pub async fn network_task(handoff: &'static NetworkHandoff, slot: &'static TransportSlot) {
    let Some(task) = handoff.lock(|cell| cell.take()) else {
        warn!("network task spawned without a loop");
        return;
    };

    let transport = task.run().await;
    slot.lock(|cell| cell.replace(Some(transport)));
    debug!("transport returned");
}

/// Render loop task
#[embassy_executor::task]
pub async fn render_task(task: Render) {
    task.run().await;
}

/// Board glue handed to [`livepixel_core::Session::start`]
pub struct BoardHost {
    spawner: Spawner,
    stack: Stack<'static>,
    display: &'static SharedPanel,
    slot: &'static TransportSlot,
    handoff: &'static NetworkHandoff,
}

impl BoardHost {
    pub fn new(
        spawner: Spawner,
        stack: Stack<'static>,
        display: &'static SharedPanel,
        slot: &'static TransportSlot,
        handoff: &'static NetworkHandoff,
    ) -> Self {
        Self {
            spawner,
            stack,
            display,
            slot,
            handoff,
        }
    }
}

impl SessionHost<'static, Cs, QUEUE_SLOTS> for BoardHost {
    type Display = Panel;
    type Transport = WsTransport;
    type Status = UiStatus;

    fn display(&self) -> &'static SharedPanel {
        self.display
    }

    fn status(&self) -> UiStatus {
        UiStatus
    }

    fn link_up(&self) -> bool {
        self.stack.is_link_up()
    }

    fn take_transport(&mut self) -> Option<WsTransport> {
        self.slot.lock(|cell| cell.take())
    }

    fn spawn_network(&mut self, task: Network) -> Result<(), Network> {
        self.handoff.lock(|cell| cell.replace(Some(task)));
        match self.spawner.spawn(network_task(self.handoff, self.slot)) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("network task spawn failed: {}", e);
                match self.handoff.lock(|cell| cell.take()) {
                    Some(task) => Err(task),
                    // Nothing else takes from the handoff
                    None => Ok(()),
                }
            }
        }
    }

    fn return_transport(&mut self, transport: WsTransport) {
        self.slot.lock(|cell| cell.replace(Some(transport)));
    }

    fn spawn_render(&mut self, task: Render) -> Result<(), SpawnRejected> {
        self.spawner
            .spawn(render_task(task))
            .map_err(|_| SpawnRejected)
    }
}

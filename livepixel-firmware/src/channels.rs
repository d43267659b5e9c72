//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy tasks.
//! Uses embassy-sync primitives for safe async communication.

use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use livepixel_core::traits::{SessionStatus, StatusSink};
use livepixel_core::SessionShared;

/// Raw mutex used by every shared primitive on this board
pub type Cs = CriticalSectionRawMutex;

/// Channel capacity for status screen events
const UI_CHANNEL_SIZE: usize = 8;

/// Events shown on the status screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum UiEvent {
    /// Boot, waiting for the network
    Starting,
    /// Session stopped by the user
    Stopped,
    /// Reported by the running session
    Session(SessionStatus),
}

/// Status screen events
pub static UI_EVENTS: Channel<Cs, UiEvent, UI_CHANNEL_SIZE> = Channel::new();

/// Exit/start button pressed
pub static BUTTON_PRESSED: Signal<Cs, ()> = Signal::new();

/// Queue, connection flags and statistics for the live pixel session
pub static SESSION: SessionShared<Cs> = SessionShared::new();

/// Forwards session status to the status task
///
/// Never blocks; an event is dropped if the status task is behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct UiStatus;

impl StatusSink for UiStatus {
    fn notify(&self, status: SessionStatus) {
        if UI_EVENTS.try_send(UiEvent::Session(status)).is_err() {
            warn!("status event dropped: {}", status);
        }
    }
}

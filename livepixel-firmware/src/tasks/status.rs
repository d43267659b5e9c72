//! Status screen task
//!
//! Repaints the band below the canvas whenever a UI event arrives.

use defmt::*;

use crate::channels::UI_EVENTS;
use crate::display::{draw_status, status_lines, SharedPanel};

#[embassy_executor::task]
pub async fn status_task(display: &'static SharedPanel, retry_secs: u32) {
    info!("Status task started");

    loop {
        let event = UI_EVENTS.receive().await;
        debug!("status: {}", event);

        let lines = status_lines(&event, retry_secs);
        let mut panel = display.lock().await;
        if let Err(e) = draw_status(&mut *panel, &lines) {
            warn!("status draw failed: {}", e);
        }
    }
}

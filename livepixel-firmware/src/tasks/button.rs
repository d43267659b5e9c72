//! Exit/start button task
//!
//! Polls the B button and signals the controller on each debounced press.

use defmt::*;
use embassy_rp::gpio::Input;
use embassy_time::{Duration, Ticker};

use crate::channels::BUTTON_PRESSED;

/// Poll period
const POLL_MS: u64 = 10;

/// Level must be stable this long to count
const DEBOUNCE_MS: u64 = 30;

/// Button task - button is active low with a pull-up
#[embassy_executor::task]
pub async fn button_task(button: Input<'static>) {
    info!("Button task started");

    let mut ticker = Ticker::every(Duration::from_millis(POLL_MS));
    let threshold = DEBOUNCE_MS / POLL_MS;
    let mut stable_for: u64 = 0;
    let mut pressed = false;
    let mut last_level = button.is_low();

    loop {
        ticker.next().await;

        let level = button.is_low();
        if level != last_level {
            last_level = level;
            stable_for = 0;
            continue;
        }

        stable_for = stable_for.saturating_add(1);
        if stable_for < threshold || level == pressed {
            continue;
        }

        pressed = level;
        if pressed {
            debug!("button pressed");
            BUTTON_PRESSED.signal(());
        }
    }
}

//! Mode controller task
//!
//! Starts the live pixel session once the network is up, stops it when the
//! button is pressed and starts it again on the next press.

use defmt::*;
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};

use livepixel_core::config::SessionConfig;
use livepixel_core::{Session, SessionError};

use crate::channels::{UiEvent, BUTTON_PRESSED, SESSION, UI_EVENTS};
use crate::tasks::session::BoardHost;

/// How long the first start waits for a DHCP lease
const BOOT_NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

#[embassy_executor::task]
pub async fn controller_task(
    mut host: BoardHost,
    stack: Stack<'static>,
    config: &'static SessionConfig,
) {
    info!("Controller task started");
    UI_EVENTS.send(UiEvent::Starting).await;

    if with_timeout(BOOT_NETWORK_TIMEOUT, stack.wait_config_up())
        .await
        .is_err()
    {
        warn!("no network after {} s", BOOT_NETWORK_TIMEOUT.as_secs());
    }

    let mut session = Session::new(&SESSION);

    loop {
        BUTTON_PRESSED.reset();

        match session.start(&mut host, config).await {
            Ok(()) => {
                BUTTON_PRESSED.wait().await;
                info!("exit requested");
                session.stop().await;
                UI_EVENTS.send(UiEvent::Stopped).await;
            }
            Err(SessionError::LinkDown) => {
                // Status screen shows "WiFi down / Press B to exit"
                BUTTON_PRESSED.wait().await;
                UI_EVENTS.send(UiEvent::Stopped).await;
            }
            Err(e) => {
                error!("session start failed: {}", e);
                UI_EVENTS.send(UiEvent::Stopped).await;
            }
        }

        BUTTON_PRESSED.reset();
        BUTTON_PRESSED.wait().await;
        info!("restarting live pixel");
    }
}

//! WiFi tasks
//!
//! - `cyw43_task` drives the radio
//! - `net_task` drives the embassy-net stack
//! - `wifi_task` joins the configured network and rejoins after a drop

use cyw43::JoinOptions;
use cyw43_pio::PioSpi;
use defmt::*;
use embassy_net::Stack;
use embassy_rp::gpio::Output;
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_time::{Duration, Timer};

use livepixel_core::config::WifiConfig;

/// Delay between failed join attempts
const JOIN_RETRY: Duration = Duration::from_secs(5);

#[embassy_executor::task]
pub async fn cyw43_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
pub async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

/// Join task - keeps the board on the configured network
#[embassy_executor::task]
pub async fn wifi_task(
    mut control: cyw43::Control<'static>,
    stack: Stack<'static>,
    wifi: &'static WifiConfig,
) -> ! {
    info!("WiFi task started");

    loop {
        let options = if wifi.password.is_empty() {
            JoinOptions::new_open()
        } else {
            JoinOptions::new(wifi.password.as_bytes())
        };

        match control.join(&wifi.ssid, options).await {
            Ok(()) => {
                info!("joined {}", wifi.ssid.as_str());
                stack.wait_config_up().await;
                if let Some(config) = stack.config_v4() {
                    info!("DHCP address {}", config.address);
                }

                stack.wait_link_down().await;
                warn!("WiFi link lost, rejoining");
            }
            Err(e) => {
                warn!("join failed with status {}", e.status);
                Timer::after(JOIN_RETRY).await;
            }
        }
    }
}

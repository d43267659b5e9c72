//! Live Pixel - networked pixel canvas firmware
//!
//! Main firmware binary for the Raspberry Pi Pico W with a 128x160 ST7735
//! panel. Joins WiFi, connects to the pixel server over a WebSocket and
//! paints the shared canvas as updates stream in.
//!
//! Pin assignments:
//! - ST7735 on SPI1: SCK GPIO10, MOSI GPIO11, CS GPIO9, DC GPIO8, RST GPIO12
//! - B button (exit/start): GPIO15, active low
//! - CYW43: PWR GPIO23, DIO GPIO24, CS GPIO25, CLK GPIO29 (PIO0)

#![no_std]
#![no_main]

use core::cell::RefCell;

use cyw43_pio::{PioSpi, DEFAULT_CLOCK_DIVIDER};
use defmt::*;
use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_rp::bind_interrupts;
use embassy_rp::clocks::RoscRng;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{InterruptHandler as PioInterruptHandler, Pio};
use embassy_rp::spi::{Config as SpiConfig, Spi};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use rand_core::RngCore;
use static_cell::{ConstStaticCell, StaticCell};
use {defmt_rtt as _, panic_probe as _};

use livepixel_core::config::{parse_config, DeviceConfig, SessionConfig, WifiConfig};
use livepixel_core::traits::PixelDisplay;
use livepixel_protocol::{Color565, Endpoint};

use crate::display::{SharedPanel, St7735};
use crate::net::{WsBuffers, WsTransport};
use crate::tasks::{BoardHost, NetworkHandoff, TransportSlot};

/// Embedded configuration (compiled into firmware)
/// Edit livepixel.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../livepixel.toml");

/// Server used when the embedded configuration is broken
const FALLBACK_URL: &str = "ws://192.168.1.208:8080/ws";

/// ST7735 SPI clock
const PANEL_SPI_HZ: u32 = 32_000_000;

mod channels;
mod display;
mod net;
mod tasks;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
});

// Static cells for state that tasks reference forever
static DEVICE_CONFIG: StaticCell<DeviceConfig> = StaticCell::new();
static DISPLAY: StaticCell<SharedPanel> = StaticCell::new();
static CYW43_STATE: StaticCell<cyw43::State> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static TRANSPORT: StaticCell<TransportSlot> = StaticCell::new();
static NETWORK_HANDOFF: StaticCell<NetworkHandoff> = StaticCell::new();

// Too large to build on the stack
static WS_BUFFERS: ConstStaticCell<WsBuffers> = ConstStaticCell::new(WsBuffers::new());

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Live pixel firmware starting...");

    // Initialize RP2040 peripherals
    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config: &'static DeviceConfig = DEVICE_CONFIG.init(load_config());
    info!(
        "Configuration loaded: {}x{} canvas, queue {}",
        config.session.canvas.dim.cells(),
        config.session.canvas.dim.cells(),
        config.session.pipeline.queue_capacity
    );

    // Setup SPI1 for the ST7735 panel
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = PANEL_SPI_HZ;
    let spi = Spi::new_blocking_txonly(p.SPI1, p.PIN_10, p.PIN_11, spi_config);
    let dc = Output::new(p.PIN_8, Level::Low);
    let cs = Output::new(p.PIN_9, Level::High);
    let mut rst = Output::new(p.PIN_12, Level::High);

    let mut panel = St7735::new(spi, dc, cs);
    if let Err(e) = panel.init(&mut rst).await {
        error!("Failed to initialize display: {}", e);
    } else if let Err(e) = panel.fill_screen(Color565::BLACK) {
        warn!("Failed to clear display: {}", e);
    } else {
        info!("ST7735 initialized");
    }
    let display: &'static SharedPanel = DISPLAY.init(Mutex::new(panel));

    // Setup CYW43 WiFi over PIO0
    let fw = include_bytes!("../cyw43-firmware/43439A0.bin");
    let clm = include_bytes!("../cyw43-firmware/43439A0_clm.bin");

    let pwr = Output::new(p.PIN_23, Level::Low);
    let wifi_cs = Output::new(p.PIN_25, Level::High);
    let mut pio = Pio::new(p.PIO0, Irqs);
    let wifi_spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        wifi_cs,
        p.PIN_24,
        p.PIN_29,
        p.DMA_CH0,
    );

    let state = CYW43_STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, wifi_spi, fw).await;
    spawner.spawn(tasks::cyw43_task(runner)).unwrap();

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;
    info!("CYW43 initialized");

    // Network stack with DHCP
    let seed = RoscRng.next_u64();
    let (stack, net_runner) = embassy_net::new(
        net_device,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(tasks::net_task(net_runner)).unwrap();

    let transport = WsTransport::new(stack, WS_BUFFERS.take());
    let slot: &'static TransportSlot =
        TRANSPORT.init(BlockingMutex::new(RefCell::new(Some(transport))));

    // B button for exit/start
    let button = Input::new(p.PIN_15, Pull::Up);

    let wifi: &'static WifiConfig = &config.wifi;
    let session: &'static SessionConfig = &config.session;
    let handoff: &'static NetworkHandoff =
        NETWORK_HANDOFF.init(BlockingMutex::new(RefCell::new(None)));
    let host = BoardHost::new(spawner, stack, display, slot, handoff);

    // Spawn tasks
    spawner
        .spawn(tasks::wifi_task(control, stack, wifi))
        .unwrap();
    spawner
        .spawn(tasks::status_task(
            display,
            session.pipeline.reconnect_interval_secs(),
        ))
        .unwrap();
    spawner.spawn(tasks::button_task(button)).unwrap();
    spawner
        .spawn(tasks::controller_task(host, stack, session))
        .unwrap();

    info!("All tasks spawned, firmware running");

    // Main task has nothing else to do - all work happens in spawned tasks
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Parse the livepixel.toml file that was embedded at compile time
fn load_config() -> DeviceConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Parsed embedded configuration successfully");
            config
        }
        Err(e) => {
            // build.rs validates the file, so this only happens if the two
            // validators disagree
            error!("Failed to parse embedded config: {}", e);
            error!("Using fallback configuration");
            create_fallback_config()
        }
    }
}

/// Default settings with the stock server address and no WiFi credentials
fn create_fallback_config() -> DeviceConfig {
    let endpoint = unwrap!(Endpoint::parse(FALLBACK_URL));

    DeviceConfig {
        wifi: WifiConfig::default(),
        session: SessionConfig {
            endpoint,
            canvas: Default::default(),
            pipeline: Default::default(),
        },
    }
}

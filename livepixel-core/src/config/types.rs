//! Configuration type definitions

use heapless::String;
use livepixel_protocol::{CanvasDim, Color565, Endpoint};

/// Maximum WiFi SSID length
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WiFi passphrase length
pub const MAX_PASSWORD_LEN: usize = 64;

/// Smallest queue a configuration may ask for
pub const MIN_QUEUE_CAPACITY: usize = 256;

/// WiFi credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiConfig {
    pub ssid: String<MAX_SSID_LEN>,
    pub password: String<MAX_PASSWORD_LEN>,
}

/// Canvas layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanvasConfig {
    /// Logical cells per side (32 or 64)
    pub dim: CanvasDim,
    /// Physical side length of the canvas area in pixels
    pub size_px: u16,
    /// Color used by clear and on connect
    pub background: Color565,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            dim: CanvasDim::D32,
            size_px: 128,
            background: Color565::WHITE,
        }
    }
}

/// Pipeline tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineConfig {
    /// Usable queue slots (MIN_QUEUE_CAPACITY..=QUEUE_SLOTS)
    pub queue_capacity: usize,
    /// Minimum time between connection attempts
    pub reconnect_interval_ms: u32,
    /// Batches larger than this are drawn directly by the network loop
    pub direct_draw_threshold: usize,
    /// Updates drained per render pass
    pub render_batch: usize,
    /// Continuous render work before a voluntary yield
    pub yield_interval_ms: u32,
    /// Network loop poll period
    pub poll_interval_ms: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            reconnect_interval_ms: 5000,
            direct_draw_threshold: 50,
            render_batch: 32,
            yield_interval_ms: 50,
            poll_interval_ms: 100,
        }
    }
}

impl PipelineConfig {
    /// Reconnect interval in whole seconds, rounded up, for status text
    pub const fn reconnect_interval_secs(&self) -> u32 {
        self.reconnect_interval_ms.div_ceil(1000)
    }
}

/// Everything a session needs; immutable while it runs
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionConfig {
    pub endpoint: Endpoint,
    pub canvas: CanvasConfig,
    pub pipeline: PipelineConfig,
}

/// Complete device configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub wifi: WifiConfig,
    pub session: SessionConfig,
}

//! ST7735 panel and status screen
//!
//! The panel is shared between the render loop, the network loop (direct
//! draws, canvas resets) and the status task through one async mutex.

pub mod st7735;
pub mod status;

use embassy_rp::gpio::Output;
use embassy_rp::peripherals::SPI1;
use embassy_rp::spi::{Blocking, Spi};
use embassy_sync::mutex::Mutex;

pub use st7735::St7735;
pub use status::{draw_status, status_lines};

use crate::channels::Cs;

/// The board's panel: ST7735 on SPI1
pub type Panel = St7735<Spi<'static, SPI1, Blocking>, Output<'static>>;

/// Panel shared by all tasks
pub type SharedPanel = Mutex<Cs, Panel>;

//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod button;
pub mod controller;
pub mod session;
pub mod status;
pub mod wifi;

pub use button::button_task;
pub use controller::controller_task;
pub use session::{network_task, render_task, BoardHost, NetworkHandoff, TransportSlot};
pub use status::status_task;
pub use wifi::{cyw43_task, net_task, wifi_task};

//! Status screen rendering
//!
//! Builds the two status lines shown below the canvas for each UI event.
//! The canvas itself is never touched here.

use core::fmt::Write;

use heapless::String;
use livepixel_core::traits::{DisplayError, DisplayExt, PixelDisplay, SessionStatus};
use livepixel_protocol::Color565;

use crate::channels::UiEvent;

/// Top of the status band (first row below a 128 px canvas)
pub const BAND_TOP: u16 = 128;

/// Height of the status band
pub const BAND_HEIGHT: u16 = 32;

/// Baselines of the two status lines, matching the classic layout
const LINE_1_Y: u16 = 135;
const LINE_2_Y: u16 = 145;

const TEXT_SCALE: u8 = 1;

/// One line of status text
pub struct StatusLine {
    pub text: String<24>,
    pub color: Color565,
}

impl StatusLine {
    fn new(text: &str, color: Color565) -> Self {
        let mut line = String::new();
        for ch in text.chars() {
            if line.push(ch).is_err() {
                break;
            }
        }
        Self { text: line, color }
    }

    fn retry(secs: u32) -> Self {
        let mut text = String::new();
        let _ = write!(text, "Retrying in {}s...", secs);
        Self {
            text,
            color: Color565::WHITE,
        }
    }

    fn ip(ip: Option<[u8; 4]>) -> Self {
        let mut text = String::new();
        match ip {
            Some([a, b, c, d]) => {
                let _ = write!(text, "IP: {}.{}.{}.{}", a, b, c, d);
            }
            None => {
                let _ = text.push_str("IP: -");
            }
        }
        Self {
            text,
            color: Color565::WHITE,
        }
    }
}

/// Status text for an event
///
/// `retry_secs` is the reconnect interval shown after a failed attempt.
pub fn status_lines(event: &UiEvent, retry_secs: u32) -> [StatusLine; 2] {
    match event {
        UiEvent::Starting => [
            StatusLine::new("Starting...", Color565::WHITE),
            StatusLine::new("", Color565::WHITE),
        ],
        UiEvent::Stopped => [
            StatusLine::new("Live pixel stopped", Color565::WHITE),
            StatusLine::new("Press B to start", Color565::WHITE),
        ],
        UiEvent::Session(status) => match *status {
            SessionStatus::Connecting { ip } => [
                StatusLine::ip(ip),
                StatusLine::new("Connect server...", Color565::WHITE),
            ],
            SessionStatus::Connected { ip } => [
                StatusLine::new("Connected!", Color565::GREEN),
                StatusLine::ip(ip),
            ],
            SessionStatus::ConnectFailed => [
                StatusLine::new("Connect failed", Color565::RED),
                StatusLine::retry(retry_secs),
            ],
            SessionStatus::Disconnected => [
                StatusLine::new("Disconnected", Color565::RED),
                StatusLine::new("Reconnecting...", Color565::WHITE),
            ],
            SessionStatus::LinkDown => [
                StatusLine::new("WiFi down", Color565::RED),
                StatusLine::new("Press B to exit", Color565::WHITE),
            ],
        },
    }
}

/// Repaint the status band
pub fn draw_status<D: PixelDisplay>(
    display: &mut D,
    lines: &[StatusLine; 2],
) -> Result<(), DisplayError> {
    display.clear_band(BAND_TOP, BAND_HEIGHT, Color565::BLACK)?;
    for (line, y) in lines.iter().zip([LINE_1_Y, LINE_2_Y]) {
        if !line.text.is_empty() {
            display.draw_centered_text(y, &line.text, line.color, TEXT_SCALE)?;
        }
    }
    Ok(())
}

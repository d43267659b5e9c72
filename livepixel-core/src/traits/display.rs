//! Display driver trait

use livepixel_protocol::Color565;

/// Errors reported by a display driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// SPI/bus transfer failed
    Bus,
    /// Rectangle lies outside the panel
    OutOfBounds,
}

/// Minimal drawing contract the pipeline needs from a panel
///
/// Coordinates are physical pixels with the origin at the top-left corner.
pub trait PixelDisplay {
    /// Panel size as (width, height)
    fn size(&self) -> (u16, u16);

    /// Fill a rectangle with a solid color
    fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: Color565,
    ) -> Result<(), DisplayError>;

    /// Fill the whole panel
    fn fill_screen(&mut self, color: Color565) -> Result<(), DisplayError> {
        let (width, height) = self.size();
        self.fill_rect(0, 0, width, height, color)
    }

    /// Draw a line of text with its top-left corner at (x, y)
    ///
    /// `scale` multiplies the base glyph size.
    fn draw_text(
        &mut self,
        x: u16,
        y: u16,
        text: &str,
        color: Color565,
        scale: u8,
    ) -> Result<(), DisplayError>;

    /// Width in pixels of `text` at `scale`
    fn text_width(&self, text: &str, scale: u8) -> u16;
}

/// Helpers for status text
pub trait DisplayExt: PixelDisplay {
    /// Draw `text` horizontally centered on row `y`
    fn draw_centered_text(
        &mut self,
        y: u16,
        text: &str,
        color: Color565,
        scale: u8,
    ) -> Result<(), DisplayError> {
        let (width, _) = self.size();
        let text_width = self.text_width(text, scale);
        let x = width.saturating_sub(text_width) / 2;
        self.draw_text(x, y, text, color, scale)
    }

    /// Blank a horizontal band of the panel
    fn clear_band(&mut self, y: u16, height: u16, color: Color565) -> Result<(), DisplayError> {
        let (width, panel_height) = self.size();
        if y >= panel_height {
            return Err(DisplayError::OutOfBounds);
        }
        self.fill_rect(0, y, width, height.min(panel_height - y), color)
    }
}

// Blanket implementation for all PixelDisplay types
impl<T: PixelDisplay> DisplayExt for T {}

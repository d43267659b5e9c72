//! ST7735 TFT Display Driver
//!
//! Driver for 128x160 ST7735 (black tab) panels over a write-only SPI bus,
//! RGB565 pixel format, portrait orientation. Drawing goes straight to the
//! panel RAM; there is no frame buffer.

use embassy_time::Timer;
use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_graphics::text::{Baseline, Text};
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use livepixel_core::traits::{DisplayError, PixelDisplay};
use livepixel_protocol::Color565;

/// Panel dimensions in portrait orientation
pub const WIDTH: u16 = 128;
pub const HEIGHT: u16 = 160;

/// Pixels streamed per SPI write during fills
const FILL_CHUNK_PIXELS: usize = 32;

/// ST7735 commands
#[allow(dead_code)]
mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const NORON: u8 = 0x13;
    pub const INVOFF: u8 = 0x20;
    pub const DISPOFF: u8 = 0x28;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A;
    pub const RASET: u8 = 0x2B;
    pub const RAMWR: u8 = 0x2C;
    pub const MADCTL: u8 = 0x36;
    pub const COLMOD: u8 = 0x3A;
    pub const FRMCTR1: u8 = 0xB1;
    pub const FRMCTR2: u8 = 0xB2;
    pub const FRMCTR3: u8 = 0xB3;
    pub const INVCTR: u8 = 0xB4;
    pub const PWCTR1: u8 = 0xC0;
    pub const PWCTR2: u8 = 0xC1;
    pub const PWCTR3: u8 = 0xC2;
    pub const PWCTR4: u8 = 0xC3;
    pub const PWCTR5: u8 = 0xC4;
    pub const VMCTR1: u8 = 0xC5;
    pub const GMCTRP1: u8 = 0xE0;
    pub const GMCTRN1: u8 = 0xE1;
}

/// Row/column address order for portrait, black tab
const MADCTL_PORTRAIT: u8 = 0xC0;

/// 16 bits per pixel
const COLMOD_RGB565: u8 = 0x05;

/// ST7735 TFT driver
pub struct St7735<SPI, PIN> {
    spi: SPI,
    /// Data/command select (low = command)
    dc: PIN,
    /// Chip select (active low)
    cs: PIN,
}

impl<SPI, PIN> St7735<SPI, PIN>
where
    SPI: SpiBus,
    PIN: OutputPin,
{
    /// Create a new ST7735 driver
    pub fn new(spi: SPI, dc: PIN, cs: PIN) -> Self {
        Self { spi, dc, cs }
    }

    /// Reset and initialize the panel
    pub async fn init(&mut self, rst: &mut PIN) -> Result<(), DisplayError> {
        rst.set_low().map_err(|_| DisplayError::Bus)?;
        Timer::after_millis(10).await;
        rst.set_high().map_err(|_| DisplayError::Bus)?;
        Timer::after_millis(120).await;

        self.command(cmd::SWRESET, &[])?;
        Timer::after_millis(150).await;
        self.command(cmd::SLPOUT, &[])?;
        Timer::after_millis(255).await;

        // Frame rate and power settings for black tab panels
        let init_cmds: &[(u8, &[u8])] = &[
            (cmd::FRMCTR1, &[0x01, 0x2C, 0x2D]),
            (cmd::FRMCTR2, &[0x01, 0x2C, 0x2D]),
            (cmd::FRMCTR3, &[0x01, 0x2C, 0x2D, 0x01, 0x2C, 0x2D]),
            (cmd::INVCTR, &[0x07]),
            (cmd::PWCTR1, &[0xA2, 0x02, 0x84]),
            (cmd::PWCTR2, &[0xC5]),
            (cmd::PWCTR3, &[0x0A, 0x00]),
            (cmd::PWCTR4, &[0x8A, 0x2A]),
            (cmd::PWCTR5, &[0x8A, 0xEE]),
            (cmd::VMCTR1, &[0x0E]),
            (cmd::INVOFF, &[]),
            (cmd::MADCTL, &[MADCTL_PORTRAIT]),
            (cmd::COLMOD, &[COLMOD_RGB565]),
            (
                cmd::GMCTRP1,
                &[
                    0x02, 0x1C, 0x07, 0x12, 0x37, 0x32, 0x29, 0x2D, 0x29, 0x25, 0x2B, 0x39, 0x00,
                    0x01, 0x03, 0x10,
                ],
            ),
            (
                cmd::GMCTRN1,
                &[
                    0x03, 0x1D, 0x07, 0x06, 0x2E, 0x2C, 0x29, 0x2D, 0x2E, 0x2E, 0x37, 0x3F, 0x00,
                    0x00, 0x02, 0x10,
                ],
            ),
        ];

        for &(c, params) in init_cmds {
            self.command(c, params)?;
        }

        self.command(cmd::NORON, &[])?;
        Timer::after_millis(10).await;
        self.command(cmd::DISPON, &[])?;
        Timer::after_millis(100).await;

        Ok(())
    }

    /// Send a command byte followed by its parameters
    fn command(&mut self, command: u8, params: &[u8]) -> Result<(), DisplayError> {
        self.cs.set_low().map_err(|_| DisplayError::Bus)?;
        let result = self.write_command(command, params);
        self.cs.set_high().map_err(|_| DisplayError::Bus)?;
        result
    }

    fn write_command(&mut self, command: u8, params: &[u8]) -> Result<(), DisplayError> {
        self.dc.set_low().map_err(|_| DisplayError::Bus)?;
        self.spi.write(&[command]).map_err(|_| DisplayError::Bus)?;
        if !params.is_empty() {
            self.dc.set_high().map_err(|_| DisplayError::Bus)?;
            self.spi.write(params).map_err(|_| DisplayError::Bus)?;
        }
        self.spi.flush().map_err(|_| DisplayError::Bus)
    }

    /// Set the RAM window for the next pixel write (inclusive bounds)
    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), DisplayError> {
        let [x0h, x0l] = x0.to_be_bytes();
        let [x1h, x1l] = x1.to_be_bytes();
        let [y0h, y0l] = y0.to_be_bytes();
        let [y1h, y1l] = y1.to_be_bytes();
        self.command(cmd::CASET, &[x0h, x0l, x1h, x1l])?;
        self.command(cmd::RASET, &[y0h, y0l, y1h, y1l])
    }

    /// Stream `count` pixels of one color into the current window
    fn write_repeated(&mut self, color: u16, count: usize) -> Result<(), DisplayError> {
        let [hi, lo] = color.to_be_bytes();
        let mut chunk = [0u8; FILL_CHUNK_PIXELS * 2];
        for pair in chunk.chunks_exact_mut(2) {
            pair[0] = hi;
            pair[1] = lo;
        }

        self.cs.set_low().map_err(|_| DisplayError::Bus)?;
        let result = self.stream(&chunk, count);
        self.cs.set_high().map_err(|_| DisplayError::Bus)?;
        result
    }

    fn stream(&mut self, chunk: &[u8], count: usize) -> Result<(), DisplayError> {
        self.dc.set_low().map_err(|_| DisplayError::Bus)?;
        self.spi.write(&[cmd::RAMWR]).map_err(|_| DisplayError::Bus)?;
        self.dc.set_high().map_err(|_| DisplayError::Bus)?;

        let mut remaining = count;
        while remaining > 0 {
            let pixels = remaining.min(FILL_CHUNK_PIXELS);
            self.spi
                .write(&chunk[..pixels * 2])
                .map_err(|_| DisplayError::Bus)?;
            remaining -= pixels;
        }
        self.spi.flush().map_err(|_| DisplayError::Bus)
    }

    /// Turn display on/off
    #[allow(dead_code)]
    pub fn set_display_on(&mut self, on: bool) -> Result<(), DisplayError> {
        if on {
            self.command(cmd::DISPON, &[])
        } else {
            self.command(cmd::DISPOFF, &[])
        }
    }
}

fn font_for(scale: u8) -> &'static MonoFont<'static> {
    if scale >= 2 {
        &FONT_10X20
    } else {
        &FONT_6X10
    }
}

impl<SPI, PIN> PixelDisplay for St7735<SPI, PIN>
where
    SPI: SpiBus,
    PIN: OutputPin,
{
    fn size(&self) -> (u16, u16) {
        (WIDTH, HEIGHT)
    }

    fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: Color565,
    ) -> Result<(), DisplayError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        if x >= WIDTH || y >= HEIGHT {
            return Err(DisplayError::OutOfBounds);
        }

        let width = width.min(WIDTH - x);
        let height = height.min(HEIGHT - y);
        self.set_window(x, y, x + width - 1, y + height - 1)?;
        self.write_repeated(color.raw(), width as usize * height as usize)
    }

    fn draw_text(
        &mut self,
        x: u16,
        y: u16,
        text: &str,
        color: Color565,
        scale: u8,
    ) -> Result<(), DisplayError> {
        let style = MonoTextStyle::new(font_for(scale), Rgb565::from(RawU16::new(color.raw())));
        Text::with_baseline(text, Point::new(x as i32, y as i32), style, Baseline::Top)
            .draw(self)?;
        Ok(())
    }

    fn text_width(&self, text: &str, scale: u8) -> u16 {
        let font = font_for(scale);
        let advance = font.character_size.width + font.character_spacing;
        (text.chars().count() as u32 * advance).min(u16::MAX as u32) as u16
    }
}

impl<SPI, PIN> OriginDimensions for St7735<SPI, PIN> {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

/// embedded-graphics target, used for text rendering
impl<SPI, PIN> DrawTarget for St7735<SPI, PIN>
where
    SPI: SpiBus,
    PIN: OutputPin,
{
    type Color = Rgb565;
    type Error = DisplayError;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 || point.x >= WIDTH as i32 || point.y >= HEIGHT as i32 {
                continue;
            }
            let color = Color565(color.into_storage());
            PixelDisplay::fill_rect(self, point.x as u16, point.y as u16, 1, 1, color)?;
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        let Some(bottom_right) = area.bottom_right() else {
            return Ok(());
        };
        let color = Color565(color.into_storage());
        self.set_window(
            area.top_left.x as u16,
            area.top_left.y as u16,
            bottom_right.x as u16,
            bottom_right.y as u16,
        )?;
        self.write_repeated(color.raw(), area.size.width as usize * area.size.height as usize)
    }
}

//! Pixel primitives shared by every message format
//!
//! A pixel on the wire is a comma-separated triple `x,y,color` where the
//! coordinates are decimal integers and the color is a 16-bit RGB565 value
//! written in hex.

use heapless::Vec;

use crate::message::ParseError;

/// Maximum pixels carried by one batched message (`chunk;` / `compressed;`)
///
/// Senders split larger edits into several chunks, so this only has to cover
/// a single chunk. Pixels beyond the capacity are counted as overflow and
/// dropped.
pub const MAX_BATCH_PIXELS: usize = 64;

/// Logical canvas dimension (cells per side)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanvasDim {
    /// 32×32 cells
    D32,
    /// 64×64 cells
    D64,
}

impl CanvasDim {
    /// Look up a dimension from its cell count
    pub const fn from_cells(cells: u16) -> Option<Self> {
        match cells {
            32 => Some(CanvasDim::D32),
            64 => Some(CanvasDim::D64),
            _ => None,
        }
    }

    /// Cells per side
    pub const fn cells(self) -> u16 {
        match self {
            CanvasDim::D32 => 32,
            CanvasDim::D64 => 64,
        }
    }

    /// Total number of cells on the canvas
    pub const fn area(self) -> usize {
        let cells = self.cells() as usize;
        cells * cells
    }

    /// Check whether signed wire coordinates fall inside the canvas
    pub fn contains(self, x: i32, y: i32) -> bool {
        let cells = self.cells() as i32;
        (0..cells).contains(&x) && (0..cells).contains(&y)
    }
}

/// 16-bit packed RGB565 color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Color565(pub u16);

impl Color565 {
    pub const BLACK: Self = Self(0x0000);
    pub const WHITE: Self = Self(0xFFFF);
    pub const RED: Self = Self(0xF800);
    pub const GREEN: Self = Self(0x07E0);
    pub const BLUE: Self = Self(0x001F);

    /// Raw 16-bit value
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Parse a hex color (`FFFF`, `0xffff` or `#ffff`, 1-4 digits)
    pub fn from_hex(text: &str) -> Option<Self> {
        let text = text.trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .or_else(|| text.strip_prefix('#'))
            .unwrap_or(text);

        if digits.is_empty() || digits.len() > 4 {
            return None;
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        u16::from_str_radix(digits, 16).ok().map(Color565)
    }
}

/// A single cell write on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PixelUpdate {
    /// Column (0..CANVAS_DIM)
    pub x: u8,
    /// Row (0..CANVAS_DIM)
    pub y: u8,
    /// Cell color
    pub color: Color565,
}

impl PixelUpdate {
    /// Create an update without bounds checking
    pub const fn new(x: u8, y: u8, color: Color565) -> Self {
        Self { x, y, color }
    }

    /// Parse an `x,y,color` triple and check it against the canvas
    pub fn parse(text: &str, dim: CanvasDim) -> Result<Self, ParseError> {
        let (x, y, color) = parse_triple(text).ok_or(ParseError::MalformedPixel)?;

        if !dim.contains(x, y) {
            return Err(ParseError::OutOfBounds);
        }

        // contains() bounds both to < 64
        Ok(Self::new(x as u8, y as u8, color))
    }
}

/// Split a raw `x,y,color` triple into signed coordinates and a color
pub(crate) fn parse_triple(text: &str) -> Option<(i32, i32, Color565)> {
    let mut parts = text.trim().split(',');
    let x = parts.next()?.trim().parse::<i32>().ok()?;
    let y = parts.next()?.trim().parse::<i32>().ok()?;
    let color = Color565::from_hex(parts.next()?)?;

    if parts.next().is_some() {
        return None;
    }

    Some((x, y, color))
}

/// Bounded, ordered batch of pixel updates from one message
///
/// Malformed and out-of-bounds triples are skipped and counted. Triples past
/// the capacity `N` are counted as overflow and dropped; the batch never grows
/// past `N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<const N: usize = MAX_BATCH_PIXELS> {
    pixels: Vec<PixelUpdate, N>,
    malformed: u16,
    out_of_bounds: u16,
    overflow: u16,
}

impl<const N: usize> Default for Batch<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Batch<N> {
    /// Create an empty batch
    pub const fn new() -> Self {
        Self {
            pixels: Vec::new(),
            malformed: 0,
            out_of_bounds: 0,
            overflow: 0,
        }
    }

    /// Parse `;`-separated triples into a batch
    pub fn from_triples(body: &str, dim: CanvasDim) -> Self {
        let mut batch = Self::new();

        for triple in body.split(';') {
            if triple.trim().is_empty() {
                continue;
            }
            match PixelUpdate::parse(triple, dim) {
                Ok(update) => {
                    batch.push(update);
                }
                Err(ParseError::OutOfBounds) => {
                    batch.out_of_bounds = batch.out_of_bounds.saturating_add(1);
                }
                Err(_) => {
                    batch.malformed = batch.malformed.saturating_add(1);
                }
            }
        }

        batch
    }

    /// Append an update, returning false when the batch is full
    pub fn push(&mut self, update: PixelUpdate) -> bool {
        if self.pixels.push(update).is_err() {
            self.overflow = self.overflow.saturating_add(1);
            return false;
        }
        true
    }

    /// Updates in arrival order
    pub fn as_slice(&self) -> &[PixelUpdate] {
        &self.pixels
    }

    /// Number of accepted updates
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// True if no update was accepted
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Batch capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Triples that failed to parse
    pub fn malformed(&self) -> u16 {
        self.malformed
    }

    /// Triples with coordinates outside the canvas
    pub fn out_of_bounds(&self) -> u16 {
        self.out_of_bounds
    }

    /// Valid triples dropped because the batch was full
    pub fn overflow(&self) -> u16 {
        self.overflow
    }
}

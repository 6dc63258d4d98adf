//! Shared types for the display pipeline.
//!
//! Backend-side views ([`FrameBuffer`], [`CursorShape`]) borrow memory the
//! backend owns and live for one callback. [`CanonicalImage`] is the
//! normalized output handed to the outward channel.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

// ── PixelWidth ───────────────────────────────────────────────────

/// Byte width of one raw backend pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelWidth {
    One,
    Two,
    Four,
}

impl PixelWidth {
    /// Map a byte count onto a supported width.
    pub fn from_bytes(bytes: u32) -> Result<Self, BridgeError> {
        match bytes {
            1 => Ok(PixelWidth::One),
            2 => Ok(PixelWidth::Two),
            4 => Ok(PixelWidth::Four),
            _ => Err(BridgeError::InvalidPixelFormat(
                "bytes per pixel must be 1, 2 or 4",
            )),
        }
    }

    pub const fn bytes(self) -> usize {
        match self {
            PixelWidth::One => 1,
            PixelWidth::Two => 2,
            PixelWidth::Four => 4,
        }
    }
}

// ── PixelFormat ──────────────────────────────────────────────────

/// Channel layout negotiated with the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian: bool,
    pub red_shift: u8,
    pub red_max: u16,
    pub green_shift: u8,
    pub green_max: u16,
    pub blue_shift: u8,
    pub blue_max: u16,
}

impl PixelFormat {
    /// 8 bits per pixel, blue in the top two bits.
    pub const BGR233: PixelFormat = PixelFormat {
        bits_per_pixel: 8,
        depth: 8,
        big_endian: false,
        red_shift: 0,
        red_max: 7,
        green_shift: 3,
        green_max: 7,
        blue_shift: 6,
        blue_max: 3,
    };

    /// 16 bits per pixel, 5-6-5.
    pub const RGB565: PixelFormat = PixelFormat {
        bits_per_pixel: 16,
        depth: 16,
        big_endian: false,
        red_shift: 11,
        red_max: 0x1f,
        green_shift: 5,
        green_max: 0x3f,
        blue_shift: 0,
        blue_max: 0x1f,
    };

    /// 32 bits per pixel, 8 bits per channel, top byte unused.
    pub const RGB888: PixelFormat = PixelFormat {
        bits_per_pixel: 32,
        depth: 24,
        big_endian: false,
        red_shift: 16,
        red_max: 0xff,
        green_shift: 8,
        green_max: 0xff,
        blue_shift: 0,
        blue_max: 0xff,
    };

    /// The format requested from the backend for a configured color depth.
    ///
    /// Anything other than 8 or 16 gets the 32-bit true-color layout.
    pub const fn for_color_depth(depth: u8) -> PixelFormat {
        match depth {
            8 => Self::BGR233,
            16 => Self::RGB565,
            _ => Self::RGB888,
        }
    }

    /// Read width derived from `bits_per_pixel`.
    pub fn pixel_width(&self) -> Result<PixelWidth, BridgeError> {
        PixelWidth::from_bytes(self.bits_per_pixel as u32 / 8)
    }

    /// Check that every channel is `2^n - 1` wide and fits in the pixel.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if !matches!(self.bits_per_pixel, 8 | 16 | 32) {
            return Err(BridgeError::InvalidPixelFormat(
                "bits per pixel must be 8, 16 or 32",
            ));
        }
        if self.depth > self.bits_per_pixel {
            return Err(BridgeError::InvalidPixelFormat("depth exceeds bits per pixel"));
        }
        for (shift, max) in [
            (self.red_shift, self.red_max),
            (self.green_shift, self.green_max),
            (self.blue_shift, self.blue_max),
        ] {
            let span = max as u32 + 1;
            if max == 0 || !span.is_power_of_two() {
                return Err(BridgeError::InvalidPixelFormat(
                    "channel max must be 2^n - 1",
                ));
            }
            if shift as u32 + span.trailing_zeros() > self.bits_per_pixel as u32 {
                return Err(BridgeError::InvalidPixelFormat(
                    "channel does not fit in pixel",
                ));
            }
        }
        Ok(())
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::RGB888
    }
}

// ── Rect ─────────────────────────────────────────────────────────

/// A rectangle in framebuffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rectangle lies inside a `width × height` surface.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let right = self.x as u64 + self.width as u64;
        let bottom = self.y as u64 + self.height as u64;
        right <= width as u64 && bottom <= height as u64
    }
}

/// Top-left corner a copied rectangle lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

// ── FrameBuffer ──────────────────────────────────────────────────

/// Read-only view of the backend's framebuffer.
///
/// Rows are packed: stride is `bytes_per_pixel * width`.
#[derive(Debug, Clone, Copy)]
pub struct FrameBuffer<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl<'a> FrameBuffer<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// Row pitch in bytes.
    pub fn stride(&self) -> Result<usize, BridgeError> {
        Ok(self.format.pixel_width()?.bytes() * self.width as usize)
    }

    /// Fail unless `rect` lies inside the framebuffer.
    pub fn check_region(&self, rect: &Rect) -> Result<(), BridgeError> {
        if rect.fits_within(self.width, self.height) {
            Ok(())
        } else {
            Err(BridgeError::RegionOutOfBounds {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                fb_width: self.width,
                fb_height: self.height,
            })
        }
    }
}

// ── Cursor ───────────────────────────────────────────────────────

/// A 1-bit-per-pixel cursor mask handed over by the backend.
///
/// The backend gives up ownership of the mask with each cursor-shape
/// event; [`release`](Self::release) consumes it so it is freed exactly
/// once.
#[derive(Debug, Default)]
pub struct MaskBuffer {
    bits: Vec<u8>,
}

impl MaskBuffer {
    pub fn new(bits: Vec<u8>) -> Self {
        Self { bits }
    }

    /// Bytes per mask row for a cursor `width` pixels wide.
    pub const fn row_bytes(width: u32) -> usize {
        (width as usize).div_ceil(8)
    }

    /// Total mask size for a `width × height` cursor.
    pub const fn expected_len(width: u32, height: u32) -> usize {
        Self::row_bytes(width) * height as usize
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Whether pixel `(x, y)` is opaque. Bits are MSB-first per byte.
    ///
    /// Reads past the end of the mask count as transparent.
    pub fn is_set(&self, width: u32, x: u32, y: u32) -> bool {
        let index = y as usize * Self::row_bytes(width) + x as usize / 8;
        let bit = 0x80u8 >> (x % 8);
        self.bits.get(index).is_some_and(|byte| byte & bit != 0)
    }

    /// Free the mask, returning the number of bytes released.
    pub fn release(self) -> usize {
        self.bits.len()
    }
}

/// Cursor bitmap reported by the backend.
///
/// `source` stays owned by the backend; `mask` is owned by whoever
/// handles the event.
#[derive(Debug)]
pub struct CursorShape<'a> {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    pub source: &'a [u8],
    pub mask: MaskBuffer,
}

// ── CanonicalImage ───────────────────────────────────────────────

/// Packed layout of a canonical image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageLayout {
    /// `0xAARRGGBB` per pixel.
    Argb32,
    /// `0xFFRRGGBB` per pixel; alpha carries no meaning.
    Rgb24,
}

/// Normalized 8-bit-per-channel image, one packed `u32` per pixel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalImage {
    pub layout: ImageLayout,
    pub width: u32,
    pub height: u32,
    pixels: Vec<u32>,
}

impl CanonicalImage {
    /// Allocate a zeroed image, reporting allocation failure as an error.
    pub fn try_new(layout: ImageLayout, width: u32, height: u32) -> Result<Self, BridgeError> {
        let count = (width as usize)
            .checked_mul(height as usize)
            .ok_or(BridgeError::ResourceExhausted { bytes: usize::MAX })?;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(count)
            .map_err(|_| BridgeError::ResourceExhausted {
                bytes: count.saturating_mul(4),
            })?;
        pixels.resize(count, 0);
        Ok(Self {
            layout,
            width,
            height,
            pixels,
        })
    }

    /// Row pitch in bytes.
    pub const fn stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Packed pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Store a packed pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn put(&mut self, x: u32, y: u32, value: u32) {
        self.pixels[y as usize * self.width as usize + x as usize] = value;
    }

    /// Mutable row slice, used by the translators.
    pub fn row_mut(&mut self, y: u32) -> &mut [u32] {
        let start = y as usize * self.width as usize;
        &mut self.pixels[start..start + self.width as usize]
    }
}

// ── Tests ────────────────────────────────────────────────────────

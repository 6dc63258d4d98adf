//! Backend pixel → 8-bit-per-channel color translation.
//!
//! Each channel is scaled with `((raw >> shift) * 256) / (max + 1)` and
//! truncated to a byte. Because `max + 1` is a power of two dividing 256,
//! the truncation also discards any neighbouring channel bits left above
//! the shifted value, so no explicit masking is needed.

use crate::display::types::{PixelFormat, PixelWidth};
use crate::error::BridgeError;

// ── Color ────────────────────────────────────────────────────────

/// An 8-bit-per-channel color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Pack as `(A,R,G,B)`, or `(A,B,G,R)` when `swap_red_blue` is set.
    #[inline]
    pub const fn pack(self, alpha: u8, swap_red_blue: bool) -> u32 {
        let (hi, lo) = if swap_red_blue {
            (self.blue, self.red)
        } else {
            (self.red, self.blue)
        };
        (alpha as u32) << 24 | (hi as u32) << 16 | (self.green as u32) << 8 | lo as u32
    }

    /// Inverse of [`pack`](Self::pack): `(alpha, color)`.
    pub const fn unpack(packed: u32, swap_red_blue: bool) -> (u8, Color) {
        let alpha = (packed >> 24) as u8;
        let hi = (packed >> 16) as u8;
        let green = (packed >> 8) as u8;
        let lo = packed as u8;
        let color = if swap_red_blue {
            Color::new(lo, green, hi)
        } else {
            Color::new(hi, green, lo)
        };
        (alpha, color)
    }
}

// ── Channel math ─────────────────────────────────────────────────

/// Scale one channel of `raw` to 8 bits.
#[inline]
pub fn channel(raw: u32, shift: u8, max: u16) -> u8 {
    let value = (raw as u64).checked_shr(shift as u32).unwrap_or(0);
    ((value * 256) / (max as u64 + 1)) as u8
}

/// Translate one raw pixel value.
#[inline]
pub fn translate(raw: u32, format: &PixelFormat) -> Color {
    Color {
        red: channel(raw, format.red_shift, format.red_max),
        green: channel(raw, format.green_shift, format.green_max),
        blue: channel(raw, format.blue_shift, format.blue_max),
    }
}

/// Read a `width`-byte unsigned pixel value at `offset`.
#[inline]
pub fn read_pixel(
    bytes: &[u8],
    offset: usize,
    width: PixelWidth,
    big_endian: bool,
) -> Result<u32, BridgeError> {
    let n = width.bytes();
    let raw = offset
        .checked_add(n)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(BridgeError::PixelOutOfBounds {
            offset,
            width: n,
            len: bytes.len(),
        })?;

    Ok(match (width, big_endian) {
        (PixelWidth::One, _) => raw[0] as u32,
        (PixelWidth::Two, false) => u16::from_le_bytes([raw[0], raw[1]]) as u32,
        (PixelWidth::Two, true) => u16::from_be_bytes([raw[0], raw[1]]) as u32,
        (PixelWidth::Four, false) => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        (PixelWidth::Four, true) => u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
    })
}

// ── Translator ───────────────────────────────────────────────────

/// A pixel format bound to a read width and channel order.
///
/// Copyable and allocation-free; built once per event.
#[derive(Debug, Clone, Copy)]
pub struct Translator {
    format: PixelFormat,
    width: PixelWidth,
    swap_red_blue: bool,
}

impl Translator {
    pub fn new(format: PixelFormat, width: PixelWidth, swap_red_blue: bool) -> Self {
        Self {
            format,
            width,
            swap_red_blue,
        }
    }

    /// Translator reading the format's own pixel width.
    pub fn for_format(format: PixelFormat, swap_red_blue: bool) -> Result<Self, BridgeError> {
        Ok(Self::new(format, format.pixel_width()?, swap_red_blue))
    }

    pub fn pixel_width(&self) -> PixelWidth {
        self.width
    }

    /// Translate the pixel at `offset` and pack it with `alpha`.
    #[inline]
    pub fn packed_at(&self, bytes: &[u8], offset: usize, alpha: u8) -> Result<u32, BridgeError> {
        let raw = read_pixel(bytes, offset, self.width, self.format.big_endian)?;
        Ok(translate(raw, &self.format).pack(alpha, self.swap_red_blue))
    }
}

// ── Tests ────────────────────────────────────────────────────────

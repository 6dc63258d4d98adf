//! Cursor bitmap + 1-bit mask → ARGB cursor image.

use tracing::debug;

use crate::display::translate::Translator;
use crate::display::types::{CanonicalImage, CursorShape, ImageLayout, MaskBuffer, PixelFormat, PixelWidth};
use crate::error::BridgeError;
use crate::network::Outward;
use crate::protocol::{CompositeMode, Instruction, Layer};

/// Draws cursor shapes onto a dedicated off-screen layer.
#[derive(Debug, Clone, Copy)]
pub struct CursorRenderer {
    layer: Layer,
    swap_red_blue: bool,
}

impl CursorRenderer {
    pub fn new(layer: Layer, swap_red_blue: bool) -> Self {
        Self {
            layer,
            swap_red_blue,
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Render `cursor`, paint it on the cursor layer and point the client
    /// cursor at it.
    ///
    /// The mask is released here on every path; the source pixels are
    /// left to the backend.
    pub fn render(
        &self,
        out: &dyn Outward,
        format: &PixelFormat,
        hotspot: (i32, i32),
        cursor: CursorShape<'_>,
    ) -> Result<(), BridgeError> {
        let CursorShape {
            width,
            height,
            bytes_per_pixel,
            source,
            mask,
        } = cursor;

        let image = self.build_image(format, width, height, bytes_per_pixel, source, &mask);
        let released = mask.release();
        debug!(width, height, released, "cursor mask released");
        let image = image?;

        out.send(Instruction::Image {
            mode: CompositeMode::Replace,
            layer: self.layer,
            x: 0,
            y: 0,
            image,
        })?;
        out.send(Instruction::Cursor {
            hotspot_x: hotspot.0,
            hotspot_y: hotspot.1,
            layer: self.layer,
            src_x: 0,
            src_y: 0,
            width,
            height,
        })
    }

    /// Build the ARGB image without emitting anything.
    pub fn build_image(
        &self,
        format: &PixelFormat,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        source: &[u8],
        mask: &MaskBuffer,
    ) -> Result<CanonicalImage, BridgeError> {
        let expected = MaskBuffer::expected_len(width, height);
        if mask.len() < expected {
            return Err(BridgeError::MaskTooShort {
                expected,
                actual: mask.len(),
            });
        }

        let pixel_width = PixelWidth::from_bytes(bytes_per_pixel)?;
        let translator = Translator::new(*format, pixel_width, self.swap_red_blue);
        let bpp = pixel_width.bytes();
        let stride = bpp * width as usize;

        let mut image = CanonicalImage::try_new(ImageLayout::Argb32, width, height)?;
        for dy in 0..height {
            let row_start = dy as usize * stride;
            let row = image.row_mut(dy);
            for (dx, pixel) in row.iter_mut().enumerate() {
                let alpha = if mask.is_set(width, dx as u32, dy) { 0xFF } else { 0x00 };
                *pixel = translator.packed_at(source, row_start + dx * bpp, alpha)?;
            }
        }
        Ok(image)
    }
}

// ── Tests ────────────────────────────────────────────────────────

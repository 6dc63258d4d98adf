//! Backend change events → outward drawing instructions.
//!
//! The dispatcher remembers one thing between events: whether a
//! copy-rect already redrew part of the current frame. VNC servers often
//! follow a copy-rect with a framebuffer update for the same area; since
//! the client already performed the copy, that update is dropped.

use tracing::debug;

use crate::display::translate::Translator;
use crate::display::types::{CanonicalImage, FrameBuffer, ImageLayout, Point, Rect};
use crate::error::BridgeError;
use crate::network::Outward;
use crate::protocol::{CompositeMode, Instruction, Layer};

/// Per-session update state.
#[derive(Debug, Default)]
pub struct UpdateDispatcher {
    copy_rect_used: bool,
    swap_red_blue: bool,
}

impl UpdateDispatcher {
    pub fn new(swap_red_blue: bool) -> Self {
        Self {
            copy_rect_used: false,
            swap_red_blue,
        }
    }

    /// Start a new frame window. A copy-rect never carries over.
    pub fn begin_frame(&mut self) {
        self.copy_rect_used = false;
    }

    pub fn copy_rect_used(&self) -> bool {
        self.copy_rect_used
    }

    /// Handle a framebuffer update for `region`.
    ///
    /// Returns `Ok(true)` when an image instruction was emitted and
    /// `Ok(false)` when the update was absorbed by a preceding copy-rect
    /// or covered nothing.
    pub fn rect_update(
        &mut self,
        out: &dyn Outward,
        framebuffer: &FrameBuffer<'_>,
        region: Rect,
    ) -> Result<bool, BridgeError> {
        if self.copy_rect_used {
            self.copy_rect_used = false;
            debug!(?region, "update already drawn by copy-rect");
            return Ok(false);
        }
        if region.is_empty() {
            return Ok(false);
        }
        framebuffer.check_region(&region)?;

        let image = self.translate_region(framebuffer, region)?;
        out.send(Instruction::Image {
            mode: CompositeMode::Overwrite,
            layer: Layer::DEFAULT,
            x: region.x,
            y: region.y,
            image,
        })?;
        Ok(true)
    }

    /// Handle a server-side copy of `src` to `dst`.
    pub fn copy_rect(&mut self, out: &dyn Outward, src: Rect, dst: Point) -> Result<(), BridgeError> {
        out.send(Instruction::Copy {
            src_layer: Layer::DEFAULT,
            src_x: src.x,
            src_y: src.y,
            width: src.width,
            height: src.height,
            mode: CompositeMode::Overwrite,
            dst_layer: Layer::DEFAULT,
            dst_x: dst.x,
            dst_y: dst.y,
        })?;
        self.copy_rect_used = true;
        Ok(())
    }

    /// Announce a new surface size, then run the backend's allocator.
    ///
    /// The allocator always runs and its verdict is returned as-is. The
    /// first value reports whether the size instruction was delivered.
    pub fn resize(
        &mut self,
        out: &dyn Outward,
        width: u32,
        height: u32,
        allocate: &mut dyn FnMut(u32, u32) -> bool,
    ) -> (Result<(), BridgeError>, bool) {
        let sent = out.send(Instruction::Size {
            layer: Layer::DEFAULT,
            width,
            height,
        });
        (sent, allocate(width, height))
    }

    // ── Internal ─────────────────────────────────────────────────

    fn translate_region(
        &self,
        framebuffer: &FrameBuffer<'_>,
        region: Rect,
    ) -> Result<CanonicalImage, BridgeError> {
        let translator = Translator::for_format(framebuffer.format, self.swap_red_blue)?;
        let bpp = translator.pixel_width().bytes();
        let stride = framebuffer.stride()?;

        let mut image = CanonicalImage::try_new(ImageLayout::Rgb24, region.width, region.height)?;
        for dy in 0..region.height {
            let row_start = (region.y + dy) as usize * stride + region.x as usize * bpp;
            let row = image.row_mut(dy);
            for (dx, pixel) in row.iter_mut().enumerate() {
                *pixel = translator.packed_at(framebuffer.data, row_start + dx * bpp, 0xFF)?;
            }
        }
        Ok(image)
    }
}

// ── Tests ────────────────────────────────────────────────────────

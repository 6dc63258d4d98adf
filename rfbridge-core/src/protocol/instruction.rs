//! Drawing instructions sent from the bridge to the thin client.
//!
//! # Command set
//!
//! ```text
//! size      layer, width, height
//! img       mode, layer, x, y, image
//! copy      src_layer, src rect, mode, dst_layer, dst_x, dst_y
//! cursor    hotspot_x, hotspot_y, layer, src rect
//! clipboard text
//! abort     status, message
//! ```

use serde::{Deserialize, Serialize};

use crate::display::types::CanonicalImage;
use crate::error::BridgeError;

// ── Layer ─────────────────────────────────────────────────────────

/// A drawing surface on the client.
///
/// Index `0` is the visible default layer. Negative indices are
/// off-screen buffers, which is where the cursor image lives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Layer(pub i32);

impl Layer {
    /// The visible root surface.
    pub const DEFAULT: Layer = Layer(0);

    /// The `index`-th off-screen buffer (`0` → `-1`, `1` → `-2`, …).
    pub const fn buffer(index: u32) -> Layer {
        Layer(-(index as i32) - 1)
    }

    /// Whether this layer is an off-screen buffer.
    pub const fn is_buffer(self) -> bool {
        self.0 < 0
    }
}

impl Default for Layer {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── CompositeMode ─────────────────────────────────────────────────

/// How newly drawn pixels combine with the surface contents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CompositeMode {
    /// Source drawn over the destination; opaque pixels overwrite it.
    Overwrite,
    /// Destination replaced wholesale, alpha included.
    Replace,
}

impl std::fmt::Display for CompositeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompositeMode::Overwrite => write!(f, "over"),
            CompositeMode::Replace => write!(f, "src"),
        }
    }
}

// ── AbortStatus ───────────────────────────────────────────────────

/// Status code carried by an abort instruction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum AbortStatus {
    /// The backend failed or closed the connection.
    UpstreamError = 0x0203,
}

impl AbortStatus {
    pub const fn code(self) -> u16 {
        self as u16
    }
}

// ── Instruction ───────────────────────────────────────────────────

/// One outward drawing command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Instruction {
    /// Resize a layer.
    Size { layer: Layer, width: u32, height: u32 },

    /// Draw an image at `(x, y)` on `layer`.
    Image {
        mode: CompositeMode,
        layer: Layer,
        x: u32,
        y: u32,
        image: CanonicalImage,
    },

    /// Copy a rectangle between layers.
    Copy {
        src_layer: Layer,
        src_x: u32,
        src_y: u32,
        width: u32,
        height: u32,
        mode: CompositeMode,
        dst_layer: Layer,
        dst_x: u32,
        dst_y: u32,
    },

    /// Use the `src` rectangle of `layer` as the mouse cursor.
    Cursor {
        hotspot_x: i32,
        hotspot_y: i32,
        layer: Layer,
        src_x: u32,
        src_y: u32,
        width: u32,
        height: u32,
    },

    /// Replace the client clipboard.
    Clipboard { text: String },

    /// End the session.
    Abort { status: AbortStatus, message: String },
}

impl Instruction {
    /// Short opcode, used in logs and statistics.
    pub fn opcode(&self) -> &'static str {
        match self {
            Instruction::Size { .. } => "size",
            Instruction::Image { .. } => "img",
            Instruction::Copy { .. } => "copy",
            Instruction::Cursor { .. } => "cursor",
            Instruction::Clipboard { .. } => "clipboard",
            Instruction::Abort { .. } => "abort",
        }
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BridgeError> {
        bincode::serialize(self).map_err(BridgeError::from)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BridgeError> {
        bincode::deserialize(bytes).map_err(BridgeError::from)
    }
}

// ── Tests ─────────────────────────────────────────────────────────

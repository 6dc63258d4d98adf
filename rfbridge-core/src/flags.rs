//! Pointer button state carried by mouse events.

use bitflags::bitflags;

bitflags! {
    /// Buttons held during a pointer event, one bit per button.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ButtonMask: u8 {
        const LEFT         = 0x01;
        const MIDDLE       = 0x02;
        const RIGHT        = 0x04;
        const SCROLL_UP    = 0x08;
        const SCROLL_DOWN  = 0x10;
        const SCROLL_LEFT  = 0x20;
        const SCROLL_RIGHT = 0x40;
        const BUTTON_8     = 0x80;
    }
}

impl ButtonMask {
    /// Build a mask from the client's raw bits. All eight buttons pass through.
    pub fn from_client(bits: u8) -> Self {
        Self::from_bits_retain(bits)
    }
}

//! # rfbridge-core
//!
//! Display bridge between a remote-framebuffer (VNC) client session and a
//! thin-client drawing stream.
//!
//! This crate contains:
//! - **Display**: pixel translation, update dispatch, cursor rendering,
//!   clipboard transcoding, the frame pump and ordered teardown
//! - **Protocol**: `Instruction`, the drawing commands sent to the client
//! - **Network**: the `Outward` sink and its channel implementation
//! - **State**: `SessionPhase`, the session lifecycle
//! - **Flags**: `ButtonMask` for pointer events
//! - **Error**: `BridgeError` / `FatalError`, typed with `thiserror`

pub mod display;
pub mod error;
pub mod flags;
pub mod network;
pub mod protocol;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use error::{BridgeError, FatalError};
pub use flags::ButtonMask;
pub use network::{ChannelOutward, InstructionReceiver, Outward};
pub use protocol::{AbortStatus, CompositeMode, Instruction, Layer};
pub use state::SessionPhase;

pub use display::{
    AudioStream, Backend, BackendEvents, BackendLogLevel, BackendResidue, CanonicalImage,
    CursorShape, DisplaySession, FrameBuffer, ManualClock, MaskBuffer, PixelFormat, Point,
    PumpOutcome, Rect, SessionConfig, SystemClock, TeardownReport, TeardownStep, WaitOutcome,
};

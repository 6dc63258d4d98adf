//! # Display bridge
//!
//! Turns the callbacks of a remote-framebuffer client library into
//! drawing instructions for a thin client.
//!
//! ## Architecture
//!
//! ```text
//!  Backend (VNC client)                         Outward sink
//! ┌──────────────────────┐                    ┌──────────────────┐
//! │ wait_for_message     │◄── FramePump ──┐   │                  │
//! │ handle_message ──────┼─► SessionContext│   │  Size / Image /  │
//! │   on_rect_update     │   ├ UpdateDispatcher ─► Copy / Cursor / │
//! │   on_copy_rect       │   ├ CursorRenderer ──► Clipboard /     │
//! │   on_cursor_shape    │   └ clipboard ─────────► Abort         │
//! │   on_resize          │                    └──────────────────┘
//! │   on_cut_text        │
//! └──────────────────────┘
//!
//! Client input ──[mouse / key / clipboard stream]──► DisplaySession ──► Backend
//! ```
//!
//! ## Sub-modules
//!
//! | Module      | Purpose                                              |
//! |-------------|------------------------------------------------------|
//! | `types`     | Pixel formats, rectangles, framebuffer views, images |
//! | `translate` | Server pixel → canonical 8-bit RGB                   |
//! | `dispatch`  | Rect updates, copy-rect dedup, resize                |
//! | `cursor`    | Cursor bitmap + mask → ARGB image                    |
//! | `clipboard` | ISO-8859-1 ↔ UTF-8 clipboard text                    |
//! | `pump`      | Frame-paced message pump                             |
//! | `reclaim`   | Ordered session teardown                             |
//! | `backend`   | `Backend` / `BackendEvents` / `AudioStream` seams    |
//! | `session`   | `DisplaySession` entry points                        |

pub mod backend;
pub mod clipboard;
pub mod cursor;
pub mod dispatch;
pub mod pump;
pub mod reclaim;
pub mod session;
pub mod translate;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────

pub use backend::{AudioStream, Backend, BackendEvents, BackendLogLevel, WaitOutcome};
pub use clipboard::{Clipboard, DEFAULT_CLIPBOARD_LIMIT, TEXT_MIMETYPE};
pub use cursor::CursorRenderer;
pub use dispatch::UpdateDispatcher;
pub use pump::{
    Clock, DEFAULT_FRAME_DURATION, DEFAULT_INITIAL_WAIT, FramePump, ManualClock, PumpOutcome,
    PumpState, SystemClock,
};
pub use reclaim::{
    BackendResidue, OwnedBuffer, ResidueChain, ResidueReport, SessionResources, TeardownReport,
    TeardownStep,
};
pub use session::{DisplaySession, SessionConfig, SessionContext};
pub use translate::{Color, Translator};
pub use types::{
    CanonicalImage, CursorShape, FrameBuffer, ImageLayout, MaskBuffer, PixelFormat, PixelWidth,
    Point, Rect,
};

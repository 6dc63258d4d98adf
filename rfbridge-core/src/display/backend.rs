//! Seams between the display bridge and its collaborators.
//!
//! A [`Backend`] is the remote-framebuffer client library: it owns the
//! connection, parses the wire protocol, and calls back into a
//! [`BackendEvents`] context while handling each message. The context is
//! always passed in explicitly, so there is no global lookup from a
//! backend handle to its session.

use std::time::Duration;

use async_trait::async_trait;

use crate::display::reclaim::BackendResidue;
use crate::display::types::{CursorShape, FrameBuffer, Point, Rect};
use crate::error::BridgeError;
use crate::flags::ButtonMask;

// ── WaitOutcome ──────────────────────────────────────────────────

/// Result of waiting for the next backend message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A message is ready to be handled.
    Ready,
    /// The timeout elapsed with nothing to read.
    TimedOut,
    /// The connection failed.
    Error,
}

/// Severity of a message from the backend library's own log sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendLogLevel {
    Info,
    Error,
}

// ── BackendEvents ────────────────────────────────────────────────

/// Callbacks the backend invokes while handling a message.
pub trait BackendEvents: Send {
    /// Pixels inside `region` of `framebuffer` changed.
    fn on_rect_update(&mut self, framebuffer: &FrameBuffer<'_>, region: Rect);

    /// The server moved `src` to `dst` on its own framebuffer.
    fn on_copy_rect(&mut self, src: Rect, dst: Point);

    /// The cursor image changed. Ownership of `cursor.mask` moves here.
    fn on_cursor_shape(&mut self, hotspot: (i32, i32), cursor: CursorShape<'_>);

    /// The framebuffer is about to be resized.
    ///
    /// `allocate` is the backend's own buffer allocation routine; its
    /// result is returned unchanged.
    fn on_resize(
        &mut self,
        width: u32,
        height: u32,
        allocate: &mut dyn FnMut(u32, u32) -> bool,
    ) -> bool;

    /// The server clipboard changed. `None` or empty means nothing to do.
    fn on_cut_text(&mut self, text: Option<&[u8]>);

    /// Password for VNC authentication, if one is configured.
    fn password(&self) -> Option<String>;

    /// A log line from the backend library.
    fn log(&mut self, level: BackendLogLevel, message: &str);
}

// ── Backend ──────────────────────────────────────────────────────

/// A remote-framebuffer client session.
#[async_trait]
pub trait Backend: Send {
    /// Wait up to `timeout` for the next message.
    async fn wait_for_message(&mut self, timeout: Duration) -> WaitOutcome;

    /// Read and dispatch one message. `false` means the session failed.
    async fn handle_message(&mut self, events: &mut dyn BackendEvents) -> bool;

    /// Forward a pointer event.
    fn send_pointer(&mut self, x: i32, y: i32, buttons: ButtonMask) -> Result<(), BridgeError>;

    /// Forward a key event.
    fn send_key(&mut self, keysym: u32, pressed: bool) -> Result<(), BridgeError>;

    /// Send ISO-8859-1 clipboard text to the server.
    fn send_cut_text(&mut self, text: &[u8]) -> Result<(), BridgeError>;

    /// Hand over the buffers the backend's own cleanup does not free.
    fn take_residue(&mut self) -> BackendResidue;

    /// The backend's generic cleanup. Runs last during teardown.
    fn cleanup(self)
    where
        Self: Sized;
}

// ── AudioStream ──────────────────────────────────────────────────

/// Audio subsystem attached to a session.
///
/// Only consulted during teardown, before any session state is freed.
pub trait AudioStream: Send {
    fn enabled(&self) -> bool;

    fn stop(&mut self);
}

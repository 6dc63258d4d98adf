//! One display session: backend, outward sink, and the state between them.
//!
//! [`DisplaySession`] exposes the entry points the gateway calls
//! (`handle_messages`, input, clipboard streams, `free_session`).
//! [`SessionContext`] is what the backend sees while it handles a
//! message: the [`BackendEvents`] implementation that routes every
//! callback to the dispatcher, cursor renderer or transcoder.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::display::backend::{AudioStream, Backend, BackendEvents, BackendLogLevel};
use crate::display::clipboard::{self, Clipboard, DEFAULT_CLIPBOARD_LIMIT};
use crate::display::cursor::CursorRenderer;
use crate::display::dispatch::UpdateDispatcher;
use crate::display::pump::{
    Clock, DEFAULT_FRAME_DURATION, DEFAULT_INITIAL_WAIT, FramePump, PumpOutcome, SystemClock,
};
use crate::display::reclaim::{self, SessionResources, TeardownReport};
use crate::display::types::{CursorShape, FrameBuffer, PixelFormat, Point, Rect};
use crate::error::BridgeError;
use crate::flags::ButtonMask;
use crate::network::Outward;
use crate::protocol::Layer;
use crate::state::SessionPhase;

// ── SessionConfig ────────────────────────────────────────────────

/// Per-session settings fixed at connect time.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Frame window for the message pump.
    pub frame_duration: Duration,
    /// Wait before the first message of each pump call.
    pub initial_wait: Duration,
    /// Requested color depth (8, 16, 24 or 32).
    pub color_depth: u8,
    /// Swap red and blue in emitted images.
    pub swap_red_blue: bool,
    /// Encodings advertised to the server, space separated.
    pub encodings: Option<String>,
    /// Password for VNC authentication.
    pub password: Option<String>,
    /// Off-screen layer the cursor image is drawn on.
    pub cursor_layer: Layer,
    /// Cap on clipboard data accepted from the client.
    pub clipboard_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_duration: DEFAULT_FRAME_DURATION,
            initial_wait: DEFAULT_INITIAL_WAIT,
            color_depth: 24,
            swap_red_blue: false,
            encodings: None,
            password: None,
            cursor_layer: Layer::buffer(0),
            clipboard_limit: DEFAULT_CLIPBOARD_LIMIT,
        }
    }
}

impl SessionConfig {
    /// Pixel format requested from the backend.
    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::for_color_depth(self.color_depth)
    }
}

// ── SessionContext ───────────────────────────────────────────────

/// Callback context handed to the backend on every message.
pub struct SessionContext {
    out: Arc<dyn Outward>,
    format: PixelFormat,
    dispatcher: UpdateDispatcher,
    cursor: CursorRenderer,
    password: Option<String>,
    cancel: CancellationToken,
}

impl SessionContext {
    pub fn new(
        out: Arc<dyn Outward>,
        config: &SessionConfig,
        cancel: CancellationToken,
    ) -> Result<Self, BridgeError> {
        let format = config.pixel_format();
        format.validate()?;
        Ok(Self {
            out,
            format,
            dispatcher: UpdateDispatcher::new(config.swap_red_blue),
            cursor: CursorRenderer::new(config.cursor_layer, config.swap_red_blue),
            password: config.password.clone(),
            cancel,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    pub fn dispatcher(&self) -> &UpdateDispatcher {
        &self.dispatcher
    }

    /// Start of a pump call.
    pub fn begin_frame(&mut self) {
        self.dispatcher.begin_frame();
    }

    /// Log an update-scoped failure; a closed channel cancels the session.
    fn settle(&self, what: &'static str, result: Result<(), BridgeError>) {
        match result {
            Ok(()) => {}
            Err(BridgeError::ChannelClosed) => {
                debug!("{what}: outward channel closed");
                self.cancel.cancel();
            }
            Err(e) => warn!("{what} dropped: {e}"),
        }
    }
}

impl BackendEvents for SessionContext {
    fn on_rect_update(&mut self, framebuffer: &FrameBuffer<'_>, region: Rect) {
        let result = self
            .dispatcher
            .rect_update(&*self.out, framebuffer, region)
            .map(|_| ());
        self.settle("framebuffer update", result);
    }

    fn on_copy_rect(&mut self, src: Rect, dst: Point) {
        let result = self.dispatcher.copy_rect(&*self.out, src, dst);
        self.settle("copy-rect", result);
    }

    fn on_cursor_shape(&mut self, hotspot: (i32, i32), cursor: CursorShape<'_>) {
        let result = self.cursor.render(&*self.out, &self.format, hotspot, cursor);
        self.settle("cursor update", result);
    }

    fn on_resize(
        &mut self,
        width: u32,
        height: u32,
        allocate: &mut dyn FnMut(u32, u32) -> bool,
    ) -> bool {
        info!(width, height, "framebuffer resized");
        let (sent, allocated) = self.dispatcher.resize(&*self.out, width, height, allocate);
        self.settle("resize", sent);
        allocated
    }

    fn on_cut_text(&mut self, text: Option<&[u8]>) {
        let result = clipboard::forward_cut_text(&*self.out, text).map(|_| ());
        self.settle("clipboard update", result);
    }

    fn password(&self) -> Option<String> {
        self.password.clone()
    }

    fn log(&mut self, level: BackendLogLevel, message: &str) {
        match level {
            BackendLogLevel::Info => info!(target: "rfbridge::backend", "{message}"),
            BackendLogLevel::Error => error!(target: "rfbridge::backend", "{message}"),
        }
    }
}

// ── DisplaySession ───────────────────────────────────────────────

struct SessionParts<B> {
    backend: B,
    context: SessionContext,
    clipboard: Clipboard,
    encodings: Option<String>,
    audio: Option<Box<dyn AudioStream>>,
}

/// A single backend session bridged to one outward channel.
///
/// Driven by exactly one task. Every entry point fails with
/// [`BridgeError::SessionClosed`] once the session has aborted or been
/// torn down, without touching the backend.
pub struct DisplaySession<B: Backend> {
    phase: SessionPhase,
    parts: Option<SessionParts<B>>,
    pump: FramePump,
    out: Arc<dyn Outward>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl<B: Backend> DisplaySession<B> {
    /// Create a session with the system clock and a fresh cancel token.
    pub fn new(backend: B, out: Arc<dyn Outward>, config: SessionConfig) -> Result<Self, BridgeError> {
        Self::with_parts(
            backend,
            out,
            config,
            Arc::new(SystemClock::new()),
            CancellationToken::new(),
        )
    }

    /// Create a session with an explicit clock and cancel token.
    pub fn with_parts(
        backend: B,
        out: Arc<dyn Outward>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Result<Self, BridgeError> {
        let context = SessionContext::new(Arc::clone(&out), &config, cancel.clone())?;
        debug!(format = ?context.pixel_format(), "session created");
        Ok(Self {
            phase: SessionPhase::new(),
            parts: Some(SessionParts {
                backend,
                context,
                clipboard: Clipboard::new(config.clipboard_limit),
                encodings: config.encodings,
                audio: None,
            }),
            pump: FramePump::new(config.frame_duration, config.initial_wait),
            out,
            clock,
            cancel,
        })
    }

    /// Attach the session's audio stream, stopped first at teardown.
    pub fn attach_audio(&mut self, audio: Box<dyn AudioStream>) -> Result<(), BridgeError> {
        self.phase.ensure_active()?;
        let parts = self.parts.as_mut().ok_or(BridgeError::SessionClosed)?;
        parts.audio = Some(audio);
        Ok(())
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Token that stops the pump at its next wait boundary.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Encodings advertised to the server, if configured.
    pub fn encodings(&self) -> Option<&str> {
        self.parts.as_ref()?.encodings.as_deref()
    }

    /// Drain backend messages for one frame window.
    ///
    /// A fatal error has already been reported to the client with one
    /// abort instruction when this returns `Err`; call
    /// [`free_session`](Self::free_session) next.
    pub async fn handle_messages(&mut self) -> Result<PumpOutcome, BridgeError> {
        self.phase.ensure_active()?;
        let parts = self.parts.as_mut().ok_or(BridgeError::SessionClosed)?;
        parts.context.begin_frame();

        match self
            .pump
            .run(
                &mut parts.backend,
                &mut parts.context,
                &*self.out,
                &*self.clock,
                &self.cancel,
            )
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(fatal) => {
                self.phase.abort(fatal)?;
                Err(BridgeError::Fatal(fatal))
            }
        }
    }

    /// Forward a pointer event to the server.
    pub fn handle_mouse(&mut self, x: i32, y: i32, buttons: ButtonMask) -> Result<(), BridgeError> {
        self.backend_mut()?.send_pointer(x, y, buttons)
    }

    /// Forward a key event to the server.
    pub fn handle_key(&mut self, keysym: u32, pressed: bool) -> Result<(), BridgeError> {
        self.backend_mut()?.send_key(keysym, pressed)
    }

    /// A client clipboard stream opened. Returns whether it is accepted.
    pub fn handle_clipboard_receive(&mut self, stream: u32, mimetype: &str) -> Result<bool, BridgeError> {
        Ok(self.parts_mut()?.clipboard.begin(stream, mimetype))
    }

    /// A chunk of a client clipboard stream. Returns the bytes kept.
    pub fn handle_clipboard_blob(&mut self, stream: u32, data: &[u8]) -> Result<usize, BridgeError> {
        Ok(self.parts_mut()?.clipboard.append(stream, data))
    }

    /// A client clipboard stream ended; its text goes to the server.
    ///
    /// Returns whether anything was sent.
    pub fn handle_clipboard_end(&mut self, stream: u32) -> Result<bool, BridgeError> {
        let parts = self.parts_mut()?;
        match parts.clipboard.finish(stream) {
            Some(text) => {
                parts.backend.send_cut_text(&text)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Tear the session down. Valid exactly once.
    pub fn free_session(&mut self) -> Result<TeardownReport, BridgeError> {
        self.phase.close()?;
        self.cancel.cancel();
        let parts = self.parts.take().ok_or(BridgeError::SessionClosed)?;
        Ok(Self::teardown(parts))
    }

    // ── Internal ─────────────────────────────────────────────────

    fn parts_mut(&mut self) -> Result<&mut SessionParts<B>, BridgeError> {
        self.phase.ensure_active()?;
        self.parts.as_mut().ok_or(BridgeError::SessionClosed)
    }

    fn backend_mut(&mut self) -> Result<&mut B, BridgeError> {
        Ok(&mut self.parts_mut()?.backend)
    }

    fn teardown(parts: SessionParts<B>) -> TeardownReport {
        let SessionParts {
            backend,
            context,
            clipboard,
            encodings,
            audio,
        } = parts;
        reclaim::reclaim(SessionResources {
            audio,
            encodings,
            clipboard,
            state: context,
            backend,
        })
    }
}

impl<B: Backend> Drop for DisplaySession<B> {
    fn drop(&mut self) {
        if let Some(parts) = self.parts.take() {
            warn!("display session dropped without free_session; tearing down");
            Self::teardown(parts);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

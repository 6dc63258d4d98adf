//! Domain-specific error types for the display bridge.
//!
//! Fatal session errors ([`FatalError`]) end the session with exactly one
//! abort instruction. Everything else in [`BridgeError`] is scoped to a
//! single update or a single entry-point call.

use thiserror::Error;

use crate::protocol::AbortStatus;

/// The canonical error type for the display bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    // ── Fatal Session Errors ─────────────────────────────────────
    /// The backend failed mid-session; the session has been aborted.
    #[error("session aborted: {0}")]
    Fatal(#[from] FatalError),

    /// The session was aborted or torn down; the call touched nothing.
    #[error("session is closed")]
    SessionClosed,

    // ── Per-Update Errors ────────────────────────────────────────
    /// A canonical image buffer could not be allocated.
    #[error("resource exhausted: could not allocate {bytes} bytes")]
    ResourceExhausted { bytes: usize },

    /// A dirty region does not fit inside the framebuffer.
    #[error("region {x},{y} {width}x{height} outside {fb_width}x{fb_height} framebuffer")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        fb_width: u32,
        fb_height: u32,
    },

    /// A raw pixel read ran past the end of its buffer.
    #[error("pixel read out of bounds: offset {offset} + {width} bytes (len {len})")]
    PixelOutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// The negotiated pixel format violates its channel invariants.
    #[error("invalid pixel format: {0}")]
    InvalidPixelFormat(&'static str),

    /// A cursor mask does not hold `ceil(w/8) * h` bytes.
    #[error("cursor mask too short: expected {expected} bytes, got {actual}")]
    MaskTooShort { expected: usize, actual: usize },

    // ── Channel Errors ───────────────────────────────────────────
    /// The outward instruction channel was closed by the gateway.
    #[error("outward channel closed")]
    ChannelClosed,

    // ── Serialization Errors ─────────────────────────────────────
    /// Encoding or decoding of an instruction failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl BridgeError {
    /// Whether the error ended the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_) | Self::SessionClosed)
    }
}

// ── FatalError ───────────────────────────────────────────────────

/// The two ways a session can die mid-stream.
///
/// Neither is retried here; reconnection belongs to the layer above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FatalError {
    /// The backend's message-handling call failed.
    #[error("error handling message from VNC server")]
    UpstreamError,

    /// The backend's wait call reported an error (not a timeout).
    #[error("connection closed")]
    ConnectionClosed,
}

impl FatalError {
    /// Status code carried by the abort instruction.
    pub fn status(self) -> AbortStatus {
        match self {
            Self::UpstreamError | Self::ConnectionClosed => AbortStatus::UpstreamError,
        }
    }

    /// Human-readable message carried by the abort instruction.
    pub fn message(self) -> &'static str {
        match self {
            Self::UpstreamError => "Error handling message from VNC server.",
            Self::ConnectionClosed => "Connection closed.",
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for BridgeError {
    fn from(s: String) -> Self {
        BridgeError::Other(s)
    }
}

impl From<&str> for BridgeError {
    fn from(s: &str) -> Self {
        BridgeError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for BridgeError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        BridgeError::ChannelClosed
    }
}

impl From<Box<bincode::ErrorKind>> for BridgeError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        BridgeError::Encoding(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = BridgeError::ResourceExhausted { bytes: 4096 };
        assert!(e.to_string().contains("4096"));

        let e = BridgeError::MaskTooShort {
            expected: 3,
            actual: 2,
        };
        assert!(e.to_string().contains('3'));
        assert!(e.to_string().contains('2'));
    }

    #[test]
    fn fatal_errors_carry_abort_details() {
        assert_eq!(FatalError::UpstreamError.status(), AbortStatus::UpstreamError);
        assert_eq!(FatalError::ConnectionClosed.message(), "Connection closed.");

        let e: BridgeError = FatalError::ConnectionClosed.into();
        assert!(e.is_fatal());
        assert!(!BridgeError::ChannelClosed.is_fatal());
    }

    #[test]
    fn from_string() {
        let e: BridgeError = "something broke".into();
        assert!(matches!(e, BridgeError::Other(_)));
    }

    #[test]
    fn from_send_error() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<u8>();
        drop(rx);
        let e: BridgeError = tx.send(1).unwrap_err().into();
        assert!(matches!(e, BridgeError::ChannelClosed));
    }
}

//! Clipboard text in both directions.
//!
//! VNC carries clipboard text as ISO-8859-1; the client side speaks
//! UTF-8. Server → client text is converted and emitted right away.
//! Client → server text arrives as a stream of blobs, is accumulated in
//! the session [`Clipboard`], and is converted back when the stream ends.

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::network::Outward;
use crate::protocol::Instruction;

/// The only mimetype accepted from the client.
pub const TEXT_MIMETYPE: &str = "text/plain";

/// Default cap on accumulated client clipboard data.
pub const DEFAULT_CLIPBOARD_LIMIT: usize = 256 * 1024;

// ── Transcoding ──────────────────────────────────────────────────

/// Decode ISO-8859-1, stopping at the first NUL.
pub fn latin1_to_utf8(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

/// Encode as ISO-8859-1. Characters above U+00FF become `?`.
pub fn utf8_to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Forward server clipboard text to the client.
///
/// Absent or empty text is not an error; nothing is sent and `Ok(false)`
/// is returned.
pub fn forward_cut_text(out: &dyn Outward, text: Option<&[u8]>) -> Result<bool, BridgeError> {
    let Some(bytes) = text.filter(|t| !t.is_empty()) else {
        return Ok(false);
    };
    let text = latin1_to_utf8(bytes);
    debug!(len = text.len(), "server clipboard changed");
    out.send(Instruction::Clipboard { text })?;
    Ok(true)
}

// ── Clipboard ────────────────────────────────────────────────────

/// Client clipboard contents being streamed towards the server.
#[derive(Debug)]
pub struct Clipboard {
    buffer: BytesMut,
    limit: usize,
    stream: Option<u32>,
    truncated: bool,
}

impl Clipboard {
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            limit,
            stream: None,
            truncated: false,
        }
    }

    /// Start receiving `stream`. Returns `false` if the mimetype is not
    /// plain text, in which case the stream is ignored.
    pub fn begin(&mut self, stream: u32, mimetype: &str) -> bool {
        if mimetype != TEXT_MIMETYPE {
            debug!(stream, mimetype, "ignoring non-text clipboard stream");
            self.stream = None;
            return false;
        }
        self.buffer.clear();
        self.truncated = false;
        self.stream = Some(stream);
        true
    }

    /// Append a blob of the active stream, truncating at the limit.
    ///
    /// A cut never splits a UTF-8 sequence, and nothing is kept after
    /// the first cut. Returns the number of bytes kept.
    pub fn append(&mut self, stream: u32, data: &[u8]) -> usize {
        if self.stream != Some(stream) || self.truncated {
            return 0;
        }
        let room = self.limit.saturating_sub(self.buffer.len());
        let mut kept = data.len().min(room);
        if kept < data.len() {
            while kept > 0 && is_continuation(data[kept]) {
                kept -= 1;
            }
            self.truncated = true;
            warn!(stream, dropped = data.len() - kept, "clipboard limit reached");
        }
        self.buffer.extend_from_slice(&data[..kept]);
        kept
    }

    /// Finish `stream`, returning its contents as ISO-8859-1.
    pub fn finish(&mut self, stream: u32) -> Option<Vec<u8>> {
        if self.stream.take() != Some(stream) {
            return None;
        }
        let text = String::from_utf8_lossy(&self.buffer);
        Some(utf8_to_latin1(&text))
    }

    pub fn contents(&self) -> &[u8] {
        &self.buffer
    }

    /// Free the buffer, returning the number of bytes it held.
    pub fn free(self) -> usize {
        self.buffer.capacity()
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

impl Default for Clipboard {
    fn default() -> Self {
        Self::new(DEFAULT_CLIPBOARD_LIMIT)
    }
}

// ── Tests ────────────────────────────────────────────────────────

//! Ordered session teardown.
//!
//! The backend library frees most of its own memory in its generic
//! cleanup routine, but not all of it: the framebuffer, the raw decode
//! buffer, the last cursor source and the client-data chain are left to
//! the embedder. [`BackendResidue`] wraps each of those in an owning
//! handle so teardown is a sequence of explicit `release` calls.
//!
//! Order, enforced by [`reclaim`]:
//!
//! 1. stop audio (it may still read session state)
//! 2. free the advertised-encodings string
//! 3. free the clipboard
//! 4. drop the session state
//! 5. release the backend residue
//! 6. run the backend's generic cleanup

use tracing::{debug, info};

use crate::display::backend::{AudioStream, Backend};
use crate::display::clipboard::Clipboard;

// ── OwnedBuffer ──────────────────────────────────────────────────

/// A backend allocation the embedder must free.
#[derive(Debug)]
pub struct OwnedBuffer {
    name: &'static str,
    data: Vec<u8>,
}

impl OwnedBuffer {
    pub fn new(name: &'static str, data: Vec<u8>) -> Self {
        Self { name, data }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Free the buffer, returning its size.
    pub fn release(self) -> usize {
        debug!(buffer = self.name, bytes = self.data.len(), "released");
        self.data.len()
    }
}

// ── ResidueChain ─────────────────────────────────────────────────

#[derive(Debug)]
struct ResidueNode {
    data: Vec<u8>,
    next: Option<Box<ResidueNode>>,
}

/// Singly linked list of per-client data blocks the backend never frees.
///
/// Released node by node, front to back, without recursion.
#[derive(Debug, Default)]
pub struct ResidueChain {
    head: Option<Box<ResidueNode>>,
    len: usize,
}

impl ResidueChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a block, as the backend does when registering client data.
    pub fn push_front(&mut self, data: Vec<u8>) {
        let next = self.head.take();
        self.head = Some(Box::new(ResidueNode { data, next }));
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Walk and free every node. Returns `(nodes, bytes)`.
    pub fn release(mut self) -> (usize, usize) {
        let mut nodes = 0;
        let mut bytes = 0;
        let mut cursor = self.head.take();
        while let Some(mut node) = cursor {
            cursor = node.next.take();
            nodes += 1;
            bytes += node.data.len();
        }
        self.len = 0;
        (nodes, bytes)
    }
}

impl Drop for ResidueChain {
    fn drop(&mut self) {
        let mut cursor = self.head.take();
        while let Some(mut node) = cursor {
            cursor = node.next.take();
        }
    }
}

// ── BackendResidue ───────────────────────────────────────────────

/// Everything the backend's generic cleanup leaves behind.
#[derive(Debug, Default)]
pub struct BackendResidue {
    pub framebuffer: Option<OwnedBuffer>,
    pub raw_buffer: Option<OwnedBuffer>,
    pub cursor_source: Option<OwnedBuffer>,
    pub client_data: ResidueChain,
}

/// What releasing a [`BackendResidue`] freed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResidueReport {
    pub buffers: usize,
    pub chain_nodes: usize,
    pub bytes: usize,
}

impl BackendResidue {
    pub fn release(self) -> ResidueReport {
        let mut report = ResidueReport::default();
        for buffer in [self.framebuffer, self.raw_buffer, self.cursor_source]
            .into_iter()
            .flatten()
        {
            report.buffers += 1;
            report.bytes += buffer.release();
        }
        let (nodes, bytes) = self.client_data.release();
        report.chain_nodes = nodes;
        report.bytes += bytes;
        report
    }
}

// ── Teardown ─────────────────────────────────────────────────────

/// One step of [`reclaim`], in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    StopAudio,
    FreeEncodings,
    FreeClipboard,
    FreeSessionState,
    ReleaseResidue,
    BackendCleanup,
}

/// Record of a completed teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub steps: Vec<TeardownStep>,
    pub residue: ResidueReport,
    pub bytes_released: usize,
}

/// Everything a session owns at teardown time.
pub struct SessionResources<B, S> {
    pub audio: Option<Box<dyn AudioStream>>,
    pub encodings: Option<String>,
    pub clipboard: Clipboard,
    pub state: S,
    pub backend: B,
}

/// Tear a session down in the fixed order above.
pub fn reclaim<B: Backend, S>(resources: SessionResources<B, S>) -> TeardownReport {
    let SessionResources {
        audio,
        encodings,
        clipboard,
        state,
        mut backend,
    } = resources;
    let mut report = TeardownReport::default();

    if let Some(mut audio) = audio {
        if audio.enabled() {
            audio.stop();
            report.steps.push(TeardownStep::StopAudio);
        }
    }

    if let Some(encodings) = encodings {
        report.bytes_released += encodings.capacity();
        drop(encodings);
        report.steps.push(TeardownStep::FreeEncodings);
    }

    report.bytes_released += clipboard.free();
    report.steps.push(TeardownStep::FreeClipboard);

    drop(state);
    report.steps.push(TeardownStep::FreeSessionState);

    report.residue = backend.take_residue().release();
    report.bytes_released += report.residue.bytes;
    report.steps.push(TeardownStep::ReleaseResidue);

    backend.cleanup();
    report.steps.push(TeardownStep::BackendCleanup);

    info!(
        bytes = report.bytes_released,
        chain_nodes = report.residue.chain_nodes,
        "session resources reclaimed"
    );
    report
}

// ── Tests ────────────────────────────────────────────────────────

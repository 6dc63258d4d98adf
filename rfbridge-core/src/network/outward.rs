//! Outward instruction sinks.
//!
//! The gateway owns the client connection; the bridge only needs a place
//! to push one [`Instruction`] at a time. Other subsystems of the same
//! session (audio, for one) may hold the same sink, so `send` takes
//! `&self` and each call delivers a whole instruction.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::BridgeError;
use crate::protocol::Instruction;

/// A sink for outward drawing instructions.
pub trait Outward: Send + Sync {
    fn send(&self, instruction: Instruction) -> Result<(), BridgeError>;
}

pub type InstructionReceiver = mpsc::UnboundedReceiver<Instruction>;

/// [`Outward`] backed by a tokio channel.
///
/// The receiving half belongs to the gateway's writer task. When it is
/// dropped, the next send fails with [`BridgeError::ChannelClosed`] and
/// cancels `closed`, so the frame pump stops at its next wait boundary.
#[derive(Debug, Clone)]
pub struct ChannelOutward {
    tx: mpsc::UnboundedSender<Instruction>,
    closed: CancellationToken,
}

impl ChannelOutward {
    /// Create a sink and the receiver the writer task drains.
    pub fn new(closed: CancellationToken) -> (Self, InstructionReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, closed }, rx)
    }

    /// Token cancelled once the receiver is gone.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

impl Outward for ChannelOutward {
    fn send(&self, instruction: Instruction) -> Result<(), BridgeError> {
        self.tx.send(instruction).map_err(|e| {
            self.closed.cancel();
            BridgeError::from(e)
        })
    }
}

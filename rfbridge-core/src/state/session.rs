//! Session lifecycle state machine.
//!
//! Transitions are validated and return `Result` instead of panicking,
//! so an entry point called after abort or teardown is rejected before
//! it can reach the backend.

use std::time::Instant;

use crate::error::{BridgeError, FatalError};

// ── SessionPhase ─────────────────────────────────────────────────

/// The lifecycle phase of one display session.
///
/// ```text
///  Active ──► Aborted ──► Closed
///     │                     ▲
///     └─────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected and pumping messages.
    Active {
        /// When the session was created.
        since: Instant,
    },

    /// A fatal error was reported to the client; awaiting teardown.
    Aborted(FatalError),

    /// Torn down. Terminal.
    Closed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active { .. } => write!(f, "Active"),
            Self::Aborted(fatal) => write!(f, "Aborted ({fatal})"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

impl SessionPhase {
    pub fn new() -> Self {
        Self::Active {
            since: Instant::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// How long the session has been active, `None` once it is not.
    pub fn active_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Active { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    /// Fail with [`BridgeError::SessionClosed`] unless active.
    pub fn ensure_active(&self) -> Result<(), BridgeError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(BridgeError::SessionClosed)
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Aborted`.
    ///
    /// Valid from: `Active`.
    pub fn abort(&mut self, fatal: FatalError) -> Result<(), BridgeError> {
        match self {
            Self::Active { .. } => {
                *self = Self::Aborted(fatal);
                Ok(())
            }
            _ => Err(BridgeError::SessionClosed),
        }
    }

    /// Transition to `Closed`.
    ///
    /// Valid from: `Active`, `Aborted`.
    pub fn close(&mut self) -> Result<(), BridgeError> {
        match self {
            Self::Active { .. } | Self::Aborted(_) => {
                *self = Self::Closed;
                Ok(())
            }
            Self::Closed => Err(BridgeError::SessionClosed),
        }
    }
}

impl Default for SessionPhase {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

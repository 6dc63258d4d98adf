//! Frame-paced backend message pump.
//!
//! One call to [`FramePump::run`] drains backend messages for at most one
//! frame window:
//!
//! ```text
//!  Idle ──► WaitingForMessage ──ready──► HandlingMessage ──ok──► FrameBoundary
//!   ▲            │  │                          │                   │    │
//!   │  timed out │  │ error                    │ failed            │    │ budget left
//!   ├────────────┘  ▼                          ▼                   │    ▼
//!   │            Aborted ◄─────────────────────┘                   │  WaitingForMessage
//!   └──────────────────────────── budget spent ────────────────────┘
//! ```
//!
//! A call therefore runs for at most one frame duration plus one
//! in-flight `handle_message`. Time comes from an injected [`Clock`] so
//! pacing can be tested without sleeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::display::backend::{Backend, BackendEvents, WaitOutcome};
use crate::error::FatalError;
use crate::network::Outward;
use crate::protocol::Instruction;

/// Default frame window.
pub const DEFAULT_FRAME_DURATION: Duration = Duration::from_millis(40);

/// Default wait before the first message of a call.
pub const DEFAULT_INITIAL_WAIT: Duration = Duration::from_micros(1_000_000);

// ── Clock ────────────────────────────────────────────────────────

/// Monotonic time source.
pub trait Clock: Send + Sync {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock [`Clock`] measured from its creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven [`Clock`]. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

// ── PumpState / PumpOutcome ──────────────────────────────────────

/// Where the pump is in its per-call state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpState {
    #[default]
    Idle,
    WaitingForMessage { timeout: Duration },
    HandlingMessage,
    FrameBoundary,
    Aborted(FatalError),
}

/// How a successful pump call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Nothing arrived before the wait timed out.
    TimedOut { handled: usize },
    /// The frame budget ran out; remaining messages wait for the next call.
    FrameComplete { handled: usize },
    /// Cancellation was observed at a wait boundary.
    Cancelled { handled: usize },
}

impl PumpOutcome {
    pub fn handled(&self) -> usize {
        match *self {
            Self::TimedOut { handled }
            | Self::FrameComplete { handled }
            | Self::Cancelled { handled } => handled,
        }
    }
}

// ── FramePump ────────────────────────────────────────────────────

/// Frame-paced driver for a backend's message loop.
#[derive(Debug, Clone)]
pub struct FramePump {
    frame_duration: Duration,
    initial_wait: Duration,
    state: PumpState,
}

impl FramePump {
    pub fn new(frame_duration: Duration, initial_wait: Duration) -> Self {
        Self {
            frame_duration,
            initial_wait,
            state: PumpState::Idle,
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// State the last call ended in: `Idle`, or `Aborted` after a failure.
    pub fn state(&self) -> PumpState {
        self.state
    }

    /// Drain backend messages for one frame window.
    ///
    /// On a fatal error exactly one abort instruction is sent on `out`
    /// and the error is returned; tearing the session down is the
    /// caller's job.
    pub async fn run<B: Backend>(
        &mut self,
        backend: &mut B,
        events: &mut dyn BackendEvents,
        out: &dyn Outward,
        clock: &dyn Clock,
        cancel: &CancellationToken,
    ) -> Result<PumpOutcome, FatalError> {
        let frame_start = clock.now();
        let mut handled = 0usize;
        self.state = PumpState::WaitingForMessage {
            timeout: self.initial_wait,
        };

        loop {
            let current = self.state;
            self.state = match current {
                PumpState::Idle => PumpState::WaitingForMessage {
                    timeout: self.initial_wait,
                },

                PumpState::WaitingForMessage { timeout } => {
                    if cancel.is_cancelled() {
                        return Ok(self.finish(PumpOutcome::Cancelled { handled }));
                    }
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Ok(self.finish(PumpOutcome::Cancelled { handled }));
                        }
                        outcome = backend.wait_for_message(timeout) => outcome,
                    };
                    match outcome {
                        WaitOutcome::Ready => PumpState::HandlingMessage,
                        WaitOutcome::TimedOut => {
                            return Ok(self.finish(PumpOutcome::TimedOut { handled }));
                        }
                        WaitOutcome::Error => PumpState::Aborted(FatalError::ConnectionClosed),
                    }
                }

                PumpState::HandlingMessage => {
                    if backend.handle_message(events).await {
                        handled += 1;
                        PumpState::FrameBoundary
                    } else {
                        PumpState::Aborted(FatalError::UpstreamError)
                    }
                }

                PumpState::FrameBoundary => {
                    let elapsed = clock.now().saturating_sub(frame_start);
                    match self.frame_duration.checked_sub(elapsed) {
                        Some(remaining) if !remaining.is_zero() => {
                            PumpState::WaitingForMessage { timeout: remaining }
                        }
                        _ => {
                            debug!(handled, ?elapsed, "frame budget spent");
                            return Ok(self.finish(PumpOutcome::FrameComplete { handled }));
                        }
                    }
                }

                PumpState::Aborted(fatal) => {
                    error!("aborting session: {fatal}");
                    if let Err(e) = out.send(Instruction::Abort {
                        status: fatal.status(),
                        message: fatal.message().to_string(),
                    }) {
                        warn!("abort instruction not delivered: {e}");
                    }
                    return Err(fatal);
                }
            };
        }
    }

    fn finish(&mut self, outcome: PumpOutcome) -> PumpOutcome {
        self.state = PumpState::Idle;
        outcome
    }
}

impl Default for FramePump {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_DURATION, DEFAULT_INITIAL_WAIT)
    }
}

// ── Tests ────────────────────────────────────────────────────────

//! Bridge runner: one display session against the synthetic server.
//!
//! Drives the frame pump until the server drops the connection or the
//! stop handle is cancelled, drains the outward channel in a separate
//! writer task, then tears the session down.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use rfbridge_core::display::{DisplaySession, PumpOutcome, SystemClock, TeardownReport};
use rfbridge_core::{BridgeError, ChannelOutward, FatalError, Instruction, InstructionReceiver};

use crate::config::BridgeConfig;
use crate::synthetic::SyntheticBackend;

// ── InstructionStats ─────────────────────────────────────────────

/// Per-opcode counts of what reached the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionStats {
    pub counts: BTreeMap<&'static str, u64>,
    pub bytes: u64,
}

impl InstructionStats {
    pub fn record(&mut self, instruction: &Instruction) {
        *self.counts.entry(instruction.opcode()).or_default() += 1;
        match instruction.to_bytes() {
            Ok(encoded) => self.bytes += encoded.len() as u64,
            Err(e) => warn!("{} instruction not encodable: {e}", instruction.opcode()),
        }
    }

    pub fn count(&self, opcode: &str) -> u64 {
        self.counts.get(opcode).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Writer task: drain the channel until every sender is gone.
async fn drain(mut rx: InstructionReceiver) -> InstructionStats {
    let mut stats = InstructionStats::default();
    while let Some(instruction) = rx.recv().await {
        stats.record(&instruction);
    }
    stats
}

// ── BridgeService ────────────────────────────────────────────────

/// How a run ended.
#[derive(Debug)]
pub struct RunSummary {
    /// Pump calls that ended normally.
    pub frames: u64,
    /// Messages handled by those calls.
    pub messages: u64,
    pub aborted: Option<FatalError>,
    pub teardown: TeardownReport,
    pub stats: InstructionStats,
}

pub struct BridgeService {
    config: BridgeConfig,
    stop: CancellationToken,
}

impl BridgeService {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            stop: CancellationToken::new(),
        }
    }

    /// Handle that stops the service at the next frame boundary.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Run one session until the server disconnects or the service is
    /// stopped.
    pub async fn run(&self) -> Result<RunSummary, BridgeError> {
        let session_config = self.config.to_session_config();
        let backend = SyntheticBackend::new(&self.config.synthetic, session_config.pixel_format())?;

        let (out, rx) = ChannelOutward::new(self.stop.child_token());
        let writer = tokio::spawn(drain(rx));

        let mut session = DisplaySession::with_parts(
            backend,
            Arc::new(out),
            session_config,
            Arc::new(SystemClock::new()),
            self.stop.child_token(),
        )?;
        info!(
            width = self.config.synthetic.width,
            height = self.config.synthetic.height,
            "session started"
        );

        let mut frames = 0u64;
        let mut messages = 0u64;
        let mut aborted = None;
        loop {
            match session.handle_messages().await {
                Ok(PumpOutcome::Cancelled { handled }) => {
                    messages += handled as u64;
                    info!("session cancelled");
                    break;
                }
                Ok(outcome) => {
                    frames += 1;
                    messages += outcome.handled() as u64;
                    if frames % 250 == 0 {
                        debug!(frames, messages, "pumping");
                    }
                }
                Err(BridgeError::Fatal(fatal)) => {
                    error!("session ended: {fatal}");
                    aborted = Some(fatal);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let teardown = session.free_session()?;
        drop(session);
        let stats = writer
            .await
            .map_err(|e| BridgeError::Other(format!("writer task failed: {e}")))?;

        info!(
            frames,
            messages,
            instructions = stats.total(),
            bytes = stats.bytes,
            "session finished"
        );
        Ok(RunSummary {
            frames,
            messages,
            aborted,
            teardown,
            stats,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

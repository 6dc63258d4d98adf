//! Configuration for the bridge runner.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rfbridge_core::display::SessionConfig;
use rfbridge_core::protocol::Layer;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Pixel format and session options.
    pub display: DisplayConfig,
    /// Frame pacing.
    pub pacing: PacingConfig,
    /// Client clipboard handling.
    pub clipboard: ClipboardConfig,
    /// Synthetic framebuffer server.
    pub synthetic: SyntheticConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Color depth requested from the server: 8, 16, 24 or 32.
    pub color_depth: u8,
    /// Swap red and blue channels in emitted images.
    pub swap_red_blue: bool,
    /// Space-separated encodings to advertise. Empty means library default.
    pub encodings: String,
    /// VNC password. Empty means none.
    pub password: String,
}

/// Frame pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Frame window in milliseconds.
    pub frame_duration_ms: u64,
    /// Wait for the first message of a frame, in milliseconds.
    pub initial_wait_ms: u64,
}

/// Clipboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Maximum client clipboard size in KiB.
    pub limit_kib: usize,
}

/// Synthetic server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Framebuffer width in pixels.
    pub width: u32,
    /// Framebuffer height in pixels.
    pub height: u32,
    /// Server messages per second.
    pub message_rate: u32,
    /// Send clipboard text every N messages (0 = never).
    pub cut_text_every: u64,
    /// Drop the connection after N messages (0 = never).
    pub disconnect_after: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color_depth: 24,
            swap_red_blue: false,
            encodings: String::new(),
            password: String::new(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            frame_duration_ms: 40,
            initial_wait_ms: 1000,
        }
    }
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self { limit_kib: 256 }
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            message_rate: 120,
            cut_text_every: 200,
            disconnect_after: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl BridgeConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Convert into the per-session settings of the core library.
    pub fn to_session_config(&self) -> SessionConfig {
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.trim().to_string());
        SessionConfig {
            frame_duration: Duration::from_millis(self.pacing.frame_duration_ms.max(1)),
            initial_wait: Duration::from_millis(self.pacing.initial_wait_ms),
            color_depth: self.display.color_depth,
            swap_red_blue: self.display.swap_red_blue,
            encodings: non_empty(&self.display.encodings),
            password: non_empty(&self.display.password),
            cursor_layer: Layer::buffer(0),
            clipboard_limit: self.clipboard.limit_kib.saturating_mul(1024),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

//! rfbridge — entry point.
//!
//! ```text
//! rfbridge                  Run one session in the foreground
//! rfbridge --config <path>  Load a custom config TOML
//! rfbridge --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rfbridge::config::BridgeConfig;
use rfbridge::service::BridgeService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rfbridge", about = "Remote-framebuffer display bridge runner")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "rfbridge.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&BridgeConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = BridgeConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("rfbridge v{}", env!("CARGO_PKG_VERSION"));
    info!("color depth: {}", config.display.color_depth);
    info!("frame duration: {} ms", config.pacing.frame_duration_ms);

    let service = BridgeService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    let summary = service.run().await?;
    for (opcode, count) in &summary.stats.counts {
        info!("{opcode}: {count}");
    }
    if let Some(fatal) = summary.aborted {
        info!("session aborted: {fatal}");
    }

    Ok(())
}

//! Now-playing sender — entry point.
//!
//! ```text
//! nowplaying-sender                    Run with defaults
//! nowplaying-sender --config <path>    Use custom config TOML
//! nowplaying-sender --relay <addr>     Override the relay address
//! nowplaying-sender --gen-config       Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use nowplaying_sender::config::SenderConfig;
use nowplaying_sender::observer::{PlaybackObserver, RefreshPipeline};
use nowplaying_sender::platform_manager;
use nowplaying_sender::transport::FrameSender;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "nowplaying-sender", about = "Push now-playing state to a relay display")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "nowplaying-sender.toml")]
    config: PathBuf,

    /// Relay address (overrides config). Example: 192.168.1.50:32150
    #[arg(short, long)]
    relay: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&SenderConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = SenderConfig::load(&cli.config);
    if let Some(addr) = cli.relay {
        config.network.relay_address = addr;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("nowplaying-sender v{}", env!("CARGO_PKG_VERSION"));
    info!("relay: {}", config.network.relay_address);

    // ── 1. Build the refresh pipeline ───────────────────────────

    let sender = FrameSender::new(config.network.relay_address.clone(), config.timeout());
    let mut pipeline = RefreshPipeline::new(sender, config.normalize_options());

    if !config.preview.path.is_empty() {
        let (preview_tx, preview_rx) = mpsc::channel(4);
        pipeline = pipeline.with_preview(preview_tx);
        tokio::spawn(write_previews(preview_rx, PathBuf::from(&config.preview.path)));
    }

    // ── 2. Start the observer on its own worker thread ──────────

    let manager = platform_manager()?;
    let observer = PlaybackObserver::new(manager, pipeline);
    let shutdown = CancellationToken::new();
    let worker = observer.spawn_worker(shutdown.clone())?;
    let mut worker = tokio::task::spawn_blocking(move || worker.join());

    // ── 3. Wait for Ctrl-C or for the observer to give up ───────

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received — shutting down");
            shutdown.cancel();
            if let Err(e) = (&mut worker).await {
                error!("observer worker failed: {e}");
            }
        }
        joined = &mut worker => {
            match joined {
                Ok(Ok(())) => info!("observer finished"),
                Ok(Err(_)) => error!("observer worker panicked"),
                Err(e) => error!("observer worker failed: {e}"),
            }
        }
    }

    Ok(())
}

/// Keep the most recent raw thumbnail on disk for local preview.
async fn write_previews(mut rx: mpsc::Receiver<Vec<u8>>, path: PathBuf) {
    while let Some(bytes) = rx.recv().await {
        match tokio::fs::write(&path, &bytes).await {
            Ok(()) => debug!("preview written to {} ({} bytes)", path.display(), bytes.len()),
            Err(e) => warn!("failed to write preview {}: {e}", path.display()),
        }
    }
}

//! Now-playing relay — entry point.
//!
//! ```text
//! nowplaying-relay                    Run with defaults
//! nowplaying-relay --config <path>    Use custom config TOML
//! nowplaying-relay --listen <addr>    Override the listen address
//! nowplaying-relay --gen-config       Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::task::LocalSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nowplaying_relay::config::RelayConfig;
use nowplaying_relay::headless::HeadlessDisplay;
use nowplaying_relay::lifecycle::RelayApp;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "nowplaying-relay", about = "Now-playing relay display")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "nowplaying-relay.toml")]
    config: PathBuf,

    /// Listen address (overrides config). Example: 0.0.0.0:32150
    #[arg(short, long)]
    listen: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&RelayConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = RelayConfig::load(&cli.config);
    if let Some(addr) = cli.listen {
        config.network.listen_address = addr;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("nowplaying-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("listen: {}", config.network.listen_address);
    info!("display: {}x{}", config.display.width, config.display.height);

    let mut display = HeadlessDisplay::new(config.display.width, config.display.height);
    if !config.display.snapshot_path.is_empty() {
        info!("snapshots: {}", config.display.snapshot_path);
        display = display.with_snapshot(&config.display.snapshot_path);
    }

    // UI state lives on this thread; the listening task runs beside it.
    let local = LocalSet::new();
    local
        .run_until(async move {
            let mut app = RelayApp::new(display, config.service_settings());
            app.start().await?;

            tokio::signal::ctrl_c().await?;
            info!("Ctrl-C received — shutting down");
            app.stop().await;
            Ok::<_, Box<dyn std::error::Error>>(())
        })
        .await?;

    Ok(())
}

//! Trading cockpit synchronization client - Entry Point

use anyhow::Result;
use clap::Parser;
use cockpit_core::SubscriptionSet;
use tracing::info;

/// Keeps a trading cockpit view in sync with its backend service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via COCKPIT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Comma-separated symbol selection, overriding the config
    #[arg(short, long)]
    symbols: Option<String>,

    /// Poll once, print the reconciled view as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection
    cockpit_ws::init_crypto();

    let args = Args::parse();

    cockpit_telemetry::init_logging()?;

    info!("Starting cockpit-sync v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > COCKPIT_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("COCKPIT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let mut config = cockpit_app::AppConfig::load(&config_path)?;
    if let Some(list) = args.symbols {
        config.symbols = SubscriptionSet::parse(&list)?.symbols().to_vec();
    }
    info!(
        ws_url = %config.ws_url,
        base_url = %config.api.base_url,
        symbols = ?config.symbols,
        "Configuration loaded"
    );

    let app = cockpit_app::Application::new(config)?;

    if args.once {
        let view = app.run_once().await?;
        println!("{}", serde_json::to_string_pretty(&*view)?);
        return Ok(());
    }

    app.run().await?;
    Ok(())
}

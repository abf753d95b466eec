use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use moneta_invoice::InvoiceTracker;
use moneta_node::{build_engine, run_pass, NodeConfig};
use moneta_store::Store;

/// Treasury settlement scheduler: rebalances hot-wallet/exchange liquidity
/// per asset and expires overdue deposit invoices.
#[derive(Parser, Debug)]
#[command(name = "settlementd")]
struct Args {
    /// Path to the JSON config; a default file is written if missing.
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Run a single pass and exit.
    #[arg(long)]
    once: bool,

    /// Override the configured interval between passes.
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = NodeConfig::ensure(&args.config)?;
    let interval_secs = args.interval_secs.unwrap_or(config.interval_secs);

    let store = Store::open(&config.data_dir)?;
    let tracker = InvoiceTracker::new(store)?;
    let engine = build_engine(&config);

    info!(
        chains = config.chains.len(),
        assets = config.assets.len(),
        interval_secs,
        "settlementd starting"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        interval.tick().await;
        run_pass(&engine, &tracker).await;
        if args.once {
            break;
        }
    }

    info!("settlementd done");
    Ok(())
}

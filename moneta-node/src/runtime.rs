use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use moneta_invoice::InvoiceTracker;
use moneta_settlement::fixture::{FixtureExchangeClient, FixtureWalletClient};
use moneta_settlement::{AssetNetworkMapper, BalanceAggregator, SettlementEngine};

use crate::config::NodeConfig;

/// Builds the settlement engine from config, wiring the fixture clients of
/// the dev harness. Production embeds the engine through the library API
/// with real wallet/exchange clients instead.
pub fn build_engine(config: &NodeConfig) -> SettlementEngine {
    let mut aggregator = BalanceAggregator::new(Duration::from_secs(config.balance_timeout_secs));
    for chain in &config.chains {
        let client = FixtureWalletClient::new()
            .with_balance(&chain.hot_wallet_address, chain.fixture_balance);
        aggregator.register(&chain.blockchain_key, &chain.hot_wallet_address, Arc::new(client));
    }

    let mut exchange = FixtureExchangeClient::new();
    for (asset, balance) in &config.exchange_fixture_balances {
        exchange = exchange.with_balance(asset, *balance);
    }

    let mapper = AssetNetworkMapper::new(config.assets.clone());
    SettlementEngine::new(mapper, aggregator, Arc::new(exchange), config.settlement.clone())
}

/// One scheduler pass: settle every configured asset, then sweep overdue
/// invoices. Failures are logged and never stop the pass; the next interval
/// retries from a fresh snapshot.
pub async fn run_pass(engine: &SettlementEngine, tracker: &InvoiceTracker) {
    let assets: Vec<String> = engine.mapper().assets().iter().map(|a| a.to_string()).collect();
    for asset in assets {
        match engine.settle_asset(&asset).await {
            Ok(report) => {
                let failed = report.results.iter().filter(|r| !r.success()).count();
                info!(
                    asset = %asset,
                    amount = %report.plan.amount,
                    executed = report.results.len() - failed,
                    failed,
                    chain_failures = report.plan.failures.len(),
                    "settlement pass done"
                );
            }
            Err(e) => error!(asset = %asset, error = %e, "settlement pass failed"),
        }
    }

    match tracker.sweep_expired(Utc::now()).await {
        Ok(0) => {}
        Ok(count) => info!(count, "invoice expiry sweep done"),
        Err(e) => error!(error = %e, "invoice expiry sweep failed"),
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use moneta_common::Amount;

use crate::aggregator::BalanceAggregator;
use crate::asset_map::AssetNetworkMapper;
use crate::clients::ExchangeClient;
use crate::config::SettlementConfig;
use crate::error::{Result, SettlementError};
use crate::plan::{compute_plan, PlannedTransfer, SettlementPlan};

/// Outcome of one chain's transfer in a settlement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub asset: String,
    pub blockchain_key: String,
    pub original_balance: Amount,
    /// Signed; positive moved funds to the exchange.
    pub settlement_amount: Amount,
    pub remaining_balance: Amount,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SettlementResult {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// A settlement run: the plan that was computed and what happened per chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub plan: SettlementPlan,
    pub results: Vec<SettlementResult>,
}

/// Rebalances platform liquidity between on-chain hot wallets and the
/// exchange custody account.
///
/// Plan computation is pure ([`compute_plan`]); execution performs the
/// transfers through the injected clients and captures per-chain outcomes,
/// never raising a whole-batch error. Runs for the same asset serialize
/// behind a process-local single-flight lock; multiple scheduler processes
/// still need an external lease, which is outside this engine.
pub struct SettlementEngine {
    mapper: AssetNetworkMapper,
    aggregator: BalanceAggregator,
    exchange: Arc<dyn ExchangeClient>,
    config: SettlementConfig,
    asset_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SettlementEngine {
    pub fn new(
        mapper: AssetNetworkMapper,
        aggregator: BalanceAggregator,
        exchange: Arc<dyn ExchangeClient>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            mapper,
            aggregator,
            exchange,
            config,
            asset_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn mapper(&self) -> &AssetNetworkMapper {
        &self.mapper
    }

    /// Snapshots balances and computes the rebalancing plan for `asset`.
    /// No lock is held between this snapshot and any later execution; the
    /// plan describes the world as it was at snapshot time.
    pub async fn compute_asset_plan(&self, asset: &str) -> Result<SettlementPlan> {
        let chains = self.mapper.chains_for_asset(asset);
        if chains.is_empty() {
            return Err(SettlementError::UnsupportedAsset(asset.to_string()));
        }

        let keys: Vec<String> = chains.iter().map(|(key, _)| key.clone()).collect();
        let snapshot = self.aggregator.hot_wallet_balances(&keys).await;
        if snapshot.is_partial() {
            warn!(
                asset,
                failed = snapshot.failures.len(),
                "settlement snapshot is partial; failed chains are excluded from the plan"
            );
        }

        let exchange_balance = self.exchange.get_balance(asset).await?;
        compute_plan(asset, &snapshot, exchange_balance.as_decimal(), &self.config)
    }

    /// Executes every transfer in the plan concurrently, one result per
    /// chain. A failed chain yields `error: Some(..)` on its result; the
    /// others are unaffected.
    pub async fn execute_plan(&self, plan: &SettlementPlan) -> Vec<SettlementResult> {
        let futures = plan
            .transfers
            .iter()
            .map(|transfer| self.execute_transfer(&plan.asset, transfer));
        join_all(futures).await
    }

    /// Full run for one asset: snapshot, plan, execute. Concurrent calls for
    /// the same asset serialize on a single-flight lock.
    pub async fn settle_asset(&self, asset: &str) -> Result<SettlementReport> {
        let lock = self.lock_for(asset);
        let _guard = lock.lock().await;

        let plan = self.compute_asset_plan(asset).await?;
        info!(
            asset,
            hot_total = %plan.hot_total,
            exchange = %plan.exchange_balance,
            amount = %plan.amount,
            transfers = plan.transfers.len(),
            dust_skipped = plan.skipped_dust.len(),
            "[Settlement] computed plan"
        );

        let results = if plan.is_noop() {
            Vec::new()
        } else {
            self.execute_plan(&plan).await
        };

        let failed = results.iter().filter(|r| !r.success()).count();
        if failed > 0 {
            warn!(asset, failed, total = results.len(), "[Settlement] run finished with failures");
        } else {
            info!(asset, total = results.len(), "[Settlement] run finished");
        }
        Ok(SettlementReport { plan, results })
    }

    async fn execute_transfer(&self, asset: &str, transfer: &PlannedTransfer) -> SettlementResult {
        let outcome = self.dispatch_transfer(asset, transfer).await;
        let (tx_hash, error, remaining) = match outcome {
            Ok(hash) => (
                Some(hash),
                None,
                Amount::new(
                    transfer.original_balance.as_decimal() - transfer.amount.as_decimal(),
                ),
            ),
            Err(message) => {
                warn!(
                    asset,
                    chain = %transfer.blockchain_key,
                    amount = %transfer.amount,
                    error = %message,
                    "[Settlement] transfer failed"
                );
                (None, Some(message), transfer.original_balance)
            }
        };

        SettlementResult {
            asset: asset.to_string(),
            blockchain_key: transfer.blockchain_key.clone(),
            original_balance: transfer.original_balance,
            settlement_amount: transfer.amount,
            remaining_balance: remaining,
            tx_hash,
            error,
            timestamp: Utc::now(),
        }
    }

    /// Positive amounts go hot wallet -> exchange deposit address; negative
    /// amounts are withdrawn from the exchange back to the hot wallet.
    async fn dispatch_transfer(
        &self,
        asset: &str,
        transfer: &PlannedTransfer,
    ) -> std::result::Result<String, String> {
        let network = self
            .mapper
            .blockchain_key_to_network(&transfer.blockchain_key)
            .ok_or_else(|| format!("no network mapping for {}", transfer.blockchain_key))?;

        if transfer.amount.is_negative() {
            let amount = transfer.amount.abs();
            self.exchange
                .withdraw(asset, network, &transfer.hot_wallet_address, &amount)
                .await
                .map_err(|e| e.to_string())
        } else {
            let (_, wallet) = self
                .aggregator
                .endpoint(&transfer.blockchain_key)
                .ok_or_else(|| {
                    format!("no wallet client registered for {}", transfer.blockchain_key)
                })?;
            let deposit_address = self
                .exchange
                .get_deposit_address(asset, network)
                .await
                .map_err(|e| e.to_string())?;
            wallet
                .transfer(&transfer.hot_wallet_address, &deposit_address, &transfer.amount)
                .await
                .map_err(|e| e.to_string())
        }
    }

    fn lock_for(&self, asset: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .asset_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(asset.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

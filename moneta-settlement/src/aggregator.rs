use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::warn;

use moneta_common::Amount;

use crate::clients::WalletClient;
use crate::error::{Result, SettlementError};

/// A chain's hot wallet and the client that can reach it.
#[derive(Clone)]
struct HotWallet {
    address: String,
    client: Arc<dyn WalletClient>,
}

/// Live balance of one chain's hot wallet, fetched per settlement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotWalletBalance {
    pub blockchain_key: String,
    pub address: String,
    pub balance: Amount,
}

/// One chain's query failing. Data, not an exception: the batch stays `Ok`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainFailure {
    pub blockchain_key: String,
    pub error: String,
}

/// Fan-in of a multi-chain balance query.
#[derive(Debug, Clone, Default)]
pub struct AggregatedBalances {
    pub balances: Vec<HotWalletBalance>,
    pub failures: Vec<ChainFailure>,
}

impl AggregatedBalances {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn total(&self) -> Decimal {
        self.balances
            .iter()
            .map(|b| b.balance.as_decimal())
            .sum()
    }
}

/// Queries hot-wallet balances across chains in parallel.
///
/// Each chain runs as its own task bounded by `query_timeout`; a slow or
/// broken chain becomes a [`ChainFailure`] entry and never aborts or
/// contaminates the other chains' results.
pub struct BalanceAggregator {
    wallets: HashMap<String, HotWallet>,
    query_timeout: Duration,
}

impl BalanceAggregator {
    pub fn new(query_timeout: Duration) -> Self {
        Self {
            wallets: HashMap::new(),
            query_timeout,
        }
    }

    pub fn register(
        &mut self,
        blockchain_key: &str,
        hot_wallet_address: &str,
        client: Arc<dyn WalletClient>,
    ) {
        self.wallets.insert(
            blockchain_key.to_string(),
            HotWallet {
                address: hot_wallet_address.to_string(),
                client,
            },
        );
    }

    /// The hot-wallet address and client registered for a chain.
    pub fn endpoint(&self, blockchain_key: &str) -> Option<(&str, Arc<dyn WalletClient>)> {
        self.wallets
            .get(blockchain_key)
            .map(|w| (w.address.as_str(), w.client.clone()))
    }

    /// Single-chain query.
    pub async fn hot_wallet_balance(&self, blockchain_key: &str) -> Result<HotWalletBalance> {
        let wallet = self
            .wallets
            .get(blockchain_key)
            .ok_or_else(|| SettlementError::UnknownBlockchain(blockchain_key.to_string()))?;
        let balance = timeout(self.query_timeout, wallet.client.get_balance(&wallet.address))
            .await
            .map_err(|_| SettlementError::Wallet {
                chain: blockchain_key.to_string(),
                message: format!("balance query timed out after {:?}", self.query_timeout),
            })?
            .map_err(|e| SettlementError::Wallet {
                chain: blockchain_key.to_string(),
                message: e.to_string(),
            })?;
        Ok(HotWalletBalance {
            blockchain_key: blockchain_key.to_string(),
            address: wallet.address.clone(),
            balance,
        })
    }

    /// Fan-out one task per chain, fan-in with per-chain error isolation.
    /// Waits for every task; never fail-fast. Dropping the returned future
    /// drops the underlying `JoinSet`, which aborts the outstanding queries
    /// without touching already-collected results.
    pub async fn hot_wallet_balances(&self, blockchain_keys: &[String]) -> AggregatedBalances {
        let mut tasks = JoinSet::new();
        let mut result = AggregatedBalances::default();

        for key in blockchain_keys {
            let wallet = match self.wallets.get(key) {
                Some(w) => w.clone(),
                None => {
                    result.failures.push(ChainFailure {
                        blockchain_key: key.clone(),
                        error: "no wallet client registered".to_string(),
                    });
                    continue;
                }
            };
            let key = key.clone();
            let query_timeout = self.query_timeout;
            tasks.spawn(async move {
                let outcome = timeout(query_timeout, wallet.client.get_balance(&wallet.address))
                    .await
                    .map_err(|_| format!("balance query timed out after {:?}", query_timeout))
                    .and_then(|r| r.map_err(|e| e.to_string()));
                (key, wallet.address, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, address, Ok(balance))) => result.balances.push(HotWalletBalance {
                    blockchain_key: key,
                    address,
                    balance,
                }),
                Ok((key, _, Err(error))) => {
                    warn!(chain = %key, %error, "hot wallet balance query failed");
                    result.failures.push(ChainFailure {
                        blockchain_key: key,
                        error,
                    });
                }
                Err(join_error) => {
                    // A panicked query task; the chain attribution is gone
                    // with it.
                    warn!(%join_error, "balance query task aborted");
                    result.failures.push(ChainFailure {
                        blockchain_key: "unknown".to_string(),
                        error: join_error.to_string(),
                    });
                }
            }
        }

        result.balances.sort_by(|a, b| a.blockchain_key.cmp(&b.blockchain_key));
        result.failures.sort_by(|a, b| a.blockchain_key.cmp(&b.blockchain_key));
        result
    }
}

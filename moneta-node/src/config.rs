use std::collections::HashMap;
use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use moneta_common::Amount;
use moneta_settlement::{AssetMappingEntry, SettlementConfig};

/// One chain the scheduler watches: its hot wallet and, for the dev
/// harness, the balance the fixture wallet client starts with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub blockchain_key: String,
    pub hot_wallet_address: String,
    /// Seed balance for the fixture wallet client. Production deployments
    /// replace the fixture clients with real RPC-backed ones through the
    /// library API; the daemon itself only schedules runs.
    pub fixture_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub data_dir: String,
    /// Seconds between scheduler passes.
    pub interval_secs: u64,
    /// Per-chain balance query timeout.
    pub balance_timeout_secs: u64,
    pub settlement: SettlementConfig,
    pub chains: Vec<ChainConfig>,
    pub assets: Vec<AssetMappingEntry>,
    /// Seed balances for the fixture exchange client, keyed by asset.
    #[serde(default)]
    pub exchange_fixture_balances: HashMap<String, Amount>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            interval_secs: 300,
            balance_timeout_secs: 30,
            settlement: SettlementConfig {
                ratio: Decimal::new(5, 1),
                default_dust_minimum: Amount::zero(),
                dust_minimums: HashMap::new(),
                distribution_scale: 8,
            },
            chains: Vec::new(),
            assets: Vec::new(),
            exchange_fixture_balances: HashMap::new(),
        }
    }
}

impl NodeConfig {
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Loads the config, writing a default file first if none exists.
    pub fn ensure(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        if !Path::new(path).exists() {
            let default = Self::default();
            fs::write(path, serde_json::to_string_pretty(&default)?)?;
            info!("wrote default config to {}", path);
        }
        Self::load(path)
    }
}

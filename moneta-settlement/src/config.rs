use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use moneta_common::Amount;

/// Tunables for the settlement engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Target fraction of the combined (hot + exchange) balance that should
    /// sit at the exchange. Must be in `[0, 1)`.
    pub ratio: Decimal,
    /// Per-chain transfers below this are dropped from the plan.
    pub default_dust_minimum: Amount,
    /// Asset-specific dust overrides, keyed by asset symbol.
    #[serde(default)]
    pub dust_minimums: HashMap<String, Amount>,
    /// Decimal places used when splitting the settlement amount per chain.
    pub distribution_scale: u32,
}

impl SettlementConfig {
    pub fn dust_minimum(&self, asset: &str) -> Amount {
        self.dust_minimums
            .get(asset)
            .copied()
            .unwrap_or(self.default_dust_minimum)
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            ratio: Decimal::new(5, 1), // 0.5
            default_dust_minimum: Amount::zero(),
            dust_minimums: HashMap::new(),
            distribution_scale: 8,
        }
    }
}

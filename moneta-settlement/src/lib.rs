pub mod aggregator;
pub mod asset_map;
pub mod clients;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixture;
pub mod plan;

pub use aggregator::{AggregatedBalances, BalanceAggregator, ChainFailure, HotWalletBalance};
pub use asset_map::{AssetMappingEntry, AssetNetworkMapper};
pub use clients::{ClientError, ExchangeClient, WalletClient};
pub use config::SettlementConfig;
pub use engine::{SettlementEngine, SettlementReport, SettlementResult};
pub use error::{Result, SettlementError};
pub use plan::{
    compute_plan, proportional_distribution, required_exchange_balance, settlement_amount,
    PlannedTransfer, SettlementPlan,
};

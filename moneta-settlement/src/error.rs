use thiserror::Error;

use crate::clients::ClientError;

/// Errors that abort a settlement run outright. Per-chain problems during
/// aggregation or plan execution are never raised through here; they are
/// carried as data (`ChainFailure`, `SettlementResult::error`) so one
/// unresponsive chain degrades only its own contribution.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("Unknown blockchain: {0}")]
    UnknownBlockchain(String),

    #[error("Wallet error on {chain}: {message}")]
    Wallet { chain: String, message: String },

    #[error("Exchange error: {0}")]
    Exchange(#[from] ClientError),

    #[error("Invalid settlement config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SettlementError>;

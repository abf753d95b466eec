use async_trait::async_trait;
use thiserror::Error;

use moneta_common::Amount;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Rejected: {0}")]
    Rejected(String),
}

/// One on-chain wallet per blockchain. Signing and broadcast live behind
/// this seam; the settlement engine only sees balances and tx hashes.
#[async_trait]
pub trait WalletClient: Send + Sync {
    async fn get_balance(&self, address: &str) -> std::result::Result<Amount, ClientError>;

    /// Moves `amount` from `from` to `to`, returning the transaction hash.
    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: &Amount,
    ) -> std::result::Result<String, ClientError>;
}

/// The centralized exchange custody account.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn get_deposit_address(
        &self,
        asset: &str,
        network: &str,
    ) -> std::result::Result<String, ClientError>;

    async fn withdraw(
        &self,
        asset: &str,
        network: &str,
        address: &str,
        amount: &Amount,
    ) -> std::result::Result<String, ClientError>;

    async fn get_balance(&self, asset: &str) -> std::result::Result<Amount, ClientError>;
}

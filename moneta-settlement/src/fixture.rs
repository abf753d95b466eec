use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use moneta_common::{new_id, Amount};

use crate::clients::{ClientError, ExchangeClient, WalletClient};

/// In-memory wallet client for tests and the dev harness. Holds per-address
/// balances, optionally injects latency or a blanket failure.
#[derive(Default)]
pub struct FixtureWalletClient {
    balances: RwLock<HashMap<String, Amount>>,
    latency: Option<Duration>,
    failure: Option<String>,
}

impl FixtureWalletClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, address: &str, balance: Amount) -> Self {
        let Self {
            balances,
            latency,
            failure,
        } = self;
        let mut map = balances.into_inner();
        map.insert(address.to_string(), balance);
        Self {
            balances: RwLock::new(map),
            latency,
            failure,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every call fails with `message`; models an unresponsive chain.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    async fn simulate(&self) -> std::result::Result<(), ClientError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.failure {
            Some(message) => Err(ClientError::Rpc(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WalletClient for FixtureWalletClient {
    async fn get_balance(&self, address: &str) -> std::result::Result<Amount, ClientError> {
        self.simulate().await?;
        let balances = self.balances.read().await;
        Ok(balances.get(address).copied().unwrap_or_else(Amount::zero))
    }

    async fn transfer(
        &self,
        from: &str,
        _to: &str,
        amount: &Amount,
    ) -> std::result::Result<String, ClientError> {
        self.simulate().await?;
        let mut balances = self.balances.write().await;
        let current = balances.get(from).copied().unwrap_or_else(Amount::zero);
        if current < *amount {
            return Err(ClientError::Rejected(format!(
                "insufficient funds on {}: {} < {}",
                from, current, amount
            )));
        }
        let remaining = current
            .checked_sub(amount)
            .map_err(|e| ClientError::Rejected(e.to_string()))?;
        balances.insert(from.to_string(), remaining);
        Ok(format!("fixture-tx-{}", new_id()))
    }
}

/// In-memory exchange custody account.
#[derive(Default)]
pub struct FixtureExchangeClient {
    balances: RwLock<HashMap<String, Amount>>,
    fail_withdrawals: Option<String>,
}

impl FixtureExchangeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, asset: &str, balance: Amount) -> Self {
        let Self {
            balances,
            fail_withdrawals,
        } = self;
        let mut map = balances.into_inner();
        map.insert(asset.to_string(), balance);
        Self {
            balances: RwLock::new(map),
            fail_withdrawals,
        }
    }

    /// Withdrawals fail with `message`; balance and deposit-address queries
    /// keep working.
    pub fn with_failing_withdrawals(mut self, message: &str) -> Self {
        self.fail_withdrawals = Some(message.to_string());
        self
    }
}

#[async_trait]
impl ExchangeClient for FixtureExchangeClient {
    async fn get_deposit_address(
        &self,
        asset: &str,
        network: &str,
    ) -> std::result::Result<String, ClientError> {
        Ok(format!("exchange-{}-{}", asset.to_lowercase(), network.to_lowercase()))
    }

    async fn withdraw(
        &self,
        asset: &str,
        _network: &str,
        _address: &str,
        amount: &Amount,
    ) -> std::result::Result<String, ClientError> {
        if let Some(message) = &self.fail_withdrawals {
            return Err(ClientError::Rejected(message.clone()));
        }
        let mut balances = self.balances.write().await;
        let current = balances.get(asset).copied().unwrap_or_else(Amount::zero);
        if current < *amount {
            return Err(ClientError::Rejected(format!(
                "insufficient exchange balance for {}: {} < {}",
                asset, current, amount
            )));
        }
        let remaining = current
            .checked_sub(amount)
            .map_err(|e| ClientError::Rejected(e.to_string()))?;
        balances.insert(asset.to_string(), remaining);
        Ok(format!("exchange-tx-{}", new_id()))
    }

    async fn get_balance(&self, asset: &str) -> std::result::Result<Amount, ClientError> {
        let balances = self.balances.read().await;
        Ok(balances.get(asset).copied().unwrap_or_else(Amount::zero))
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CurrencyKeyError {
    #[error("Invalid blockchain key: {0}")]
    Blockchain(String),

    #[error("Invalid token id: {0}")]
    Token(String),
}

/// Identifies a token on a specific chain.
///
/// `blockchain_key` is a CAIP-2 chain id (`eip155:1`), `token_id` a
/// CAIP-19-style asset id scoped to that chain
/// (`eip155:1/erc20:0xdac17f958d2ee523a2206206994597c13d831ec7`).
/// The same fungible asset on different chains has different currency keys;
/// grouping them back together is the asset mapper's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyKey {
    pub blockchain_key: String,
    pub token_id: String,
}

impl CurrencyKey {
    pub fn new(blockchain_key: &str, token_id: &str) -> Result<Self, CurrencyKeyError> {
        if !is_valid_blockchain_key(blockchain_key) {
            return Err(CurrencyKeyError::Blockchain(blockchain_key.to_string()));
        }
        let prefix = format!("{}/", blockchain_key);
        let reference = token_id.strip_prefix(&prefix);
        match reference {
            Some(rest) if !rest.is_empty() => Ok(Self {
                blockchain_key: blockchain_key.to_string(),
                token_id: token_id.to_string(),
            }),
            _ => Err(CurrencyKeyError::Token(token_id.to_string())),
        }
    }

    /// Stable key used for ordering and for composite storage keys.
    pub fn sort_key(&self) -> String {
        self.token_id.clone()
    }
}

impl fmt::Display for CurrencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token_id)
    }
}

/// CAIP-2: `namespace:reference`, namespace 3-8 lowercase alphanumerics,
/// reference 1-32 chars of `[-_a-zA-Z0-9]`.
pub fn is_valid_blockchain_key(key: &str) -> bool {
    let mut parts = key.splitn(2, ':');
    let (namespace, reference) = match (parts.next(), parts.next()) {
        (Some(n), Some(r)) => (n, r),
        _ => return false,
    };
    let namespace_ok = (3..=8).contains(&namespace.len())
        && namespace
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let reference_ok = (1..=32).contains(&reference.len())
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    namespace_ok && reference_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_caip_style_keys() {
        let key = CurrencyKey::new(
            "eip155:1",
            "eip155:1/erc20:0xdac17f958d2ee523a2206206994597c13d831ec7",
        )
        .unwrap();
        assert_eq!(key.blockchain_key, "eip155:1");
    }

    #[test]
    fn rejects_token_on_wrong_chain() {
        let err = CurrencyKey::new("eip155:1", "eip155:56/bep20:0xabc");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_malformed_blockchain_key() {
        assert!(CurrencyKey::new("ethereum mainnet", "ethereum mainnet/usdt").is_err());
        assert!(CurrencyKey::new("e:1", "e:1/usdt").is_err());
    }
}

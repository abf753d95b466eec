use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One configured token: where it lives and which exchange-side asset and
/// network it maps to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMappingEntry {
    /// CAIP-19-style token id (`eip155:1/erc20:0xdac1...`).
    pub token_id: String,
    /// Exchange asset symbol grouping the token with its siblings on other
    /// chains (`USDT`).
    pub asset: String,
    /// Exchange network symbol for deposits/withdrawals on this chain
    /// (`ERC20`, `TRC20`).
    pub network: String,
    /// CAIP-2 chain id the token lives on.
    pub blockchain_key: String,
    /// Human-readable names also accepted for the chain ("ethereum").
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Static mapping between chain-scoped token ids and exchange-side
/// (asset, network) pairs. Three chains' USDT all collapse to asset "USDT"
/// here, which is what makes exchange-custody accounting per asset possible.
#[derive(Debug, Clone, Default)]
pub struct AssetNetworkMapper {
    by_token: HashMap<String, (String, String)>,
    network_by_chain: HashMap<String, String>,
    chains_by_asset: HashMap<String, Vec<(String, String)>>,
    tokens: Vec<String>,
}

impl AssetNetworkMapper {
    pub fn new(entries: Vec<AssetMappingEntry>) -> Self {
        let mut mapper = Self::default();
        for entry in entries {
            mapper
                .by_token
                .insert(entry.token_id.clone(), (entry.asset.clone(), entry.network.clone()));
            mapper
                .network_by_chain
                .insert(entry.blockchain_key.clone(), entry.network.clone());
            for alias in &entry.aliases {
                mapper
                    .network_by_chain
                    .insert(alias.to_lowercase(), entry.network.clone());
            }
            mapper
                .chains_by_asset
                .entry(entry.asset.clone())
                .or_default()
                .push((entry.blockchain_key.clone(), entry.token_id.clone()));
            mapper.tokens.push(entry.token_id);
        }
        mapper
    }

    /// Canonical (asset, network) for a chain-scoped token id.
    pub fn token_to_asset(&self, token_id: &str) -> Option<(&str, &str)> {
        self.by_token
            .get(token_id)
            .map(|(asset, network)| (asset.as_str(), network.as_str()))
    }

    /// Network symbol for a chain, accepting the canonical CAIP-2 id as well
    /// as configured human-readable aliases (case-insensitive).
    pub fn blockchain_key_to_network(&self, blockchain_key: &str) -> Option<&str> {
        self.network_by_chain
            .get(blockchain_key)
            .or_else(|| self.network_by_chain.get(&blockchain_key.to_lowercase()))
            .map(String::as_str)
    }

    pub fn is_supported(&self, token_id: &str) -> bool {
        self.by_token.contains_key(token_id)
    }

    pub fn supported_tokens(&self) -> &[String] {
        &self.tokens
    }

    /// All (blockchain_key, token_id) pairs carrying the asset.
    pub fn chains_for_asset(&self, asset: &str) -> &[(String, String)] {
        self.chains_by_asset
            .get(asset)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All configured asset symbols.
    pub fn assets(&self) -> Vec<&str> {
        let mut assets: Vec<&str> = self.chains_by_asset.keys().map(String::as_str).collect();
        assets.sort_unstable();
        assets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdt_on_three_chains() -> AssetNetworkMapper {
        AssetNetworkMapper::new(vec![
            AssetMappingEntry {
                token_id: "eip155:1/erc20:0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
                asset: "USDT".to_string(),
                network: "ERC20".to_string(),
                blockchain_key: "eip155:1".to_string(),
                aliases: vec!["ethereum".to_string()],
            },
            AssetMappingEntry {
                token_id: "tron:mainnet/trc20:TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string(),
                asset: "USDT".to_string(),
                network: "TRC20".to_string(),
                blockchain_key: "tron:mainnet".to_string(),
                aliases: vec!["tron".to_string()],
            },
            AssetMappingEntry {
                token_id: "eip155:56/bep20:0x55d398326f99059ff775485246999027b3197955".to_string(),
                asset: "USDT".to_string(),
                network: "BEP20".to_string(),
                blockchain_key: "eip155:56".to_string(),
                aliases: vec!["bsc".to_string(), "binance-smart-chain".to_string()],
            },
        ])
    }

    #[test]
    fn groups_chain_tokens_under_one_asset() {
        let mapper = usdt_on_three_chains();
        let (asset, network) = mapper
            .token_to_asset("tron:mainnet/trc20:TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t")
            .unwrap();
        assert_eq!(asset, "USDT");
        assert_eq!(network, "TRC20");
        assert_eq!(mapper.chains_for_asset("USDT").len(), 3);
        assert!(mapper.token_to_asset("eip155:1/erc20:0xunknown").is_none());
    }

    #[test]
    fn network_lookup_accepts_canonical_id_and_aliases() {
        let mapper = usdt_on_three_chains();
        assert_eq!(mapper.blockchain_key_to_network("eip155:1"), Some("ERC20"));
        assert_eq!(mapper.blockchain_key_to_network("Ethereum"), Some("ERC20"));
        assert_eq!(mapper.blockchain_key_to_network("BSC"), Some("BEP20"));
        assert_eq!(mapper.blockchain_key_to_network("solana:mainnet"), None);
    }

    #[test]
    fn membership_queries() {
        let mapper = usdt_on_three_chains();
        assert!(mapper.is_supported("eip155:1/erc20:0xdac17f958d2ee523a2206206994597c13d831ec7"));
        assert!(!mapper.is_supported("eip155:1/erc20:0xdead"));
        assert_eq!(mapper.supported_tokens().len(), 3);
        assert_eq!(mapper.assets(), vec!["USDT"]);
    }
}

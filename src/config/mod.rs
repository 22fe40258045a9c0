//! Configuration for the wallet core

pub mod rpc;

use serde::{Deserialize, Serialize};

// Re-export RPC config
pub use rpc::RpcConfig;

/// Default location of the wallet store when no path is configured
pub const DEFAULT_STORAGE_PATH: &str = "cyberex-wallet.json";

/// Native currency metadata for a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
}

/// Supported EVM networks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Ethereum,
    Bsc,
    Polygon,
    Arbitrum,
    Optimism,
    Avalanche,
    Fantom,
}

impl Network {
    pub const ALL: [Network; 7] = [
        Network::Ethereum,
        Network::Bsc,
        Network::Polygon,
        Network::Arbitrum,
        Network::Optimism,
        Network::Avalanche,
        Network::Fantom,
    ];

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Ethereum => 1,
            Network::Bsc => 56,
            Network::Polygon => 137,
            Network::Arbitrum => 42161,
            Network::Optimism => 10,
            Network::Avalanche => 43114,
            Network::Fantom => 250,
        }
    }

    /// Storage key for this network
    pub fn key(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Bsc => "bsc",
            Network::Polygon => "polygon",
            Network::Arbitrum => "arbitrum",
            Network::Optimism => "optimism",
            Network::Avalanche => "avalanche",
            Network::Fantom => "fantom",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Ethereum => "Ethereum",
            Network::Bsc => "BNB Smart Chain",
            Network::Polygon => "Polygon",
            Network::Arbitrum => "Arbitrum One",
            Network::Optimism => "Optimism",
            Network::Avalanche => "Avalanche",
            Network::Fantom => "Fantom",
        }
    }

    pub fn native_currency(&self) -> NativeCurrency {
        let (name, symbol) = match self {
            Network::Ethereum | Network::Arbitrum | Network::Optimism => ("Ether", "ETH"),
            Network::Bsc => ("BNB", "BNB"),
            Network::Polygon => ("MATIC", "MATIC"),
            Network::Avalanche => ("AVAX", "AVAX"),
            Network::Fantom => ("FTM", "FTM"),
        };
        NativeCurrency {
            name,
            symbol,
            decimals: 18,
        }
    }

    /// Public RPC endpoint (rate limited, for testing only)
    pub fn public_rpc_url(&self) -> &'static str {
        match self {
            Network::Ethereum => "https://eth.llamarpc.com",
            Network::Bsc => "https://bsc-dataseed.binance.org",
            Network::Polygon => "https://polygon-rpc.com",
            Network::Arbitrum => "https://arb1.arbitrum.io/rpc",
            Network::Optimism => "https://mainnet.optimism.io",
            Network::Avalanche => "https://api.avax.network/ext/bc/C/rpc",
            Network::Fantom => "https://rpc.ftm.tools",
        }
    }

    pub fn block_explorer(&self) -> &'static str {
        match self {
            Network::Ethereum => "https://etherscan.io",
            Network::Bsc => "https://bscscan.com",
            Network::Polygon => "https://polygonscan.com",
            Network::Arbitrum => "https://arbiscan.io",
            Network::Optimism => "https://optimistic.etherscan.io",
            Network::Avalanche => "https://snowtrace.io",
            Network::Fantom => "https://ftmscan.com",
        }
    }

    pub fn from_key(key: &str) -> Option<Network> {
        Self::ALL
            .into_iter()
            .find(|n| n.key().eq_ignore_ascii_case(key.trim()))
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Network> {
        Self::ALL.into_iter().find(|n| n.chain_id() == chain_id)
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the JSON wallet store
    pub storage_path: String,
    /// Path to the dispatcher audit log (JSONL), disabled when absent
    pub audit_log_path: Option<String>,
    /// Page request timeout (milliseconds), wait forever when absent
    pub request_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: DEFAULT_STORAGE_PATH.to_string(),
            audit_log_path: Some("audit.jsonl".to_string()),
            request_timeout_ms: Some(60_000), // 1 minute
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_lookup() {
        assert_eq!(Network::from_key("bsc"), Some(Network::Bsc));
        assert_eq!(Network::from_key(" Polygon "), Some(Network::Polygon));
        assert_eq!(Network::from_key("base"), None);
        assert_eq!(Network::from_chain_id(42161), Some(Network::Arbitrum));
        assert_eq!(Network::from_chain_id(999), None);
    }

    #[test]
    fn test_default_network_is_ethereum() {
        assert_eq!(Network::default(), Network::Ethereum);
    }

    #[test]
    fn test_network_serde_uses_key() {
        let json = serde_json::to_string(&Network::Avalanche).unwrap();
        assert_eq!(json, "\"avalanche\"");
        for network in Network::ALL {
            assert_eq!(Network::from_key(network.key()), Some(network));
        }
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"storage_path": "/tmp/w.json"}"#).unwrap();
        assert_eq!(config.storage_path, "/tmp/w.json");
        assert_eq!(config.request_timeout_ms, Some(60_000));
    }
}

//! RPC endpoint configuration
//!
//! Endpoints are resolved per network:
//! 1. Per-chain env vars (ETH_RPC_URL, BSC_RPC_URL, etc.) - highest priority
//! 2. Public RPC fallbacks - for testing only
//!
//! # Examples
//!
//! ```bash
//! export ETH_RPC_URL="https://eth-mainnet.g.alchemy.com/v2/YOUR_KEY"
//! export POLYGON_RPC_URL="https://polygon-mainnet.g.alchemy.com/v2/YOUR_KEY"
//! ```

use crate::config::Network;
use std::collections::HashMap;

/// RPC configuration for multiple chains
#[derive(Debug, Clone, Default)]
pub struct RpcConfig {
    /// RPC URLs indexed by chain ID
    urls: HashMap<u64, String>,
}

/// Environment variable holding the endpoint for a network
fn env_var(network: Network) -> &'static str {
    match network {
        Network::Ethereum => "ETH_RPC_URL",
        Network::Bsc => "BSC_RPC_URL",
        Network::Polygon => "POLYGON_RPC_URL",
        Network::Arbitrum => "ARBITRUM_RPC_URL",
        Network::Optimism => "OPTIMISM_RPC_URL",
        Network::Avalanche => "AVALANCHE_RPC_URL",
        Network::Fantom => "FANTOM_RPC_URL",
    }
}

impl RpcConfig {
    /// Create RPC config from environment variables
    ///
    /// Every supported network ends up with an endpoint: networks without an
    /// env var fall back to their public RPC.
    pub fn from_env() -> Self {
        let mut urls = HashMap::new();

        for network in Network::ALL {
            match std::env::var(env_var(network)) {
                Ok(url) if !url.trim().is_empty() => {
                    tracing::debug!(network = network.key(), "Using {} for RPC", env_var(network));
                    urls.insert(network.chain_id(), url);
                }
                _ => {
                    if network == Network::Ethereum {
                        tracing::warn!(
                            "No RPC configured for Ethereum, using public RPC (rate limited)"
                        );
                    }
                    urls.insert(network.chain_id(), network.public_rpc_url().to_string());
                }
            }
        }

        Self { urls }
    }

    /// Create with explicit RPC URLs
    pub fn with_urls(urls: HashMap<u64, String>) -> Self {
        Self { urls }
    }

    /// Config with no endpoints at all (offline)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get RPC URL for a chain
    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.urls.get(&chain_id).map(|s| s.as_str())
    }

    /// Check if a chain is configured
    pub fn has_chain(&self, chain_id: u64) -> bool {
        self.urls.contains_key(&chain_id)
    }
}

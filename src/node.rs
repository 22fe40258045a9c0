//! Node-RPC client
//!
//! The dispatcher never speaks JSON-RPC to a node itself. It goes through a
//! [`NodeClient`], obtained from a [`NodeConnector`] for whichever network
//! is currently selected. [`RpcConnector`] builds alloy HTTP clients from
//! [`RpcConfig`]; tests substitute their own connector.

use crate::config::{Network, RpcConfig};
use crate::{Error, Result};
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::sync::Arc;

/// Connection to a single node endpoint
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Chain id reported by the node
    async fn chain_id(&self) -> Result<u64>;

    /// Native balance in wei
    async fn get_balance(&self, address: Address) -> Result<U256>;

    /// Sign `tx` with `wallet`, submit it and return the transaction hash
    async fn send_transaction(&self, wallet: EthereumWallet, tx: TransactionRequest)
        -> Result<B256>;
}

/// Maps a network to a node connection
pub trait NodeConnector: Send + Sync {
    /// `None` when no endpoint is configured for `network`
    fn connect(&self, network: Network) -> Option<Arc<dyn NodeClient>>;
}

/// JSON-RPC over HTTP using alloy providers
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    url: url::Url,
}

impl HttpNodeClient {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| Error::Config(format!("Invalid RPC URL: {}", e)))?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn chain_id(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().connect_http(self.url.clone());
        provider
            .get_chain_id()
            .await
            .map_err(|e| Error::Network(format!("Failed to get chain id: {}", e)))
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().connect_http(self.url.clone());
        provider
            .get_balance(address)
            .await
            .map_err(|e| Error::Network(format!("Failed to get balance: {}", e)))
    }

    async fn send_transaction(
        &self,
        wallet: EthereumWallet,
        tx: TransactionRequest,
    ) -> Result<B256> {
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.url.clone());

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| Error::Network(format!("Failed to send transaction: {}", e)))?;

        Ok(*pending.tx_hash())
    }
}

/// Connector resolving endpoints from an [`RpcConfig`]
#[derive(Debug, Clone)]
pub struct RpcConnector {
    rpc: RpcConfig,
}

impl RpcConnector {
    pub fn new(rpc: RpcConfig) -> Self {
        Self { rpc }
    }
}

impl NodeConnector for RpcConnector {
    fn connect(&self, network: Network) -> Option<Arc<dyn NodeClient>> {
        let url = self.rpc.get(network.chain_id())?;
        match HttpNodeClient::new(url) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(network = network.key(), error = %e, "Ignoring unusable RPC URL");
                None
            }
        }
    }
}

/// Format a wei amount as ether, always with a fractional part ("1.0", "0.25")
pub fn format_ether(value: U256) -> String {
    const DECIMALS: usize = 18;

    let divisor = U256::from(10).pow(U256::from(DECIMALS));
    let whole = value / divisor;
    let remainder = value % divisor;

    let remainder_str = format!("{:0>width$}", remainder, width = DECIMALS);
    let trimmed = remainder_str.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, trimmed)
    }
}

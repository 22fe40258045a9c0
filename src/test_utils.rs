//! Shared fixtures for unit tests

use crate::config::Network;
use crate::network::NetworkManager;
use crate::node::{NodeClient, NodeConnector};
use crate::storage::MemoryStorage;
use crate::wallet::KeyStore;
use crate::Result;
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// Hardhat development accounts (DO NOT use in production!)
pub const TEST_PHRASE: &str = "test test test test test test test test test test test junk";
pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
pub const OTHER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const OTHER_ADDRESS: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

/// In-process node answering from fixed state
#[derive(Default)]
pub struct MockNode {
    pub chain_id: u64,
    pub balances: HashMap<Address, U256>,
    pub tx_hash: B256,
    pub sent: Mutex<Vec<TransactionRequest>>,
}

impl MockNode {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            tx_hash: B256::repeat_byte(0xab),
            ..Default::default()
        }
    }

    pub fn with_balance(mut self, address: &str, wei: U256) -> Self {
        self.balances.insert(address.parse().unwrap(), wei);
        self
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(self.balances.get(&address).copied().unwrap_or(U256::ZERO))
    }

    async fn send_transaction(
        &self,
        _wallet: EthereumWallet,
        tx: TransactionRequest,
    ) -> Result<B256> {
        self.sent.lock().unwrap().push(tx);
        Ok(self.tx_hash)
    }
}

/// Connects every network to the same node, or to none
pub struct FixedConnector(pub Option<Arc<MockNode>>);

impl NodeConnector for FixedConnector {
    fn connect(&self, _network: Network) -> Option<Arc<dyn NodeClient>> {
        self.0.clone().map(|node| node as Arc<dyn NodeClient>)
    }
}

/// Key store and network manager sharing one in-memory storage
pub fn wallet_backend(node: Option<Arc<MockNode>>) -> (KeyStore, NetworkManager) {
    let storage = Arc::new(MemoryStorage::new());
    let keys = KeyStore::new(storage.clone());
    let networks = NetworkManager::new(storage, Arc::new(FixedConnector(node)));
    (keys, networks)
}

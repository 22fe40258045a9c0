//! Current network selection
//!
//! Persists which [`Network`] the wallet is pointed at and hands out node
//! connections for it.

use crate::config::Network;
use crate::node::{NodeClient, NodeConnector};
use crate::storage::Storage;
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;

/// Storage key holding the selected network key
pub const CURRENT_NETWORK_KEY: &str = "cyberex_current_network";

/// Network selection backed by the shared storage
#[derive(Clone)]
pub struct NetworkManager {
    storage: Arc<dyn Storage>,
    connector: Arc<dyn NodeConnector>,
}

impl NetworkManager {
    pub fn new(storage: Arc<dyn Storage>, connector: Arc<dyn NodeConnector>) -> Self {
        Self { storage, connector }
    }

    /// The selected network, Ethereum if none (or an unknown one) is stored
    pub async fn current_network(&self) -> Result<Network> {
        let stored = self.storage.get(CURRENT_NETWORK_KEY).await?;
        let network = stored
            .as_ref()
            .and_then(Value::as_str)
            .and_then(Network::from_key)
            .unwrap_or_default();
        Ok(network)
    }

    /// Select a network by key ("ethereum", "bsc", ...)
    pub async fn set_current_network(&self, key: &str) -> Result<Network> {
        let network =
            Network::from_key(key).ok_or_else(|| Error::UnsupportedNetwork(key.to_string()))?;
        self.storage
            .set(CURRENT_NETWORK_KEY, Value::String(network.key().to_string()))
            .await?;
        tracing::info!(network = network.key(), chain_id = network.chain_id(), "Switched network");
        Ok(network)
    }

    /// Node connection for the selected network, if one is configured
    pub async fn client(&self) -> Result<Option<Arc<dyn NodeClient>>> {
        let network = self.current_network().await?;
        Ok(self.connector.connect(network))
    }

    pub fn all() -> &'static [Network] {
        &Network::ALL
    }

    pub fn by_chain_id(chain_id: u64) -> Option<Network> {
        Network::from_chain_id(chain_id)
    }

    pub fn by_key(key: &str) -> Option<Network> {
        Network::from_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RpcConfig;
    use crate::node::RpcConnector;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn manager(storage: Arc<MemoryStorage>) -> NetworkManager {
        NetworkManager::new(storage, Arc::new(RpcConnector::new(RpcConfig::empty())))
    }

    #[tokio::test]
    async fn test_defaults_to_ethereum() {
        let networks = manager(Arc::new(MemoryStorage::new()));
        assert_eq!(networks.current_network().await.unwrap(), Network::Ethereum);
    }

    #[tokio::test]
    async fn test_set_current_network_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let networks = manager(storage.clone());

        networks.set_current_network("polygon").await.unwrap();
        assert_eq!(networks.current_network().await.unwrap(), Network::Polygon);
        assert_eq!(
            storage.get(CURRENT_NETWORK_KEY).await.unwrap(),
            Some(json!("polygon"))
        );
    }

    #[tokio::test]
    async fn test_rejects_unknown_network() {
        let storage = Arc::new(MemoryStorage::new());
        let networks = manager(storage.clone());

        let err = networks.set_current_network("solana").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedNetwork(_)));
        assert!(storage.get(CURRENT_NETWORK_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_stored_key_falls_back() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(CURRENT_NETWORK_KEY, json!("base")).await.unwrap();
        let networks = manager(storage);
        assert_eq!(networks.current_network().await.unwrap(), Network::Ethereum);
    }

    #[test]
    fn test_lookups() {
        assert_eq!(NetworkManager::all().len(), 7);
        assert_eq!(NetworkManager::by_chain_id(56), Some(Network::Bsc));
        assert_eq!(NetworkManager::by_key("fantom"), Some(Network::Fantom));
        assert_eq!(NetworkManager::by_key("base"), None);
    }

    #[tokio::test]
    async fn test_no_client_without_endpoint() {
        let networks = manager(Arc::new(MemoryStorage::new()));
        assert!(networks.client().await.unwrap().is_none());
    }
}

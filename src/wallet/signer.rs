//! Transient signing handles
//!
//! SECURITY: A [`WalletSigner`] is the only way stored keys are used.
//! - Built on demand from the key store's current wallet, never cached
//! - Keys live in alloy's PrivateKeySigner and are never serialized
//! - Keys are never logged

use crate::network::NetworkManager;
use crate::node::NodeClient;
use crate::wallet::derive::{address_string, signer_from_private_key};
use crate::wallet::{KeyStore, Wallet};
use crate::{Error, Result};
use alloy::hex;
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, SignerSync};
use std::sync::Arc;

/// A private key bound to an optional node connection
pub struct WalletSigner {
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
    node: Option<Arc<dyn NodeClient>>,
}

impl WalletSigner {
    pub fn new(signer: PrivateKeySigner, node: Option<Arc<dyn NodeClient>>) -> Self {
        let address = signer.address();
        Self {
            signer,
            address,
            node,
        }
    }

    /// Build a signer for a stored wallet record
    pub fn from_wallet(wallet: &Wallet, node: Option<Arc<dyn NodeClient>>) -> Result<Self> {
        let signer = signer_from_private_key(&wallet.private_key)?;
        Ok(Self::new(signer, node))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Lowercase hex address
    pub fn address_string(&self) -> String {
        address_string(&self.address)
    }

    /// Sign an EIP-191 personal message
    pub fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        self.signer
            .sign_message_sync(message)
            .map_err(|e| Error::InvalidArgument(format!("Signing failed: {}", e)))
    }

    /// Sign and submit a transaction through the bound node
    ///
    /// `from` is filled in with this signer's address; a different `from`
    /// is rejected.
    pub async fn send_transaction(&self, mut tx: TransactionRequest) -> Result<B256> {
        let node = self.node.as_ref().ok_or_else(|| {
            Error::Network("No node connection for the current network".to_string())
        })?;

        match tx.from {
            Some(from) if from != self.address => {
                return Err(Error::InvalidArgument(format!(
                    "Transaction from {} does not match the current wallet",
                    address_string(&from)
                )));
            }
            _ => tx.from = Some(self.address),
        }

        let wallet = EthereumWallet::from(self.signer.clone());
        let hash = node.send_transaction(wallet, tx).await?;
        tracing::info!(from = %self.address_string(), tx_hash = %hash, "Submitted transaction");
        Ok(hash)
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSigner")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .field("connected", &self.node.is_some())
            .finish()
    }
}

/// `0x`-prefixed 65-byte `r || s || v` encoding
pub fn signature_hex(signature: &Signature) -> String {
    format!("0x{}", hex::encode(signature.as_bytes()))
}

/// Builds a [`WalletSigner`] for whichever wallet is current right now
#[derive(Clone)]
pub struct SignerFactory {
    keys: KeyStore,
    networks: NetworkManager,
}

impl SignerFactory {
    pub fn new(keys: KeyStore, networks: NetworkManager) -> Self {
        Self { keys, networks }
    }

    /// `None` when no wallet is selected
    pub async fn get_signer(&self) -> Result<Option<WalletSigner>> {
        let Some(wallet) = self.keys.get_current().await? else {
            return Ok(None);
        };

        let node = self.networks.client().await?;
        WalletSigner::from_wallet(&wallet, node).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RpcConfig;
    use crate::node::RpcConnector;
    use crate::storage::MemoryStorage;

    // Test private key (DO NOT use in production!)
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const OTHER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const OTHER_ADDRESS: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

    fn factory() -> (SignerFactory, KeyStore) {
        let storage = Arc::new(MemoryStorage::new());
        let keys = KeyStore::new(storage.clone());
        let networks =
            NetworkManager::new(storage, Arc::new(RpcConnector::new(RpcConfig::empty())));
        (SignerFactory::new(keys.clone(), networks), keys)
    }

    #[tokio::test]
    async fn test_no_signer_without_current_wallet() {
        let (factory, keys) = factory();
        assert!(factory.get_signer().await.unwrap().is_none());

        keys.import_from_private_key(TEST_KEY, None).await.unwrap();
        assert!(factory.get_signer().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signer_follows_wallet_switch() {
        let (factory, keys) = factory();
        keys.import_from_private_key(TEST_KEY, None).await.unwrap();
        keys.import_from_private_key(OTHER_KEY, None).await.unwrap();

        keys.set_current(TEST_ADDRESS).await.unwrap();
        let first = factory.get_signer().await.unwrap().unwrap();
        assert_eq!(first.address_string(), TEST_ADDRESS);

        keys.set_current(OTHER_ADDRESS).await.unwrap();
        let second = factory.get_signer().await.unwrap().unwrap();
        assert_eq!(second.address_string(), OTHER_ADDRESS);
    }

    #[tokio::test]
    async fn test_signature_recovers_to_signer() {
        let (factory, keys) = factory();
        keys.import_from_private_key(TEST_KEY, None).await.unwrap();
        keys.set_current(TEST_ADDRESS).await.unwrap();
        let signer = factory.get_signer().await.unwrap().unwrap();

        let signature = signer.sign_message(b"hello").unwrap();
        let recovered = signature.recover_address_from_msg(b"hello").unwrap();
        assert_eq!(recovered, signer.address());
        assert_eq!(signature_hex(&signature).len(), 2 + 130);
    }

    #[tokio::test]
    async fn test_send_without_node_is_network_error() {
        let (factory, keys) = factory();
        keys.import_from_private_key(TEST_KEY, None).await.unwrap();
        keys.set_current(TEST_ADDRESS).await.unwrap();
        let signer = factory.get_signer().await.unwrap().unwrap();

        let err = signer
            .send_transaction(TransactionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let wallet = Wallet {
            address: TEST_ADDRESS.to_string(),
            private_key: TEST_KEY.to_string(),
            mnemonic: None,
            name: None,
        };
        let signer = WalletSigner::from_wallet(&wallet, None).unwrap();
        let debug_str = format!("{:?}", signer);

        assert!(!debug_str.contains("ac0974bec"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}

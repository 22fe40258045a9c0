//! Durable wallet records and current-wallet selection
//!
//! SECURITY: The key store is the only component that writes private keys
//! or mnemonics to storage.
//! - Inputs are validated before any storage access
//! - Mutations run one at a time behind a write lock
//! - Wallet `Debug` output never includes key material

use crate::storage::Storage;
use crate::wallet::derive::{
    address_string, generate_mnemonic, normalize_address, private_key_string,
    signer_from_mnemonic, signer_from_private_key, validate_mnemonic,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Storage key holding the ordered wallet list
pub const WALLETS_KEY: &str = "cyberex_wallets";
/// Storage key holding the selected wallet address
pub const CURRENT_WALLET_KEY: &str = "cyberex_current_wallet";

/// A stored wallet record
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// Lowercase hex address, unique within a store
    pub address: String,
    /// `0x`-prefixed hex private key
    pub private_key: String,
    /// Recovery phrase, absent for private-key imports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// Implement Debug manually to avoid exposing key material
impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("name", &self.name)
            .field("private_key", &"[REDACTED]")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn default_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => format!("Wallet {}", chrono::Utc::now().timestamp_millis()),
    }
}

/// Wallet records persisted in a [`Storage`]
#[derive(Clone)]
pub struct KeyStore {
    storage: Arc<dyn Storage>,
    write_lock: Arc<Mutex<()>>,
}

impl KeyStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Generate a fresh mnemonic wallet and persist it
    ///
    /// The returned wallet carries the mnemonic so the caller can show it
    /// for backup.
    pub async fn create(&self, name: Option<&str>) -> Result<Wallet> {
        let phrase = generate_mnemonic()?;
        let wallet = self.import_from_mnemonic(&phrase, name).await?;
        tracing::info!(address = %wallet.address, "Created wallet");
        Ok(wallet)
    }

    /// Validate `phrase`, derive its first account and persist it
    pub async fn import_from_mnemonic(&self, phrase: &str, name: Option<&str>) -> Result<Wallet> {
        let normalized = validate_mnemonic(phrase)?;
        let signer = signer_from_mnemonic(&normalized)?;

        let wallet = Wallet {
            address: address_string(&signer.address()),
            private_key: private_key_string(&signer),
            mnemonic: Some(normalized),
            name: Some(default_name(name)),
        };

        self.save(&wallet).await?;
        tracing::debug!(address = %wallet.address, "Imported wallet from mnemonic");
        Ok(wallet)
    }

    /// Validate a hex private key and persist the wallet it controls
    pub async fn import_from_private_key(&self, key: &str, name: Option<&str>) -> Result<Wallet> {
        let signer = signer_from_private_key(key)?;

        let wallet = Wallet {
            address: address_string(&signer.address()),
            private_key: private_key_string(&signer),
            mnemonic: None,
            name: Some(default_name(name)),
        };

        self.save(&wallet).await?;
        tracing::debug!(address = %wallet.address, "Imported wallet from private key");
        Ok(wallet)
    }

    /// All wallets in insertion order
    pub async fn list(&self) -> Result<Vec<Wallet>> {
        match self.storage.get(WALLETS_KEY).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::Storage(format!("corrupt wallet list: {}", e))),
            None => Ok(Vec::new()),
        }
    }

    /// Raw selected address, which may be stale
    pub async fn current_address(&self) -> Result<Option<String>> {
        let stored = self.storage.get(CURRENT_WALLET_KEY).await?;
        Ok(stored.as_ref().and_then(Value::as_str).map(str::to_string))
    }

    /// The selected wallet, `None` if nothing is selected or the selection is stale
    pub async fn get_current(&self) -> Result<Option<Wallet>> {
        let Some(current) = self.current_address().await? else {
            return Ok(None);
        };

        let wallets = self.list().await?;
        Ok(wallets.into_iter().find(|w| w.address == current))
    }

    /// Point the current-wallet selection at `address`
    ///
    /// The address is not checked against the stored wallets.
    pub async fn set_current(&self, address: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let address = normalize_address(address);
        self.storage
            .set(CURRENT_WALLET_KEY, Value::String(address.clone()))
            .await?;
        tracing::info!(address = %address, "Selected wallet");
        Ok(())
    }

    /// Remove a wallet, clearing the selection if it was current
    ///
    /// Returns whether a record was removed.
    pub async fn delete(&self, address: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let address = normalize_address(address);

        let mut wallets = self.list().await?;
        let before = wallets.len();
        wallets.retain(|w| w.address != address);
        let removed = wallets.len() != before;

        if removed {
            self.storage
                .set(WALLETS_KEY, serde_json::to_value(&wallets)?)
                .await?;
        }

        if self.current_address().await?.as_deref() == Some(address.as_str()) {
            self.storage.remove(CURRENT_WALLET_KEY).await?;
        }

        tracing::info!(address = %address, removed, "Deleted wallet");
        Ok(removed)
    }

    /// Upsert keyed by address: replace in place, or append
    pub async fn save(&self, wallet: &Wallet) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut wallets = self.list().await?;
        match wallets.iter_mut().find(|w| w.address == wallet.address) {
            Some(existing) => *existing = wallet.clone(),
            None => wallets.push(wallet.clone()),
        }

        self.storage
            .set(WALLETS_KEY, serde_json::to_value(&wallets)?)
            .await
    }

    /// Wipe all persisted state, not only wallets
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.clear().await?;
        tracing::warn!("Wallet storage reset");
        Ok(())
    }
}

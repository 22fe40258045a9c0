//! Cyberex Wallet
//!
//! Core of a browser-extension Ethereum wallet:
//! - An EIP-1193 provider injected into untrusted pages
//! - A bridge relaying namespaced page requests to the privileged side
//! - A dispatcher routing those requests to the key store and signer
//!
//! # Security Model
//!
//! - Page code only ever sees the provider; it holds no secrets
//! - The bridge forwards only namespaced requests from the page's own origin
//! - Private keys never leave the privileged tier (key store, signer, dispatcher)
//! - Every dispatched request can be written to a JSONL audit trail

pub mod config;
pub mod network;
pub mod node;
pub mod relay;
pub mod rpc;
pub mod storage;
pub mod wallet;

mod error;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use config::{Config, Network, RpcConfig};
pub use error::{Error, Result};
pub use network::NetworkManager;
pub use relay::{load_page, Bridge, Page, PageProvider};
pub use rpc::Dispatcher;
pub use storage::{JsonFileStorage, MemoryStorage, Storage};
pub use wallet::{KeyStore, SignerFactory, Wallet, WalletSigner};

//! Secure wallet management
//!
//! This module handles private key storage and message/transaction signing.
//! Key material NEVER leaves this module and is NEVER handed to page code.

pub mod derive;
mod keystore;
mod signer;

pub use keystore::{KeyStore, Wallet, CURRENT_WALLET_KEY, WALLETS_KEY};
pub use signer::{signature_hex, SignerFactory, WalletSigner};

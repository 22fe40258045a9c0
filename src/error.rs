//! Error types for the wallet core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid mnemonic phrase")]
    InvalidMnemonic,

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("No wallet found. Create or import a wallet first.")]
    NoWallet,

    #[error("No address found")]
    NoAddress,

    #[error("unknown method")]
    UnknownMethod(String),

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error message returned to the page by the wallet backend
    #[error("{0}")]
    Rpc(String),

    #[error("Request {0} timed out")]
    Timeout(String),

    #[error("Request {0} was cancelled")]
    Cancelled(String),

    #[error("Page message bus closed")]
    Disconnected,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

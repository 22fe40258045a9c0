//! Privileged request dispatcher
//!
//! SECURITY: The dispatcher is the only component that can reach the key
//! store and signer factory on behalf of a page.
//! - Every request is answered with a result or `{ "error": message }`
//! - Handler errors and panics never escape into the privileged context
//! - Raw key material never appears in a response

use crate::network::NetworkManager;
use crate::node::format_ether;
use crate::rpc::{error_result, method_from_type, AuditLog, RpcMethod, RpcRequest};
use crate::wallet::{signature_hex, KeyStore, SignerFactory, WalletSigner};
use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;
use futures::FutureExt;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Chain id reported when no node connection is configured
const DEFAULT_CHAIN_ID: &str = "0x1";

/// A relayed request plus the continuation that answers it
#[derive(Debug)]
pub struct TransportRequest {
    pub request: RpcRequest,
    pub reply: oneshot::Sender<Value>,
}

/// Routes page requests to wallet operations
#[derive(Clone)]
pub struct Dispatcher {
    keys: KeyStore,
    signers: SignerFactory,
    networks: NetworkManager,
    audit: Option<AuditLog>,
}

impl Dispatcher {
    pub fn new(keys: KeyStore, networks: NetworkManager) -> Self {
        let signers = SignerFactory::new(keys.clone(), networks.clone());
        Self {
            keys,
            signers,
            networks,
            audit: None,
        }
    }

    /// Append every dispatch outcome to `audit`
    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Start serving a transport; returns its sending half
    pub fn spawn(self, buffer: usize) -> (mpsc::Sender<TransportRequest>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer);
        let handle = tokio::spawn(self.serve(rx));
        (tx, handle)
    }

    /// Answer transport requests until every sender is dropped
    ///
    /// Each request runs in its own task, so a slow node call never holds up
    /// unrelated requests.
    pub async fn serve(self, mut rx: mpsc::Receiver<TransportRequest>) {
        tracing::info!("Dispatcher listening");
        while let Some(TransportRequest { request, reply }) = rx.recv().await {
            let dispatcher = self.clone();
            tokio::spawn(async move {
                let result = dispatcher.dispatch(&request).await;
                if reply.send(result).is_err() {
                    tracing::debug!(id = %request.id, "Requester went away before the reply");
                }
            });
        }
        tracing::info!("Dispatcher transport closed");
    }

    /// Handle one request; never fails
    pub async fn dispatch(&self, request: &RpcRequest) -> Value {
        let started = Instant::now();
        let method = method_from_type(&request.kind).unwrap_or(&request.method);

        let outcome = AssertUnwindSafe(self.route(method, &request.params))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(Error::Rpc("internal wallet error".to_string())));

        let duration_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => tracing::debug!(method, id = %request.id, duration_ms, "Request handled"),
            Err(e) => {
                tracing::warn!(method, id = %request.id, duration_ms, error = %e, "Request failed")
            }
        }
        if let Some(audit) = &self.audit {
            audit.record(method, &request.id, &outcome, duration_ms).await;
        }

        outcome.unwrap_or_else(|e| error_result(e.to_string()))
    }

    async fn route(&self, method: &str, params: &[Value]) -> Result<Value> {
        match method.parse::<RpcMethod>()? {
            RpcMethod::RequestAccounts => self.request_accounts().await,
            RpcMethod::Accounts => Ok(self.accounts().await),
            RpcMethod::SendTransaction => self.send_transaction(params).await,
            RpcMethod::Sign | RpcMethod::PersonalSign => self.sign(params).await,
            RpcMethod::GetBalance => self.get_balance(params).await,
            RpcMethod::ChainId => self.chain_id().await,
            RpcMethod::SwitchEthereumChain => {
                tracing::debug!(?params, "Chain switch requested; ignoring");
                Ok(Value::Null)
            }
        }
    }

    async fn request_accounts(&self) -> Result<Value> {
        let wallet = self.keys.get_current().await?.ok_or(Error::NoWallet)?;
        Ok(json!([wallet.address]))
    }

    async fn accounts(&self) -> Value {
        match self.keys.get_current().await {
            Ok(Some(wallet)) => json!([wallet.address]),
            Ok(None) => json!([]),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read current wallet for eth_accounts");
                json!([])
            }
        }
    }

    async fn signer(&self) -> Result<WalletSigner> {
        self.signers.get_signer().await?.ok_or(Error::NoWallet)
    }

    async fn send_transaction(&self, params: &[Value]) -> Result<Value> {
        let signer = self.signer().await?;
        let tx = params
            .first()
            .ok_or_else(|| Error::InvalidArgument("Missing transaction object".to_string()))?;
        let tx: TransactionRequest = serde_json::from_value(tx.clone())
            .map_err(|e| Error::InvalidArgument(format!("Invalid transaction: {}", e)))?;

        let hash = signer.send_transaction(tx).await?;
        Ok(json!(format!("0x{}", hex::encode(hash.as_slice()))))
    }

    async fn sign(&self, params: &[Value]) -> Result<Value> {
        let signer = self.signer().await?;
        let message = params
            .first()
            .ok_or_else(|| Error::InvalidArgument("Missing message".to_string()))?;
        let bytes = message_bytes(message)?;

        let signature = signer.sign_message(&bytes)?;
        Ok(json!(signature_hex(&signature)))
    }

    async fn get_balance(&self, params: &[Value]) -> Result<Value> {
        let address = match params.first().and_then(Value::as_str) {
            Some(raw) => raw
                .trim()
                .parse::<Address>()
                .map_err(|e| Error::InvalidArgument(format!("Invalid address: {}", e)))?,
            None => {
                let wallet = self.keys.get_current().await?.ok_or(Error::NoAddress)?;
                wallet
                    .address
                    .parse::<Address>()
                    .map_err(|e| Error::Storage(format!("Stored address unreadable: {}", e)))?
            }
        };

        let node = self.networks.client().await?.ok_or_else(|| {
            Error::Network("No node connection for the current network".to_string())
        })?;

        let balance = node.get_balance(address).await?;
        Ok(json!(format_ether(balance)))
    }

    async fn chain_id(&self) -> Result<Value> {
        match self.networks.client().await? {
            Some(node) => {
                let chain_id = node.chain_id().await?;
                Ok(json!(format!("{:#x}", chain_id)))
            }
            None => Ok(json!(DEFAULT_CHAIN_ID)),
        }
    }
}

/// Bytes to sign for `eth_sign`/`personal_sign`
///
/// `0x`-prefixed hex is decoded; any other string is signed as UTF-8.
fn message_bytes(message: &Value) -> Result<Vec<u8>> {
    let text = message
        .as_str()
        .ok_or_else(|| Error::InvalidArgument("Message must be a string".to_string()))?;

    if let Some(digits) = text.strip_prefix("0x") {
        if let Ok(bytes) = hex::decode(digits) {
            return Ok(bytes);
        }
    }
    Ok(text.as_bytes().to_vec())
}

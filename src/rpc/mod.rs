//! Wire envelopes and the supported method set
//!
//! Every message that crosses a context boundary is tagged with the
//! [`NAMESPACE`] prefix so it cannot collide with unrelated page traffic:
//!
//! ```text
//! Request:  { type: "CYBEREX_" + method, id, method, params: [...] }
//! Response: { type: "CYBEREX_" + method + "_RESPONSE", id, result: any | { error } }
//! ```

mod audit;
mod dispatcher;

pub use audit::AuditLog;
pub use dispatcher::{Dispatcher, TransportRequest};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Reserved message namespace
pub const NAMESPACE: &str = "CYBEREX";

/// Suffix marking a response envelope
pub const RESPONSE_SUFFIX: &str = "_RESPONSE";

/// Envelope type for a request to `method`
pub fn request_type(method: &str) -> String {
    format!("{}_{}", NAMESPACE, method)
}

/// Envelope type answering a request of type `request_type`
pub fn response_type(request_type: &str) -> String {
    format!("{}{}", request_type, RESPONSE_SUFFIX)
}

/// Whether `kind` carries the wallet namespace prefix
pub fn is_namespaced(kind: &str) -> bool {
    kind.strip_prefix(NAMESPACE)
        .is_some_and(|rest| rest.starts_with('_'))
}

/// Method name encoded in a request envelope type
pub fn method_from_type(kind: &str) -> Option<&str> {
    kind.strip_prefix(NAMESPACE)?.strip_prefix('_')
}

/// `{ "error": message }`, the only failure shape the page ever sees
pub fn error_result(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

/// Error message carried by a result, if any
pub fn result_error(result: &Value) -> Option<String> {
    match result.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// New correlation id: millisecond timestamp plus random bits
pub fn new_correlation_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(method: &str, params: Vec<Value>) -> Self {
        Self {
            kind: request_type(method),
            id: new_correlation_id(),
            method: method.to_string(),
            params,
        }
    }
}

/// Response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub result: Value,
}

impl RpcResponse {
    /// Response to `request` carrying `result`
    pub fn answering(request: &RpcRequest, result: Value) -> Self {
        Self {
            kind: response_type(&request.kind),
            id: request.id.clone(),
            result,
        }
    }
}

/// Page-facing methods the dispatcher knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    RequestAccounts,
    Accounts,
    SendTransaction,
    Sign,
    PersonalSign,
    GetBalance,
    ChainId,
    SwitchEthereumChain,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 8] = [
        RpcMethod::RequestAccounts,
        RpcMethod::Accounts,
        RpcMethod::SendTransaction,
        RpcMethod::Sign,
        RpcMethod::PersonalSign,
        RpcMethod::GetBalance,
        RpcMethod::ChainId,
        RpcMethod::SwitchEthereumChain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::RequestAccounts => "eth_requestAccounts",
            RpcMethod::Accounts => "eth_accounts",
            RpcMethod::SendTransaction => "eth_sendTransaction",
            RpcMethod::Sign => "eth_sign",
            RpcMethod::PersonalSign => "personal_sign",
            RpcMethod::GetBalance => "eth_getBalance",
            RpcMethod::ChainId => "eth_chainId",
            RpcMethod::SwitchEthereumChain => "wallet_switchEthereumChain",
        }
    }
}

impl FromStr for RpcMethod {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownMethod(s.to_string()))
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

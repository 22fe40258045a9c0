//! Page provider (`window.ethereum`)
//!
//! The only object untrusted page code talks to. It turns method calls into
//! correlated request/response pairs on the page message bus; it holds no
//! secrets and can only reach the wallet through the bridge.

use crate::relay::page::{PageBus, PageMessage};
use crate::rpc::{
    is_namespaced, request_type, response_type, result_error, RpcRequest, RpcResponse,
    RESPONSE_SUFFIX,
};
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

/// `request({ method, params })` arguments
#[derive(Debug, Clone, Deserialize)]
pub struct RequestArguments {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RequestArguments {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

struct PendingRequest {
    method: String,
    /// Envelope type a matching response must carry
    response_type: String,
    reply: oneshot::Sender<Value>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingRequest>>>;

fn lock(pending: &Mutex<HashMap<String, PendingRequest>>) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a call's pending entry when dropped
struct PendingGuard {
    id: String,
    pending: PendingMap,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.id);
    }
}

/// An in-flight call
///
/// The pending entry lives exactly as long as the handle or the future
/// returned by [`RequestHandle::response`]. Dropping either one, e.g. under
/// the caller's own timeout, releases it.
pub struct RequestHandle {
    method: String,
    rx: oneshot::Receiver<Value>,
    cancel: CancellationToken,
    timeout: Option<Duration>,
    guard: PendingGuard,
}

impl RequestHandle {
    /// Correlation id of the request
    pub fn id(&self) -> &str {
        &self.guard.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Abandon the call; a later response is ignored
    pub fn cancel(&self) {
        self.cancel.cancel();
        lock(&self.guard.pending).remove(&self.guard.id);
    }

    /// Token that cancels this call when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the response
    pub async fn response(self) -> Result<Value> {
        let RequestHandle {
            method,
            rx,
            cancel,
            timeout,
            guard,
        } = self;
        let id = guard.id.as_str();

        let reply = async {
            let received = match timeout {
                Some(limit) => tokio::time::timeout(limit, rx)
                    .await
                    .map_err(|_| Error::Timeout(id.to_string()))?,
                None => rx.await,
            };
            received.map_err(|_| Error::Disconnected)
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled(id.to_string())),
            reply = reply => reply,
        };

        let value = match outcome {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(id, method = %method, error = %e, "Page request abandoned");
                return Err(e);
            }
        };

        match result_error(&value) {
            Some(message) => Err(Error::Rpc(message)),
            None => Ok(value),
        }
    }
}

/// EIP-1193 style provider installed into a page
pub struct PageProvider {
    bus: PageBus,
    pending: PendingMap,
    timeout: Option<Duration>,
}

impl PageProvider {
    /// Create a provider on `bus` and start routing responses to it
    ///
    /// `timeout` bounds every call; `None` waits until a response arrives or
    /// the page unloads.
    pub fn new(bus: PageBus, timeout: Option<Duration>) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(route_responses(
            bus.clone(),
            bus.subscribe(),
            Arc::downgrade(&pending),
        ));
        Self {
            bus,
            pending,
            timeout,
        }
    }

    pub fn is_cyberex(&self) -> bool {
        true
    }

    /// Post a request and return a handle to its response
    pub fn issue(&self, method: &str, params: Vec<Value>) -> Result<RequestHandle> {
        if self.bus.is_unloaded() {
            return Err(Error::Disconnected);
        }

        let request = RpcRequest::new(method, params);
        let envelope = serde_json::to_value(&request)?;
        let (reply, rx) = oneshot::channel();

        lock(&self.pending).insert(
            request.id.clone(),
            PendingRequest {
                method: method.to_string(),
                response_type: response_type(&request_type(method)),
                reply,
            },
        );
        self.bus.post(envelope);

        tracing::trace!(id = %request.id, method, "Posted page request");
        Ok(RequestHandle {
            method: method.to_string(),
            rx,
            cancel: CancellationToken::new(),
            timeout: self.timeout,
            guard: PendingGuard {
                id: request.id,
                pending: self.pending.clone(),
            },
        })
    }

    pub async fn request(&self, args: RequestArguments) -> Result<Value> {
        self.issue(&args.method, args.params)?.response().await
    }

    /// Legacy `send(method, params)`
    pub async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.request(RequestArguments::new(method, params)).await
    }

    /// Legacy `enable()`
    pub async fn enable(&self) -> Result<Value> {
        self.send("eth_requestAccounts", Vec::new()).await
    }

    /// Whether `eth_accounts` returns at least one address
    pub async fn is_connected(&self) -> Result<bool> {
        let accounts = self.send("eth_accounts", Vec::new()).await?;
        Ok(accounts.as_array().is_some_and(|a| !a.is_empty()))
    }

    /// Calls still waiting for a response
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl std::fmt::Debug for PageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageProvider")
            .field("origin", self.bus.origin())
            .field("pending", &self.pending_count())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Parse a page message as a response envelope for this page
fn as_response(bus: &PageBus, message: PageMessage) -> Option<RpcResponse> {
    if message.source != *bus.origin() {
        return None;
    }
    let kind = message.data.get("type")?.as_str()?;
    if !is_namespaced(kind) || !kind.ends_with(RESPONSE_SUFFIX) {
        return None;
    }
    serde_json::from_value(message.data).ok()
}

/// Deliver responses to their pending calls until the page unloads or the
/// provider is dropped
async fn route_responses(
    bus: PageBus,
    mut rx: broadcast::Receiver<PageMessage>,
    pending: Weak<Mutex<HashMap<String, PendingRequest>>>,
) {
    let unloaded = bus.unloaded();
    loop {
        let message = tokio::select! {
            _ = unloaded.cancelled() => break,
            message = rx.recv() => message,
        };

        let message = match message {
            Ok(message) => message,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Provider fell behind the page bus");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let Some(response) = as_response(&bus, message) else {
            continue;
        };
        let Some(live) = pending.upgrade() else {
            break;
        };

        let mut map = lock(&live);
        let matches = map
            .get(&response.id)
            .is_some_and(|p| p.response_type == response.kind);
        if matches {
            if let Some(request) = map.remove(&response.id) {
                if request.reply.send(response.result).is_err() {
                    tracing::debug!(id = %response.id, method = %request.method, "Caller stopped waiting");
                }
            }
        }
    }

    // Unload: dropping the senders fails every waiting call
    if let Some(live) = pending.upgrade() {
        lock(&live).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::Page;
    use crate::rpc::error_result;
    use serde_json::json;

    /// Answer the next `count` requests seen on `rx`, in reverse order
    async fn answer_reversed(
        page: Page,
        mut rx: broadcast::Receiver<PageMessage>,
        count: usize,
    ) {
        let mut requests = Vec::new();
        while requests.len() < count {
            let message = rx.recv().await.unwrap();
            if let Ok(request) = serde_json::from_value::<RpcRequest>(message.data) {
                requests.push(request);
            }
        }
        for request in requests.into_iter().rev() {
            let result = json!(format!("answer:{}", request.method));
            let response = RpcResponse::answering(&request, result);
            page.post_message(serde_json::to_value(response).unwrap());
        }
    }

    #[tokio::test]
    async fn test_out_of_order_responses_resolve_independently() {
        let page = Page::new("https://dapp.example");
        let provider = PageProvider::new(page.bus(), Some(Duration::from_secs(5)));
        let responder = tokio::spawn(answer_reversed(page.clone(), page.subscribe(), 2));

        let first = provider.issue("eth_accounts", vec![]).unwrap();
        let second = provider.issue("eth_chainId", vec![]).unwrap();
        assert_ne!(first.id(), second.id());

        let (a, b) = tokio::join!(first.response(), second.response());
        assert_eq!(a.unwrap(), json!("answer:eth_accounts"));
        assert_eq!(b.unwrap(), json!("answer:eth_chainId"));
        assert_eq!(provider.pending_count(), 0);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_result_fails_the_call() {
        let page = Page::new("https://dapp.example");
        let provider = PageProvider::new(page.bus(), Some(Duration::from_secs(5)));
        let mut rx = page.subscribe();

        let handle = provider.issue("eth_requestAccounts", vec![]).unwrap();
        let request: RpcRequest = serde_json::from_value(rx.recv().await.unwrap().data).unwrap();
        let response = RpcResponse::answering(&request, error_result("no wallet"));
        page.post_message(serde_json::to_value(response).unwrap());

        let err = handle.response().await.unwrap_err();
        assert!(matches!(err, Error::Rpc(ref m) if m == "no wallet"));
    }

    #[tokio::test]
    async fn test_ignores_mismatched_and_foreign_responses() {
        let page = Page::new("https://dapp.example");
        let provider = PageProvider::new(page.bus(), Some(Duration::from_millis(200)));
        let mut rx = page.subscribe();

        let handle = provider.issue("eth_accounts", vec![]).unwrap();
        let request: RpcRequest = serde_json::from_value(rx.recv().await.unwrap().data).unwrap();

        // Right id, wrong method
        page.post_message(json!({
            "type": "CYBEREX_eth_chainId_RESPONSE",
            "id": request.id,
            "result": "0x1"
        }));
        // Right envelope, posted by another frame
        page.bus().post_from(
            crate::relay::Origin::new("https://evil.example"),
            serde_json::to_value(RpcResponse::answering(&request, json!(["0xevil"]))).unwrap(),
        );

        let err = handle.response().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(provider.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_releases_pending_entry() {
        let page = Page::new("https://dapp.example");
        let provider = PageProvider::new(page.bus(), None);

        let handle = provider.issue("eth_accounts", vec![]).unwrap();
        assert_eq!(provider.pending_count(), 1);

        let token = handle.cancellation_token();
        let waiter = tokio::spawn(handle.response());
        token.cancel();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
        assert_eq!(provider.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_response_future_releases_pending_entry() {
        let page = Page::new("https://dapp.example");
        let provider = PageProvider::new(page.bus(), None);

        let handle = provider.issue("eth_accounts", vec![]).unwrap();
        let waited = tokio::time::timeout(Duration::from_millis(10), handle.response()).await;
        assert!(waited.is_err());
        assert_eq!(provider.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unload_fails_waiting_calls() {
        let page = Page::new("https://dapp.example");
        let provider = PageProvider::new(page.bus(), None);

        let handle = provider.issue("eth_accounts", vec![]).unwrap();
        page.unload();

        let err = handle.response().await.unwrap_err();
        assert!(matches!(err, Error::Disconnected));
        assert!(matches!(
            provider.issue("eth_accounts", vec![]),
            Err(Error::Disconnected)
        ));
    }

    #[test]
    fn test_request_arguments_deserialize() {
        let args: RequestArguments =
            serde_json::from_value(json!({ "method": "eth_chainId" })).unwrap();
        assert_eq!(args.method, "eth_chainId");
        assert!(args.params.is_empty());
    }
}

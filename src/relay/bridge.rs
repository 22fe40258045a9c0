//! Content-script bridge
//!
//! Runs alongside the page with access to both the page message bus and the
//! privileged transport. It injects the provider exactly once, then relays
//! namespaced requests from the page's own origin to the dispatcher and posts
//! the answers back under the matching response type.

use crate::relay::page::{Page, PageEvent, PageMessage};
use crate::relay::PageProvider;
use crate::rpc::{
    error_result, is_namespaced, RpcRequest, RpcResponse, TransportRequest, RESPONSE_SUFFIX,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Script node injected into the document
pub const INPAGE_SCRIPT: &str = "inpage.js";

/// Result posted when the privileged side cannot be reached
const BACKEND_UNAVAILABLE: &str = "wallet backend unavailable";

/// Bridge between one page and the dispatcher
#[derive(Clone)]
pub struct Bridge {
    page: Page,
    transport: mpsc::Sender<TransportRequest>,
}

impl Bridge {
    pub fn new(page: Page, transport: mpsc::Sender<TransportRequest>) -> Self {
        Self { page, transport }
    }

    /// Install the provider into the page
    ///
    /// The script node is attached, evaluated and detached again, then
    /// `ethereum#initialized` fires. Returns `false` without side effects if
    /// the page already has a provider.
    pub fn inject(&self, timeout: Option<Duration>) -> bool {
        if self.page.ethereum().is_some() {
            return false;
        }

        self.page.append_node(INPAGE_SCRIPT);
        let provider = Arc::new(PageProvider::new(self.page.bus(), timeout));
        let installed = self.page.install_provider(provider);
        self.page.remove_node(INPAGE_SCRIPT);

        if installed {
            self.page.dispatch_event(PageEvent::EthereumInitialized);
            tracing::info!(origin = %self.page.origin(), "Provider injected");
        }
        installed
    }

    /// Start relaying page requests; the task ends when the page unloads
    ///
    /// A page carries at most one relay. Returns `None` if another bridge is
    /// already attached, so no request is ever forwarded twice.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if !self.page.attach_bridge() {
            tracing::debug!(origin = %self.page.origin(), "Page already bridged");
            return None;
        }
        // Subscribe before spawning so nothing posted after `start` returns is missed
        let rx = self.page.subscribe();
        Some(tokio::spawn(self.clone().relay(rx)))
    }

    async fn relay(self, mut rx: broadcast::Receiver<PageMessage>) {
        let unloaded = self.page.bus().unloaded();
        loop {
            let message = tokio::select! {
                _ = unloaded.cancelled() => break,
                message = rx.recv() => message,
            };

            match message {
                Ok(message) => {
                    if let Some(request) = self.accept(message) {
                        tokio::spawn(self.clone().forward(request));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Bridge fell behind the page bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!(origin = %self.page.origin(), "Bridge stopped");
    }

    /// Keep only well-formed wallet requests posted by the page itself
    fn accept(&self, message: PageMessage) -> Option<RpcRequest> {
        if message.source != *self.page.origin() {
            return None;
        }
        let kind = message.data.get("type").and_then(Value::as_str)?;
        if !is_namespaced(kind) || kind.ends_with(RESPONSE_SUFFIX) {
            return None;
        }

        match serde_json::from_value::<RpcRequest>(message.data) {
            Ok(request) => Some(request),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping malformed wallet request");
                None
            }
        }
    }

    async fn forward(self, request: RpcRequest) {
        let (reply, rx) = oneshot::channel();
        let envelope = TransportRequest {
            request: request.clone(),
            reply,
        };

        let result = match self.transport.send(envelope).await {
            Ok(()) => rx.await.unwrap_or_else(|_| {
                tracing::warn!(id = %request.id, "Dispatcher dropped the request");
                error_result(BACKEND_UNAVAILABLE)
            }),
            Err(_) => {
                tracing::warn!(id = %request.id, "Privileged transport closed");
                error_result(BACKEND_UNAVAILABLE)
            }
        };

        match serde_json::to_value(RpcResponse::answering(&request, result)) {
            Ok(response) => self.page.post_message(response),
            Err(e) => tracing::error!(id = %request.id, error = %e, "Failed to encode response"),
        }
    }
}

//! The untrusted page's execution context
//!
//! A [`Page`] models one page load: a message bus every script on the page
//! (and every embedded frame) can post to and listen on, a page-visible
//! event channel, a document to inject script nodes into, and the global
//! slot where the wallet provider gets installed.

use crate::relay::PageProvider;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Buffered messages per listener before it starts lagging
const BUS_CAPACITY: usize = 256;

/// Origin a message was posted from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin(String);

impl Origin {
    pub fn new(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message on the page bus
#[derive(Debug, Clone)]
pub struct PageMessage {
    pub source: Origin,
    pub data: Value,
}

/// Page-visible events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// The wallet provider is installed and ready
    EthereumInitialized,
}

impl PageEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PageEvent::EthereumInitialized => "ethereum#initialized",
        }
    }
}

/// Posting/listening handle on a page's message bus
#[derive(Clone)]
pub struct PageBus {
    origin: Origin,
    messages: broadcast::Sender<PageMessage>,
    unloaded: CancellationToken,
}

impl PageBus {
    /// The page's own origin
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Post `data` from the page's own origin
    pub fn post(&self, data: Value) {
        self.post_from(self.origin.clone(), data);
    }

    /// Post `data` from another origin sharing the bus (e.g. an iframe)
    pub fn post_from(&self, source: Origin, data: Value) {
        if self.is_unloaded() {
            return;
        }
        // No listeners is not an error for postMessage
        let _ = self.messages.send(PageMessage { source, data });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageMessage> {
        self.messages.subscribe()
    }

    /// Fires when the page is torn down
    pub fn unloaded(&self) -> CancellationToken {
        self.unloaded.clone()
    }

    pub fn is_unloaded(&self) -> bool {
        self.unloaded.is_cancelled()
    }
}

struct PageInner {
    bus: PageBus,
    events: broadcast::Sender<PageEvent>,
    document: Mutex<Vec<String>>,
    ethereum: OnceLock<Arc<PageProvider>>,
    bridged: AtomicBool,
}

/// One loaded page
#[derive(Clone)]
pub struct Page {
    inner: Arc<PageInner>,
}

impl Page {
    pub fn new(origin: impl Into<String>) -> Self {
        let (messages, _) = broadcast::channel(BUS_CAPACITY);
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(PageInner {
                bus: PageBus {
                    origin: Origin::new(origin),
                    messages,
                    unloaded: CancellationToken::new(),
                },
                events,
                document: Mutex::new(Vec::new()),
                ethereum: OnceLock::new(),
                bridged: AtomicBool::new(false),
            }),
        }
    }

    pub fn origin(&self) -> &Origin {
        self.inner.bus.origin()
    }

    pub fn bus(&self) -> PageBus {
        self.inner.bus.clone()
    }

    /// `window.postMessage` from page script
    pub fn post_message(&self, data: Value) {
        self.inner.bus.post(data);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageMessage> {
        self.inner.bus.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PageEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn dispatch_event(&self, event: PageEvent) {
        tracing::debug!(event = event.name(), origin = %self.origin(), "Page event");
        let _ = self.inner.events.send(event);
    }

    /// `window.ethereum`
    pub fn ethereum(&self) -> Option<Arc<PageProvider>> {
        self.inner.ethereum.get().cloned()
    }

    /// `window.cyberex`, the same provider under the wallet's own name
    pub fn cyberex(&self) -> Option<Arc<PageProvider>> {
        self.ethereum()
    }

    /// Install the provider; `false` if one is already installed
    pub(crate) fn install_provider(&self, provider: Arc<PageProvider>) -> bool {
        self.inner.ethereum.set(provider).is_ok()
    }

    /// Claim the page's single bridge slot; `false` if a bridge already runs
    pub(crate) fn attach_bridge(&self) -> bool {
        !self.inner.bridged.swap(true, Ordering::SeqCst)
    }

    /// Whether a bridge is relaying for this page
    pub fn has_bridge(&self) -> bool {
        self.inner.bridged.load(Ordering::SeqCst)
    }

    /// Script nodes currently attached to the document
    pub fn document_nodes(&self) -> Vec<String> {
        self.document().clone()
    }

    pub(crate) fn append_node(&self, node: &str) {
        self.document().push(node.to_string());
    }

    pub(crate) fn remove_node(&self, node: &str) {
        self.document().retain(|n| n != node);
    }

    fn document(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.inner
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Tear the page down; listeners stop and pending calls are orphaned
    pub fn unload(&self) {
        tracing::debug!(origin = %self.origin(), "Page unloaded");
        self.inner.bus.unloaded.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_messages_carry_their_origin() {
        let page = Page::new("https://dapp.example");
        let mut rx = page.subscribe();

        page.post_message(json!({ "hello": 1 }));
        page.bus()
            .post_from(Origin::new("https://ads.example"), json!({ "hello": 2 }));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.source, *page.origin());
        let second = rx.recv().await.unwrap();
        assert_eq!(second.source.as_str(), "https://ads.example");
    }

    #[tokio::test]
    async fn test_unloaded_page_drops_posts() {
        let page = Page::new("https://dapp.example");
        let mut rx = page.subscribe();
        page.unload();
        page.post_message(json!(1));
        assert!(rx.try_recv().is_err());
        assert!(page.bus().is_unloaded());
    }

    #[test]
    fn test_single_bridge_slot() {
        let page = Page::new("https://dapp.example");
        assert!(!page.has_bridge());
        assert!(page.attach_bridge());
        assert!(!page.attach_bridge());
        assert!(page.clone().has_bridge());
    }

    #[test]
    fn test_document_nodes() {
        let page = Page::new("https://dapp.example");
        page.append_node("a");
        page.append_node("b");
        page.remove_node("a");
        assert_eq!(page.document_nodes(), vec!["b".to_string()]);
    }
}

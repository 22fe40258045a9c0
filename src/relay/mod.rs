//! Page-to-wallet relay
//!
//! Three isolated tiers, connected only by messages:
//!
//! ```text
//! page script ── PageProvider ──(page bus)── Bridge ──(transport)── Dispatcher
//! ```
//!
//! The provider lives in the untrusted page and holds nothing sensitive. The
//! bridge shares the page bus but only forwards namespaced requests from the
//! page's own origin. The dispatcher owns the key store.

mod bridge;
mod page;
mod provider;

pub use bridge::{Bridge, INPAGE_SCRIPT};
pub use page::{Origin, Page, PageBus, PageEvent, PageMessage};
pub use provider::{PageProvider, RequestArguments, RequestHandle};

use crate::rpc::TransportRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Attach a bridge to `page` and inject the provider
///
/// Returns the installed provider and the bridge's relay task. Loading a page
/// that is already bridged returns its existing provider and no new relay.
pub fn load_page(
    page: &Page,
    transport: mpsc::Sender<TransportRequest>,
    timeout: Option<Duration>,
) -> (Option<Arc<PageProvider>>, Option<JoinHandle<()>>) {
    let bridge = Bridge::new(page.clone(), transport);
    let relay = bridge.start();
    bridge.inject(timeout);
    (page.ethereum(), relay)
}

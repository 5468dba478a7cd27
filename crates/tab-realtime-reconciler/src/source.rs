//! The event-source seam: where change events come from.
//!
//! The reconciler consumes [`SourceSignal`]s from whatever transport is
//! plugged in behind [`TabEventSource`]. Each `open` call is one connection
//! attempt; when the connection reports a loss (or its channel closes) the
//! reconciler decides whether and when to open a new one.

use futures_util::future::BoxFuture;
use tab_protocol_types::ChangeEvent;
use tokio::sync::mpsc;

/// Scope of a stream subscription: one customer's tab rows.
#[derive(Clone)]
pub struct StreamFilter {
    pub customer_id: String,
    pub access_token: String,
}

impl StreamFilter {
    /// Server-side equality filter expression for the subscription.
    pub fn wire_expression(&self) -> String {
        format!("customer_id=eq.{}", self.customer_id)
    }
}

impl std::fmt::Debug for StreamFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFilter")
            .field("customer_id", &self.customer_id)
            .finish_non_exhaustive()
    }
}

/// Signals delivered by an open connection.
#[derive(Debug)]
pub enum SourceSignal {
    /// The subscription was acknowledged; events will follow.
    Established,
    Event(ChangeEvent),
    /// The connection failed. The reconciler owns the retry policy.
    Lost(String),
}

/// One open connection. Dropping it (closing the receiver) tells the source
/// to stop producing.
pub struct SourceConnection {
    pub signals: mpsc::Receiver<SourceSignal>,
}

/// A transport that can stream tab change events for one customer.
pub trait TabEventSource: Send + Sync {
    /// Open a server-filtered connection. Never fails directly: connection
    /// problems surface as [`SourceSignal::Lost`] on the channel.
    fn open(&self, filter: StreamFilter) -> BoxFuture<'_, SourceConnection>;
}

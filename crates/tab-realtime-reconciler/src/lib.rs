//! Keeps the local active-tab collection consistent with backend changes.
//!
//! A [`TabRealtimeReconciler`] owns the collection and one subscription to a
//! pluggable [`TabEventSource`]. Delivered INSERT/UPDATE/DELETE events are
//! merged in delivery order on the UI work queue; stream loss is handled with
//! bounded exponential backoff, ending in a degraded status once retries run
//! out. [`PollingEventSource`] is the bundled transport.

mod error;
mod polling;
mod reconciler;
mod source;
mod subscription_fsm;

pub use error::{RealtimeError, RealtimeResult};
pub use polling::PollingEventSource;
pub use reconciler::{ReconcilerConfig, TabFetcher, TabRealtimeReconciler, TabsUiEffect};
pub use source::{SourceConnection, SourceSignal, StreamFilter, TabEventSource};
pub use subscription_fsm::RealtimeStatus;

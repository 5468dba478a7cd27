//! Polling-backed event source.
//!
//! Stands in for a push transport: it polls the tabs REST endpoint on an
//! interval, diffs consecutive snapshots, and synthesizes the same change
//! events a realtime stream would deliver. The first successful poll counts
//! as the subscription acknowledgement; a run of consecutive poll failures
//! counts as a stream loss, handing the retry decision back to the
//! reconciler.

use crate::source::{SourceConnection, SourceSignal, StreamFilter, TabEventSource};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::time::Duration;
use tab_protocol_types::{ChangeEvent, ChangeEventType, Tab, TabRecordPatch};
use tabs_api::TabsClient;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Consecutive poll failures before the connection is reported lost.
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

const SIGNAL_BUFFER: usize = 64;

pub struct PollingEventSource {
    client: TabsClient,
    interval: Duration,
    failure_threshold: u32,
}

impl PollingEventSource {
    pub fn new(client: TabsClient) -> Self {
        Self {
            client,
            interval: DEFAULT_POLL_INTERVAL,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }
}

impl TabEventSource for PollingEventSource {
    fn open(&self, filter: StreamFilter) -> BoxFuture<'_, SourceConnection> {
        let client = self.client.clone();
        let interval = self.interval;
        let threshold = self.failure_threshold;
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
            tokio::spawn(poll_loop(client, filter, interval, threshold, tx));
            SourceConnection { signals: rx }
        })
    }
}

impl std::fmt::Debug for PollingEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingEventSource")
            .field("interval", &self.interval)
            .field("failure_threshold", &self.failure_threshold)
            .finish_non_exhaustive()
    }
}

async fn poll_loop(
    client: TabsClient,
    filter: StreamFilter,
    interval: Duration,
    threshold: u32,
    tx: mpsc::Sender<SourceSignal>,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut known: Option<HashMap<String, Tab>> = None;
    let mut failures: u32 = 0;

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            return;
        }

        match client
            .fetch_active_tabs(&filter.customer_id, &filter.access_token)
            .await
        {
            Ok(rows) => {
                failures = 0;
                match &known {
                    None => {
                        known = Some(index_by_id(rows));
                        if tx.send(SourceSignal::Established).await.is_err() {
                            return;
                        }
                    }
                    Some(previous) => {
                        let events = diff_snapshots(previous, &rows);
                        if !events.is_empty() {
                            debug!(count = events.len(), "poll diff produced change events");
                        }
                        known = Some(index_by_id(rows));
                        for event in events {
                            if tx.send(SourceSignal::Event(event)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            Err(err) => {
                failures += 1;
                warn!(error = %err, failures, "tab poll failed");
                if failures >= threshold {
                    let _ = tx
                        .send(SourceSignal::Lost(format!(
                            "{failures} consecutive poll failures: {err}"
                        )))
                        .await;
                    return;
                }
            }
        }
    }
}

fn index_by_id(rows: Vec<Tab>) -> HashMap<String, Tab> {
    rows.into_iter().map(|tab| (tab.id.clone(), tab)).collect()
}

/// Synthesize change events from two consecutive snapshots.
///
/// Rows that appeared become Inserts, rows that disappeared become Deletes
/// (a tab leaving the active filter looks like a disappearance), and rows
/// whose watched fields differ become Updates carrying only those fields.
fn diff_snapshots(previous: &HashMap<String, Tab>, next: &[Tab]) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for tab in next {
        match previous.get(&tab.id) {
            None => events.push(ChangeEvent::new(
                ChangeEventType::Insert,
                TabRecordPatch::for_id(&tab.id),
            )),
            Some(old) => {
                if let Some(patch) = change_patch(old, tab) {
                    events.push(ChangeEvent::new(ChangeEventType::Update, patch));
                }
            }
        }
    }

    for id in previous.keys() {
        if !next.iter().any(|tab| &tab.id == id) {
            events.push(ChangeEvent::new(
                ChangeEventType::Delete,
                TabRecordPatch::for_id(id.clone()),
            ));
        }
    }

    events
}

/// Patch carrying only the fields that differ, or `None` when nothing did.
fn change_patch(old: &Tab, new: &Tab) -> Option<TabRecordPatch> {
    let mut patch = TabRecordPatch::for_id(&new.id);
    let mut changed = false;

    if old.total != new.total {
        patch.total = Some(new.total);
        changed = true;
    }
    if old.status != new.status {
        patch.status = Some(new.status);
        changed = true;
    }
    if old.tab_number != new.tab_number {
        patch.tab_number = new.tab_number;
        changed = true;
    }

    changed.then_some(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tab_protocol_types::TabStatus;

    fn tab(id: &str, total: f64) -> Tab {
        serde_json::from_str(&format!(
            r#"{{ "id": "{id}", "status": "active", "total": {total} }}"#
        ))
        .unwrap()
    }

    fn snapshot(tabs: &[Tab]) -> HashMap<String, Tab> {
        index_by_id(tabs.to_vec())
    }

    #[test]
    fn test_identical_snapshots_produce_no_events() {
        let rows = vec![tab("t1", 10.0), tab("t2", 20.0)];
        assert!(diff_snapshots(&snapshot(&rows), &rows).is_empty());
    }

    #[test]
    fn test_new_row_becomes_an_insert() {
        let previous = snapshot(&[tab("t1", 10.0)]);
        let next = vec![tab("t1", 10.0), tab("t2", 0.0)];

        let events = diff_snapshots(&previous, &next);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, ChangeEventType::Insert);
        assert_eq!(events[0].record.id, "t2");
    }

    #[test]
    fn test_missing_row_becomes_a_delete() {
        let previous = snapshot(&[tab("t1", 10.0), tab("t2", 20.0)]);
        let next = vec![tab("t1", 10.0)];

        let events = diff_snapshots(&previous, &next);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, ChangeEventType::Delete);
        assert_eq!(events[0].record.id, "t2");
    }

    #[test]
    fn test_changed_total_becomes_a_sparse_update() {
        let previous = snapshot(&[tab("t1", 10.0)]);
        let next = vec![tab("t1", 35.5)];

        let events = diff_snapshots(&previous, &next);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, ChangeEventType::Update);
        assert_eq!(events[0].record.total, Some(35.5));
        // Unchanged fields are not carried
        assert_eq!(events[0].record.status, None);
        assert_eq!(events[0].record.tab_number, None);
    }

    #[test]
    fn test_status_change_is_detected() {
        let previous = snapshot(&[tab("t1", 10.0)]);
        let mut changed = tab("t1", 10.0);
        changed.status = TabStatus::Paid;

        let events = diff_snapshots(&previous, &[changed]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].record.status, Some(TabStatus::Paid));
    }

    #[test]
    fn test_defaults() {
        let source = PollingEventSource::new(TabsClient::new("https://test.supabase.co", "key"));
        assert_eq!(source.interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(source.failure_threshold, DEFAULT_FAILURE_THRESHOLD);
        // Threshold never drops below one failure
        let source = source.with_failure_threshold(0);
        assert_eq!(source.failure_threshold, 1);
    }
}

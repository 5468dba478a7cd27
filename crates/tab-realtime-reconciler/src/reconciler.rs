//! Merges realtime change events into the local active-tab collection.
//!
//! One worker task per subscription owns the connection loop: it opens the
//! event source, applies delivered events, and handles stream loss with
//! bounded exponential backoff. All collection mutations and listener
//! notifications are marshaled through the UI work queue, so UI-visible state
//! only ever changes on the UI loop. Events are applied strictly in delivery
//! order.

use crate::error::{RealtimeError, RealtimeResult};
use crate::source::{SourceSignal, StreamFilter, TabEventSource};
use crate::subscription_fsm::{RealtimeStatus, SubscriptionInput, SubscriptionMachine};
use futures_util::future::BoxFuture;
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tab_protocol_types::{format_currency, ChangeEvent, ChangeEventType, Tab, TabRecordPatch};
use tabs_api::TabsClient;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use ui_event_dispatch::{ListenerHandle, ListenerRegistry, UiDispatcher};

/// Reconnection policy knobs.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// First-retry backoff; doubles on each further retry.
    pub backoff_base: Duration,
    /// Backoff ceiling.
    pub backoff_max: Duration,
    /// Retries before giving up and going degraded.
    pub max_retries: u32,
    /// Upper bound of the uniform jitter added to each backoff.
    pub jitter_max: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(300),
            max_retries: 20,
            jitter_max: Duration::from_millis(250),
        }
    }
}

/// Collection change surfaced to UI listeners.
#[derive(Debug, Clone)]
pub enum TabsUiEffect {
    /// The whole collection was replaced by a fresh fetch.
    Refreshed(Vec<Tab>),
    /// One tab changed in place.
    Updated(Tab),
    /// A tab left the collection.
    Removed(String),
    /// User-visible notification for an increased total.
    Toast(String),
}

/// Fetches the active-tab collection for re-seeding after an insert or a
/// reconnect. Split from [`TabsClient`] so tests can script it.
pub trait TabFetcher: Send + Sync {
    fn fetch_active_tabs<'a>(
        &'a self,
        access_token: &'a str,
        customer_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Tab>, String>>;
}

impl TabFetcher for TabsClient {
    fn fetch_active_tabs<'a>(
        &'a self,
        access_token: &'a str,
        customer_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Tab>, String>> {
        Box::pin(async move {
            TabsClient::fetch_active_tabs(self, customer_id, access_token)
                .await
                .map_err(|err| err.to_string())
        })
    }
}

struct ActiveSubscription {
    customer_id: String,
    stop: oneshot::Sender<()>,
}

/// Owns the local active-tab collection and the single realtime subscription.
pub struct TabRealtimeReconciler {
    source: Arc<dyn TabEventSource>,
    fetcher: Arc<dyn TabFetcher>,
    dispatcher: UiDispatcher,
    tabs: Arc<Mutex<Vec<Tab>>>,
    effects: ListenerRegistry<TabsUiEffect>,
    status_listeners: ListenerRegistry<RealtimeStatus>,
    active: Mutex<Option<ActiveSubscription>>,
    config: ReconcilerConfig,
}

impl TabRealtimeReconciler {
    pub fn new(
        source: Arc<dyn TabEventSource>,
        fetcher: Arc<dyn TabFetcher>,
        dispatcher: UiDispatcher,
    ) -> Self {
        Self {
            source,
            fetcher,
            effects: ListenerRegistry::new(dispatcher.clone()),
            status_listeners: ListenerRegistry::new(dispatcher.clone()),
            dispatcher,
            tabs: Arc::new(Mutex::new(Vec::new())),
            active: Mutex::new(None),
            config: ReconcilerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a collection-change listener. Callbacks run on the UI loop.
    pub fn on_effect(
        &self,
        callback: impl Fn(&TabsUiEffect) + Send + Sync + 'static,
    ) -> ListenerHandle<TabsUiEffect> {
        self.effects.register(callback)
    }

    /// Register a connection-status listener. Callbacks run on the UI loop.
    pub fn on_status(
        &self,
        callback: impl Fn(&RealtimeStatus) + Send + Sync + 'static,
    ) -> ListenerHandle<RealtimeStatus> {
        self.status_listeners.register(callback)
    }

    /// Snapshot of the current collection.
    pub fn tabs(&self) -> Vec<Tab> {
        self.tabs.lock().expect("lock poisoned").clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.lock().expect("lock poisoned").is_some()
    }

    /// Start streaming changes for one customer's tabs.
    ///
    /// At most one subscription may be active; a second `subscribe` without
    /// an intervening [`unsubscribe`](Self::unsubscribe) is rejected, which
    /// is what prevents duplicate delivery when switching customers.
    pub fn subscribe(&self, access_token: &str, customer_id: &str) -> RealtimeResult<()> {
        let mut active = self.active.lock().expect("lock poisoned");
        if active.is_some() {
            return Err(RealtimeError::AlreadySubscribed);
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        *active = Some(ActiveSubscription {
            customer_id: customer_id.to_string(),
            stop: stop_tx,
        });
        info!(customer_id, "subscribing to tab changes");

        let worker = Worker {
            source: self.source.clone(),
            fetcher: self.fetcher.clone(),
            dispatcher: self.dispatcher.clone(),
            tabs: self.tabs.clone(),
            effects: self.effects.clone(),
            status_listeners: self.status_listeners.clone(),
            config: self.config.clone(),
            filter: StreamFilter {
                customer_id: customer_id.to_string(),
                access_token: access_token.to_string(),
            },
        };
        tokio::spawn(worker.run(stop_rx));
        Ok(())
    }

    /// Tear down the active subscription. Idempotent: a no-op when nothing
    /// is subscribed. The collection keeps its last-known state.
    pub fn unsubscribe(&self) {
        let taken = self.active.lock().expect("lock poisoned").take();
        match taken {
            Some(subscription) => {
                let _ = subscription.stop.send(());
                info!(customer_id = %subscription.customer_id, "unsubscribed from tab changes");
                self.status_listeners.notify(RealtimeStatus::Disconnected);
            }
            None => debug!("unsubscribe with no active subscription"),
        }
    }

    /// Tear down the whole collection, as on sign-out.
    pub fn reset(&self) {
        self.unsubscribe();
        let tabs = self.tabs.clone();
        let effects = self.effects.clone();
        self.dispatcher.post(move || {
            tabs.lock().expect("lock poisoned").clear();
            effects.notify(TabsUiEffect::Refreshed(Vec::new()));
        });
    }
}

impl std::fmt::Debug for TabRealtimeReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabRealtimeReconciler")
            .field("subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}

/// Per-subscription connection loop.
struct Worker {
    source: Arc<dyn TabEventSource>,
    fetcher: Arc<dyn TabFetcher>,
    dispatcher: UiDispatcher,
    tabs: Arc<Mutex<Vec<Tab>>>,
    effects: ListenerRegistry<TabsUiEffect>,
    status_listeners: ListenerRegistry<RealtimeStatus>,
    config: ReconcilerConfig,
    filter: StreamFilter,
}

impl Worker {
    async fn run(self, mut stop_rx: oneshot::Receiver<()>) {
        let mut machine = SubscriptionMachine::new();
        let mut retry_count: u32 = 0;

        let _ = machine.consume(&SubscriptionInput::Subscribe);
        self.status_listeners.notify(RealtimeStatus::Subscribing);

        loop {
            let mut connection = self.source.open(self.filter.clone()).await;

            let lost_reason = loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        let _ = machine.consume(&SubscriptionInput::Cancel);
                        debug!("realtime worker cancelled");
                        return;
                    }
                    signal = connection.signals.recv() => match signal {
                        Some(SourceSignal::Established) => {
                            if machine.consume(&SubscriptionInput::Established).is_ok() {
                                retry_count = 0;
                                self.status_listeners.notify(RealtimeStatus::Subscribed);
                                self.refetch().await;
                            } else {
                                debug!("duplicate establish acknowledgement ignored");
                            }
                        }
                        Some(SourceSignal::Event(event)) => self.apply(event).await,
                        Some(SourceSignal::Lost(reason)) => break reason,
                        None => break "stream closed".to_string(),
                    }
                }
            };

            // The last-known-good collection stays untouched across a loss.
            warn!(reason = %lost_reason, "realtime stream lost");
            let _ = machine.consume(&SubscriptionInput::Lost);
            retry_count += 1;

            if retry_count > self.config.max_retries {
                let _ = machine.consume(&SubscriptionInput::Exhausted);
                error!(
                    retries = retry_count - 1,
                    "realtime reconnection retries exhausted"
                );
                self.status_listeners.notify(RealtimeStatus::Degraded);
                // Degraded is terminal until the subscription is torn down.
                let _ = stop_rx.await;
                return;
            }

            self.status_listeners.notify(RealtimeStatus::Reconnecting);
            let delay = compute_backoff(retry_count, &self.config) + jitter(self.config.jitter_max);
            debug!(
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "waiting before reconnect"
            );
            tokio::select! {
                _ = &mut stop_rx => {
                    debug!("realtime worker cancelled during backoff");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            let _ = machine.consume(&SubscriptionInput::RetryDue);
            self.status_listeners.notify(RealtimeStatus::Subscribing);
        }
    }

    /// Apply one delivered event. Runs in delivery order: each event's
    /// processing completes (including any triggered re-fetch) before the
    /// next signal is read.
    async fn apply(&self, event: ChangeEvent) {
        match event.event_type {
            ChangeEventType::Insert => {
                let known = self
                    .tabs
                    .lock()
                    .expect("lock poisoned")
                    .iter()
                    .any(|tab| tab.id == event.record.id);
                if known {
                    debug!(tab_id = %event.record.id, "duplicate insert ignored");
                } else {
                    // The bare payload lacks the joined restaurant fields, so
                    // re-fetch instead of inserting it directly.
                    self.refetch().await;
                }
            }
            ChangeEventType::Update => {
                let tabs = self.tabs.clone();
                let effects = self.effects.clone();
                let record = event.record;
                self.dispatcher.post(move || {
                    let mut tabs = tabs.lock().expect("lock poisoned");
                    match apply_update(&mut tabs, &record) {
                        Some(outcome) => {
                            if outcome.total_increased {
                                effects.notify(TabsUiEffect::Toast(toast_text(&outcome.tab)));
                            }
                            effects.notify(TabsUiEffect::Updated(outcome.tab));
                        }
                        None => debug!(tab_id = %record.id, "update changed nothing or tab unknown"),
                    }
                });
            }
            ChangeEventType::Delete => {
                let tabs = self.tabs.clone();
                let effects = self.effects.clone();
                let id = event.record.id;
                self.dispatcher.post(move || {
                    let mut tabs = tabs.lock().expect("lock poisoned");
                    if remove_tab(&mut tabs, &id) {
                        effects.notify(TabsUiEffect::Removed(id));
                    } else {
                        debug!(tab_id = %id, "delete for absent tab ignored");
                    }
                });
            }
        }
    }

    /// Replace the collection with a fresh fetch. A failed fetch is logged
    /// and leaves the collection untouched.
    async fn refetch(&self) {
        match self
            .fetcher
            .fetch_active_tabs(&self.filter.access_token, &self.filter.customer_id)
            .await
        {
            Ok(fresh) => {
                let tabs = self.tabs.clone();
                let effects = self.effects.clone();
                self.dispatcher.post(move || {
                    let snapshot = fresh.clone();
                    *tabs.lock().expect("lock poisoned") = fresh;
                    effects.notify(TabsUiEffect::Refreshed(snapshot));
                });
            }
            Err(err) => warn!(error = %err, "tab re-fetch failed; keeping last known collection"),
        }
    }
}

struct UpdateOutcome {
    tab: Tab,
    total_increased: bool,
}

/// Field-level merge of an update event into the collection. `None` when the
/// tab is unknown or the patch changed nothing (a duplicate delivery).
fn apply_update(tabs: &mut [Tab], record: &TabRecordPatch) -> Option<UpdateOutcome> {
    let tab = tabs.iter_mut().find(|tab| tab.id == record.id)?;
    let previous_total = tab.total;
    if !record.apply_to(tab) {
        return None;
    }
    Some(UpdateOutcome {
        total_increased: tab.total > previous_total,
        tab: tab.clone(),
    })
}

/// Remove a tab by id. False when it was already absent.
fn remove_tab(tabs: &mut Vec<Tab>, id: &str) -> bool {
    let before = tabs.len();
    tabs.retain(|tab| tab.id != id);
    tabs.len() != before
}

fn toast_text(tab: &Tab) -> String {
    format!(
        "Tab #{} updated: {}",
        tab.display_number(),
        format_currency(tab.total)
    )
}

/// Deterministic backoff component: `base * 2^(retry-1)`, capped.
fn compute_backoff(retry_count: u32, config: &ReconcilerConfig) -> Duration {
    if retry_count == 0 {
        return Duration::ZERO;
    }
    let base_ms = config.backoff_base.as_millis() as u64;
    let max_ms = config.backoff_max.as_millis() as u64;
    let multiplier = 1u64.checked_shl(retry_count - 1).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(multiplier).min(max_ms))
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceConnection;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tab_protocol_types::TabStatus;
    use tokio::sync::mpsc;
    use ui_event_dispatch::{ui_work_queue, UiWorkQueue};

    fn tab(id: &str, number: i64, total: f64) -> Tab {
        serde_json::from_str(&format!(
            r#"{{
                "id": "{id}",
                "tab_number": {number},
                "status": "active",
                "total": {total},
                "restaurant": {{ "id": "rest-1", "name": "Mama Oliech", "logo_url": null }}
            }}"#
        ))
        .unwrap()
    }

    fn update_event(id: &str, total: f64) -> ChangeEvent {
        ChangeEvent::new(
            ChangeEventType::Update,
            TabRecordPatch {
                total: Some(total),
                ..TabRecordPatch::for_id(id)
            },
        )
    }

    // ====== Merge rules (pure) ======

    #[test]
    fn test_update_merges_and_reports_increase() {
        let mut tabs = vec![tab("t1", 7, 0.0)];
        let patch = TabRecordPatch {
            total: Some(25.5),
            ..TabRecordPatch::for_id("t1")
        };

        let outcome = apply_update(&mut tabs, &patch).unwrap();

        assert!(outcome.total_increased);
        assert_eq!(outcome.tab.total, 25.5);
        // Fields absent from the patch are preserved
        assert_eq!(outcome.tab.status, TabStatus::Active);
        assert_eq!(outcome.tab.restaurant_name(), Some("Mama Oliech"));
    }

    #[test]
    fn test_update_for_unknown_tab_is_ignored() {
        let mut tabs = vec![tab("t1", 7, 10.0)];
        let patch = TabRecordPatch {
            total: Some(99.0),
            ..TabRecordPatch::for_id("missing")
        };

        assert!(apply_update(&mut tabs, &patch).is_none());
        assert_eq!(tabs[0].total, 10.0);
    }

    #[test]
    fn test_duplicate_update_is_a_no_op() {
        let mut tabs = vec![tab("t1", 7, 0.0)];
        let patch = TabRecordPatch {
            total: Some(25.5),
            ..TabRecordPatch::for_id("t1")
        };

        assert!(apply_update(&mut tabs, &patch).is_some());
        assert!(apply_update(&mut tabs, &patch).is_none());
        assert_eq!(tabs[0].total, 25.5);
    }

    #[test]
    fn test_decreased_total_is_not_an_increase() {
        let mut tabs = vec![tab("t1", 7, 100.0)];
        let patch = TabRecordPatch {
            total: Some(60.0),
            ..TabRecordPatch::for_id("t1")
        };

        let outcome = apply_update(&mut tabs, &patch).unwrap();
        assert!(!outcome.total_increased);
    }

    #[test]
    fn test_remove_tab_twice() {
        let mut tabs = vec![tab("t1", 7, 0.0), tab("t2", 8, 0.0)];

        assert!(remove_tab(&mut tabs, "t1"));
        assert!(!remove_tab(&mut tabs, "t1"));
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].id, "t2");
    }

    #[test]
    fn test_toast_text_format() {
        let tab = tab("t1", 7, 25.5);
        assert_eq!(toast_text(&tab), "Tab #T-7 updated: KES 25.50");
    }

    // ====== Backoff ======

    #[test]
    fn test_backoff_doubles_from_the_base() {
        let config = ReconcilerConfig::default();

        assert_eq!(compute_backoff(0, &config), Duration::ZERO);
        assert_eq!(compute_backoff(1, &config), Duration::from_secs(2));
        assert_eq!(compute_backoff(2, &config), Duration::from_secs(4));
        assert_eq!(compute_backoff(3, &config), Duration::from_secs(8));
        assert_eq!(compute_backoff(8, &config), Duration::from_secs(256));
    }

    #[test]
    fn test_backoff_caps_at_the_maximum() {
        let config = ReconcilerConfig::default();

        assert_eq!(compute_backoff(9, &config), Duration::from_secs(300));
        assert_eq!(compute_backoff(20, &config), Duration::from_secs(300));
        // Shift overflow saturates rather than wrapping
        assert_eq!(compute_backoff(200, &config), Duration::from_secs(300));
    }

    #[test]
    fn test_jitter_stays_under_its_bound() {
        for _ in 0..50 {
            assert!(jitter(Duration::from_millis(250)) < Duration::from_millis(250));
        }
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
    }

    // ====== Worker integration ======

    /// Scripted event source: each `open` pops one list of signals, delivers
    /// them, then holds the connection open until the receiver is dropped.
    #[derive(Default)]
    struct FakeSource {
        connections: Mutex<VecDeque<Vec<SourceSignal>>>,
        opens: AtomicUsize,
    }

    impl FakeSource {
        fn script(&self, signals: Vec<SourceSignal>) {
            self.connections.lock().unwrap().push_back(signals);
        }
    }

    impl TabEventSource for FakeSource {
        fn open(&self, _filter: StreamFilter) -> BoxFuture<'_, SourceConnection> {
            Box::pin(async move {
                self.opens.fetch_add(1, Ordering::SeqCst);
                let scripted = self
                    .connections
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_default();
                let (tx, rx) = mpsc::channel(16);
                tokio::spawn(async move {
                    for signal in scripted {
                        if tx.send(signal).await.is_err() {
                            return;
                        }
                    }
                    tx.closed().await;
                });
                SourceConnection { signals: rx }
            })
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        calls: AtomicUsize,
        snapshots: Mutex<VecDeque<Vec<Tab>>>,
    }

    impl FakeFetcher {
        fn script(&self, tabs: Vec<Tab>) {
            self.snapshots.lock().unwrap().push_back(tabs);
        }
    }

    impl TabFetcher for FakeFetcher {
        fn fetch_active_tabs<'a>(
            &'a self,
            _access_token: &'a str,
            _customer_id: &'a str,
        ) -> BoxFuture<'a, Result<Vec<Tab>, String>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(self
                    .snapshots
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_default())
            })
        }
    }

    struct Rig {
        reconciler: Arc<TabRealtimeReconciler>,
        source: Arc<FakeSource>,
        fetcher: Arc<FakeFetcher>,
        queue: UiWorkQueue,
        effects: Arc<Mutex<Vec<TabsUiEffect>>>,
        statuses: Arc<Mutex<Vec<RealtimeStatus>>>,
    }

    impl Rig {
        /// Give the worker task time to run, draining UI work as it lands.
        async fn settle(&mut self) {
            for _ in 0..10 {
                tokio::time::sleep(Duration::from_millis(10)).await;
                self.queue.drain_pending();
            }
        }
    }

    fn fast_config() -> ReconcilerConfig {
        ReconcilerConfig {
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(5),
            max_retries: 20,
            jitter_max: Duration::ZERO,
        }
    }

    fn rig_with(config: ReconcilerConfig) -> Rig {
        let (dispatcher, queue) = ui_work_queue(64, tokio::runtime::Handle::current());
        let source = Arc::new(FakeSource::default());
        let fetcher = Arc::new(FakeFetcher::default());
        let reconciler = Arc::new(
            TabRealtimeReconciler::new(source.clone(), fetcher.clone(), dispatcher)
                .with_config(config),
        );

        let effects = Arc::new(Mutex::new(Vec::new()));
        let sink = effects.clone();
        let _e = reconciler.on_effect(move |effect| sink.lock().unwrap().push(effect.clone()));

        let statuses = Arc::new(Mutex::new(Vec::new()));
        let sink = statuses.clone();
        let _s = reconciler.on_status(move |status| sink.lock().unwrap().push(*status));

        Rig {
            reconciler,
            source,
            fetcher,
            queue,
            effects,
            statuses,
        }
    }

    fn rig() -> Rig {
        rig_with(fast_config())
    }

    #[tokio::test]
    async fn test_establish_seeds_the_collection() {
        let mut rig = rig();
        rig.source.script(vec![SourceSignal::Established]);
        rig.fetcher.script(vec![tab("t1", 7, 10.0)]);

        rig.reconciler.subscribe("token", "cust-1").unwrap();
        rig.settle().await;

        assert_eq!(rig.fetcher.calls.load(Ordering::SeqCst), 1);
        let tabs = rig.reconciler.tabs();
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].id, "t1");
        assert_eq!(
            *rig.statuses.lock().unwrap(),
            vec![RealtimeStatus::Subscribing, RealtimeStatus::Subscribed]
        );
        assert!(matches!(
            rig.effects.lock().unwrap().as_slice(),
            [TabsUiEffect::Refreshed(tabs)] if tabs.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_insert_for_unknown_tab_triggers_a_refetch() {
        let mut rig = rig();
        rig.source.script(vec![
            SourceSignal::Established,
            SourceSignal::Event(ChangeEvent::new(
                ChangeEventType::Insert,
                TabRecordPatch::for_id("t2"),
            )),
        ]);
        rig.fetcher.script(vec![tab("t1", 7, 10.0)]);
        rig.fetcher.script(vec![tab("t1", 7, 10.0), tab("t2", 8, 0.0)]);

        rig.reconciler.subscribe("token", "cust-1").unwrap();
        rig.settle().await;

        assert_eq!(rig.fetcher.calls.load(Ordering::SeqCst), 2);
        let tabs = rig.reconciler.tabs();
        assert_eq!(tabs.len(), 2);
        // The joined restaurant summary came from the fetch, not the event
        assert_eq!(tabs[1].restaurant_name(), Some("Mama Oliech"));
    }

    #[tokio::test]
    async fn test_duplicate_insert_does_not_refetch() {
        let mut rig = rig();
        rig.source.script(vec![
            SourceSignal::Established,
            SourceSignal::Event(ChangeEvent::new(
                ChangeEventType::Insert,
                TabRecordPatch::for_id("t1"),
            )),
        ]);
        rig.fetcher.script(vec![tab("t1", 7, 10.0)]);

        rig.reconciler.subscribe("token", "cust-1").unwrap();
        rig.settle().await;

        assert_eq!(rig.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rig.reconciler.tabs().len(), 1);
    }

    #[tokio::test]
    async fn test_update_patches_in_place_and_toasts() {
        let mut rig = rig();
        rig.source.script(vec![
            SourceSignal::Established,
            SourceSignal::Event(update_event("t1", 25.5)),
        ]);
        rig.fetcher.script(vec![tab("t1", 7, 0.0)]);

        rig.reconciler.subscribe("token", "cust-1").unwrap();
        rig.settle().await;

        assert_eq!(rig.reconciler.tabs()[0].total, 25.5);
        let effects = rig.effects.lock().unwrap();
        assert!(effects.iter().any(|effect| matches!(
            effect,
            TabsUiEffect::Toast(text) if text == "Tab #T-7 updated: KES 25.50"
        )));
        assert!(effects.iter().any(|effect| matches!(
            effect,
            TabsUiEffect::Updated(tab) if tab.total == 25.5
        )));
    }

    #[tokio::test]
    async fn test_delete_removes_and_repeat_delete_is_ignored() {
        let mut rig = rig();
        let delete = || {
            SourceSignal::Event(ChangeEvent::new(
                ChangeEventType::Delete,
                TabRecordPatch::for_id("t1"),
            ))
        };
        rig.source
            .script(vec![SourceSignal::Established, delete(), delete()]);
        rig.fetcher.script(vec![tab("t1", 7, 10.0)]);

        rig.reconciler.subscribe("token", "cust-1").unwrap();
        rig.settle().await;

        assert!(rig.reconciler.tabs().is_empty());
        let removals = rig
            .effects
            .lock()
            .unwrap()
            .iter()
            .filter(|effect| matches!(effect, TabsUiEffect::Removed(_)))
            .count();
        assert_eq!(removals, 1);
    }

    #[tokio::test]
    async fn test_stream_loss_reconnects_and_reestablishes() {
        let mut rig = rig();
        rig.source.script(vec![
            SourceSignal::Established,
            SourceSignal::Lost("connection reset".to_string()),
        ]);
        rig.source.script(vec![SourceSignal::Established]);
        rig.fetcher.script(vec![tab("t1", 7, 10.0)]);
        rig.fetcher.script(vec![tab("t1", 7, 10.0)]);

        rig.reconciler.subscribe("token", "cust-1").unwrap();
        rig.settle().await;

        assert_eq!(rig.source.opens.load(Ordering::SeqCst), 2);
        assert_eq!(
            *rig.statuses.lock().unwrap(),
            vec![
                RealtimeStatus::Subscribing,
                RealtimeStatus::Subscribed,
                RealtimeStatus::Reconnecting,
                RealtimeStatus::Subscribing,
                RealtimeStatus::Subscribed,
            ]
        );
        // Collection survived the loss
        assert_eq!(rig.reconciler.tabs().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_goes_degraded() {
        let mut rig = rig_with(ReconcilerConfig {
            max_retries: 0,
            ..fast_config()
        });
        rig.source.script(vec![
            SourceSignal::Established,
            SourceSignal::Lost("gone".to_string()),
        ]);
        rig.fetcher.script(vec![tab("t1", 7, 10.0)]);

        rig.reconciler.subscribe("token", "cust-1").unwrap();
        rig.settle().await;

        assert_eq!(rig.source.opens.load(Ordering::SeqCst), 1);
        assert_eq!(
            rig.statuses.lock().unwrap().last(),
            Some(&RealtimeStatus::Degraded)
        );
        // Last-known-good collection is still on screen
        assert_eq!(rig.reconciler.tabs().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_while_active_is_rejected() {
        let mut rig = rig();
        rig.source.script(vec![SourceSignal::Established]);
        rig.fetcher.script(vec![]);

        rig.reconciler.subscribe("token", "cust-1").unwrap();
        let err = rig.reconciler.subscribe("token", "cust-2").unwrap_err();
        assert!(matches!(err, RealtimeError::AlreadySubscribed));

        rig.settle().await;
        assert_eq!(rig.source.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent_and_allows_resubscribe() {
        let mut rig = rig();
        rig.source.script(vec![SourceSignal::Established]);
        rig.source.script(vec![SourceSignal::Established]);
        rig.fetcher.script(vec![tab("t1", 7, 10.0)]);
        rig.fetcher.script(vec![tab("t1", 7, 10.0)]);

        rig.reconciler.subscribe("token", "cust-1").unwrap();
        rig.settle().await;

        rig.reconciler.unsubscribe();
        rig.reconciler.unsubscribe();
        assert!(!rig.reconciler.is_subscribed());

        rig.reconciler.subscribe("token", "cust-1").unwrap();
        rig.settle().await;
        assert_eq!(rig.source.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reset_clears_the_collection() {
        let mut rig = rig();
        rig.source.script(vec![SourceSignal::Established]);
        rig.fetcher.script(vec![tab("t1", 7, 10.0)]);

        rig.reconciler.subscribe("token", "cust-1").unwrap();
        rig.settle().await;
        assert_eq!(rig.reconciler.tabs().len(), 1);

        rig.reconciler.reset();
        rig.settle().await;

        assert!(!rig.reconciler.is_subscribed());
        assert!(rig.reconciler.tabs().is_empty());
        assert!(matches!(
            rig.effects.lock().unwrap().last(),
            Some(TabsUiEffect::Refreshed(tabs)) if tabs.is_empty()
        ));
    }
}

//! Composition root: builds every long-lived object once and hands out
//! handles. There are no ambient globals; commands receive a `&ClientState`.

use auth_session_engine::{AuthGateway, SessionStore, SupabaseAuthProvider};
use client_config_and_utils::Config;
use std::sync::{Arc, Mutex};
use tab_realtime_reconciler::{PollingEventSource, TabRealtimeReconciler};
use tabs_api::TabsClient;
use tracing::info;
use ui_event_dispatch::{ui_work_queue, UiWorkQueue, DEFAULT_QUEUE_CAPACITY};

pub struct ClientState {
    pub config: Config,
    pub store: Arc<SessionStore>,
    pub gateway: Arc<AuthGateway>,
    pub tabs_client: TabsClient,
    pub reconciler: Arc<TabRealtimeReconciler>,
    /// Consumer side of the UI work queue; the watch loop takes it.
    ui_queue: Mutex<Option<UiWorkQueue>>,
}

impl ClientState {
    pub fn bootstrap(config: Config) -> Self {
        let instance_id = uuid::Uuid::new_v4();
        info!(%instance_id, supabase_url = %config.supabase_url, "bootstrapping client");

        let (dispatcher, ui_queue) =
            ui_work_queue(DEFAULT_QUEUE_CAPACITY, tokio::runtime::Handle::current());

        let store = Arc::new(SessionStore::new());
        let provider = Arc::new(SupabaseAuthProvider::new(
            &config.supabase_url,
            &config.supabase_anon_key,
        ));
        let gateway = Arc::new(AuthGateway::new(
            provider,
            store.clone(),
            dispatcher.clone(),
            &config.app_scheme,
        ));

        let tabs_client = TabsClient::new(&config.supabase_url, &config.supabase_anon_key);
        let source = Arc::new(PollingEventSource::new(tabs_client.clone()));
        let fetcher = Arc::new(tabs_client.clone());
        let reconciler = Arc::new(TabRealtimeReconciler::new(
            source,
            fetcher,
            dispatcher.clone(),
        ));

        Self {
            config,
            store,
            gateway,
            tabs_client,
            reconciler,
            ui_queue: Mutex::new(Some(ui_queue)),
        }
    }

    /// Hand the UI work queue to its owning loop. `None` after the first call.
    pub fn take_ui_queue(&self) -> Option<UiWorkQueue> {
        self.ui_queue.lock().expect("lock poisoned").take()
    }
}

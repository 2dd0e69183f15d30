//! Service wiring: stores (in-memory or Postgres) → workflows.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use labstock_auth::{IdentityProvider, InMemoryIdentityProvider};
use labstock_core::{Clock, SystemClock};
use labstock_events::Event;
use labstock_infra::store::{
    InMemoryIssuanceJournal, InMemoryMaterialRepository, InMemoryMessageStore, InMemoryRecordStore,
};
use labstock_infra::{
    AppConfig, InventoryService, InventorySettings, MessageService, PostgresStore, StoreError,
    TransactionRecorder,
};
use labstock_inventory::InventoryChanged;

pub struct AppServices {
    pub inventory: InventoryService,
    pub messages: MessageService,
    pub identity: Arc<dyn IdentityProvider>,
    changes_tx: broadcast::Sender<InventoryChanged>,
}

impl AppServices {
    /// Postgres when `DATABASE_URL` is set, in-memory otherwise.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        let settings = config.inventory_settings();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        match config.database_url.as_deref() {
            Some(url) => {
                let store = PostgresStore::connect(url).await?;
                store.migrate().await?;
                tracing::info!("using postgres stores");
                Ok(Self::postgres(store, settings, clock))
            }
            None => {
                tracing::info!("DATABASE_URL not set; using in-memory stores");
                Ok(Self::in_memory(settings, clock))
            }
        }
    }

    pub fn in_memory(settings: InventorySettings, clock: Arc<dyn Clock>) -> Self {
        let inventory = InventoryService::new(
            Arc::new(InMemoryMaterialRepository::new()),
            TransactionRecorder::new(Arc::new(InMemoryRecordStore::new())),
            Arc::new(InMemoryIssuanceJournal::new()),
            clock,
            settings,
        );
        let messages = MessageService::new(Arc::new(InMemoryMessageStore::new()));
        Self::assemble(inventory, messages)
    }

    pub fn postgres(store: PostgresStore, settings: InventorySettings, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(store);
        let inventory = InventoryService::new(
            store.clone(),
            TransactionRecorder::new(store.clone()),
            store.clone(),
            clock,
            settings,
        );
        let messages = MessageService::new(store);
        Self::assemble(inventory, messages)
    }

    fn assemble(inventory: InventoryService, messages: MessageService) -> Self {
        // Realtime channel (SSE): lossy broadcast fed from the inventory bus.
        let (changes_tx, _rx) = broadcast::channel::<InventoryChanged>(256);

        let sub = inventory.subscribe();
        let tx = changes_tx.clone();
        std::thread::spawn(move || {
            while let Ok(change) = sub.recv() {
                tracing::debug!(event_type = change.event_type(), material_id = %change.material_id(), "inventory changed");
                let _ = tx.send(change);
            }
        });

        Self {
            inventory,
            messages,
            identity: Arc::new(InMemoryIdentityProvider::new()),
            changes_tx,
        }
    }

    pub fn changes(&self) -> broadcast::Receiver<InventoryChanged> {
        self.changes_tx.subscribe()
    }
}

/// SSE stream of inventory changes (used by `/stream`).
pub fn inventory_sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(services.changes()).filter_map(|msg| match msg {
        Ok(change) => {
            let data = serde_json::to_string(&change).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(change.event_type()).data(data)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

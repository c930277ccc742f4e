use std::sync::Arc;

use server_api::{snapshot_event, ApiContext};
use shared::protocol::ServerEvent;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

#[derive(Clone)]
pub struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) events: broadcast::Sender<ServerEvent>,
    publish_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(api: ApiContext) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            api,
            events,
            publish_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Live `/ws` connections plus direct `subscribe` receivers.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Pushes the current collection to every live subscriber.
    ///
    /// Listing and sending happen under one lock, so snapshots go out in the
    /// order they were read and the last one sent is never older than an
    /// earlier one.
    pub(crate) async fn publish_snapshot(&self) {
        if self.events.receiver_count() == 0 {
            return;
        }
        let _guard = self.publish_lock.lock().await;
        let event = snapshot_event(&self.api).await;
        if self.events.send(event).is_err() {
            debug!("no live subscribers for todo snapshot");
        }
    }
}

//! Push channel bridge
//!
//! Adapts an external change-feed subscription to reconciler refreshes. The
//! transport itself (websocket, SSE, vendor SDK) is behind the
//! [`PushChannel`] trait; the bridge owns the debounce/coalesce behaviour so
//! a burst of gate events does not trigger a refresh storm.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::ChangeEvent;
use crate::services::reconcile::Reconciler;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A subscribe-by-table change feed. Delivery is at-least-once; ordering is
/// guaranteed only per record id, via the event version.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn subscribe(&self, table: &str) -> CoreResult<broadcast::Receiver<ChangeEvent>>;
}

/// Broadcast-backed channel for tests and for embedders that feed events in
/// from their own transport.
pub struct InMemoryPushChannel {
    senders: Mutex<HashMap<String, broadcast::Sender<ChangeEvent>>>,
}

impl InMemoryPushChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            senders: Mutex::new(HashMap::new()),
        })
    }

    /// Deliver an event to current subscribers of a table. Events published
    /// while nobody is subscribed are dropped, matching a live feed.
    pub fn publish(&self, table: &str, event: ChangeEvent) {
        let senders = self.senders.lock().expect("push channel lock poisoned");
        if let Some(sender) = senders.get(table) {
            let _ = sender.send(event);
        }
    }
}

#[async_trait]
impl PushChannel for InMemoryPushChannel {
    async fn subscribe(&self, table: &str) -> CoreResult<broadcast::Receiver<ChangeEvent>> {
        let mut senders = self.senders.lock().expect("push channel lock poisoned");
        let sender = senders
            .entry(table.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0);
        Ok(sender.subscribe())
    }
}

/// Background task feeding a reconciler from one table subscription.
///
/// Events are buffered for the debounce window, coalesced per record id
/// keeping the highest version, then applied in version order. Dropping the
/// bridge unsubscribes (aborts the task).
pub struct PushEventBridge {
    task: JoinHandle<()>,
}

impl PushEventBridge {
    pub async fn spawn(
        channel: &dyn PushChannel,
        table: &str,
        reconciler: Arc<Reconciler>,
        debounce: Duration,
    ) -> CoreResult<Self> {
        let receiver = channel.subscribe(table).await?;
        let table = table.to_string();
        let task = tokio::spawn(async move {
            run_bridge(receiver, table, reconciler, debounce).await;
        });
        Ok(Self { task })
    }
}

impl Drop for PushEventBridge {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_bridge(
    receiver: broadcast::Receiver<ChangeEvent>,
    table: String,
    reconciler: Arc<Reconciler>,
    debounce: Duration,
) {
    let mut stream = BroadcastStream::new(receiver);
    tracing::info!(table = %table, "push bridge subscribed");

    loop {
        // Block until the first event of a burst
        let first = match stream.next().await {
            Some(Ok(event)) => event,
            Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                // At-least-once feed: missed events surface on the next fetch
                tracing::warn!(table = %table, skipped, "push subscription lagged");
                continue;
            }
            None => {
                tracing::info!(table = %table, "push channel closed, bridge stopping");
                return;
            }
        };

        let mut window: HashMap<Uuid, ChangeEvent> = HashMap::new();
        coalesce(&mut window, first);

        // Absorb the rest of the burst until the window elapses
        let deadline = tokio::time::sleep(debounce);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                next = stream.next() => match next {
                    Some(Ok(event)) => coalesce(&mut window, event),
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        tracing::warn!(table = %table, skipped, "push subscription lagged");
                    }
                    None => break,
                },
            }
        }

        let mut events: Vec<ChangeEvent> = window.into_values().collect();
        events.sort_by_key(|event| event.version);
        tracing::debug!(table = %table, count = events.len(), "flushing coalesced push events");
        for event in events {
            reconciler.refresh_event(event);
        }
    }
}

fn coalesce(window: &mut HashMap<Uuid, ChangeEvent>, event: ChangeEvent) {
    match window.get(&event.record_id) {
        Some(existing) if existing.version >= event.version => {}
        _ => {
            window.insert(event.record_id, event);
        }
    }
}

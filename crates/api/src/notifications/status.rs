//! Per-generation status subscriptions.
//!
//! A [`StatusNotifier`] subscription follows one record's change feed and
//! re-emits every change to a single observer channel. At most one
//! subscription exists per `(generation, observer)` pair; subscribing
//! again returns the existing handle.
//!
//! Delivery is at-least-once. When the change feed lags, the current
//! record is re-read from the store and emitted with `resync = true`, so
//! an observer may see the same terminal state twice.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use adreel_core::types::GenerationId;
use adreel_db::models::generation::Generation;
use adreel_db::{GenerationStore, GenerationWatch, WatchEvent};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// One change delivered to an observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// The record as of this change.
    pub generation: Generation,
    /// True when re-read after the change feed dropped events.
    pub resync: bool,
}

/// Channel an observer receives [`StatusEvent`]s on.
pub type StatusSink = mpsc::UnboundedSender<StatusEvent>;

type SubscriptionKey = (GenerationId, String);

struct Subscription {
    serial: u64,
    cancel: CancellationToken,
}

/// Handle to a live subscription. Cloning does not create a new one.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    generation_id: GenerationId,
    observer: String,
    serial: u64,
    cancel: CancellationToken,
}

impl SubscriptionHandle {
    /// False once released, including when the observer's receiver is
    /// dropped.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    fn key(&self) -> SubscriptionKey {
        (self.generation_id, self.observer.clone())
    }
}

/// Fans store changes out to observers, keyed by generation id.
pub struct StatusNotifier {
    store: Arc<dyn GenerationStore>,
    subscriptions: Arc<Mutex<HashMap<SubscriptionKey, Subscription>>>,
    next_serial: AtomicU64,
    shutdown: CancellationToken,
}

impl StatusNotifier {
    pub fn new(store: Arc<dyn GenerationStore>) -> Self {
        Self {
            store,
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            next_serial: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Follow `generation_id` on behalf of `observer`.
    ///
    /// The store watch is opened before this returns, so a caller may read
    /// the current record afterwards without missing a change. If the pair
    /// is already subscribed, `sink` is dropped and the existing handle is
    /// returned.
    pub async fn subscribe(
        &self,
        generation_id: GenerationId,
        observer: impl Into<String>,
        sink: StatusSink,
    ) -> SubscriptionHandle {
        let observer = observer.into();
        let key = (generation_id, observer.clone());

        let mut subscriptions = self.subscriptions.lock().await;
        if let Some(existing) = subscriptions.get(&key) {
            if !existing.cancel.is_cancelled() {
                tracing::debug!(
                    generation_id = %generation_id,
                    observer = %observer,
                    "Reusing existing status subscription",
                );
                return SubscriptionHandle {
                    generation_id,
                    observer,
                    serial: existing.serial,
                    cancel: existing.cancel.clone(),
                };
            }
        }

        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();
        let watch = self.store.watch(generation_id);
        subscriptions.insert(
            key.clone(),
            Subscription {
                serial,
                cancel: cancel.clone(),
            },
        );
        drop(subscriptions);

        tokio::spawn(forward(
            watch,
            Arc::clone(&self.store),
            sink,
            cancel.clone(),
            Arc::clone(&self.subscriptions),
            key,
            serial,
        ));

        tracing::debug!(generation_id = %generation_id, observer = %observer, "Status subscription opened");
        SubscriptionHandle {
            generation_id,
            observer,
            serial,
            cancel,
        }
    }

    /// Release one subscription. Returns `false` if it was already gone.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        handle.cancel.cancel();
        let mut subscriptions = self.subscriptions.lock().await;
        let key = handle.key();
        match subscriptions.get(&key) {
            Some(sub) if sub.serial == handle.serial => {
                subscriptions.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Release every subscription held by `observer`. Returns how many.
    pub async fn detach(&self, observer: &str) -> usize {
        let mut subscriptions = self.subscriptions.lock().await;
        let before = subscriptions.len();
        subscriptions.retain(|(_, owner), sub| {
            if owner == observer {
                sub.cancel.cancel();
                false
            } else {
                true
            }
        });
        before - subscriptions.len()
    }

    /// Number of live subscriptions.
    pub async fn active_count(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    /// Release every subscription. New subscriptions made afterwards are
    /// cancelled immediately.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut subscriptions = self.subscriptions.lock().await;
        let count = subscriptions.len();
        subscriptions.clear();
        tracing::info!(count, "Released all status subscriptions");
    }
}

/// Forward one watch to one sink until cancelled, the sink closes, or
/// the change feed ends. Removes its own registry entry on exit.
async fn forward(
    mut watch: GenerationWatch,
    store: Arc<dyn GenerationStore>,
    sink: StatusSink,
    cancel: CancellationToken,
    subscriptions: Arc<Mutex<HashMap<SubscriptionKey, Subscription>>>,
    key: SubscriptionKey,
    serial: u64,
) {
    let generation_id = watch.id();

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = sink.closed() => {
                tracing::debug!(generation_id = %generation_id, "Status observer dropped its receiver");
                break;
            }
            event = watch.next() => event,
        };

        let delivered = match event {
            Some(WatchEvent::Changed(generation)) => sink.send(StatusEvent {
                generation,
                resync: false,
            }),
            Some(WatchEvent::Lagged(skipped)) => {
                tracing::warn!(
                    generation_id = %generation_id,
                    skipped,
                    "Status feed lagged, re-reading record",
                );
                match store.find_by_id(generation_id).await {
                    Ok(Some(generation)) => sink.send(StatusEvent {
                        generation,
                        resync: true,
                    }),
                    Ok(None) => Ok(()),
                    Err(e) => {
                        tracing::error!(
                            generation_id = %generation_id,
                            error = %e,
                            "Failed to re-read generation after lag",
                        );
                        Ok(())
                    }
                }
            }
            None => break,
        };

        if delivered.is_err() {
            tracing::debug!(generation_id = %generation_id, "Status observer went away");
            break;
        }
    }

    cancel.cancel();
    let mut subscriptions = subscriptions.lock().await;
    if subscriptions.get(&key).is_some_and(|sub| sub.serial == serial) {
        subscriptions.remove(&key);
    }
    tracing::debug!(generation_id = %generation_id, observer = %key.1, "Status subscription closed");
}

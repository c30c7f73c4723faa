use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use super::message::BusMessage;

/// In-process publish/subscribe bus.
///
/// Topics are plain strings, created implicitly on first subscribe or
/// publish. Each subscription owns an unbounded ordered queue; publishing
/// delivers to every queue registered on the topic, in registration order.
/// Publishing to a topic with no subscribers drops the message.
///
/// `Bus` is a cheap handle: clones share the same topic table.
#[derive(Clone)]
pub struct Bus {
    topics: Arc<Mutex<HashMap<String, Vec<Entry>>>>,
    next_id: Arc<AtomicU64>,
}

struct Entry {
    id: u64,
    tx: mpsc::UnboundedSender<BusMessage>,
}

/// Handle to one subscription on one topic.
///
/// Owned exclusively by its creator. Messages queue without bound until
/// received; call `Bus::unsubscribe` to stop receiving.
pub struct Subscription {
    topic: String,
    id: u64,
    rx: mpsc::UnboundedReceiver<BusMessage>,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Deliver a message to every subscription currently registered on
    /// `topic`, in subscriber-registration order.
    pub async fn publish(&self, topic: &str, message: BusMessage) {
        let mut registry = self.topics.lock().unwrap_or_else(|e| e.into_inner());

        let Some(entries) = registry.get_mut(topic) else {
            debug!("No subscribers on {}, dropping message", topic);
            return;
        };

        // A subscription dropped without unsubscribing shows up as a closed
        // queue; prune it here so the topic entry can be reclaimed.
        entries.retain(|entry| entry.tx.send(message.clone()).is_ok());

        if entries.is_empty() {
            registry.remove(topic);
        }
    }

    /// Register a new subscription on `topic`.
    ///
    /// The returned handle only receives messages published after this call.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut registry = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        registry
            .entry(topic.to_string())
            .or_default()
            .push(Entry { id, tx });

        debug!("Subscribed to {} (subscription {})", topic, id);

        Subscription {
            topic: topic.to_string(),
            id,
            rx,
        }
    }

    /// Remove a subscription from its topic.
    ///
    /// Unsubscribing a handle that is not registered is a no-op. Messages
    /// already queued on the handle remain receivable.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut registry = self.topics.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(entries) = registry.get_mut(&subscription.topic) {
            entries.retain(|entry| entry.id != subscription.id);
            if entries.is_empty() {
                registry.remove(&subscription.topic);
            }
        }

        debug!(
            "Unsubscribed from {} (subscription {})",
            subscription.topic, subscription.id
        );
    }

    /// Number of subscriptions currently registered on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let registry = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        registry.get(topic).map_or(0, Vec::len)
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscription {
    /// Receive the next message, waiting if the queue is empty.
    ///
    /// Returns `None` once the subscription has been unsubscribed (or the
    /// bus dropped) and the queue is drained.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }

    /// Receive the next message without waiting.
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        self.rx.try_recv().ok()
    }

    /// Whether the queue currently holds no messages.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Topic this subscription is bound to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

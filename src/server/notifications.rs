//! Live voicemail notifications
//!
//! One topic per subscriber. Delivery is at-most-once per live subscription:
//! a subscriber without an open stream misses the push and reads the stored
//! message later.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::VoicemailMessage;

type Topics = HashMap<i64, HashMap<Uuid, mpsc::UnboundedSender<VoicemailMessage>>>;

#[derive(Clone, Default)]
pub struct NotificationBus {
    topics: Arc<Mutex<Topics>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber_id: i64) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.lock().entry(subscriber_id).or_default().insert(id, tx);
        tracing::debug!("Subscription {} opened for subscriber {}", id, subscriber_id);
        Subscription { id, subscriber_id, rx, bus: self.clone() }
    }

    /// Push a message to every live subscription of the topic. Returns the
    /// number of deliveries.
    pub fn publish(&self, subscriber_id: i64, message: &VoicemailMessage) -> usize {
        let mut topics = self.lock();
        let Some(listeners) = topics.get_mut(&subscriber_id) else {
            return 0;
        };
        // Receivers dropped without unsubscribing are pruned here.
        listeners.retain(|_, tx| tx.send(message.clone()).is_ok());
        let delivered = listeners.len();
        if listeners.is_empty() {
            topics.remove(&subscriber_id);
        }
        delivered
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    pub fn subscriber_count(&self, subscriber_id: i64) -> usize {
        self.lock().get(&subscriber_id).map_or(0, HashMap::len)
    }

    fn remove(&self, subscriber_id: i64, id: Uuid) {
        let mut topics = self.lock();
        if let Some(listeners) = topics.get_mut(&subscriber_id) {
            listeners.remove(&id);
            if listeners.is_empty() {
                topics.remove(&subscriber_id);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Topics> {
        // A panic while holding the lock leaves the map itself intact.
        self.topics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A live stream of new messages for one subscriber. Dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    subscriber_id: i64,
    rx: mpsc::UnboundedReceiver<VoicemailMessage>,
    bus: NotificationBus,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn recv(&mut self) -> Option<VoicemailMessage> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = VoicemailMessage;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.remove(self.subscriber_id, self.id);
        tracing::debug!("Subscription {} closed for subscriber {}", self.id, self.subscriber_id);
    }
}

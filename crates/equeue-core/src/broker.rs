//! In-process notification broker for live boards.
//!
//! One upstream source (the database change feed, plus in-process publishers
//! such as doctor status actions) is multiplexed to every connected board.
//! Each subscriber owns a small bounded queue; publishing never waits on a
//! subscriber, so a stalled client loses messages instead of stalling others.
//! Boards re-query full state on every message, so a dropped message is
//! recovered by the next one.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::defaults::SUBSCRIBER_CAPACITY;
use crate::models::{DoctorStatus, Ticket};

// ============================================================================
// Notification
// ============================================================================

/// A change notification, decoded once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A ticket row changed. `action` is the trigger operation (`insert`, `update`, `delete`).
    Ticket { action: String, ticket: Ticket },
    /// A schedule row changed. `payload` is the raw object, including `operation`.
    Schedule { operation: String, payload: JsonValue },
    /// A doctor changed status through a break/login action.
    DoctorStatus { doctor_id: i64, status: DoctorStatus },
    /// Anything that could not be interpreted. Consumers ignore it.
    Unknown(String),
}

impl Notification {
    /// Decode a raw change-feed payload.
    ///
    /// Never fails: malformed or unrecognised payloads become [`Notification::Unknown`].
    pub fn decode(raw: &str) -> Self {
        let Ok(JsonValue::Object(obj)) = serde_json::from_str::<JsonValue>(raw) else {
            return Notification::Unknown(raw.to_string());
        };

        if let Some(operation) = obj.get("operation").and_then(JsonValue::as_str) {
            return Notification::Schedule {
                operation: operation.to_string(),
                payload: JsonValue::Object(obj.clone()),
            };
        }

        if let (Some(action), Some(data)) =
            (obj.get("action").and_then(JsonValue::as_str), obj.get("data"))
        {
            if let Ok(ticket) = serde_json::from_value::<Ticket>(data.clone()) {
                return Notification::Ticket {
                    action: action.to_string(),
                    ticket,
                };
            }
        }

        Notification::Unknown(raw.to_string())
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Ticket { .. } => "ticket",
            Notification::Schedule { .. } => "schedule",
            Notification::DoctorStatus { .. } => "doctor_status",
            Notification::Unknown(_) => "unknown",
        }
    }
}

// ============================================================================
// Broker
// ============================================================================

/// Identity of one subscriber queue.
pub type SubscriberId = u64;

/// Per-publish delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

struct BrokerInner {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Notification>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl BrokerInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Notification>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriberId) -> bool {
        self.lock().remove(&id).is_some()
    }
}

/// Fan-out hub. Cheap to clone; clones share the subscriber set.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    /// Broker with the default per-subscriber capacity.
    pub fn new() -> Self {
        Self::with_capacity(SUBSCRIBER_CAPACITY)
    }

    /// Broker with a custom per-subscriber capacity (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register a new subscriber queue.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let total = {
            let mut subs = self.inner.lock();
            subs.insert(id, tx);
            subs.len()
        };
        debug!(
            subsystem = "broker",
            subscriber_id = id,
            subscribers = total,
            "Subscriber registered"
        );
        Subscription {
            id,
            rx,
            broker: Arc::downgrade(&self.inner),
        }
    }

    /// Deregister a subscriber and close its queue. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.remove(id);
        if removed {
            debug!(subsystem = "broker", subscriber_id = id, "Subscriber removed");
        }
        removed
    }

    /// Offer `notification` to every subscriber without waiting.
    ///
    /// A full queue drops the message for that subscriber only.
    pub fn publish(&self, notification: Notification) -> PublishReport {
        let mut report = PublishReport::default();
        let mut closed = Vec::new();

        let mut subs = self.inner.lock();
        for (id, tx) in subs.iter() {
            match tx.try_send(notification.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    warn!(
                        subsystem = "broker",
                        subscriber_id = *id,
                        kind = notification.kind(),
                        "Subscriber queue full, message dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            subs.remove(&id);
        }
        drop(subs);

        report
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().len()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Receiving end of one subscriber queue.
///
/// Dropping the subscription deregisters it from the broker, so a live-board
/// task that ends for any reason (client gone, request cancelled, panic)
/// releases its queue.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Notification>,
    broker: Weak<BrokerInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next message, or `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = Notification;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.broker.upgrade() {
            if inner.remove(self.id) {
                debug!(
                    subsystem = "broker",
                    subscriber_id = self.id,
                    "Subscriber released"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketStatus;

    fn unknown(tag: &str) -> Notification {
        Notification::Unknown(tag.to_string())
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let broker = Broker::new();
        let mut subs: Vec<_> = (0..5).map(|_| broker.subscribe()).collect();

        let report = broker.publish(unknown("hello"));
        assert_eq!(report.delivered, 5);
        assert_eq!(report.dropped, 0);

        for sub in subs.iter_mut() {
            assert_eq!(sub.recv().await, Some(unknown("hello")));
        }
    }

    #[tokio::test]
    async fn test_full_subscriber_does_not_block_others() {
        let broker = Broker::with_capacity(2);
        let mut slow = broker.subscribe();
        let mut fast = broker.subscribe();

        broker.publish(unknown("1"));
        broker.publish(unknown("2"));
        assert_eq!(fast.recv().await, Some(unknown("1")));
        assert_eq!(fast.recv().await, Some(unknown("2")));

        // slow is full now; publish still returns immediately
        let report = broker.publish(unknown("3"));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(fast.recv().await, Some(unknown("3")));

        assert_eq!(slow.recv().await, Some(unknown("1")));
        assert_eq!(slow.recv().await, Some(unknown("2")));
        assert_eq!(slow.try_recv(), None);
    }

    #[tokio::test]
    async fn test_order_preserved_per_subscriber() {
        let broker = Broker::new();
        let mut sub = broker.subscribe();
        for i in 0..5 {
            broker.publish(unknown(&i.to_string()));
        }
        for i in 0..5 {
            assert_eq!(sub.recv().await, Some(unknown(&i.to_string())));
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent_and_closes_queue() {
        let broker = Broker::new();
        let mut sub = broker.subscribe();
        let id = sub.id();

        assert!(broker.unsubscribe(id));
        assert!(!broker.unsubscribe(id));
        assert_eq!(broker.subscriber_count(), 0);
        assert_eq!(sub.recv().await, None);

        drop(sub);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_releases_subscription() {
        let broker = Broker::new();
        let a = broker.subscribe();
        let b = broker.subscribe();
        assert_eq!(broker.subscriber_count(), 2);
        drop(a);
        assert_eq!(broker.subscriber_count(), 1);
        drop(b);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_outliving_broker() {
        let broker = Broker::new();
        let sub = broker.subscribe();
        drop(broker);
        drop(sub);
    }

    #[test]
    fn test_subscriber_ids_are_unique() {
        let broker = Broker::new();
        let a = broker.subscribe();
        let b = broker.subscribe();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_subscription_as_stream() {
        use futures::StreamExt;

        let broker = Broker::new();
        let mut sub = broker.subscribe();
        broker.publish(unknown("x"));
        assert_eq!(sub.next().await, Some(unknown("x")));
    }

    #[test]
    fn test_decode_ticket_notification() {
        let raw = r#"{"action":"update","data":{"id":12,"ticket_number":"A012","status":"invited","window_number":3,"created_at":"2026-10-19T08:00:00+03:00","called_at":"2026-10-19T08:05:00+03:00"}}"#;
        match Notification::decode(raw) {
            Notification::Ticket { action, ticket } => {
                assert_eq!(action, "update");
                assert_eq!(ticket.id, 12);
                assert_eq!(ticket.status, TicketStatus::Invited);
                assert_eq!(ticket.window_number, Some(3));
            }
            other => panic!("expected ticket notification, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_schedule_notification() {
        let raw = r#"{"operation":"UPDATE","data":{"id":4,"is_available":false}}"#;
        match Notification::decode(raw) {
            Notification::Schedule { operation, payload } => {
                assert_eq!(operation, "UPDATE");
                assert_eq!(payload["data"]["id"], 4);
            }
            other => panic!("expected schedule notification, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_tolerates_garbage() {
        for raw in [
            "",
            "not json",
            "42",
            r#"{"action":"update","data":{"id":"nope"}}"#,
            r#"{"something":"else"}"#,
        ] {
            assert_eq!(Notification::decode(raw), Notification::Unknown(raw.to_string()));
        }
    }
}

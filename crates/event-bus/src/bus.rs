use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{BusError, IntegrationEvent, Message};

/// Outbound side of the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes an event on its topic and returns the message sent.
    async fn publish(&self, event: IntegrationEvent) -> Result<Message, BusError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, event: IntegrationEvent) -> Result<Message, BusError> {
        (**self).publish(event).await
    }
}

/// In-process bus with one bounded queue per subscriber and topic.
///
/// Each subscriber owns its queue, so a slow subscriber never loses
/// messages: once its queue is full, publishers wait for room. Handlers
/// must therefore not publish to a topic they consume.
///
/// Published messages are only retained when the bus is built
/// [`with_history`](InMemoryEventBus::with_history). Publishing can be made
/// to fail for fault-injection tests.
#[derive(Clone)]
pub struct InMemoryEventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    capacity: usize,
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<Message>>>>,
    record_history: AtomicBool,
    history: Mutex<Vec<Message>>,
    fail_on_publish: AtomicBool,
}

impl InMemoryEventBus {
    /// Creates a bus whose subscriber queues hold `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                capacity: capacity.max(1),
                subscribers: Mutex::new(HashMap::new()),
                record_history: AtomicBool::new(false),
                history: Mutex::new(Vec::new()),
                fail_on_publish: AtomicBool::new(false),
            }),
        }
    }

    /// Keeps every published message for [`published`](Self::published).
    pub fn with_history(self) -> Self {
        self.inner.record_history.store(true, Ordering::SeqCst);
        self
    }

    fn subscribers(&self) -> MutexGuard<'_, HashMap<String, Vec<mpsc::Sender<Message>>>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes to a topic. Only messages published after this call are
    /// received. Dropping the receiver unsubscribes.
    pub fn subscribe(&self, topic: &str) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        self.subscribers()
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Makes every subsequent publish fail until reset.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.inner.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Sends an already-encoded message to every subscriber of its topic,
    /// waiting while a subscriber's queue is full.
    pub async fn publish_message(&self, message: Message) -> Result<(), BusError> {
        if self.inner.fail_on_publish.load(Ordering::SeqCst) {
            return Err(BusError::PublishFailed {
                topic: message.topic,
                reason: "broker unavailable".to_string(),
            });
        }

        if self.inner.record_history.load(Ordering::SeqCst) {
            self.inner
                .history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message.clone());
        }

        let topic = message.topic.clone();
        let senders = self.subscribers().get(&topic).cloned().unwrap_or_default();

        let mut delivered = 0;
        for sender in &senders {
            if sender.send(message.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        if delivered < senders.len() {
            self.subscribers()
                .entry(topic.clone())
                .or_default()
                .retain(|sender| !sender.is_closed());
        }

        tracing::debug!(%topic, receivers = delivered, "message published");
        metrics::counter!("events_published_total", "topic" => topic).increment(1);
        Ok(())
    }

    /// Returns every message published so far, oldest first. Empty unless
    /// the bus was built with history.
    pub fn published(&self) -> Vec<Message> {
        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the decoded events published on one topic.
    pub fn published_on(&self, topic: &str) -> Vec<IntegrationEvent> {
        self.published()
            .into_iter()
            .filter(|m| m.topic == topic)
            .filter_map(|m| m.decode().ok())
            .collect()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: IntegrationEvent) -> Result<Message, BusError> {
        let message = Message::encode(&event)?;
        self.publish_message(message.clone()).await?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ORDER_EVENTS, PAYMENT_EVENTS};
    use common::AggregateId;

    #[tokio::test]
    async fn subscribers_receive_only_their_topic() {
        let bus = InMemoryEventBus::default();
        let mut orders = bus.subscribe(ORDER_EVENTS);
        let mut payments = bus.subscribe(PAYMENT_EVENTS);
        let order_id = AggregateId::new();

        bus.publish(IntegrationEvent::OrderCancelled { order_id })
            .await
            .unwrap();

        let received = orders.recv().await.unwrap();
        assert_eq!(received.key, order_id.to_string());
        assert!(payments.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishing_without_subscribers_still_records_history() {
        let bus = InMemoryEventBus::new(8).with_history();
        let order_id = AggregateId::new();

        bus.publish(IntegrationEvent::OrderCancelled { order_id })
            .await
            .unwrap();

        assert_eq!(
            bus.published_on(ORDER_EVENTS),
            vec![IntegrationEvent::OrderCancelled { order_id }]
        );
        assert!(bus.published_on(PAYMENT_EVENTS).is_empty());
    }

    #[tokio::test]
    async fn fault_injection_fails_publishes() {
        let bus = InMemoryEventBus::default().with_history();
        bus.set_fail_on_publish(true);

        let result = bus
            .publish(IntegrationEvent::OrderCancelled { order_id: AggregateId::new() })
            .await;
        assert!(matches!(result, Err(BusError::PublishFailed { .. })));
        assert!(bus.published().is_empty());

        bus.set_fail_on_publish(false);
        bus.publish(IntegrationEvent::OrderCancelled { order_id: AggregateId::new() })
            .await
            .unwrap();
        assert_eq!(bus.published().len(), 1);
    }

    #[tokio::test]
    async fn history_is_not_kept_by_default() {
        let bus = InMemoryEventBus::new(4);
        let mut orders = bus.subscribe(ORDER_EVENTS);

        for _ in 0..3 {
            bus.publish(IntegrationEvent::OrderCancelled { order_id: AggregateId::new() })
                .await
                .unwrap();
            orders.recv().await.unwrap();
        }

        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn every_subscriber_gets_its_own_copy() {
        let bus = InMemoryEventBus::new(4);
        let mut first = bus.subscribe(ORDER_EVENTS);
        let mut second = bus.subscribe(ORDER_EVENTS);
        let order_id = AggregateId::new();

        bus.publish(IntegrationEvent::OrderCancelled { order_id })
            .await
            .unwrap();

        assert_eq!(first.recv().await.unwrap().key, order_id.to_string());
        assert_eq!(second.recv().await.unwrap().key, order_id.to_string());
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let bus = InMemoryEventBus::new(1);
        let gone = bus.subscribe(ORDER_EVENTS);
        drop(gone);

        for _ in 0..3 {
            bus.publish(IntegrationEvent::OrderCancelled { order_id: AggregateId::new() })
                .await
                .unwrap();
        }

        assert!(bus.subscribers().get(ORDER_EVENTS).is_none_or(Vec::is_empty));
    }

    #[tokio::test]
    async fn full_queue_makes_publishers_wait() {
        let bus = InMemoryEventBus::new(1);
        let mut orders = bus.subscribe(ORDER_EVENTS);

        bus.publish(IntegrationEvent::OrderCancelled { order_id: AggregateId::new() })
            .await
            .unwrap();
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            bus.publish(IntegrationEvent::OrderCancelled { order_id: AggregateId::new() }),
        )
        .await;
        assert!(blocked.is_err());

        orders.recv().await.unwrap();
        bus.publish(IntegrationEvent::OrderCancelled { order_id: AggregateId::new() })
            .await
            .unwrap();
        orders.recv().await.unwrap();
        assert!(orders.try_recv().is_err());
    }
}

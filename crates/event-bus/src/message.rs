use chrono::{DateTime, Utc};
use common::{AggregateId, Money};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::BusError;

/// Topic carrying order-side facts.
pub const ORDER_EVENTS: &str = "order.events";

/// Topic carrying payment-side facts.
pub const PAYMENT_EVENTS: &str = "payment.events";

/// Facts one side publishes for the other.
///
/// The JSON shape is part of the contract between the two sides:
/// `{"type": "OrderCancelled", "orderId": ...}` and
/// `{"type": "PaymentSucceeded", "orderId", "paymentId", "amount", "occurredAt"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum IntegrationEvent {
    OrderCancelled {
        order_id: AggregateId,
    },
    PaymentSucceeded {
        order_id: AggregateId,
        payment_id: AggregateId,
        amount: Money,
        occurred_at: DateTime<Utc>,
    },
}

impl IntegrationEvent {
    pub fn payment_succeeded(order_id: AggregateId, payment_id: AggregateId, amount: Money) -> Self {
        IntegrationEvent::PaymentSucceeded {
            order_id,
            payment_id,
            amount,
            occurred_at: Utc::now(),
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            IntegrationEvent::OrderCancelled { .. } => ORDER_EVENTS,
            IntegrationEvent::PaymentSucceeded { .. } => PAYMENT_EVENTS,
        }
    }

    /// The partition key. Always the order id.
    pub fn order_id(&self) -> AggregateId {
        match self {
            IntegrationEvent::OrderCancelled { order_id }
            | IntegrationEvent::PaymentSucceeded { order_id, .. } => *order_id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            IntegrationEvent::OrderCancelled { .. } => "OrderCancelled",
            IntegrationEvent::PaymentSucceeded { .. } => "PaymentSucceeded",
        }
    }
}

/// A message as it travels on the bus: the serialized event plus routing data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub topic: String,
    pub key: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl Message {
    /// Serializes an event onto its topic, keyed by order id.
    pub fn encode(event: &IntegrationEvent) -> Result<Self, BusError> {
        Ok(Self {
            id: Uuid::new_v4(),
            topic: event.topic().to_string(),
            key: event.order_id().to_string(),
            payload: serde_json::to_value(event)?,
            published_at: Utc::now(),
        })
    }

    pub fn decode(&self) -> Result<IntegrationEvent, BusError> {
        serde_json::from_value(self.payload.clone()).map_err(|source| BusError::Malformed {
            topic: self.topic.clone(),
            source,
        })
    }
}

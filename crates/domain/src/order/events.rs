//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AccountEmail, AggregateId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::OrderLine;

/// Events that can occur on an order aggregate.
///
/// The order total is never stored; it is derived from the lines whenever a
/// line-set event is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderCreated(OrderCreatedData),

    /// The whole line set was replaced by its owner.
    OrderLinesReplaced(OrderLinesReplacedData),

    /// Inventory was deducted for every line.
    OrderCompleted(OrderCompletedData),

    OrderCancelled(OrderCancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::OrderLinesReplaced(_) => "OrderLinesReplaced",
            OrderEvent::OrderCompleted(_) => "OrderCompleted",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: AggregateId,
    pub account: AccountEmail,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLinesReplacedData {
    pub lines: Vec<OrderLine>,
    pub replaced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedData {
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub cancelled_at: DateTime<Utc>,

    /// True if the order was COMPLETED and its lines were given back.
    pub restocked: bool,
}

impl OrderEvent {
    pub fn order_created(
        order_id: AggregateId,
        account: AccountEmail,
        lines: Vec<OrderLine>,
    ) -> Self {
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id,
            account,
            lines,
            created_at: Utc::now(),
        })
    }

    pub fn lines_replaced(lines: Vec<OrderLine>) -> Self {
        OrderEvent::OrderLinesReplaced(OrderLinesReplacedData {
            lines,
            replaced_at: Utc::now(),
        })
    }

    pub fn order_completed() -> Self {
        OrderEvent::OrderCompleted(OrderCompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn order_cancelled(restocked: bool) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            cancelled_at: Utc::now(),
            restocked,
        })
    }
}

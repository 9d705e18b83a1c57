//! Payment domain events.

use chrono::{DateTime, Utc};
use common::{AccountEmail, AggregateId, Money};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::PaymentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    /// A submission was decided, as SUCCESS or FAILED.
    PaymentRecorded(PaymentRecordedData),

    PaymentRefunded(PaymentRefundedData),
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentRecorded(_) => "PaymentRecorded",
            PaymentEvent::PaymentRefunded(_) => "PaymentRefunded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecordedData {
    pub payment_id: AggregateId,
    pub order_id: AggregateId,
    pub account: AccountEmail,
    pub amount: Money,
    pub status: PaymentStatus,
    pub idempotency_key: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundedData {
    pub refunded_at: DateTime<Utc>,

    /// Amount named by the refund request, if any. Informational only.
    pub requested_amount: Option<Money>,
}

impl PaymentEvent {
    pub fn payment_refunded(requested_amount: Option<Money>) -> Self {
        PaymentEvent::PaymentRefunded(PaymentRefundedData {
            refunded_at: Utc::now(),
            requested_amount,
        })
    }
}

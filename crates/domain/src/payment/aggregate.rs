//! Payment aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AccountEmail, AggregateId, Money};
use event_store::Version;

use crate::aggregate::Aggregate;

use super::{PaymentError, PaymentEvent, PaymentRecordedData, PaymentStatus};

/// Payment aggregate root.
///
/// At most one payment exists per idempotency key; the key also determines
/// the payment id, so a second submission with the same key lands on the
/// same aggregate.
#[derive(Debug, Clone, Default)]
pub struct Payment {
    id: Option<AggregateId>,
    version: Version,
    order_id: Option<AggregateId>,
    account: Option<AccountEmail>,
    amount: Money,
    status: PaymentStatus,
    idempotency_key: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Payment {
    type Event = PaymentEvent;
    type Error = PaymentError;

    fn aggregate_type() -> &'static str {
        "Payment"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            PaymentEvent::PaymentRecorded(data) => {
                self.id = Some(data.payment_id);
                self.order_id = Some(data.order_id);
                self.account = Some(data.account);
                self.amount = data.amount;
                self.status = data.status;
                self.idempotency_key = data.idempotency_key;
                self.created_at = Some(data.recorded_at);
                self.updated_at = Some(data.recorded_at);
            }
            PaymentEvent::PaymentRefunded(data) => {
                self.status = PaymentStatus::Refunded;
                self.updated_at = Some(data.refunded_at);
            }
        }
    }
}

impl Payment {
    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn account(&self) -> Option<&AccountEmail> {
        self.account.as_ref()
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl Payment {
    /// Records the outcome of a submission.
    pub fn record(&self, data: PaymentRecordedData) -> Result<Vec<PaymentEvent>, PaymentError> {
        if self.id.is_some() {
            return Err(PaymentError::AlreadyRecorded);
        }
        if !data.status.is_recordable() {
            return Err(PaymentError::InvalidInitialStatus(data.status));
        }

        Ok(vec![PaymentEvent::PaymentRecorded(data)])
    }

    /// Marks the payment REFUNDED. Refunding twice yields no events.
    pub fn refund(&self, requested_amount: Option<Money>) -> Result<Vec<PaymentEvent>, PaymentError> {
        if self.id.is_none() {
            return Err(PaymentError::NotRecorded);
        }
        if self.status == PaymentStatus::Refunded {
            return Ok(vec![]);
        }

        Ok(vec![PaymentEvent::payment_refunded(requested_amount)])
    }
}

//! Idempotent payment submission and refunds.

use std::sync::Arc;

use chrono::Utc;
use common::{AggregateId, Caller, Money};
use domain::{
    Aggregate, CommandHandler, DomainError, OrderStatus, Payment, PaymentError, PaymentStatus,
    payment::PaymentRecordedData,
};
use event_bus::{EventPublisher, IntegrationEvent};
use event_store::{EventQuery, EventStore};
use serde_json::json;
use uuid::Uuid;

use crate::error::{Result, SagaError};
use crate::gateways::OrderSnapshotReader;

/// Namespace for payment ids derived from idempotency keys.
const PAYMENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x8c4e_2a61_5f0d_4b7e_9a13_d2c7_06e4_f5b1);

pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// The payment id a submission with `idempotency_key` is stored under.
pub fn payment_id_for(idempotency_key: &str) -> AggregateId {
    AggregateId::derived(&PAYMENT_ID_NAMESPACE, idempotency_key)
}

/// What `refund_for_order` did.
#[derive(Debug)]
pub enum RefundOutcome {
    Refunded(Payment),
    AlreadyRefunded(Payment),
    NoPayment,
}

/// Records payment attempts against orders and refunds them.
///
/// A submission is keyed by its idempotency key: the key determines the
/// payment id, so repeating a submission returns the first record instead of
/// charging twice.
pub struct PaymentSubmissionManager {
    payments: CommandHandler<Arc<dyn EventStore>, Payment>,
    orders: Arc<dyn OrderSnapshotReader>,
    publisher: Arc<dyn EventPublisher>,
}

impl PaymentSubmissionManager {
    pub fn new(
        store: Arc<dyn EventStore>,
        orders: Arc<dyn OrderSnapshotReader>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            payments: CommandHandler::new(store),
            orders,
            publisher,
        }
    }

    /// Submits a payment for an order.
    ///
    /// An amount equal to the order total is recorded as SUCCESS and
    /// announced with one `PaymentSucceeded`; any other amount is recorded
    /// as FAILED and announced nowhere.
    #[tracing::instrument(skip(self, caller))]
    pub async fn submit(
        &self,
        caller: &Caller,
        order_id: AggregateId,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<Payment> {
        validate_idempotency_key(idempotency_key)?;
        validate_amount(amount)?;

        // 1. Replay of an earlier submission
        let payment_id = payment_id_for(idempotency_key);
        if let Some(existing) = self.payments.load_existing(payment_id).await? {
            tracing::info!(%payment_id, "idempotent replay, returning existing payment");
            return Ok(existing);
        }

        // 2. Identity and order checks
        let account = caller
            .authenticated()
            .ok_or(SagaError::Unauthenticated)?
            .clone();
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;
        if order.status != OrderStatus::Created {
            return Err(SagaError::InvalidTransition {
                current: order.status.to_string(),
                action: "pay for",
            });
        }

        // 3. Decide and record
        let status = if amount == order.total_amount {
            PaymentStatus::Success
        } else {
            tracing::warn!(%payment_id, expected = %order.total_amount, "amount does not match order total");
            PaymentStatus::Failed
        };
        let data = PaymentRecordedData {
            payment_id,
            order_id,
            account,
            amount,
            status,
            idempotency_key: idempotency_key.to_string(),
            recorded_at: Utc::now(),
        };

        let payment = match self
            .payments
            .execute(payment_id, |payment| payment.record(data))
            .await
        {
            Ok(result) => result.aggregate,
            Err(e) if e.is_conflict() || matches!(e, DomainError::Payment(PaymentError::AlreadyRecorded)) => {
                tracing::info!(%payment_id, "concurrent submission with the same key won");
                return self.get(payment_id).await;
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(%payment_id, status = %status, "payment recorded");
        metrics::counter!("payments_submitted_total", "status" => status.as_str()).increment(1);

        // 4. Announce only after the record is durable
        if status == PaymentStatus::Success {
            let event = IntegrationEvent::payment_succeeded(order_id, payment_id, amount);
            if let Err(e) = self.publisher.publish(event).await {
                tracing::error!(%payment_id, error = %e, "failed to publish PaymentSucceeded");
                metrics::counter!("events_publish_failed_total", "topic" => event_bus::PAYMENT_EVENTS)
                    .increment(1);
            }
        }

        Ok(payment)
    }

    pub async fn get(&self, payment_id: AggregateId) -> Result<Payment> {
        self.payments
            .load_existing(payment_id)
            .await?
            .ok_or(SagaError::PaymentNotFound(payment_id))
    }

    /// The most recent payment for an order, preferring any that did not
    /// fail.
    #[tracing::instrument(skip(self))]
    pub async fn get_by_order(&self, order_id: AggregateId) -> Result<Payment> {
        let query = EventQuery::for_aggregate_type(Payment::aggregate_type())
            .event_type("PaymentRecorded")
            .payload_contains(json!({ "data": { "order_id": order_id } }));
        let payments = self.payments.load_matching(query).await?;

        let (failed, usable): (Vec<Payment>, Vec<Payment>) = payments
            .into_iter()
            .partition(|payment| payment.status() == PaymentStatus::Failed);

        usable
            .into_iter()
            .max_by_key(Payment::created_at)
            .or_else(|| failed.into_iter().max_by_key(Payment::created_at))
            .ok_or(SagaError::NoPaymentForOrder(order_id))
    }

    /// Marks a payment REFUNDED. Refunding a REFUNDED payment returns it
    /// unchanged.
    #[tracing::instrument(skip(self, caller))]
    pub async fn refund(
        &self,
        caller: &Caller,
        payment_id: AggregateId,
        amount: Option<Money>,
    ) -> Result<Payment> {
        caller.authenticated().ok_or(SagaError::Unauthenticated)?;
        if let Some(amount) = amount {
            validate_amount(amount)?;
        }

        self.get(payment_id).await?;
        self.mark_refunded(payment_id, amount).await
    }

    /// Refunds whichever payment `get_by_order` picks for the order.
    #[tracing::instrument(skip(self))]
    pub async fn refund_for_order(&self, order_id: AggregateId) -> Result<RefundOutcome> {
        let payment = match self.get_by_order(order_id).await {
            Ok(payment) => payment,
            Err(SagaError::NoPaymentForOrder(_)) => return Ok(RefundOutcome::NoPayment),
            Err(e) => return Err(e),
        };
        if payment.status() == PaymentStatus::Refunded {
            return Ok(RefundOutcome::AlreadyRefunded(payment));
        }
        let Some(payment_id) = payment.id() else {
            return Ok(RefundOutcome::NoPayment);
        };

        let refunded = self.mark_refunded(payment_id, None).await?;
        Ok(RefundOutcome::Refunded(refunded))
    }

    async fn mark_refunded(&self, payment_id: AggregateId, amount: Option<Money>) -> Result<Payment> {
        match self
            .payments
            .execute(payment_id, |payment| payment.refund(amount))
            .await
        {
            Ok(result) => {
                if !result.is_noop() {
                    tracing::info!(%payment_id, "payment refunded");
                }
                Ok(result.aggregate)
            }
            Err(e) if e.is_conflict() => {
                // Only a refund can race a refund.
                let current = self.get(payment_id).await?;
                if current.status() == PaymentStatus::Refunded {
                    Ok(current)
                } else {
                    Err(SagaError::ConcurrentModification(payment_id))
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn validate_idempotency_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(SagaError::Validation("idempotency key must not be blank".to_string()));
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(SagaError::Validation(format!(
            "idempotency key must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_amount(amount: Money) -> Result<()> {
    if amount < Money::MIN_CHARGE {
        return Err(SagaError::Validation(format!(
            "amount must be at least {}",
            Money::MIN_CHARGE
        )));
    }
    Ok(())
}

//! Reactions each side runs to the other side's events.

use std::sync::Arc;

use async_trait::async_trait;
use event_bus::{EventHandler, HandleOutcome, IntegrationEvent};

use crate::error::SagaError;
use crate::orders::OrderLifecycleManager;
use crate::payments::{PaymentSubmissionManager, RefundOutcome};

/// Completes the order a successful payment was made for.
pub struct PaymentSucceededHandler {
    orders: Arc<OrderLifecycleManager>,
}

impl PaymentSucceededHandler {
    pub fn new(orders: Arc<OrderLifecycleManager>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl EventHandler for PaymentSucceededHandler {
    fn name(&self) -> &'static str {
        "payment_succeeded"
    }

    async fn handle(&self, event: &IntegrationEvent) -> HandleOutcome {
        let IntegrationEvent::PaymentSucceeded { order_id, payment_id, .. } = event else {
            return HandleOutcome::skipped(format!("not handled here: {}", event.type_name()));
        };

        match self.orders.complete(*order_id).await {
            Ok(_) => {
                tracing::info!(%order_id, %payment_id, "order completed from payment");
                HandleOutcome::Handled
            }
            Err(e) => classify(e),
        }
    }
}

/// Refunds the payment of an order that was cancelled.
pub struct OrderCancelledHandler {
    payments: Arc<PaymentSubmissionManager>,
}

impl OrderCancelledHandler {
    pub fn new(payments: Arc<PaymentSubmissionManager>) -> Self {
        Self { payments }
    }
}

#[async_trait]
impl EventHandler for OrderCancelledHandler {
    fn name(&self) -> &'static str {
        "order_cancelled"
    }

    async fn handle(&self, event: &IntegrationEvent) -> HandleOutcome {
        let IntegrationEvent::OrderCancelled { order_id } = event else {
            return HandleOutcome::skipped(format!("not handled here: {}", event.type_name()));
        };

        match self.payments.refund_for_order(*order_id).await {
            Ok(RefundOutcome::Refunded(_)) => {
                tracing::info!(%order_id, "payment refunded for cancelled order");
                HandleOutcome::Handled
            }
            Ok(RefundOutcome::AlreadyRefunded(_)) => HandleOutcome::skipped("payment already refunded"),
            Ok(RefundOutcome::NoPayment) => HandleOutcome::skipped("no payment for order"),
            Err(e) => classify(e),
        }
    }
}

/// Stale deliveries are skipped, transient failures retried and the rest
/// failed.
fn classify(err: SagaError) -> HandleOutcome {
    match err {
        SagaError::OrderNotFound(_) | SagaError::InvalidTransition { .. } => {
            HandleOutcome::skipped(err.to_string())
        }
        e if e.is_transient() => HandleOutcome::retry(e.to_string()),
        e => HandleOutcome::failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::GatewayError;
    use common::AggregateId;

    #[test]
    fn classification_follows_error_class() {
        assert!(matches!(
            classify(SagaError::OrderNotFound(AggregateId::new())),
            HandleOutcome::Skipped { .. }
        ));
        assert!(matches!(
            classify(SagaError::InvalidTransition {
                current: "COMPLETED".to_string(),
                action: "complete",
            }),
            HandleOutcome::Skipped { .. }
        ));
        assert!(matches!(
            classify(GatewayError::Unavailable("down".to_string()).into()),
            HandleOutcome::Retry { .. }
        ));
        assert!(matches!(
            classify(SagaError::ConcurrentModification(AggregateId::new())),
            HandleOutcome::Retry { .. }
        ));
        assert!(matches!(
            classify(SagaError::InsufficientStock {
                upc: "000111".to_string(),
                requested: 2,
                available: 0,
            }),
            HandleOutcome::Failed { .. }
        ));
    }
}

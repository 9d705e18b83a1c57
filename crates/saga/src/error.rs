//! Saga error types.

use common::AggregateId;
use domain::{DomainError, OrderError, PaymentError};
use event_store::EventStoreError;
use thiserror::Error;

use crate::gateways::GatewayError;

/// Coarse classification callers and the request layer act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthenticated,
    Forbidden,
    TransientDownstream,
    Internal,
}

/// Errors returned by the order and payment managers.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Order belongs to another account")]
    Forbidden,

    #[error("Order not found: {0}")]
    OrderNotFound(AggregateId),

    #[error("Payment not found: {0}")]
    PaymentNotFound(AggregateId),

    #[error("No payment for order {0}")]
    NoPaymentForOrder(AggregateId),

    #[error("Catalog item not found: {0}")]
    CatalogItemNotFound(String),

    #[error("Cannot {action} a {current} order")]
    InvalidTransition {
        current: String,
        action: &'static str,
    },

    #[error("Insufficient stock for {upc}: requested {requested}, available {available}")]
    InsufficientStock {
        upc: String,
        requested: u32,
        available: u32,
    },

    /// A deduction failed; already-deducted lines were compensated.
    #[error("Inventory adjustment failed for order {order_id} at {upc}: {reason}")]
    InventoryAdjustmentFailed {
        order_id: AggregateId,
        upc: String,
        reason: String,
    },

    /// Lost an optimistic-concurrency race on the aggregate.
    #[error("Concurrent modification of {0}")]
    ConcurrentModification(AggregateId),

    #[error("Downstream error: {0}")]
    Downstream(#[from] GatewayError),

    #[error("Domain error: {0}")]
    Domain(DomainError),
}

impl SagaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::Validation(_) => ErrorKind::Validation,
            SagaError::Unauthenticated => ErrorKind::Unauthenticated,
            SagaError::Forbidden => ErrorKind::Forbidden,
            SagaError::OrderNotFound(_)
            | SagaError::PaymentNotFound(_)
            | SagaError::NoPaymentForOrder(_)
            | SagaError::CatalogItemNotFound(_) => ErrorKind::NotFound,
            SagaError::InvalidTransition { .. }
            | SagaError::InsufficientStock { .. }
            | SagaError::InventoryAdjustmentFailed { .. }
            | SagaError::ConcurrentModification(_) => ErrorKind::Conflict,
            SagaError::Downstream(_) => ErrorKind::TransientDownstream,
            SagaError::Domain(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SagaError::Downstream(_)
                | SagaError::InventoryAdjustmentFailed { .. }
                | SagaError::ConcurrentModification(_)
                | SagaError::Domain(DomainError::EventStore(_))
        )
    }
}

impl From<DomainError> for SagaError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { aggregate_id, .. }) => {
                SagaError::ConcurrentModification(aggregate_id)
            }
            DomainError::Order(OrderError::InvalidStateTransition { current, action }) => {
                SagaError::InvalidTransition {
                    current: current.to_string(),
                    action,
                }
            }
            DomainError::Order(OrderError::NotOwner) => SagaError::Forbidden,
            DomainError::Order(
                e @ (OrderError::NoLines
                | OrderError::InvalidQuantity { .. }
                | OrderError::AmountOverflow),
            ) => {
                SagaError::Validation(e.to_string())
            }
            DomainError::Payment(PaymentError::InvalidInitialStatus(status)) => {
                SagaError::Validation(format!("cannot record a payment as {status}"))
            }
            other => SagaError::Domain(other),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OrderStatus;
    use event_store::Version;

    #[test]
    fn version_conflicts_become_concurrent_modification() {
        let id = AggregateId::new();
        let err: SagaError = DomainError::EventStore(EventStoreError::ConcurrencyConflict {
            aggregate_id: id,
            expected: Version::new(1),
            actual: Version::new(2),
        })
        .into();

        assert!(matches!(err, SagaError::ConcurrentModification(got) if got == id));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.is_transient());
    }

    #[test]
    fn order_rule_violations_keep_their_class() {
        let err: SagaError = DomainError::Order(OrderError::InvalidStateTransition {
            current: OrderStatus::Completed,
            action: "update",
        })
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "Cannot update a COMPLETED order");

        let err: SagaError = DomainError::Order(OrderError::NotOwner).into();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err: SagaError = DomainError::Order(OrderError::NoLines).into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: SagaError = DomainError::Order(OrderError::AmountOverflow).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn business_conflicts_are_not_transient() {
        let err = SagaError::InsufficientStock {
            upc: "000111".to_string(),
            requested: 3,
            available: 1,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!err.is_transient());
    }

    #[test]
    fn gateway_failures_are_transient_downstream() {
        let err: SagaError = GatewayError::Unavailable("timeout".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::TransientDownstream);
        assert!(err.is_transient());
    }
}

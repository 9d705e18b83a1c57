//! Order fulfillment across the order and payment sides.
//!
//! - [`OrderLifecycleManager`] creates, edits, completes and cancels orders,
//!   deducting stock on completion and compensating when a deduction fails
//! - [`PaymentSubmissionManager`] records idempotent payment submissions and
//!   refunds
//! - the [`choreography`] handlers connect the two over the event bus:
//!   a successful payment completes its order, a cancelled order refunds its
//!   payment

pub mod choreography;
pub mod compensation;
pub mod error;
pub mod gateways;
pub mod orders;
pub mod payments;

pub use choreography::{OrderCancelledHandler, PaymentSucceededHandler};
pub use compensation::{Adjustment, CompensationOutcome};
pub use error::{ErrorKind, Result, SagaError};
pub use gateways::{
    CatalogItem, CatalogLoadError, GatewayError, InMemoryInventory, InMemoryOrderSnapshots,
    InventoryGateway, OrderSnapshot, OrderSnapshotReader,
};
pub use orders::{LineRequest, OrderLifecycleManager};
pub use payments::{PaymentSubmissionManager, RefundOutcome, payment_id_for};

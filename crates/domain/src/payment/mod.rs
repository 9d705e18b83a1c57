//! Payment aggregate and related types.

mod aggregate;
mod events;
mod status;

pub use aggregate::Payment;
pub use events::{PaymentEvent, PaymentRecordedData, PaymentRefundedData};
pub use status::PaymentStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment already recorded")]
    AlreadyRecorded,

    #[error("Payment does not exist")]
    NotRecorded,

    /// Only SUCCESS and FAILED can be recorded at creation.
    #[error("Cannot record a payment as {0}")]
    InvalidInitialStatus(PaymentStatus),
}

//! Order aggregate and related types.

mod aggregate;
mod events;
mod line;
mod status;

pub use aggregate::Order;
pub use events::{
    OrderCancelledData, OrderCompletedData, OrderCreatedData, OrderEvent, OrderLinesReplacedData,
};
pub use line::OrderLine;
pub use status::OrderStatus;

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order already created")]
    AlreadyCreated,

    #[error("Order does not exist")]
    NotCreated,

    #[error("Order must have at least one line")]
    NoLines,

    #[error("Invalid quantity {quantity} for '{upc}' (must be at least 1)")]
    InvalidQuantity { upc: String, quantity: u32 },

    #[error("Order total is too large to represent")]
    AmountOverflow,

    /// Order is not in a status that allows the action.
    #[error("Invalid state transition: cannot {action} a {current} order")]
    InvalidStateTransition {
        current: OrderStatus,
        action: &'static str,
    },

    #[error("Order belongs to another account")]
    NotOwner,
}

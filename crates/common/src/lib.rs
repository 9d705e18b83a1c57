//! Shared types for the order fulfillment services.
//!
//! Everything here is owned by neither service: identifiers, the fixed-point
//! [`Money`] type and the explicit caller identity threaded through every
//! manager call.

pub mod identity;
pub mod money;
pub mod types;

pub use identity::{AccountEmail, Caller, InvalidAccountEmail};
pub use money::{InvalidMoney, Money};
pub use types::{AggregateId, InvalidAggregateId};

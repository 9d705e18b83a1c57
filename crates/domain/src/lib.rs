//! Domain layer for order fulfillment.
//!
//! This crate provides:
//! - the `Aggregate` and `DomainEvent` traits for event-sourced entities
//! - `CommandHandler`, which loads an aggregate, runs a command and appends
//!   the resulting events under an optimistic version check
//! - the `Order` aggregate (CREATED → COMPLETED / CANCELED)
//! - the `Payment` aggregate (SUCCESS / FAILED → REFUNDED)

pub mod aggregate;
pub mod command;
pub mod error;
pub mod order;
pub mod payment;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{CommandHandler, CommandResult};
pub use error::DomainError;
pub use order::{Order, OrderError, OrderEvent, OrderLine, OrderStatus};
pub use payment::{Payment, PaymentError, PaymentEvent, PaymentStatus};

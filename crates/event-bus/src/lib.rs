//! Integration events between the order and payment sides.
//!
//! Delivery is asynchronous and at-least-once. Messages are keyed by order id
//! and each topic is consumed by one [`Subscriber`] task that processes
//! messages one at a time, so per-key order within a topic is preserved.
//! Each subscriber has a bounded queue; publishers wait when it is full, so
//! a subscriber that falls behind delays delivery but never loses messages.

pub mod bus;
pub mod error;
pub mod message;
pub mod subscriber;

pub use bus::{EventPublisher, InMemoryEventBus};
pub use error::BusError;
pub use message::{IntegrationEvent, Message, ORDER_EVENTS, PAYMENT_EVENTS};
pub use subscriber::{
    DeadLetter, DeadLetterQueue, EventHandler, HandleOutcome, RetryPolicy, Subscriber,
};

//! Append-only event storage with optimistic concurrency.
//!
//! Every write appends one or more envelopes for a single aggregate and is
//! guarded by an expected-version check, so a status decision made on a stale
//! read loses with [`EventStoreError::ConcurrencyConflict`].

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::EventQuery;
pub use store::{AppendOptions, EventStore, EventStoreExt};

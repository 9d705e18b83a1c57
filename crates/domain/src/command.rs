//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{
    AppendOptions, EventEnvelope, EventQuery, EventStore, EventStoreError, EventStoreExt, Version,
};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were persisted. Empty for a no-op command.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

impl<A: Aggregate> CommandResult<A> {
    /// Returns true if the command wrote nothing.
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }
}

/// Loads aggregates from an event store and persists the events commands
/// produce.
///
/// Every write is an append conditioned on the version the command saw, so
/// two commands racing on one aggregate cannot both commit.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replays an aggregate. Unknown ids yield a default (uncreated) instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning `None` if it was never created.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Loads every aggregate that has an event matching `query`, in order of
    /// first appearance.
    pub async fn load_matching(&self, query: EventQuery) -> Result<Vec<A>, DomainError> {
        let ids = self.store.matching_aggregate_ids(query).await?;
        let mut aggregates = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(aggregate) = self.load_existing(id).await? {
                aggregates.push(aggregate);
            }
        }
        Ok(aggregates)
    }

    /// Loads the aggregate, runs `command_fn` against it and appends the
    /// resulting events expecting the loaded version.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        self.commit(aggregate_id, aggregate, command_fn).await
    }

    /// Like [`execute`](Self::execute), but fails with a concurrency conflict
    /// unless the aggregate is still at `expected`.
    ///
    /// Used when a decision was made on an earlier read and side effects have
    /// happened since: the command only commits if nothing else wrote in
    /// between.
    pub async fn execute_at<F>(
        &self,
        aggregate_id: AggregateId,
        expected: Version,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.version() != expected {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: aggregate.version(),
            }
            .into());
        }
        self.commit(aggregate_id, aggregate, command_fn).await
    }

    async fn commit<F>(
        &self,
        aggregate_id: AggregateId,
        mut aggregate: A,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let current_version = aggregate.version();
        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events,
                new_version: current_version,
            });
        }

        let envelopes = Self::build_envelopes(aggregate_id, current_version, &events)?;
        let new_version = self
            .store
            .append(envelopes, AppendOptions::at(current_version))
            .await?;

        tracing::debug!(
            aggregate_type = A::aggregate_type(),
            %aggregate_id,
            events = events.len(),
            version = new_version.as_i64(),
            "events appended"
        );

        aggregate.apply_events(events.iter().cloned());
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    fn build_envelopes(
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut version = current_version;
        events
            .iter()
            .map(|event| {
                version = version.next();
                EventEnvelope::wrap(
                    aggregate_id,
                    A::aggregate_type(),
                    event.event_type(),
                    version,
                    event,
                )
                .map_err(DomainError::from)
            })
            .collect()
    }
}

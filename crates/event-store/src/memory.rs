use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version,
    query::json_contains,
    store::{AppendOptions, EventStore, validate_events_for_append},
};

/// Event store that keeps every envelope in memory.
///
/// Used when no database is configured and throughout the tests. Appends are
/// serialized by a single write lock, which gives the same per-aggregate
/// atomicity as the PostgreSQL unique constraint.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored events.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns the number of stored events for one aggregate.
    pub async fn event_count_for(&self, aggregate_id: AggregateId) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .count()
    }
}

fn current_version(events: &[EventEnvelope], aggregate_id: AggregateId) -> Version {
    events
        .iter()
        .filter(|e| e.aggregate_id == aggregate_id)
        .map(|e| e.version)
        .max()
        .unwrap_or(Version::initial())
}

fn matches(envelope: &EventEnvelope, query: &EventQuery) -> bool {
    if query.aggregate_id.is_some_and(|id| id != envelope.aggregate_id) {
        return false;
    }
    if let Some(ref aggregate_type) = query.aggregate_type
        && &envelope.aggregate_type != aggregate_type
    {
        return false;
    }
    if let Some(ref types) = query.event_types
        && !types.contains(&envelope.event_type)
    {
        return false;
    }
    if let Some(ref pattern) = query.payload_contains
        && !json_contains(&envelope.payload, pattern)
    {
        return false;
    }
    true
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let mut store = self.events.write().await;
        let current = current_version(&store, aggregate_id);

        if let Some(expected) = options.expected_version
            && current != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current,
            });
        }

        // Mirrors the (aggregate_id, version) unique constraint.
        if events[0].version != current.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: events[0].version,
                actual: current,
            });
        }

        let last = events[events.len() - 1].version;
        store.extend(events);
        Ok(last)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let matching = store.iter().filter(|e| matches(e, &query)).cloned();
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let store = self.events.read().await;
        let version = current_version(&store, aggregate_id);
        Ok((version != Version::initial()).then_some(version))
    }
}

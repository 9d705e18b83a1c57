//! PostgreSQL integration tests.
//!
//! These need Docker and share one PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use event_store::{
    AggregateId, AppendOptions, EventEnvelope, EventQuery, EventStore, EventStoreExt,
    PostgresEventStore, Version,
};
use serde_json::json;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // keeps the container alive
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string = format!("postgres://postgres:postgres@{host}:{port}/postgres");

            let pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_events_table.sql"))
                .execute(&pool)
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn test_store() -> PostgresEventStore {
    let info = container_info().await;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE events")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventStore::new(pool)
}

fn event(
    aggregate_id: AggregateId,
    aggregate_type: &str,
    version: i64,
    event_type: &str,
    data: serde_json::Value,
) -> EventEnvelope {
    EventEnvelope::wrap(
        aggregate_id,
        aggregate_type,
        event_type,
        Version::new(version),
        &json!({"type": event_type, "data": data}),
    )
    .unwrap()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn append_and_read_back() {
    let store = test_store().await;
    let id = AggregateId::new();

    let version = store
        .append(
            vec![
                event(id, "Order", 1, "OrderCreated", json!({"account": "a@b.io"})),
                event(id, "Order", 2, "OrderCompleted", json!({})),
            ],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    assert_eq!(version, Version::new(2));
    let events = store.get_events_for_aggregate(id).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].payload["data"]["account"], "a@b.io");
    assert_eq!(events[1].event_type, "OrderCompleted");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn stale_version_conflicts() {
    let store = test_store().await;
    let id = AggregateId::new();
    store
        .append(
            vec![event(id, "Order", 1, "OrderCreated", json!({}))],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let err = store
        .append(
            vec![event(id, "Order", 2, "OrderCancelled", json!({}))],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    store
        .append(
            vec![event(id, "Order", 2, "OrderCancelled", json!({}))],
            AppendOptions::expect_version(Version::first()),
        )
        .await
        .unwrap();
    assert_eq!(store.get_aggregate_version(id).await.unwrap(), Some(Version::new(2)));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn unique_constraint_rejects_duplicate_version() {
    let store = test_store().await;
    let id = AggregateId::new();
    store
        .append(vec![event(id, "Payment", 1, "PaymentRecorded", json!({}))], AppendOptions::new())
        .await
        .unwrap();

    let err = store
        .append(vec![event(id, "Payment", 1, "PaymentRecorded", json!({}))], AppendOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn query_by_payload_containment() {
    let store = test_store().await;
    let order_id = AggregateId::new();
    let (p1, p2) = (AggregateId::new(), AggregateId::new());

    store
        .append(
            vec![event(p1, "Payment", 1, "PaymentRecorded", json!({"order_id": order_id}))],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();
    store
        .append(
            vec![event(p2, "Payment", 1, "PaymentRecorded", json!({"order_id": AggregateId::new()}))],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let ids = store
        .matching_aggregate_ids(
            EventQuery::for_aggregate_type("Payment")
                .event_type("PaymentRecorded")
                .payload_contains(json!({"data": {"order_id": order_id}})),
        )
        .await
        .unwrap();
    assert_eq!(ids, vec![p1]);

    let limited = store
        .query_events(EventQuery::for_aggregate_type("Payment").limit(1))
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].aggregate_id, p1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn aggregate_exists_reflects_writes() {
    let store = test_store().await;
    let id = AggregateId::new();
    assert!(!store.aggregate_exists(id).await.unwrap());

    store
        .append(vec![event(id, "Order", 1, "OrderCreated", json!({}))], AppendOptions::expect_new())
        .await
        .unwrap();
    assert!(store.aggregate_exists(id).await.unwrap());
}

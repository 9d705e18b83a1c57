//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::Money;
use event_bus::{InMemoryEventBus, RetryPolicy};
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{CatalogItem, InMemoryInventory};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const BUYER: &str = "buyer@example.com";

fn catalog() -> InMemoryInventory {
    InMemoryInventory::with_items([
        CatalogItem {
            item_id: "1".to_string(),
            upc: "000111".to_string(),
            name: "Widget".to_string(),
            unit_price: Money::from_cents(350),
            available_units: 10,
        },
        CatalogItem {
            item_id: "2".to_string(),
            upc: "000222".to_string(),
            name: "Gadget".to_string(),
            unit_price: Money::from_cents(125),
            available_units: 10,
        },
    ])
}

struct TestApp {
    router: axum::Router,
    state: api::AppState,
    bus: InMemoryEventBus,
    inventory: InMemoryInventory,
}

fn setup() -> TestApp {
    let inventory = catalog();
    let bus = InMemoryEventBus::default().with_history();
    let state = api::create_state(
        Arc::new(InMemoryEventStore::new()),
        "memory",
        Arc::new(inventory.clone()),
        &bus,
    );
    let router = api::create_app(state.clone(), get_metrics_handle());

    TestApp {
        router,
        state,
        bus,
        inventory,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        account: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(account) = account {
            request = request.header("x-account-email", account);
        }
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(serde_json::to_string(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn create_order(&self) -> String {
        let (status, json) = self
            .send(
                "POST",
                "/api/v1/orders",
                Some(BUYER),
                Some(json!({
                    "lines": [
                        { "upc": "000111", "quantity": 2 },
                        { "upc": "000222", "quantity": 4 }
                    ]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = app.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["event_store"], "memory");
}

#[tokio::test]
async fn test_create_and_get_order() {
    let app = setup();
    let order_id = app.create_order().await;

    let (status, json) = app
        .send("GET", &format!("/api/v1/orders/{order_id}"), None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CREATED");
    assert_eq!(json["account"], BUYER);
    assert_eq!(json["totalAmount"], "12.00");
    assert_eq!(json["lines"][0]["name"], "Widget");
    assert_eq!(json["lines"][0]["lineTotal"], "7.00");
}

#[tokio::test]
async fn test_create_order_requires_identity() {
    let app = setup();
    let body = json!({ "lines": [{ "upc": "000111", "quantity": 1 }] });

    let (status, json) = app
        .send("POST", "/api/v1/orders", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().is_some());

    let (status, _) = app
        .send("POST", "/api/v1/orders", Some("not-an-email"), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_code_and_bad_ids() {
    let app = setup();

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/orders",
            Some(BUYER),
            Some(json!({ "lines": [{ "upc": "999999", "quantity": 1 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("GET", "/api/v1/orders/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "GET",
            "/api/v1/orders/00000000-0000-0000-0000-000000000001",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_by_another_account_is_forbidden() {
    let app = setup();
    let order_id = app.create_order().await;
    let body = json!({ "lines": [{ "upc": "000222", "quantity": 1 }] });

    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/v1/orders/{order_id}"),
            Some("other@example.com"),
            Some(body.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = app
        .send("PUT", &format!("/api/v1/orders/{order_id}"), Some(BUYER), Some(body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalAmount"], "1.25");
}

#[tokio::test]
async fn test_list_orders_and_by_account() {
    let app = setup();
    app.create_order().await;
    app.create_order().await;

    let (status, json) = app.send("GET", "/api/v1/orders", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (status, json) = app
        .send(
            "GET",
            "/api/v1/orders/by-account?email=buyer@example.com",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (_, json) = app
        .send(
            "GET",
            "/api/v1/orders/by-account?email=nobody@example.com",
            None,
            None,
        )
        .await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_complete_and_cancel_over_http() {
    let app = setup();
    let order_id = app.create_order().await;

    let (status, json) = app
        .send("POST", &format!("/api/v1/orders/{order_id}/complete"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "COMPLETED");
    assert_eq!(app.inventory.available("000111"), Some(8));

    let (status, _) = app
        .send("POST", &format!("/api/v1/orders/{order_id}/complete"), None, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = app
        .send("POST", &format!("/api/v1/orders/{order_id}/cancel"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CANCELED");
    assert_eq!(app.inventory.available("000111"), Some(10));
}

#[tokio::test]
async fn test_submit_payment_is_idempotent() {
    let app = setup();
    let order_id = app.create_order().await;
    let body = json!({ "orderId": order_id, "amount": "12.00", "idempotencyKey": "k1" });

    let (status, first) = app
        .send("POST", "/api/v1/payments", Some(BUYER), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["status"], "SUCCESS");

    let (_, second) = app
        .send("POST", "/api/v1/payments", Some(BUYER), Some(body))
        .await;
    assert_eq!(first["id"], second["id"]);
    assert_eq!(app.bus.published_on(event_bus::PAYMENT_EVENTS).len(), 1);

    let (status, json) = app
        .send(
            "GET",
            &format!("/api/v1/payments/by-order?orderId={order_id}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], first["id"]);
}

#[tokio::test]
async fn test_payment_validation() {
    let app = setup();
    let order_id = app.create_order().await;

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/payments",
            Some(BUYER),
            Some(json!({ "orderId": order_id, "amount": "0.00", "idempotencyKey": "k1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/payments",
            None,
            Some(json!({ "orderId": order_id, "amount": "12.00", "idempotencyKey": "k1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refund_with_and_without_body() {
    let app = setup();
    let order_id = app.create_order().await;
    let (_, payment) = app
        .send(
            "POST",
            "/api/v1/payments",
            Some(BUYER),
            Some(json!({ "orderId": order_id, "amount": "12.00", "idempotencyKey": "k1" })),
        )
        .await;
    let payment_id = payment["id"].as_str().unwrap();

    let (status, json) = app
        .send(
            "POST",
            &format!("/api/v1/payments/{payment_id}/refund"),
            Some(BUYER),
            Some(json!({ "amount": "12.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "REFUNDED");

    let (status, json) = app
        .send(
            "POST",
            &format!("/api/v1/payments/{payment_id}/refund"),
            Some(BUYER),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "REFUNDED");

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/v1/payments/{payment_id}/refund"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paid_order_is_completed_by_choreography() {
    let app = setup();
    let shutdown = CancellationToken::new();
    let subscribers = api::spawn_subscribers(
        &app.state,
        &app.bus,
        RetryPolicy::new(3, Duration::from_millis(10)),
        shutdown.clone(),
    );
    let order_id = app.create_order().await;

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/payments",
            Some(BUYER),
            Some(json!({ "orderId": order_id, "amount": "12.00", "idempotencyKey": "k1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let completed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (_, json) = app
                .send("GET", &format!("/api/v1/orders/{order_id}"), None, None)
                .await;
            if json["status"] == "COMPLETED" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(completed.is_ok(), "order was not completed");

    shutdown.cancel();
    for handle in subscribers {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    app.create_order().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

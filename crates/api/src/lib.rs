//! HTTP API for the order fulfillment saga.
//!
//! Exposes the order and payment managers over REST, wires the two
//! choreography subscribers onto the event bus, and serves health and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_bus::{InMemoryEventBus, ORDER_EVENTS, PAYMENT_EVENTS, RetryPolicy, Subscriber};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    InventoryGateway, OrderCancelledHandler, OrderLifecycleManager, PaymentSubmissionManager,
    PaymentSucceededHandler,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    let api = Router::new()
        .route("/orders", post(routes::orders::create).get(routes::orders::list))
        .route("/orders/by-account", get(routes::orders::list_by_account))
        .route(
            "/orders/{id}",
            get(routes::orders::get).put(routes::orders::update),
        )
        .route("/orders/{id}/complete", post(routes::orders::complete))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/payments", post(routes::payments::submit))
        .route("/payments/by-order", get(routes::payments::get_by_order))
        .route("/payments/{id}", get(routes::payments::get))
        .route("/payments/{id}/refund", post(routes::payments::refund));

    Router::new()
        .route("/health", get(routes::ops::health))
        .nest("/api/v1", api)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds both managers over one event store, one inventory and one bus.
///
/// The payment side reads orders through the order manager.
pub fn create_state(
    event_store: Arc<dyn EventStore>,
    event_store_kind: &'static str,
    inventory: Arc<dyn InventoryGateway>,
    bus: &InMemoryEventBus,
) -> AppState {
    let orders = Arc::new(OrderLifecycleManager::new(
        event_store.clone(),
        inventory,
        Arc::new(bus.clone()),
    ));
    let payments = Arc::new(PaymentSubmissionManager::new(
        event_store,
        orders.clone(),
        Arc::new(bus.clone()),
    ));

    AppState {
        orders,
        payments,
        event_store: event_store_kind,
    }
}

/// Starts one subscriber per topic: successful payments complete orders,
/// cancelled orders refund payments. The tasks stop when `shutdown` fires.
pub fn spawn_subscribers(
    state: &AppState,
    bus: &InMemoryEventBus,
    policy: RetryPolicy,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let on_payment = Subscriber::new(
        bus.subscribe(PAYMENT_EVENTS),
        Arc::new(PaymentSucceededHandler::new(state.orders.clone())),
        shutdown.clone(),
    )
    .with_retry_policy(policy);

    let on_cancel = Subscriber::new(
        bus.subscribe(ORDER_EVENTS),
        Arc::new(OrderCancelledHandler::new(state.payments.clone())),
        shutdown,
    )
    .with_retry_policy(policy);

    vec![on_payment.spawn(), on_cancel.spawn()]
}

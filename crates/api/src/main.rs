//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use event_bus::InMemoryEventBus;
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use saga::InMemoryInventory;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    // 1. Configuration and tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Event store: PostgreSQL when configured, in-memory otherwise
    let (event_store, event_store_kind): (Arc<dyn EventStore>, &'static str) =
        match &config.database_url {
            Some(url) => {
                let store = PostgresEventStore::connect(url)
                    .await
                    .expect("failed to connect to PostgreSQL");
                (Arc::new(store), "postgres")
            }
            None => {
                tracing::warn!("DATABASE_URL not set, events are kept in memory");
                (Arc::new(InMemoryEventStore::new()), "memory")
            }
        };

    // 4. Inventory and bus
    let inventory = match &config.catalog_file {
        Some(path) => {
            InMemoryInventory::from_json_file(path).expect("failed to load catalog file")
        }
        None => {
            tracing::warn!("CATALOG_FILE not set, starting with an empty catalog");
            InMemoryInventory::new()
        }
    };
    let bus = InMemoryEventBus::new(config.event_bus_capacity);

    // 5. Managers and choreography
    let state = api::create_state(event_store, event_store_kind, Arc::new(inventory), &bus);
    let shutdown = CancellationToken::new();
    let subscribers =
        api::spawn_subscribers(&state, &bus, config.retry_policy(), shutdown.clone());

    // 6. Start server
    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, event_store = event_store_kind, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Stop subscribers
    shutdown.cancel();
    for handle in subscribers {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "subscriber task failed");
        }
    }

    tracing::info!("server shut down gracefully");
}

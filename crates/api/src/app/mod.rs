//! Application assembly: store selection, services wiring, routing.

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::Extension,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
};
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use tower::ServiceBuilder;

use depot_infra::event_store::{EventStore, InMemoryEventStore};
#[cfg(feature = "postgres")]
use depot_infra::event_store::PostgresEventStore;

use crate::app::services::AppServices;

/// Build the HTTP application with its backing services.
///
/// The event store defaults to in-memory; set `USE_PERSISTENT_STORES=true`
/// (with the `postgres` feature and `DATABASE_URL`) for a durable backend.
/// Read models always live in memory and are replayed from the store on
/// startup.
pub async fn build_app() -> Router {
    let store = build_event_store().await;
    let services = services::build_services(store);

    Router::new()
        .route("/health", get(health))
        .nest("/v1", v1_router())
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}

async fn build_event_store() -> Arc<dyn EventStore> {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    #[cfg(feature = "postgres")]
    if use_persistent {
        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

        let store = PostgresEventStore::connect(&database_url)
            .await
            .expect("failed to connect to Postgres");
        store
            .ensure_schema()
            .await
            .expect("failed to ensure event store schema");

        return Arc::new(store);
    }

    #[cfg(not(feature = "postgres"))]
    if use_persistent {
        tracing::warn!(
            "USE_PERSISTENT_STORES=true but the postgres feature is not enabled, using in-memory store"
        );
    }

    Arc::new(InMemoryEventStore::new())
}

fn v1_router() -> Router {
    Router::new()
        .route("/stream", get(stream))
        .nest("/inventory", routes::inventory::router())
        .nest("/funds", routes::funds::router())
        .merge(routes::catalog::router())
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// SSE feed of projection-update notifications (lossy broadcast).
async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(m) => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

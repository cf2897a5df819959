use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    catalog::build_catalog_source,
    config::{CatalogSourceKind, Config, StorageBackend},
    db, handlers, metrics,
    persistence::DebouncedWriter,
    signals::setup_signal_handlers,
    state::AppState,
    store::build_quote_store,
};

/// Request bodies are small JSON documents
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Start the Offerte engine server
///
/// This function:
/// 1. Initializes metrics
/// 2. Opens the database and builds the catalog source and quote store
/// 3. Loads the catalog (the server still starts if that fails, but is not ready)
/// 4. Sets up signal handlers for graceful shutdown and catalog reload
/// 5. Serves requests until shutdown, then flushes every open quote
pub async fn start_server(config: Config) -> Result<()> {
    let metrics_handle = if config.metrics.enabled {
        info!("Initializing Prometheus metrics...");
        Some(Arc::new(metrics::init_metrics()?))
    } else {
        None
    };

    let state = build_state(&config).await?;

    match state.reload_catalog().await {
        Ok(_) => {
            let catalog = state.current_catalog()?;
            info!(
                "Catalog loaded from {}: {} categories",
                state.catalog_source.describe(),
                catalog.categories.len()
            );
        }
        Err(e) => warn!(
            "Catalog unavailable, quotes cannot be priced until it is reloaded: {}",
            e
        ),
    }

    let (shutdown_tx, signal_handle) = setup_signal_handlers(state.clone())?;
    let mut shutdown_rx = shutdown_tx.subscribe();

    let app = create_router(state.clone(), metrics_handle, &config.metrics.endpoint);

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .with_context(|| format!("Invalid server.host: {}", config.server.host))?,
        config.server.port,
    ));

    info!("Starting Offerte engine on {}", addr);
    info!(
        "Configuration: catalog source {:?}, storage {:?}, debounce {}ms",
        config.catalog.source, config.storage.backend, config.persistence.debounce_ms
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    // Persist the latest state of every open quote
    let open = state.sessions.snapshots();
    info!("Flushing {} open quote(s)", open.len());
    for snapshot in open {
        state.writer.submit(snapshot);
    }
    state.writer.shutdown().await;

    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Wire storage, catalog source and snapshot writer from configuration
pub async fn build_state(config: &Config) -> Result<AppState> {
    let needs_db = config.storage.backend == StorageBackend::Sqlite
        || config.catalog.source == CatalogSourceKind::Database;

    let pool = if needs_db {
        Some(db::connect(&config.storage.database_path).await?)
    } else {
        None
    };

    let store = build_quote_store(&config.storage, pool.clone())?;
    let catalog_source = build_catalog_source(&config.catalog, pool)?;
    let writer = DebouncedWriter::spawn(
        store.clone(),
        Duration::from_millis(config.persistence.debounce_ms),
    );

    Ok(AppState::new(catalog_source, store, writer))
}

/// Create the Axum router with all routes and middleware
pub fn create_router(
    state: AppState,
    metrics_handle: Option<Arc<PrometheusHandle>>,
    metrics_endpoint: &str,
) -> Router {
    let api_routes = Router::new()
        .route("/ready", get(handlers::health::readiness_check))
        .route("/api/catalog", get(handlers::catalog::get_catalog))
        .route("/api/calculate", post(handlers::calculate::calculate))
        .route("/api/quotes", get(handlers::quotes::list_quotes))
        .route(
            "/api/quotes/:number",
            get(handlers::quotes::get_quote).delete(handlers::quotes::delete_quote),
        )
        .route("/api/quotes/:number/open", post(handlers::quotes::open_quote))
        .route("/api/quotes/:number/events", post(handlers::quotes::apply_event))
        .route("/api/quotes/:number/totals", get(handlers::quotes::get_totals))
        .route("/api/quotes/:number/close", post(handlers::quotes::close_quote))
        .with_state(state);

    let mut router = Router::new().route("/health", get(handlers::health::health_check));

    if let Some(handle) = metrics_handle {
        router = router.merge(
            Router::new()
                .route(metrics_endpoint, get(handlers::metrics_handler::metrics))
                .with_state(handle),
        );
    }

    router
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, test_state_without_catalog};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        create_router(state, None, "/metrics")
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = app(test_state());
        assert_eq!(send(&app, "GET", "/health", None).await.0, StatusCode::OK);
        assert_eq!(send(&app, "GET", "/ready", None).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pricing_without_catalog_is_unavailable() {
        let app = app(test_state_without_catalog());

        let (status, body) = send(&app, "GET", "/api/catalog", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["type"], "config_unavailable");

        let (status, _) = send(&app, "POST", "/api/quotes/Q-1/open", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_catalog_in_display_order() {
        let app = app(test_state());
        let (status, body) = send(&app, "GET", "/api/catalog", None).await;

        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body["categories"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_calculate_end_to_end() {
        let app = app(test_state());
        let request = json!({
            "category_entries": [
                {"category_id": "A", "count": 2},
                {"category_id": "B", "count": 1},
                {"category_id": "C", "count": 4}
            ]
        });

        let (status, body) = send(&app, "POST", "/api/calculate", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["computed"]["total_object_count"], 7);
        assert_eq!(body["computed"]["survey"]["raw_quantity"], 8.0);
        assert_eq!(body["prices"]["aufnahme"], 960.0);
    }

    #[tokio::test]
    async fn test_calculate_treats_negative_count_as_zero() {
        let app = app(test_state());
        let request = json!({
            "category_entries": [
                {"category_id": "A", "count": -1},
                {"category_id": "C", "count": 4}
            ]
        });

        let (status, body) = send(&app, "POST", "/api/calculate", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["computed"]["total_object_count"], 4);
        assert_eq!(body["category_entries"][0]["count"], 0);
    }

    #[tokio::test]
    async fn test_calculate_rejects_malformed_body() {
        let app = app(test_state());
        let (status, body) =
            send(&app, "POST", "/api/calculate", Some(json!({"category_entries": 5}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_input");
    }

    #[tokio::test]
    async fn test_quote_session_lifecycle() {
        let state = test_state();
        let app = app(state.clone());

        let (status, view) = send(&app, "POST", "/api/quotes/2024-117/open", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["state"], "computed");

        let counts = json!({
            "type": "set_category_entries",
            "entries": [
                {"category_id": "A", "count": 2},
                {"category_id": "B", "count": 1},
                {"category_id": "C", "count": 4}
            ]
        });
        let (status, view) = send(&app, "POST", "/api/quotes/2024-117/events", Some(counts)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["prices"]["aufnahme"], 960.0);

        let edit = json!({"type": "set_hours_override", "value": 5.0});
        let (_, view) = send(&app, "POST", "/api/quotes/2024-117/events", Some(edit)).await;
        assert_eq!(view["state"], "edited");
        assert_eq!(view["prices"]["aufnahme"], 600.0);
        assert_eq!(view["manual_overrides"], json!(["aufnahme", "subtotal"]));

        let discount = json!({"type": "set_discount", "percent": 10});
        send(&app, "POST", "/api/quotes/2024-117/events", Some(discount)).await;

        let (status, totals) = send(&app, "GET", "/api/quotes/2024-117/totals", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(totals["discount_percent"], 10.0);
        assert_eq!(totals["tax_rate"], 0.081);

        let (status, closed) = send(&app, "POST", "/api/quotes/2024-117/close", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(closed["totals"], totals);

        // Closed: stored, no longer editable
        let stored = state.store.load("2024-117").await.unwrap().unwrap();
        assert_eq!(stored.overrides.hours_override, Some(5.0));
        let (status, _) = send(&app, "GET", "/api/quotes/2024-117", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Reopening re-derives the marks from the stored prices
        let (_, view) = send(&app, "POST", "/api/quotes/2024-117/open", None).await;
        assert_eq!(view["prices"]["aufnahme"], 600.0);
        assert_eq!(view["prices"]["discount_percent"], 10.0);
    }

    #[tokio::test]
    async fn test_events_require_open_session() {
        let app = app(test_state());
        let event = json!({"type": "set_discount", "percent": 5});

        let (status, body) = send(&app, "POST", "/api/quotes/Q-9/events", Some(event)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "session_not_open");
    }

    #[tokio::test]
    async fn test_events_stop_when_catalog_is_lost() {
        let state = test_state();
        let app = app(state.clone());
        send(&app, "POST", "/api/quotes/Q-1/open", None).await;

        state.catalog.store(None);
        let event = json!({"type": "set_discount", "percent": 5});
        let (status, body) = send(&app, "POST", "/api/quotes/Q-1/events", Some(event)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["type"], "config_unavailable");

        // Reading the last state still works
        let (status, _) = send(&app, "GET", "/api/quotes/Q-1/totals", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_event_type_is_bad_request() {
        let app = app(test_state());
        send(&app, "POST", "/api/quotes/Q-1/open", None).await;

        let event = json!({"type": "catalog_reloaded"});
        let (status, _) = send(&app, "POST", "/api/quotes/Q-1/events", Some(event)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let state = test_state();
        let app = app(state.clone());

        send(&app, "POST", "/api/quotes/Q-1/open", None).await;
        state.writer.flush().await;

        let (status, list) = send(&app, "GET", "/api/quotes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["quote_number"], "Q-1");
        assert_eq!(list[0]["open"], true);

        let (status, _) = send(&app, "DELETE", "/api/quotes/Q-1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, "DELETE", "/api/quotes/Q-1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "quote_not_found");
    }
}

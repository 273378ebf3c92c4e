//! movie-server library crate
//!
//! Exposes `build_app` and `config` for integration tests.
//! The actual binary entrypoint is in `main.rs`.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod tracking;

use std::sync::Arc;

use axum::{Extension, Router, middleware as axum_mw, routing::get};
use deadpool_postgres::Pool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::JwtKeys;
use catalog::CatalogClient;
use config::Config;
use middleware::JwtAuth;
use routes::ApiSettings;
use tracking::{PgTrackingStore, Tracker, TrackingStore};

/// Build the full application router, tracking into `requests_tracking`.
pub fn build_app(pool: Pool, config: &Config) -> Router {
    let store: Arc<dyn TrackingStore> = Arc::new(PgTrackingStore::new(pool.clone()));
    build_app_with_store(pool, config, store)
}

/// Build the application with a custom tracking store.
///
/// Extracted so tests can construct the app without binding to a TCP port
/// and inspect the tracking records it writes.
pub fn build_app_with_store(pool: Pool, config: &Config, store: Arc<dyn TrackingStore>) -> Router {
    let keys = JwtKeys::new(
        &config.jwt_secret,
        config.jwt_access_ttl_secs,
        config.jwt_refresh_ttl_secs,
    );
    let auth = JwtAuth::new(keys.clone(), pool.clone());
    let tracker = Tracker::new(config.tracking.clone(), store.clone());

    // None when MOVIE_API_URL is unset; /movies then answers 500
    let catalog: Option<CatalogClient> =
        config
            .movie_api
            .as_ref()
            .and_then(|cfg| match CatalogClient::new(cfg) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to build movie catalog client");
                    None
                }
            });

    // Install Prometheus metrics recorder. A second install (tests) is
    // ignored and the handle still renders.
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let prometheus_handle = recorder.handle();
    let _ = metrics::set_global_recorder(recorder);

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let system_routes = Router::new()
        .route("/health", get(routes::system::health))
        .route("/metrics", get(routes::system::metrics))
        .layer(Extension(prometheus_handle));

    // Tracking sits outside CORS so every response carries the node header;
    // auth sits inside it so its user lookup is counted.
    Router::new()
        .merge(routes::register_routes())
        .merge(routes::api_routes())
        .merge(system_routes)
        .layer(axum_mw::from_fn_with_state(auth, middleware::auth_middleware))
        .layer(Extension(keys))
        .layer(Extension(catalog))
        .layer(Extension(store))
        .layer(Extension(ApiSettings {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }))
        .with_state(pool)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum_mw::from_fn_with_state(tracker, tracking::tracking_middleware))
        .layer(axum_mw::from_fn(middleware::metrics_middleware))
}

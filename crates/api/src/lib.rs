//! HTTP API server with observability for the storefront backend.
//!
//! Provides REST endpoints for order placement and management and for
//! catalog browsing, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::PlacementPolicy;
use metrics_exporter_prometheus::PrometheusHandle;
use storage::{CatalogStore, Store};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + CatalogStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/individual-orders", post(routes::orders::create_individual::<S>))
        .route("/legal-orders", post(routes::orders::create_legal::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>)
                .put(routes::orders::update::<S>)
                .delete(routes::orders::delete::<S>),
        )
        .route("/products", get(routes::catalog::list_products::<S>))
        .route("/products/search", get(routes::catalog::search_products::<S>))
        .route("/products/{id}", get(routes::catalog::get_product::<S>))
        .route("/categories", get(routes::catalog::list_categories::<S>))
        .route("/categories/{id}", get(routes::catalog::get_category::<S>))
        .route("/brands", get(routes::catalog::list_brands::<S>))
        .route("/brands/{id}", get(routes::catalog::get_brand::<S>))
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

/// Creates the application state over `store` using the configured policy.
pub fn create_state<S: Store + CatalogStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let policy = PlacementPolicy {
        enforce_price_match: config.enforce_price_match,
    };
    Arc::new(AppState::new(store, policy))
}

//! HTTP API server for the warehouse.
//!
//! Exposes order fulfillment, the product/location catalog and user
//! accounts as JSON endpoints under `/api/v1`, with bearer-token role
//! checks, structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{MethodRouter, get, post, put};
use config::Config;
use domain::{CatalogService, FulfillmentService, TokenIssuer, UserService};
use metrics_exporter_prometheus::PrometheusHandle;
use storage::WarehouseStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::{AppState, SharedState};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: WarehouseStore>(
    state: SharedState<S>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    let api = Router::new()
        .route("/register", post(routes::users::register::<S>))
        .route("/login", post(routes::users::login::<S>))
        .route("/users", admin_only(get(routes::users::list::<S>)))
        .route("/users/me", members_only(get(routes::users::me::<S>)))
        .route("/orders", members_only(get(routes::orders::list::<S>)))
        .route("/orders/receive", staff_only(post(routes::orders::receive::<S>)))
        .route("/orders/ship", staff_only(post(routes::orders::ship::<S>)))
        .route("/orders/{id}", members_only(get(routes::orders::get::<S>)))
        .route(
            "/products",
            admin_only(post(routes::products::create::<S>))
                .merge(members_only(get(routes::products::list::<S>))),
        )
        .route(
            "/products/{id}",
            members_only(get(routes::products::get::<S>)).merge(admin_only(
                put(routes::products::update::<S>).delete(routes::products::delete::<S>),
            )),
        )
        .route(
            "/locations",
            admin_only(post(routes::locations::create::<S>))
                .merge(members_only(get(routes::locations::list::<S>))),
        )
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, auth::authenticate::<S>));

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api/v1", api)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

fn admin_only<T: Clone + Send + Sync + 'static>(route: MethodRouter<T>) -> MethodRouter<T> {
    route.route_layer(middleware::from_fn(auth::require_admin))
}

fn staff_only<T: Clone + Send + Sync + 'static>(route: MethodRouter<T>) -> MethodRouter<T> {
    route.route_layer(middleware::from_fn(auth::require_staff))
}

fn members_only<T: Clone + Send + Sync + 'static>(route: MethodRouter<T>) -> MethodRouter<T> {
    route.route_layer(middleware::from_fn(auth::require_member))
}

/// Creates the application state over a single store.
///
/// Without a configured secret, tokens are signed with a random key and stop
/// verifying when the process restarts.
pub fn create_state<S: WarehouseStore>(store: S, config: &Config) -> SharedState<S> {
    let secret = config
        .jwt_secret
        .clone()
        .unwrap_or_else(|| {
            format!(
                "{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            )
        });
    let tokens = TokenIssuer::new(secret.as_bytes(), config.token_ttl);

    Arc::new(AppState {
        fulfillment: FulfillmentService::with_deadline(store.clone(), config.request_timeout),
        catalog: CatalogService::new(store.clone()),
        users: UserService::new(store, tokens).with_hash_cost(config.bcrypt_cost),
    })
}

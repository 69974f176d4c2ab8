//! Gatehouse kernel library.
//!
//! Builds the HTTP pipeline around the user and article services. The
//! `gatehouse` binary wires it to real stores; integration tests drive the
//! same router over in-memory ones.

pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod validation;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{build_cors_layer, log_request, rate_limit, recover};
use crate::state::AppState;

/// Build the full application router.
///
/// Request flow (last added = first executed):
/// trace → recovery → CORS → logging → timeout → rate limit → routes,
/// with the token check applied per route on protected endpoints.
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config().cors_allowed_origins);
    let timeout = state.config().request_timeout;
    let proxies = state.trusted_proxies().clone();

    Router::new()
        .merge(routes::health::router())
        .nest(routes::API_PREFIX, routes::api(&state))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(from_fn_with_state(proxies.clone(), log_request))
        .layer(cors)
        .layer(from_fn_with_state(proxies, recover))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

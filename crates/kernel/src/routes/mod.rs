//! HTTP route handlers.
//!
//! Public routes are reachable anonymously; protected routes sit behind the
//! token check. Both are nested under `/api/v1`, health endpoints stay at
//! the root.

pub mod article;
pub mod auth;
pub mod extract;
pub mod health;
pub mod user;

use axum::Router;
use axum::middleware::from_fn_with_state;

use crate::middleware::require_auth;
use crate::state::AppState;

/// Version prefix for every business endpoint.
pub const API_PREFIX: &str = "/api/v1";

/// Create the versioned API router.
pub fn api(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .merge(auth::router())
        .merge(article::router());

    let protected = Router::new()
        .merge(auth::protected_router())
        .merge(user::router())
        .merge(article::protected_router())
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new().merge(public).merge(protected)
}

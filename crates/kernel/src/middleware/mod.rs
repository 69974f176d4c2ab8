//! HTTP middleware components.
//!
//! Request pipeline order, outermost first:
//! recovery → CORS → logging → rate limit → (auth on protected routes) → handler.

pub mod auth;
pub mod client_ip;
pub mod cors;
pub mod logging;
pub mod rate_limit;
pub mod recovery;

pub use auth::{CurrentUser, extract_token, require_auth};
pub use client_ip::{TrustedProxies, get_client_id};
pub use cors::build_cors_layer;
pub use logging::log_request;
pub use rate_limit::{RateLimiter, rate_limit};
pub use recovery::recover;

//! Per-request access log.

use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

use crate::error::RecordedError;
use crate::middleware::client_ip::TrustedProxies;

/// Log one event per request once the downstream chain has produced a response.
pub async fn log_request(
    State(proxies): State<TrustedProxies>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();
    let client_ip = proxies.client_id(&request);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = next.run(request).await;

    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status().as_u16();

    match response.extensions().get::<RecordedError>() {
        Some(RecordedError(error)) => warn!(
            method = %method,
            path = %path,
            query = %query,
            client_ip = %client_ip,
            user_agent = %user_agent,
            status,
            latency_ms,
            error = %error,
            "request"
        ),
        None => info!(
            method = %method,
            path = %path,
            query = %query,
            client_ip = %client_ip,
            user_agent = %user_agent,
            status,
            latency_ms,
            "request"
        ),
    }

    response
}

//! Outermost pipeline stage: turns a panic anywhere downstream into a 500.

use std::any::Any;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tokio_util::task::AbortOnDropHandle;
use tracing::error;

use crate::middleware::client_ip::TrustedProxies;
use crate::response::{Envelope, ErrorCode};

/// Run the rest of the chain on its own task and catch panics.
///
/// If the client goes away, this future is dropped and the handler task is
/// aborted with it.
pub async fn recover(
    State(proxies): State<TrustedProxies>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = proxies.client_id(&request);

    let task = AbortOnDropHandle::new(tokio::spawn(next.run(request)));

    match task.await {
        Ok(response) => response,
        Err(e) => {
            let reason = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                "handler task cancelled".to_string()
            };
            error!(
                method = %method,
                path = %path,
                client_ip = %client_ip,
                panic = %reason,
                "recovered from handler fault"
            );
            Envelope::failure(ErrorCode::InternalError, None)
                .with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => payload
            .downcast_ref::<&'static str>()
            .map(|s| (*s).to_string())
            .unwrap_or_else(|| "unknown panic".to_string()),
    }
}

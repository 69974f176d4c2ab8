//! Health endpoints.
//!
//! `/health` and `/ready` answer 503 when the system cannot serve traffic;
//! they are the only handlers whose transport status follows the outcome.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde_json::{Value, json};

use crate::health::OverallStatus;
use crate::response::{Envelope, ErrorCode};
use crate::state::AppState;

async fn ping() -> Envelope<Value> {
    Envelope::success(json!({
        "message": "pong",
        "time": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    }))
}

/// Full dependency report. Degraded still counts as serving.
async fn health(State(state): State<AppState>) -> Response {
    let report = state.health().check_all().await;

    if report.status == OverallStatus::Unhealthy {
        Envelope::with_data(ErrorCode::ServiceUnavailable, report)
            .with_status(StatusCode::SERVICE_UNAVAILABLE)
    } else {
        Envelope::success(report).with_status(StatusCode::OK)
    }
}

/// Mandatory dependencies only.
async fn ready(State(state): State<AppState>) -> Response {
    let readiness = state.health().readiness().await;

    if readiness.ready {
        Envelope::success(readiness).with_status(StatusCode::OK)
    } else {
        Envelope::with_data(ErrorCode::ServiceUnavailable, readiness)
            .with_status(StatusCode::SERVICE_UNAVAILABLE)
    }
}

async fn live() -> Envelope<Value> {
    Envelope::success(json!({
        "status": "alive",
        "timestamp": Utc::now().timestamp(),
    }))
}

/// Create the health check router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/live", get(live))
}

//! Registration, login and token maintenance.

use axum::extract::State;
use axum::routing::post;
use axum::Router;
use serde_json::{Value, json};
use tracing::info;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::Envelope;
use crate::routes::extract::ApiJson;
use crate::services::user::{LoginRequest, LoginResponse, RegisterRequest};
use crate::state::AppState;

async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<Envelope<Value>> {
    let user = state.users().register(req).await?;

    Ok(Envelope::success_with_message(
        json!({ "user_id": user.id, "username": user.username }),
        "registration successful",
    ))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Envelope<LoginResponse>> {
    let response = state.users().login(req).await?;
    Ok(Envelope::success_with_message(response, "login successful"))
}

/// Tokens are stateless, so logging out is only acknowledged.
async fn logout(user: CurrentUser) -> Envelope<()> {
    info!(user_id = user.user_id, "user logged out");
    Envelope::message("logout successful")
}

async fn refresh(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Envelope<Value>> {
    let token = state.users().refresh_token(&user.token)?;
    Ok(Envelope::success(json!({ "token": token })))
}

/// Anonymous auth routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Auth routes that need a valid token.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
}

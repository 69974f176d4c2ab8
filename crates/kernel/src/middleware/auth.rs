//! Identity token authentication middleware.
//!
//! Accepts the raw token in `X-Token` or as `Authorization: Bearer <token>`,
//! validates it, and stores the caller's identity in request extensions.

use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::AppError;
use crate::response::ErrorCode;
use crate::services::token::Claims;
use crate::state::AppState;

/// Dedicated header carrying a raw token. Takes precedence over `Authorization`.
pub const TOKEN_HEADER: &str = "x-token";

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: i64,
    pub username: String,
    /// The token the caller presented.
    pub token: String,
}

impl CurrentUser {
    fn from_claims(claims: Claims, token: String) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            token,
        }
    }
}

/// Pull the token out of the request headers.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(raw) = headers.get(TOKEN_HEADER)
        && let Ok(value) = raw.to_str()
        && !value.trim().is_empty()
    {
        return Some(value.trim());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware rejecting requests without a valid token.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_token(request.headers()).map(str::to_string) else {
        return AppError::new(ErrorCode::TokenMissing).into_response();
    };

    let claims = match state.tokens().validate(&token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, path = %request.uri().path(), "token rejected");
            return AppError::from(e).into_response();
        }
    };

    request
        .extensions_mut()
        .insert(CurrentUser::from_claims(claims, token));

    next.run(request).await
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::new(ErrorCode::LoginRequired))
    }
}
